//! HTTP webhook mail transport.
//!
//! Posts each rendered message as JSON to a mail relay endpoint that does the
//! actual SMTP delivery.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use civicdesk_core::notify::NotificationError;

use super::{MailMessage, MailTransport};

#[derive(Debug, Clone)]
pub struct WebhookTransport {
    http: reqwest::Client,
    url: String,
}

impl WebhookTransport {
    /// `timeout` bounds the whole request; connecting gets at most half of it.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotificationError> {
        if url.trim().is_empty() {
            return Err(NotificationError::Config("mail webhook url is empty".into()));
        }

        // reqwest is built with `rustls-no-provider`. `Err` means a provider
        // is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .connect_timeout(timeout / 2)
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MailTransport for WebhookTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<(), NotificationError> {
        let response = self
            .http
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(to = %message.to, "Mail accepted by webhook");
            Ok(())
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            warn!(status = status.as_u16(), body = %body, "Mail webhook returned error");
            Err(NotificationError::Delivery(format!(
                "webhook returned {}: {body}",
                status.as_u16()
            )))
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn message() -> MailMessage {
        MailMessage {
            from: "desk@x".into(),
            to: "a@x".into(),
            subject: "s".into(),
            body: "b".into(),
        }
    }

    #[test]
    fn empty_url_is_config_error() {
        assert!(matches!(
            WebhookTransport::new("  ", TIMEOUT),
            Err(NotificationError::Config(_))
        ));
    }

    #[test]
    fn keeps_configured_url() {
        let transport = WebhookTransport::new("https://mail.example/send", TIMEOUT).unwrap();
        assert_eq!(transport.url(), "https://mail.example/send");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_delivery_error() {
        let transport = WebhookTransport::new("http://127.0.0.1:9/send", TIMEOUT).unwrap();
        assert!(matches!(
            transport.deliver(&message()).await,
            Err(NotificationError::Delivery(_))
        ));
    }

    #[tokio::test]
    async fn silent_endpoint_times_out() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let transport =
            WebhookTransport::new(&format!("http://{addr}/send"), Duration::from_millis(200))
                .unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), transport.deliver(&message()))
            .await
            .expect("deliver should give up on its own");
        assert!(matches!(result, Err(NotificationError::Delivery(_))));
        server.abort();
    }
}
