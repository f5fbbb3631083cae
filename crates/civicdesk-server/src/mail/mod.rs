//! Outbound email.
//!
//! [`Mailer`] renders each notification into a [`MailMessage`] and hands it
//! to a [`MailTransport`]:
//! - [`LogTransport`] writes messages to the log (development and tests)
//! - `WebhookTransport` posts them as JSON to an HTTP relay (`webhook-mail`
//!   feature)

pub mod templates;
#[cfg(feature = "webhook-mail")]
pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use civicdesk_core::model::IssueReport;
use civicdesk_core::notify::{NotificationError, Notifier};

#[cfg(feature = "webhook-mail")]
pub use webhook::WebhookTransport;

/// A rendered plain-text email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: &MailMessage) -> Result<(), NotificationError>;
}

/// Logs every message instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<(), NotificationError> {
        info!(to = %message.to, subject = %message.subject, "Mail (log transport)");
        debug!(body = %message.body, "Mail body");
        Ok(())
    }
}

/// Email-backed [`Notifier`].
pub struct Mailer<T> {
    transport: T,
    sender: String,
    base_url: String,
}

impl<T: MailTransport> Mailer<T> {
    pub fn new(transport: T, sender: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            sender: sender.into(),
            base_url: base_url.into(),
        }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: MailTransport> Notifier for Mailer<T> {
    async fn send_verification(&self, email: &str, token: &str) -> Result<(), NotificationError> {
        let message = templates::verification(&self.sender, email, &self.base_url, token);
        self.transport.deliver(&message).await
    }

    async fn send_submission_confirmation(
        &self,
        email: &str,
        report: &IssueReport,
    ) -> Result<(), NotificationError> {
        let message = templates::submission_confirmation(&self.sender, email, report);
        self.transport.deliver(&message).await
    }

    async fn send_status_change(
        &self,
        email: &str,
        report: &IssueReport,
    ) -> Result<(), NotificationError> {
        let message = templates::status_change(&self.sender, email, report);
        self.transport.deliver(&message).await
    }

    async fn send_deletion_notice(
        &self,
        email: &str,
        report: &IssueReport,
        message: &str,
    ) -> Result<(), NotificationError> {
        let message = templates::deletion_notice(&self.sender, email, report, message);
        self.transport.deliver(&message).await
    }
}
