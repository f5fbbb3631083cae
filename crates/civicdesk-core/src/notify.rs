//! Outbound notifications.
//!
//! The verification email is sent inline because registration depends on it.
//! Every other notification is best-effort: it runs on a tracked background
//! task, and failures are logged and dropped. Every send is bounded by a
//! delivery timeout so a stuck transport cannot hold up registration or
//! shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::error::Error;
use crate::model::IssueReport;

/// Errors that can occur while delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Notifier misconfigured: {0}")]
    Config(String),
}

impl From<NotificationError> for Error {
    fn from(e: NotificationError) -> Self {
        Self::NotificationError(e.to_string())
    }
}

/// Delivery channel for user-facing messages (typically email).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification(&self, email: &str, token: &str) -> Result<(), NotificationError>;

    async fn send_submission_confirmation(
        &self,
        email: &str,
        report: &IssueReport,
    ) -> Result<(), NotificationError>;

    async fn send_status_change(
        &self,
        email: &str,
        report: &IssueReport,
    ) -> Result<(), NotificationError>;

    async fn send_deletion_notice(
        &self,
        email: &str,
        report: &IssueReport,
        message: &str,
    ) -> Result<(), NotificationError>;
}

/// Link a user follows to consume their verification token.
pub fn verification_link(base_url: &str, token: &str) -> String {
    format!("{}/auth/verify?token={token}", base_url.trim_end_matches('/'))
}

/// Default upper bound on a single delivery.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Run `send`, failing with [`NotificationError::Delivery`] once `limit` elapses.
async fn bounded<F>(limit: Duration, send: F) -> Result<(), NotificationError>
where
    F: Future<Output = Result<(), NotificationError>>,
{
    tokio::time::timeout(limit, send).await.unwrap_or_else(|_| {
        Err(NotificationError::Delivery(format!(
            "timed out after {}ms",
            limit.as_millis()
        )))
    })
}

/// Fronts a [`Notifier`], deciding which sends are awaited and which are
/// fire-and-forget.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    tasks: TaskTracker,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_timeout(notifier, DEFAULT_DELIVERY_TIMEOUT)
    }

    pub fn with_timeout(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self {
            notifier,
            tasks: TaskTracker::new(),
            timeout,
        }
    }

    /// Send the verification email and wait for the outcome.
    pub async fn send_verification(&self, email: &str, token: &str) -> Result<(), NotificationError> {
        bounded(self.timeout, self.notifier.send_verification(email, token)).await
    }

    pub fn submission_received(&self, report: IssueReport) {
        let notifier = Arc::clone(&self.notifier);
        self.spawn_best_effort("submission_confirmation", report.id, async move {
            notifier
                .send_submission_confirmation(&report.reporter_email, &report)
                .await
        });
    }

    pub fn status_changed(&self, report: IssueReport) {
        let notifier = Arc::clone(&self.notifier);
        self.spawn_best_effort("status_change", report.id, async move {
            notifier.send_status_change(&report.reporter_email, &report).await
        });
    }

    pub fn deleted(&self, report: IssueReport, message: String) {
        let notifier = Arc::clone(&self.notifier);
        self.spawn_best_effort("deletion_notice", report.id, async move {
            notifier
                .send_deletion_notice(&report.reporter_email, &report, &message)
                .await
        });
    }

    /// Wait until every notification spawned so far has finished.
    pub async fn flush(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    fn spawn_best_effort<F>(&self, kind: &'static str, issue_id: i64, send: F)
    where
        F: Future<Output = Result<(), NotificationError>> + Send + 'static,
    {
        let limit = self.timeout;
        self.tasks.spawn(async move {
            match bounded(limit, send).await {
                Ok(()) => debug!(kind, issue_id, "Notification sent"),
                Err(e) => warn!(error = %e, kind, issue_id, "Notification failed"),
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::NewIssueReport;
    use crate::testing::{RecordingNotifier, SentNotification};

    fn report() -> IssueReport {
        NewIssueReport {
            reporter_name: "Alice".into(),
            reporter_email: "alice@example.com".into(),
            reporter_phone: None,
            title: "Pothole".into(),
            description: "Deep".into(),
            category: None,
            location: "Delhi".into(),
            address: "Main street".into(),
            picture: None,
            image_ref: None,
            owner_id: 1,
            created_at: 100,
        }
        .into_report(9)
    }

    #[test]
    fn verification_link_embeds_token() {
        assert_eq!(
            verification_link("https://civic.example/", "abc"),
            "https://civic.example/auth/verify?token=abc"
        );
    }

    #[tokio::test]
    async fn best_effort_sends_complete_on_flush() {
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = NotificationDispatcher::new(notifier.clone());

        dispatcher.status_changed(report());
        dispatcher.deleted(report(), "gone".into());
        dispatcher.flush().await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.contains(&SentNotification::StatusChange {
            email: "alice@example.com".into(),
            issue_id: 9,
        }));
    }

    #[tokio::test]
    async fn best_effort_failure_is_swallowed() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_all(true);
        let dispatcher = NotificationDispatcher::new(notifier.clone());

        dispatcher.status_changed(report());
        dispatcher.flush().await;

        assert!(notifier.sent().is_empty());
        // The tracker is reusable after a flush.
        notifier.fail_all(false);
        dispatcher.submission_received(report());
        dispatcher.flush().await;
        assert_eq!(notifier.sent().len(), 1);
    }

    /// Never completes a delivery.
    struct StalledNotifier;

    #[async_trait]
    impl Notifier for StalledNotifier {
        async fn send_verification(&self, _: &str, _: &str) -> Result<(), NotificationError> {
            std::future::pending().await
        }

        async fn send_submission_confirmation(
            &self,
            _: &str,
            _: &IssueReport,
        ) -> Result<(), NotificationError> {
            std::future::pending().await
        }

        async fn send_status_change(
            &self,
            _: &str,
            _: &IssueReport,
        ) -> Result<(), NotificationError> {
            std::future::pending().await
        }

        async fn send_deletion_notice(
            &self,
            _: &str,
            _: &IssueReport,
            _: &str,
        ) -> Result<(), NotificationError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_verification_times_out() {
        let dispatcher =
            NotificationDispatcher::with_timeout(Arc::new(StalledNotifier), Duration::from_millis(50));
        let result = dispatcher.send_verification("a@b.c", "t").await;
        assert!(matches!(result, Err(NotificationError::Delivery(_))));
    }

    #[tokio::test]
    async fn flush_returns_when_best_effort_send_stalls() {
        let dispatcher =
            NotificationDispatcher::with_timeout(Arc::new(StalledNotifier), Duration::from_millis(50));
        dispatcher.status_changed(report());
        tokio::time::timeout(Duration::from_secs(5), dispatcher.flush())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn verification_failure_is_returned() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_all(true);
        let dispatcher = NotificationDispatcher::new(notifier);
        assert!(dispatcher.send_verification("a@b.c", "t").await.is_err());
    }
}
