//! Issue report operations for citizens and administrators.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::lifecycle::{self, IssueTransition};
use super::query::{IssueFilter, IssueQuery, IssueQueryBuilder, IssueSortField};
use crate::auth::AuthContext;
use crate::clock::unix_timestamp;
use crate::error::{Error, Result};
use crate::image::ImageHost;
use crate::model::{IssueReport, NewIssueReport};
use crate::notify::NotificationDispatcher;
use crate::store::{IssueStore, Page, PageRequest};

/// Submission form as entered by the reporter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIssue {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub address: String,
}

pub fn deletion_message(id: i64) -> String {
    format!("Your complaint (ID: {id}) has been deleted.")
}

pub struct IssueService {
    issues: Arc<dyn IssueStore>,
    images: Arc<dyn ImageHost>,
    notifications: NotificationDispatcher,
}

impl IssueService {
    pub fn new(
        issues: Arc<dyn IssueStore>,
        images: Arc<dyn ImageHost>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            issues,
            images,
            notifications,
        }
    }

    /// File a new report owned by the caller. The image, if any, is uploaded
    /// before anything is persisted.
    #[instrument(skip(self, ctx, form, image), fields(user_id = ctx.user_id))]
    pub async fn submit(
        &self,
        ctx: &AuthContext,
        form: NewIssue,
        image: Option<Vec<u8>>,
    ) -> Result<IssueReport> {
        if form.title.trim().is_empty() {
            return Err(Error::Validation("title must not be empty".into()));
        }

        let uploaded = match image {
            Some(bytes) => Some(self.images.upload(bytes).await?),
            None => None,
        };

        let reporter_email = if form.email.trim().is_empty() {
            ctx.email.clone()
        } else {
            form.email
        };

        let new_report = NewIssueReport {
            reporter_name: form.name,
            reporter_email,
            reporter_phone: form.phone_number,
            title: form.title,
            description: form.description,
            category: form.category.filter(|c| !c.trim().is_empty()),
            location: form.location,
            address: form.address,
            picture: uploaded.as_ref().map(|u| u.url.clone()),
            image_ref: uploaded.as_ref().map(|u| u.reference_id.clone()),
            owner_id: ctx.user_id,
            created_at: unix_timestamp(),
        };

        let report = match self.issues.insert(new_report).await {
            Ok(report) => report,
            Err(e) => {
                if let Some(upload) = uploaded {
                    if let Err(cleanup) = self.images.delete(&upload.reference_id).await {
                        warn!(error = %cleanup, reference_id = %upload.reference_id, "Orphaned image cleanup failed");
                    }
                }
                return Err(e.into());
            }
        };

        info!(issue_id = report.id, "Issue submitted");
        self.notifications.submission_received(report.clone());
        Ok(report)
    }

    pub async fn list_mine(&self, ctx: &AuthContext) -> Result<Vec<IssueReport>> {
        Ok(self.issues.find_by_owner(ctx.user_id).await?)
    }

    /// A single report, visible to its owner and to administrators.
    pub async fn get(&self, ctx: &AuthContext, id: i64) -> Result<IssueReport> {
        let report = self.load(id).await?;
        if !ctx.can_access(report.owner_id) {
            return Err(Error::Forbidden(format!("issue {id} belongs to another user")));
        }
        Ok(report)
    }

    pub async fn list_all(
        &self,
        ctx: &AuthContext,
        page: PageRequest<IssueSortField>,
    ) -> Result<Page<IssueReport>> {
        ctx.require_admin()?;
        Ok(self.issues.find_by_query(&IssueQuery::all(), &page).await?)
    }

    /// Filtered listing. Filter inputs are validated before the store is
    /// consulted.
    #[instrument(skip(self, ctx, filter), fields(user_id = ctx.user_id))]
    pub async fn search(
        &self,
        ctx: &AuthContext,
        filter: &IssueFilter,
        page: PageRequest<IssueSortField>,
    ) -> Result<Page<IssueReport>> {
        ctx.require_admin()?;
        let query = IssueQueryBuilder::from_filter(filter)?;
        Ok(self.issues.find_by_query(&query, &page).await?)
    }

    /// Move a report through its lifecycle. The reporter is notified only
    /// once the new status is durable.
    #[instrument(skip(self, ctx), fields(user_id = ctx.user_id))]
    pub async fn transition(
        &self,
        ctx: &AuthContext,
        id: i64,
        transition: IssueTransition,
    ) -> Result<IssueReport> {
        ctx.require_admin()?;
        let mut report = self.load(id).await?;
        let from = report.status;

        lifecycle::apply(&mut report, transition, unix_timestamp())?;
        let saved = self.issues.update(&report).await?;

        info!(issue_id = id, from = %from, to = %saved.status, "Issue status changed");
        self.notifications.status_changed(saved.clone());
        Ok(saved)
    }

    pub async fn start_progress(&self, ctx: &AuthContext, id: i64) -> Result<IssueReport> {
        self.transition(ctx, id, IssueTransition::StartProgress).await
    }

    pub async fn resolve(&self, ctx: &AuthContext, id: i64) -> Result<IssueReport> {
        self.transition(ctx, id, IssueTransition::Resolve).await
    }

    pub async fn reject(&self, ctx: &AuthContext, id: i64) -> Result<IssueReport> {
        self.transition(ctx, id, IssueTransition::Reject).await
    }

    /// Remove a report and tell its reporter, using the pre-deletion snapshot.
    #[instrument(skip(self, ctx), fields(user_id = ctx.user_id))]
    pub async fn delete(&self, ctx: &AuthContext, id: i64) -> Result<IssueReport> {
        ctx.require_admin()?;
        let snapshot = self.load(id).await?;

        if !self.issues.delete(id).await? {
            return Err(Error::NotFound(format!("issue {id}")));
        }

        if let Some(reference_id) = snapshot.image_ref.as_deref() {
            if let Err(e) = self.images.delete(reference_id).await {
                warn!(error = %e, issue_id = id, "Failed to delete issue image");
            }
        }

        info!(issue_id = id, "Issue deleted");
        self.notifications
            .deleted(snapshot.clone(), deletion_message(id));
        Ok(snapshot)
    }

    async fn load(&self, id: i64) -> Result<IssueReport> {
        self.issues
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("issue {id}")))
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::issues::lifecycle::TransitionError;
    use crate::model::{IssueStatus, Role};
    use crate::store::MemoryStore;
    use crate::testing::{MemoryImageHost, RecordingNotifier, SentNotification};

    struct Harness {
        service: IssueService,
        store: Arc<MemoryStore>,
        images: Arc<MemoryImageHost>,
        notifier: Arc<RecordingNotifier>,
        notifications: NotificationDispatcher,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let images = Arc::new(MemoryImageHost::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let notifications = NotificationDispatcher::new(notifier.clone());
        let service = IssueService::new(store.clone(), images.clone(), notifications.clone());
        Harness {
            service,
            store,
            images,
            notifier,
            notifications,
        }
    }

    fn citizen(id: i64) -> AuthContext {
        AuthContext {
            user_id: id,
            email: format!("user{id}@example.com"),
            roles: vec![Role::User],
        }
    }

    fn admin() -> AuthContext {
        AuthContext {
            user_id: 99,
            email: "admin@example.com".into(),
            roles: vec![Role::Admin],
        }
    }

    fn form(title: &str) -> NewIssue {
        NewIssue {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            phone_number: Some("555-0100".into()),
            title: title.into(),
            description: "Needs fixing".into(),
            category: Some("roads".into()),
            location: "Delhi".into(),
            address: "12 Main St".into(),
        }
    }

    #[tokio::test]
    async fn submit_creates_pending_report_and_confirms() {
        let h = harness();
        let report = h
            .service
            .submit(&citizen(1), form("Pothole"), Some(vec![1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(report.status, IssueStatus::Pending);
        assert_eq!(report.owner_id, 1);
        assert_eq!(report.created_at, report.updated_at);
        assert_eq!(report.reporter_email, "alice@example.com");
        assert!(report.picture.as_deref().unwrap().starts_with("memory://"));
        assert_eq!(h.images.stored_refs().len(), 1);

        h.notifications.flush().await;
        assert_eq!(
            h.notifier.sent(),
            vec![SentNotification::SubmissionConfirmation {
                email: "alice@example.com".into(),
                issue_id: report.id,
            }]
        );
    }

    #[tokio::test]
    async fn failed_upload_persists_nothing() {
        let h = harness();
        h.images.fail_uploads(true);

        let err = h
            .service
            .submit(&citizen(1), form("Pothole"), Some(vec![0]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ImageUploadFailed(_)));
        assert!(IssueStore::find_by_owner(h.store.as_ref(), 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let h = harness();
        let err = h
            .service
            .submit(&citizen(1), form("  "), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn get_enforces_ownership() {
        let h = harness();
        let report = h.service.submit(&citizen(1), form("Lamp"), None).await.unwrap();

        assert!(h.service.get(&citizen(1), report.id).await.is_ok());
        assert!(h.service.get(&admin(), report.id).await.is_ok());
        assert!(matches!(
            h.service.get(&citizen(2), report.id).await.unwrap_err(),
            Error::Forbidden(_)
        ));
        assert!(matches!(
            h.service.get(&citizen(1), 404).await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert_eq!(h.service.list_mine(&citizen(1)).await.unwrap().len(), 1);
        assert!(h.service.list_mine(&citizen(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn citizens_cannot_triage() {
        let h = harness();
        let report = h.service.submit(&citizen(1), form("Lamp"), None).await.unwrap();

        let err = h.service.resolve(&citizen(1), report.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        let page = PageRequest::new(0, 10, IssueSortField::Id);
        assert!(matches!(
            h.service.list_all(&citizen(1), page).await.unwrap_err(),
            Error::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn illegal_transition_leaves_report_untouched() {
        let h = harness();
        let report = h.service.submit(&citizen(1), form("Lamp"), None).await.unwrap();
        h.service.resolve(&admin(), report.id).await.unwrap();
        h.notifications.flush().await;
        let before = h.notifier.sent().len();

        let err = h.service.reject(&admin(), report.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition(TransitionError::CannotRejectResolved)
        ));

        let stored = h.service.get(&admin(), report.id).await.unwrap();
        assert_eq!(stored.status, IssueStatus::Resolved);
        h.notifications.flush().await;
        assert_eq!(h.notifier.sent().len(), before);
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_transition() {
        let h = harness();
        let report = h.service.submit(&citizen(1), form("Lamp"), None).await.unwrap();
        h.notifier.fail_all(true);

        let updated = h.service.start_progress(&admin(), report.id).await.unwrap();
        assert_eq!(updated.status, IssueStatus::InProgress);
        h.notifications.flush().await;
    }

    #[tokio::test]
    async fn stale_transition_is_a_conflict() {
        let h = harness();
        let report = h.service.submit(&citizen(1), form("Lamp"), None).await.unwrap();

        // Simulate a concurrent writer that committed first.
        let mut other = report.clone();
        lifecycle::apply(&mut other, IssueTransition::Reject, 5).unwrap();
        IssueStore::update(h.store.as_ref(), &other).await.unwrap();

        let mut stale = report;
        lifecycle::apply(&mut stale, IssueTransition::Resolve, 6).unwrap();
        let err = IssueStore::update(h.store.as_ref(), &stale).await.unwrap_err();
        assert!(matches!(Error::from(err), Error::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_notifies_with_snapshot() {
        let h = harness();
        let report = h
            .service
            .submit(&citizen(1), form("Lamp"), Some(vec![9]))
            .await
            .unwrap();

        let snapshot = h.service.delete(&admin(), report.id).await.unwrap();
        assert_eq!(snapshot.id, report.id);
        assert!(h.images.stored_refs().is_empty());
        assert!(matches!(
            h.service.get(&admin(), report.id).await.unwrap_err(),
            Error::NotFound(_)
        ));

        h.notifications.flush().await;
        assert!(h.notifier.sent().contains(&SentNotification::DeletionNotice {
            email: "alice@example.com".into(),
            issue_id: report.id,
            message: format!("Your complaint (ID: {}) has been deleted.", report.id),
        }));
    }

    #[tokio::test]
    async fn search_rejects_bad_filters_before_querying() {
        let h = harness();
        let filter = IssueFilter {
            status: Some("closed".into()),
            ..IssueFilter::default()
        };
        let page = PageRequest::new(0, 10, IssueSortField::CreatedAt);
        assert!(matches!(
            h.service.search(&admin(), &filter, page).await.unwrap_err(),
            Error::InvalidFilter(_)
        ));
    }
}
