//! In-process collaborator doubles for tests.
//!
//! Compiled for this crate's own tests and, through the `test-utils` feature,
//! for downstream crates.

#![allow(clippy::unwrap_used)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use crate::image::{ImageError, ImageHost, UploadedImage};
use crate::model::IssueReport;
use crate::notify::{NotificationError, Notifier};

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentNotification {
    Verification { email: String, token: String },
    SubmissionConfirmation { email: String, issue_id: i64 },
    StatusChange { email: String, issue_id: i64 },
    DeletionNotice { email: String, issue_id: i64, message: String },
}

/// Records every notification; can be switched into failing mode.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    /// Token from the most recent verification email, if any.
    pub fn last_verification_token(&self) -> Option<String> {
        self.sent().into_iter().rev().find_map(|n| match n {
            SentNotification::Verification { token, .. } => Some(token),
            _ => None,
        })
    }

    fn record(&self, notification: SentNotification) -> Result<(), NotificationError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::Delivery("mail server unavailable".into()));
        }
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_verification(&self, email: &str, token: &str) -> Result<(), NotificationError> {
        self.record(SentNotification::Verification {
            email: email.to_string(),
            token: token.to_string(),
        })
    }

    async fn send_submission_confirmation(
        &self,
        email: &str,
        report: &IssueReport,
    ) -> Result<(), NotificationError> {
        self.record(SentNotification::SubmissionConfirmation {
            email: email.to_string(),
            issue_id: report.id,
        })
    }

    async fn send_status_change(
        &self,
        email: &str,
        report: &IssueReport,
    ) -> Result<(), NotificationError> {
        self.record(SentNotification::StatusChange {
            email: email.to_string(),
            issue_id: report.id,
        })
    }

    async fn send_deletion_notice(
        &self,
        email: &str,
        report: &IssueReport,
        message: &str,
    ) -> Result<(), NotificationError> {
        self.record(SentNotification::DeletionNotice {
            email: email.to_string(),
            issue_id: report.id,
            message: message.to_string(),
        })
    }
}

/// Keeps uploads in memory; can be switched into failing mode.
#[derive(Debug, Default)]
pub struct MemoryImageHost {
    images: Mutex<Vec<(String, Vec<u8>)>>,
    next_id: AtomicU64,
    fail: AtomicBool,
}

impl MemoryImageHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn stored_refs(&self) -> Vec<String> {
        self.images
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[async_trait]
impl ImageHost for MemoryImageHost {
    async fn upload(&self, bytes: Vec<u8>) -> Result<UploadedImage, ImageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ImageError::Backend("image host unavailable".into()));
        }
        let id = format!("img-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.images.lock().unwrap().push((id.clone(), bytes));
        Ok(UploadedImage {
            url: format!("memory://images/{id}"),
            reference_id: id,
        })
    }

    async fn delete(&self, reference_id: &str) -> Result<(), ImageError> {
        self.images
            .lock()
            .unwrap()
            .retain(|(id, _)| id != reference_id);
        Ok(())
    }
}
