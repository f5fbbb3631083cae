//! Error types for the civicdesk core library.

use thiserror::Error;

use crate::issues::lifecycle::TransitionError;

/// Result type alias using the civicdesk [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a core operation can report to its caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown email, unverified account, or wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Malformed, tampered, unknown or already consumed token.
    #[error("Invalid token")]
    InvalidToken,

    /// Verification token exists but its expiry has passed.
    #[error("Verification token has expired")]
    TokenExpired,

    #[error("Email is already in use")]
    DuplicateEmail,

    #[error("Admin user already exists")]
    AdminAlreadyExists,

    #[error("Invalid status transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid sort field: {0}")]
    InvalidSort(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is authenticated but lacks the role or ownership required.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed input rejected before any mutation.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Image upload failed: {0}")]
    ImageUploadFailed(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    /// The store rejected a write made against a stale read.
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
