//! civicdesk core library
//!
//! Shared functionality for civicdesk components:
//! - Session tokens, password hashing and email verification
//! - Registration and profile management
//! - Issue report lifecycle, filtered queries and the issue service
//! - Store, notifier and image host contracts with an in-memory store
//! - Configuration resolution and tracing setup

pub mod accounts;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod image;
pub mod issues;
pub mod model;
pub mod notify;
pub mod registration;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod tracing_init;

pub use accounts::{AccountService, ProfileUpdate};
pub use auth::{AuthContext, Session, SessionAuthenticator, TokenCodec, VerificationTokenManager};
pub use config::Config;
pub use error::{Error, Result};
pub use issues::{IssueService, IssueTransition, NewIssue};
pub use notify::{NotificationDispatcher, Notifier};
pub use registration::{RegistrationFlow, SignupRequest};
