//! Plain value types for identities and issue reports.
//!
//! Relationships are ids; reading a related record is an explicit store call.

mod identity;
mod issue;

pub use identity::{Identity, NewIdentity, Role, VerificationToken};
pub use issue::{IssueReport, IssueStatus, NewIssueReport};
