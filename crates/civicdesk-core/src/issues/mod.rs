//! Issue reports: status lifecycle, filtered queries and the service that
//! ties them to the stores.

pub mod lifecycle;
pub mod query;
pub mod service;

pub use lifecycle::{IssueTransition, TransitionError};
pub use query::{IssueFilter, IssuePredicate, IssueQuery, IssueQueryBuilder, IssueSortField};
pub use service::{IssueService, NewIssue};
