//! Persistence contracts consumed by the core.
//!
//! Lookups return `Ok(None)` for "not found"; `Err` is reserved for backend
//! failures. `update` is compare-and-set on the record's `version`, so a
//! read-modify-save made against a stale read is rejected with
//! [`StoreError::Stale`] instead of silently overwriting a concurrent change.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Error;
use crate::issues::query::{IssueQuery, IssueSortField};
use crate::model::{Identity, IssueReport, NewIdentity, NewIssueReport, Role};

pub use memory::MemoryStore;

/// Errors reported by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The record changed (or vanished) since it was read.
    #[error("Stale record: {0}")]
    Stale(String),

    /// A uniqueness constraint was violated.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Writing the identity would leave more than one `ADMIN`.
    #[error("An admin account already exists")]
    AdminExists,

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Stale(msg) => Self::Conflict(msg),
            StoreError::AdminExists => Self::AdminAlreadyExists,
            StoreError::Duplicate(msg) | StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}

/// Zero-based page request with an allow-listed sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<S> {
    pub page: u32,
    pub size: u32,
    pub sort: S,
}

impl<S> PageRequest<S> {
    pub const DEFAULT_SIZE: u32 = 10;

    pub fn new(page: u32, size: u32, sort: S) -> Self {
        Self {
            page,
            size: size.max(1),
            sort,
        }
    }

    pub const fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.size.max(1)))
    }
}

/// Sort keys accepted when listing identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserSortField {
    #[default]
    Id,
    Name,
    Email,
    CreatedAt,
}

impl UserSortField {
    pub fn parse(field: &str) -> crate::Result<Self> {
        match field {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            "createdAt" => Ok(Self::CreatedAt),
            other => Err(Error::InvalidSort(other.to_string())),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, StoreError>;

    async fn find_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<Identity>, StoreError>;

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError>;

    async fn exists_by_role(&self, role: Role) -> Result<bool, StoreError>;

    /// Persist a new identity. Fails with [`StoreError::Duplicate`] if the email is taken
    /// and with [`StoreError::AdminExists`] if it would be a second admin.
    async fn insert(&self, identity: NewIdentity) -> Result<Identity, StoreError>;

    /// Save an existing identity, returning it with the bumped version.
    async fn update(&self, identity: &Identity) -> Result<Identity, StoreError>;

    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    async fn find_by_role(
        &self,
        role: Role,
        page: &PageRequest<UserSortField>,
    ) -> Result<Page<Identity>, StoreError>;
}

#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn insert(&self, issue: NewIssueReport) -> Result<IssueReport, StoreError>;

    /// Save an existing report, returning it with the bumped version.
    async fn update(&self, issue: &IssueReport) -> Result<IssueReport, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<IssueReport>, StoreError>;

    async fn find_by_owner(&self, owner_id: i64) -> Result<Vec<IssueReport>, StoreError>;

    /// All reports satisfying every predicate of `query`, paged and sorted.
    async fn find_by_query(
        &self,
        query: &IssueQuery,
        page: &PageRequest<IssueSortField>,
    ) -> Result<Page<IssueReport>, StoreError>;

    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_offset_and_minimum_size() {
        let req = PageRequest::new(3, 0, UserSortField::Id);
        assert_eq!(req.size, 1);
        assert_eq!(req.offset(), 3);
        assert_eq!(PageRequest::new(2, 10, UserSortField::Id).offset(), 20);
    }

    #[test]
    fn user_sort_field_allow_list() {
        assert_eq!(UserSortField::parse("email").ok(), Some(UserSortField::Email));
        assert!(matches!(
            UserSortField::parse("password"),
            Err(Error::InvalidSort(_))
        ));
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<()> = Page {
            items: Vec::new(),
            page: 0,
            size: 10,
            total: 21,
        };
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn stale_store_error_maps_to_conflict() {
        let err: Error = StoreError::Stale("issue 1".into()).into();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn admin_store_error_maps_to_admin_already_exists() {
        let err: Error = StoreError::AdminExists.into();
        assert!(matches!(err, Error::AdminAlreadyExists));
    }
}
