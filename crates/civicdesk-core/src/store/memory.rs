//! In-process store keeping identities and issues in id-indexed maps.
//!
//! Used by tests and by deployments that do not need durability. All
//! read-modify-save sequences are serialised by a single `RwLock`, and
//! `update` still enforces version checks so callers see the same stale-read
//! semantics as the SQLite store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IssueStore, Page, PageRequest, StoreError, UserSortField, UserStore};
use crate::issues::query::{IssueQuery, IssueSortField};
use crate::model::{Identity, IssueReport, NewIdentity, NewIssueReport, Role};

#[derive(Debug, Default)]
struct Inner {
    identities: BTreeMap<i64, Identity>,
    emails: HashMap<String, i64>,
    issues: BTreeMap<i64, IssueReport>,
    last_identity_id: i64,
    last_issue_id: i64,
}

impl Inner {
    fn owner_email(&self, owner_id: i64) -> Option<&str> {
        self.identities.get(&owner_id).map(|i| i.email.as_str())
    }

    fn admin_other_than(&self, id: Option<i64>) -> bool {
        self.identities
            .values()
            .any(|i| Some(i.id) != id && i.has_role(Role::Admin))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T, S>(mut items: Vec<T>, page: &PageRequest<S>) -> Page<T> {
    let total = items.len() as u64;
    let start = usize::try_from(page.offset()).unwrap_or(usize::MAX).min(items.len());
    let end = start.saturating_add(page.size as usize).min(items.len());
    let items = items.drain(start..end).collect();
    Page {
        items,
        page: page.page,
        size: page.size,
        total,
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .emails
            .get(email)
            .and_then(|id| inner.identities.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, StoreError> {
        Ok(self.inner.read().await.identities.get(&id).cloned())
    }

    async fn find_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<Identity>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .identities
            .values()
            .find(|i| i.verification.as_ref().is_some_and(|v| v.value == token))
            .cloned())
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.inner.read().await.emails.contains_key(email))
    }

    async fn exists_by_role(&self, role: Role) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .identities
            .values()
            .any(|i| i.has_role(role)))
    }

    async fn insert(&self, identity: NewIdentity) -> Result<Identity, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.emails.contains_key(&identity.email) {
            return Err(StoreError::Duplicate(format!("email {}", identity.email)));
        }
        if identity.roles.contains(&Role::Admin) && inner.admin_other_than(None) {
            return Err(StoreError::AdminExists);
        }
        inner.last_identity_id += 1;
        let id = inner.last_identity_id;
        let identity = identity.into_identity(id);
        inner.emails.insert(identity.email.clone(), id);
        inner.identities.insert(id, identity.clone());
        Ok(identity)
    }

    async fn update(&self, identity: &Identity) -> Result<Identity, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(current) = inner.identities.get(&identity.id) else {
            return Err(StoreError::Stale(format!("identity {} no longer exists", identity.id)));
        };
        if current.version != identity.version {
            return Err(StoreError::Stale(format!("identity {}", identity.id)));
        }
        let old_email = current.email.clone();
        if identity.has_role(Role::Admin) && inner.admin_other_than(Some(identity.id)) {
            return Err(StoreError::AdminExists);
        }
        if old_email != identity.email {
            if inner.emails.contains_key(&identity.email) {
                return Err(StoreError::Duplicate(format!("email {}", identity.email)));
            }
            inner.emails.remove(&old_email);
            inner.emails.insert(identity.email.clone(), identity.id);
        }

        let mut saved = identity.clone();
        saved.version += 1;
        inner.identities.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(removed) = inner.identities.remove(&id) else {
            return Ok(false);
        };
        inner.emails.remove(&removed.email);
        inner.issues.retain(|_, issue| issue.owner_id != id);
        Ok(true)
    }

    async fn find_by_role(
        &self,
        role: Role,
        page: &PageRequest<UserSortField>,
    ) -> Result<Page<Identity>, StoreError> {
        let inner = self.inner.read().await;
        let mut matches: Vec<Identity> = inner
            .identities
            .values()
            .filter(|i| i.has_role(role))
            .cloned()
            .collect();
        match page.sort {
            UserSortField::Id => {}
            UserSortField::Name => matches.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id))),
            UserSortField::Email => matches.sort_by(|a, b| a.email.cmp(&b.email)),
            UserSortField::CreatedAt => {
                matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            }
        }
        Ok(paginate(matches, page))
    }
}

#[async_trait]
impl IssueStore for MemoryStore {
    async fn insert(&self, issue: NewIssueReport) -> Result<IssueReport, StoreError> {
        let mut inner = self.inner.write().await;
        inner.last_issue_id += 1;
        let report = issue.into_report(inner.last_issue_id);
        inner.issues.insert(report.id, report.clone());
        Ok(report)
    }

    async fn update(&self, issue: &IssueReport) -> Result<IssueReport, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.issues.get(&issue.id) {
            Some(current) if current.version == issue.version => {}
            Some(_) => return Err(StoreError::Stale(format!("issue {}", issue.id))),
            None => {
                return Err(StoreError::Stale(format!("issue {} no longer exists", issue.id)));
            }
        }
        let mut saved = issue.clone();
        saved.version += 1;
        inner.issues.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<IssueReport>, StoreError> {
        Ok(self.inner.read().await.issues.get(&id).cloned())
    }

    async fn find_by_owner(&self, owner_id: i64) -> Result<Vec<IssueReport>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .issues
            .values()
            .filter(|issue| issue.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_by_query(
        &self,
        query: &IssueQuery,
        page: &PageRequest<IssueSortField>,
    ) -> Result<Page<IssueReport>, StoreError> {
        let inner = self.inner.read().await;
        let mut matches: Vec<IssueReport> = inner
            .issues
            .values()
            .filter(|issue| query.matches(issue, inner.owner_email(issue.owner_id)))
            .cloned()
            .collect();
        match page.sort {
            IssueSortField::Id => {}
            IssueSortField::Title => {
                matches.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
            }
            IssueSortField::CreatedAt => {
                matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            }
        }
        Ok(paginate(matches, page))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.issues.remove(&id).is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::issues::query::IssueQueryBuilder;
    use crate::model::VerificationToken;

    fn new_identity(email: &str, roles: Vec<Role>) -> NewIdentity {
        NewIdentity {
            email: email.into(),
            password_hash: "hash".into(),
            name: email.split('@').next().unwrap_or_default().into(),
            phone_number: None,
            bio: None,
            picture: None,
            image_ref: None,
            roles,
            verification: VerificationToken {
                value: format!("token-{email}"),
                expires_at: 1_000,
            },
            created_at: 10,
        }
    }

    fn new_issue(owner_id: i64, title: &str) -> NewIssueReport {
        NewIssueReport {
            reporter_name: "Alice".into(),
            reporter_email: "alice@example.com".into(),
            reporter_phone: None,
            title: title.into(),
            description: "desc".into(),
            category: None,
            location: "Delhi".into(),
            address: "addr".into(),
            picture: None,
            image_ref: None,
            owner_id,
            created_at: 10,
        }
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_rejects_duplicate_email() {
        let store = MemoryStore::new();
        let a = UserStore::insert(&store, new_identity("a@x.io", vec![Role::User])).await.unwrap();
        let b = UserStore::insert(&store, new_identity("b@x.io", vec![Role::User])).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let dup = UserStore::insert(&store, new_identity("a@x.io", vec![Role::User])).await;
        assert!(matches!(dup, Err(StoreError::Duplicate(_))));
        assert!(store.exists_by_email("a@x.io").await.unwrap());
        assert!(!store.exists_by_email("A@x.io").await.unwrap());
    }

    #[tokio::test]
    async fn second_admin_is_rejected() {
        let store = MemoryStore::new();
        let admin = UserStore::insert(&store, new_identity("a@x.io", vec![Role::Admin]))
            .await
            .unwrap();
        let second = UserStore::insert(&store, new_identity("b@x.io", vec![Role::Admin])).await;
        assert!(matches!(second, Err(StoreError::AdminExists)));
        assert!(!store.exists_by_email("b@x.io").await.unwrap());

        let mut user = UserStore::insert(&store, new_identity("c@x.io", vec![Role::User]))
            .await
            .unwrap();
        user.roles.push(Role::Admin);
        let promoted = UserStore::update(&store, &user).await;
        assert!(matches!(promoted, Err(StoreError::AdminExists)));

        // The existing admin can still be saved.
        UserStore::update(&store, &admin).await.unwrap();
    }

    #[tokio::test]
    async fn lookup_by_verification_token() {
        let store = MemoryStore::new();
        UserStore::insert(&store, new_identity("a@x.io", vec![Role::User])).await.unwrap();
        let found = store.find_by_verification_token("token-a@x.io").await.unwrap();
        assert_eq!(found.map(|i| i.email), Some("a@x.io".to_string()));
        assert!(store.find_by_verification_token("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn identity_update_rejects_stale_version() {
        let store = MemoryStore::new();
        let identity = UserStore::insert(&store, new_identity("a@x.io", vec![Role::User])).await.unwrap();

        let mut first = identity.clone();
        first.name = "First".into();
        let saved = UserStore::update(&store, &first).await.unwrap();
        assert_eq!(saved.version, 1);

        let mut second = identity;
        second.name = "Second".into();
        assert!(matches!(
            UserStore::update(&store, &second).await,
            Err(StoreError::Stale(_))
        ));
    }

    #[tokio::test]
    async fn issue_update_rejects_stale_version() {
        let store = MemoryStore::new();
        let issue = IssueStore::insert(&store, new_issue(1, "a")).await.unwrap();
        IssueStore::update(&store, &issue).await.unwrap();
        assert!(matches!(
            IssueStore::update(&store, &issue).await,
            Err(StoreError::Stale(_))
        ));
    }

    #[tokio::test]
    async fn query_sorts_and_pages() {
        let store = MemoryStore::new();
        for title in ["delta", "alpha", "charlie", "bravo"] {
            IssueStore::insert(&store, new_issue(1, title)).await.unwrap();
        }
        let page = store
            .find_by_query(
                &IssueQuery::all(),
                &PageRequest::new(1, 2, IssueSortField::Title),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        let titles: Vec<&str> = page.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["charlie", "delta"]);
    }

    #[tokio::test]
    async fn query_resolves_owner_email() {
        let store = MemoryStore::new();
        let alice = UserStore::insert(&store, new_identity("alice@x.io", vec![Role::User])).await.unwrap();
        let bob = UserStore::insert(&store, new_identity("bob@x.io", vec![Role::User])).await.unwrap();
        IssueStore::insert(&store, new_issue(alice.id, "a")).await.unwrap();
        IssueStore::insert(&store, new_issue(bob.id, "b")).await.unwrap();

        let query = IssueQueryBuilder::new().owner_email(Some("bob@x.io")).build();
        let page = store
            .find_by_query(&query, &PageRequest::new(0, 10, IssueSortField::Id))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].owner_id, bob.id);
    }

    #[tokio::test]
    async fn find_by_role_filters() {
        let store = MemoryStore::new();
        UserStore::insert(&store, new_identity("admin@x.io", vec![Role::Admin])).await.unwrap();
        UserStore::insert(&store, new_identity("u@x.io", vec![Role::User])).await.unwrap();
        assert!(store.exists_by_role(Role::Admin).await.unwrap());

        let users = store
            .find_by_role(Role::User, &PageRequest::new(0, 10, UserSortField::Email))
            .await
            .unwrap();
        assert_eq!(users.total, 1);
        assert_eq!(users.items[0].email, "u@x.io");
    }
}
