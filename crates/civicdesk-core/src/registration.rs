//! Account signup and email verification.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::auth::VerificationTokenManager;
use crate::auth::password::{check_password_policy, hash_password_async};
use crate::clock::unix_timestamp;
use crate::error::{Error, Result};
use crate::model::{Identity, NewIdentity, Role};
use crate::notify::NotificationDispatcher;
use crate::store::{StoreError, UserStore};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Requested role names; empty means `USER`.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Requested role names, deduplicated in request order. Unknown names fail
/// before anything is written.
pub fn parse_roles(names: &[String]) -> Result<Vec<Role>> {
    if names.is_empty() {
        return Ok(vec![Role::User]);
    }
    let mut roles = Vec::with_capacity(names.len());
    for name in names {
        let role: Role = name.parse()?;
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    Ok(roles)
}

pub struct RegistrationFlow {
    users: Arc<dyn UserStore>,
    tokens: Arc<VerificationTokenManager>,
    notifications: NotificationDispatcher,
}

impl RegistrationFlow {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<VerificationTokenManager>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            users,
            tokens,
            notifications,
        }
    }

    /// Create an unverified account and send its verification email.
    ///
    /// The email is load-bearing: if it cannot be sent the new account is
    /// removed and the caller gets `NotificationError`.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: SignupRequest) -> Result<Identity> {
        let email = request.email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::Validation("a valid email address is required".into()));
        }
        if request.name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".into()));
        }
        check_password_policy(&request.password)?;
        let roles = parse_roles(&request.roles)?;

        if self.users.exists_by_email(&email).await? {
            warn!("Signup with an email already in use");
            return Err(Error::DuplicateEmail);
        }
        if roles.contains(&Role::Admin) && self.users.exists_by_role(Role::Admin).await? {
            warn!("Signup requested a second admin");
            return Err(Error::AdminAlreadyExists);
        }

        let password_hash = hash_password_async(request.password).await?;
        let now = unix_timestamp();
        let verification = self.tokens.generate(now);
        let token = verification.value.clone();

        let identity = self
            .users
            .insert(NewIdentity {
                email,
                password_hash,
                name: request.name,
                phone_number: request.phone_number,
                bio: request.bio,
                picture: None,
                image_ref: None,
                roles,
                verification,
                created_at: now,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => Error::DuplicateEmail,
                other => other.into(),
            })?;

        if let Err(e) = self
            .notifications
            .send_verification(&identity.email, &token)
            .await
        {
            warn!(error = %e, user_id = identity.id, "Verification email failed; removing account");
            if let Err(rollback) = self.users.delete(identity.id).await {
                error!(error = %rollback, user_id = identity.id, "Failed to remove unverified account");
            }
            return Err(e.into());
        }

        info!(user_id = identity.id, "User registered");
        Ok(identity)
    }

    /// Consume a verification token, enabling the account.
    pub async fn verify(&self, token: &str) -> Result<Identity> {
        self.tokens.consume(token).await
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::DEFAULT_VERIFICATION_TTL_SECS;
    use crate::store::{MemoryStore, PageRequest, UserSortField};
    use crate::testing::{RecordingNotifier, SentNotification};

    fn flow() -> (RegistrationFlow, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let tokens = Arc::new(VerificationTokenManager::new(
            store.clone(),
            DEFAULT_VERIFICATION_TTL_SECS,
        ));
        let flow = RegistrationFlow::new(
            store.clone(),
            tokens,
            NotificationDispatcher::new(notifier.clone()),
        );
        (flow, store, notifier)
    }

    fn signup(email: &str, roles: &[&str]) -> SignupRequest {
        SignupRequest {
            name: "Alice".into(),
            email: email.into(),
            password: "correct horse".into(),
            phone_number: None,
            bio: None,
            roles: roles.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn roles_default_and_legacy_spelling() {
        assert_eq!(parse_roles(&[]).unwrap(), vec![Role::User]);
        assert_eq!(
            parse_roles(&["ROLE_ADMIN".into(), "ADMIN".into(), "USER".into()]).unwrap(),
            vec![Role::Admin, Role::User]
        );
        assert!(matches!(
            parse_roles(&["SUPERUSER".into()]),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn register_creates_unverified_user_and_sends_token() {
        let (flow, _store, notifier) = flow();
        let identity = flow.register(signup("alice@example.com", &[])).await.unwrap();

        assert!(!identity.enabled && !identity.verified);
        assert_eq!(identity.roles, vec![Role::User]);
        assert_ne!(identity.password_hash, "correct horse");

        let token = identity.verification.as_ref().unwrap().value.clone();
        assert_eq!(
            notifier.sent(),
            vec![SentNotification::Verification {
                email: "alice@example.com".into(),
                token,
            }]
        );
    }

    #[tokio::test]
    async fn duplicate_email_sends_no_second_mail() {
        let (flow, _store, notifier) = flow();
        flow.register(signup("alice@example.com", &[])).await.unwrap();

        let err = flow
            .register(signup("alice@example.com", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateEmail));
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn second_admin_is_refused() {
        let (flow, _store, _notifier) = flow();
        flow.register(signup("root@example.com", &["ADMIN"]))
            .await
            .unwrap();

        let err = flow
            .register(signup("other@example.com", &["ROLE_ADMIN"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AdminAlreadyExists));
        assert_eq!(err.to_string(), "Admin user already exists");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_admin_signups_create_one_admin() {
        let (flow, store, _notifier) = flow();
        let (a, b) = tokio::join!(
            flow.register(signup("root@example.com", &["ADMIN"])),
            flow.register(signup("other@example.com", &["ADMIN"])),
        );
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(Error::AdminAlreadyExists)))
        );

        let admins = store
            .find_by_role(Role::Admin, &PageRequest::new(0, 10, UserSortField::Id))
            .await
            .unwrap();
        assert_eq!(admins.total, 1);
    }

    #[tokio::test]
    async fn mail_failure_rolls_back_registration() {
        let (flow, store, notifier) = flow();
        notifier.fail_all(true);

        let err = flow
            .register(signup("alice@example.com", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotificationError(_)));
        assert!(!store.exists_by_email("alice@example.com").await.unwrap());

        notifier.fail_all(false);
        flow.register(signup("alice@example.com", &[])).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_before_writes() {
        let (flow, store, notifier) = flow();
        let mut short = signup("alice@example.com", &[]);
        short.password = "short".into();
        assert!(matches!(
            flow.register(short).await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            flow.register(signup("not-an-email", &[])).await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            flow.register(signup("alice@example.com", &["GUEST"]))
                .await
                .unwrap_err(),
            Error::Validation(_)
        ));
        assert!(!store.exists_by_email("alice@example.com").await.unwrap());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn verify_enables_account_once() {
        let (flow, _store, notifier) = flow();
        flow.register(signup("alice@example.com", &[])).await.unwrap();
        let token = notifier.last_verification_token().unwrap();

        let identity = flow.verify(&token).await.unwrap();
        assert!(identity.can_authenticate());
        assert!(matches!(
            flow.verify(&token).await.unwrap_err(),
            Error::InvalidToken
        ));
    }
}
