//! Single-use email verification tokens.

use std::sync::Arc;

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{info, instrument, warn};

use crate::clock::unix_timestamp;
use crate::error::{Error, Result};
use crate::model::{Identity, VerificationToken};
use crate::store::{StoreError, UserStore};

/// Verification link lifetime: 24 hours.
pub const DEFAULT_VERIFICATION_TTL_SECS: i64 = 24 * 60 * 60;

const TOKEN_BYTES: usize = 32;

pub struct VerificationTokenManager {
    users: Arc<dyn UserStore>,
    ttl_secs: i64,
}

impl VerificationTokenManager {
    pub fn new(users: Arc<dyn UserStore>, ttl_secs: i64) -> Self {
        Self { users, ttl_secs }
    }

    /// Fresh unguessable token expiring `ttl_secs` after `now`.
    pub fn generate(&self, now: i64) -> VerificationToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        VerificationToken {
            value: hex::encode(bytes),
            expires_at: now + self.ttl_secs,
        }
    }

    /// Enable and verify the identity holding `token`, then discard the token.
    pub async fn consume(&self, token: &str) -> Result<Identity> {
        self.consume_at(token, unix_timestamp()).await
    }

    /// An expired token is left in place so the account stays unverified.
    #[instrument(skip(self, token))]
    pub async fn consume_at(&self, token: &str, now: i64) -> Result<Identity> {
        if token.trim().is_empty() {
            return Err(Error::InvalidToken);
        }

        let Some(mut identity) = self.users.find_by_verification_token(token).await? else {
            warn!("Unknown or already used verification token");
            return Err(Error::InvalidToken);
        };

        let expired = identity
            .verification
            .as_ref()
            .is_none_or(|v| v.is_expired_at(now));
        if expired {
            warn!(user_id = identity.id, "Verification token expired");
            return Err(Error::TokenExpired);
        }

        identity.enabled = true;
        identity.verified = true;
        identity.verification = None;

        // Losing the race to a concurrent consume means the token is gone.
        let saved = self.users.update(&identity).await.map_err(|e| match e {
            StoreError::Stale(_) => Error::InvalidToken,
            other => other.into(),
        })?;

        info!(user_id = saved.id, "Account verified");
        Ok(saved)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{NewIdentity, Role};
    use crate::store::MemoryStore;

    async fn setup(expires_at: i64) -> (VerificationTokenManager, Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        let token = "a".repeat(64);
        UserStore::insert(
            store.as_ref(),
            NewIdentity {
                email: "alice@example.com".into(),
                password_hash: "hash".into(),
                name: "Alice".into(),
                phone_number: None,
                bio: None,
                picture: None,
                image_ref: None,
                roles: vec![Role::User],
                verification: VerificationToken {
                    value: token.clone(),
                    expires_at,
                },
                created_at: 0,
            },
        )
        .await
        .unwrap();
        let manager = VerificationTokenManager::new(store.clone(), DEFAULT_VERIFICATION_TTL_SECS);
        (manager, store, token)
    }

    #[test]
    fn generated_tokens_are_unique_hex() {
        let store = Arc::new(MemoryStore::new());
        let manager = VerificationTokenManager::new(store, DEFAULT_VERIFICATION_TTL_SECS);
        let a = manager.generate(1_000);
        let b = manager.generate(1_000);
        assert_ne!(a.value, b.value);
        assert_eq!(a.value.len(), TOKEN_BYTES * 2);
        assert!(a.value.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.expires_at, 1_000 + DEFAULT_VERIFICATION_TTL_SECS);
    }

    #[tokio::test]
    async fn consume_enables_and_is_single_use() {
        let (manager, store, token) = setup(10_000).await;

        let identity = manager.consume_at(&token, 5_000).await.unwrap();
        assert!(identity.enabled && identity.verified);
        assert!(identity.verification.is_none());

        let stored = store.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert!(stored.can_authenticate());

        let replay = manager.consume_at(&token, 5_001).await.unwrap_err();
        assert!(matches!(replay, Error::InvalidToken));
    }

    #[tokio::test]
    async fn expired_token_leaves_account_unverified() {
        let (manager, store, token) = setup(10_000).await;

        let err = manager.consume_at(&token, 10_001).await.unwrap_err();
        assert!(matches!(err, Error::TokenExpired));

        let stored = store.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert!(!stored.enabled);
        assert!(stored.verification.is_some());

        // Still expired on retry; never flips to invalid.
        let again = manager.consume_at(&token, 10_002).await.unwrap_err();
        assert!(matches!(again, Error::TokenExpired));
    }

    #[tokio::test]
    async fn unknown_or_blank_token_is_invalid() {
        let (manager, _store, _token) = setup(10_000).await;
        assert!(matches!(
            manager.consume_at("deadbeef", 0).await.unwrap_err(),
            Error::InvalidToken
        ));
        assert!(matches!(
            manager.consume_at("  ", 0).await.unwrap_err(),
            Error::InvalidToken
        ));
    }
}
