//! Login and per-request caller resolution.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::jwt::TokenCodec;
use super::password::verify_password_async;
use crate::error::{Error, Result};
use crate::model::{Identity, Role};
use crate::store::UserStore;

/// Authenticated caller, passed explicitly to every service operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub roles: Vec<Role>,
}

impl AuthContext {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            user_id: identity.id,
            email: identity.email.clone(),
            roles: identity.roles.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden("admin role required".into()))
        }
    }

    /// Owners and admins may see a record.
    pub fn can_access(&self, owner_id: i64) -> bool {
        self.user_id == owner_id || self.is_admin()
    }
}

/// Outcome of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub identity: Identity,
    pub token: String,
    pub expires_in_secs: i64,
}

/// Token from an `Authorization: Bearer <token>` header value.
pub fn strip_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub struct SessionAuthenticator {
    users: Arc<dyn UserStore>,
    codec: Arc<TokenCodec>,
}

impl SessionAuthenticator {
    pub fn new(users: Arc<dyn UserStore>, codec: Arc<TokenCodec>) -> Self {
        Self { users, codec }
    }

    /// Unknown email, unverified account and wrong password all fail the
    /// same way.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        let Some(identity) = self.users.find_by_email(email).await? else {
            warn!("Login for unknown email");
            return Err(Error::InvalidCredentials);
        };

        if !identity.can_authenticate() {
            warn!(user_id = identity.id, "Login for unverified account");
            return Err(Error::InvalidCredentials);
        }

        let matches =
            verify_password_async(password.to_string(), identity.password_hash.clone()).await?;
        if !matches {
            warn!(user_id = identity.id, "Login with wrong password");
            return Err(Error::InvalidCredentials);
        }

        let token = self.codec.issue(&identity.email, &identity.role_names())?;
        info!(user_id = identity.id, "User logged in");

        Ok(Session {
            identity,
            token,
            expires_in_secs: self.codec.ttl_secs(),
        })
    }

    /// Resolve an `Authorization` header value into the calling identity.
    pub async fn resolve_bearer(&self, header: &str) -> Result<AuthContext> {
        let token = strip_bearer(header).ok_or(Error::InvalidToken)?;
        self.resolve_token(token).await
    }

    /// Resolve a bare token. Roles come from the stored identity, not the
    /// token, so role changes apply immediately.
    pub async fn resolve_token(&self, token: &str) -> Result<AuthContext> {
        let subject = self.codec.parse_subject(token)?;

        let Some(identity) = self.users.find_by_email(&subject).await? else {
            debug!("Token subject no longer exists");
            return Err(Error::InvalidToken);
        };

        if !self.codec.verify(token, &identity.email) || !identity.can_authenticate() {
            return Err(Error::InvalidToken);
        }

        Ok(AuthContext::from_identity(&identity))
    }

    /// Current identity record for a resolved caller.
    pub async fn identity(&self, ctx: &AuthContext) -> Result<Identity> {
        self.users
            .find_by_id(ctx.user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", ctx.user_id)))
    }
}
