//! Identity (user account) and role types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Fixed set of roles an identity may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    /// Accepts `USER`/`ADMIN` as well as the `ROLE_` prefixed spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix("ROLE_").unwrap_or(name);
        match name {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(Error::Validation(format!("Role not found: {s}"))),
        }
    }
}

/// Single-use email verification token held by an unverified identity.
///
/// Value and expiry only ever exist together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationToken {
    pub value: String,
    pub expires_at: i64,
}

impl VerificationToken {
    pub const fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

/// An account. `enabled` implies `verified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub picture: Option<String>,
    pub image_ref: Option<String>,
    pub roles: Vec<Role>,
    pub enabled: bool,
    pub verified: bool,
    #[serde(skip_serializing, default)]
    pub verification: Option<VerificationToken>,
    pub created_at: i64,
    /// Bumped by the store on every successful update.
    pub version: i64,
}

impl Identity {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Only verified, enabled identities may sign in or present a session token.
    pub const fn can_authenticate(&self) -> bool {
        self.enabled && self.verified
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.as_str().to_string()).collect()
    }
}

/// Fields for a not-yet-persisted identity; the store assigns `id` and `version`.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub picture: Option<String>,
    pub image_ref: Option<String>,
    pub roles: Vec<Role>,
    pub verification: VerificationToken,
    pub created_at: i64,
}

impl NewIdentity {
    /// Materialise with a store-assigned id. New identities start unverified and disabled.
    pub fn into_identity(self, id: i64) -> Identity {
        Identity {
            id,
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            phone_number: self.phone_number,
            bio: self.bio,
            picture: self.picture,
            image_ref: self.image_ref,
            roles: self.roles,
            enabled: false,
            verified: false,
            verification: Some(self.verification),
            created_at: self.created_at,
            version: 0,
        }
    }
}
