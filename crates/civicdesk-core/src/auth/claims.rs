//! Session token claims.

use serde::{Deserialize, Serialize};

use crate::model::Role;

/// Claims embedded in a bearer session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the identity's email).
    pub sub: String,
    /// Role names held when the token was issued.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

impl Claims {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }

    pub const fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}
