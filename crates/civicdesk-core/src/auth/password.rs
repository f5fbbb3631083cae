//! Password hashing and verification using argon2id.
//!
//! Hashing is CPU-bound, so the async entry points move the work onto the
//! blocking pool.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::error::{Error, Result};

/// Shortest password accepted at signup or on a password change.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Length rule shared by signup and profile updates, counted in characters.
pub fn check_password_policy(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hash a password using argon2id with a random salt.
pub fn hash_password(password: &str) -> std::result::Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored argon2id hash.
pub fn verify_password(
    password: &str,
    hash: &str,
) -> std::result::Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn hash_password_async(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| Error::Internal(format!("password hashing failed: {e}")))
}

/// Returns `false` for a wrong password. A stored hash that cannot be parsed
/// is an internal error, not a mismatch.
pub async fn verify_password_async(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| Error::Internal(format!("password verification task failed: {e}")))?
        .map_err(|e| Error::Internal(format!("stored password hash is invalid: {e}")))
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn policy_counts_characters() {
        assert!(matches!(check_password_policy("1234567"), Err(Error::Validation(_))));
        check_password_policy("12345678").unwrap();
        // Eight characters, more than eight bytes.
        check_password_policy("pässwörd").unwrap();
    }

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("mysecret").unwrap();
        assert!(verify_password("mysecret", &hash).unwrap());
        assert!(!verify_password("wrongpassword", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_fresh_salt() {
        let h1 = hash_password("password1").unwrap();
        let h2 = hash_password("password1").unwrap();
        assert_ne!(h1, h2);
        assert!(!h1.contains("password1"));
    }

    #[tokio::test]
    async fn async_wrappers_round_trip() {
        let hash = hash_password_async("hunter2hunter2".into()).await.unwrap();
        assert!(verify_password_async("hunter2hunter2".into(), hash.clone()).await.unwrap());
        assert!(!verify_password_async("nope".into(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_is_internal_error() {
        let err = verify_password_async("pw".into(), "not-a-hash".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
