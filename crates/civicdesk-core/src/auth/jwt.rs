//! Bearer session token issuance and validation.

use std::collections::HashSet;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::claims::Claims;
use crate::clock::unix_timestamp;
use crate::error::{Error, Result};

/// Session lifetime: 10 hours.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 10 * 60 * 60;

/// Signs and checks HS256 session tokens with a key fixed at construction.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenCodec {
    /// Create a codec for the given secret. An empty secret or a non-positive
    /// lifetime is a configuration error.
    pub fn new(secret: &[u8], ttl_secs: i64) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config("token signing secret is empty".into()));
        }
        if ttl_secs <= 0 {
            return Err(Error::Config(format!(
                "session lifetime must be positive, got {ttl_secs}s"
            )));
        }

        // Expiry is checked against our own clock in `verify_at`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["sub".to_string(), "exp".to_string()]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
        })
    }

    pub const fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issue a token for `subject` valid from now for the configured lifetime.
    pub fn issue(&self, subject: &str, roles: &[String]) -> Result<String> {
        self.issue_at(subject, roles, unix_timestamp())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, subject: &str, roles: &[String], now: i64) -> Result<String> {
        let claims = Claims {
            sub: subject.to_string(),
            roles: roles.to_vec(),
            iat: now,
            exp: now + self.ttl_secs,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Config(format!("Token creation failed: {e}")))
    }

    /// Decode and signature-check a token. Expiry is not considered.
    pub fn parse_claims(&self, token: &str) -> Result<Claims> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| Error::InvalidToken)
    }

    pub fn parse_subject(&self, token: &str) -> Result<String> {
        self.parse_claims(token).map(|claims| claims.sub)
    }

    /// True only for a correctly signed, unexpired token issued to `expected_subject`.
    pub fn verify(&self, token: &str, expected_subject: &str) -> bool {
        self.verify_at(token, expected_subject, unix_timestamp())
    }

    pub fn verify_at(&self, token: &str, expected_subject: &str, now: i64) -> bool {
        self.parse_claims(token)
            .is_ok_and(|claims| claims.sub == expected_subject && !claims.is_expired_at(now))
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn test_codec() -> TokenCodec {
        TokenCodec::new(b"test-secret-key-for-testing", DEFAULT_SESSION_TTL_SECS).unwrap()
    }

    fn roles() -> Vec<String> {
        vec!["USER".to_string()]
    }

    #[test]
    fn issue_and_verify() {
        let codec = test_codec();
        let token = codec.issue("alice@example.com", &roles()).unwrap();

        assert!(codec.verify(&token, "alice@example.com"));
        assert_eq!(codec.parse_subject(&token).unwrap(), "alice@example.com");

        let claims = codec.parse_claims(&token).unwrap();
        assert!(claims.has_role(Role::User));
        assert!(!claims.has_role(Role::Admin));
        assert_eq!(claims.exp - claims.iat, DEFAULT_SESSION_TTL_SECS);
    }

    #[test]
    fn issuance_is_deterministic_for_fixed_time() {
        let codec = test_codec();
        let a = codec.issue_at("alice@example.com", &roles(), 1_700_000_000).unwrap();
        let b = codec.issue_at("alice@example.com", &roles(), 1_700_000_000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn expired_token_fails_verification() {
        let codec = test_codec();
        let issued = 1_700_000_000;
        let token = codec.issue_at("alice@example.com", &roles(), issued).unwrap();

        assert!(codec.verify_at(&token, "alice@example.com", issued + DEFAULT_SESSION_TTL_SECS - 1));
        assert!(!codec.verify_at(&token, "alice@example.com", issued + DEFAULT_SESSION_TTL_SECS));
        // Long-expired tokens still parse; only `verify` considers expiry.
        assert!(codec.parse_subject(&token).is_ok());
    }

    #[test]
    fn subject_mismatch_fails_verification() {
        let codec = test_codec();
        let token = codec.issue("alice@example.com", &roles()).unwrap();
        assert!(!codec.verify(&token, "bob@example.com"));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let codec1 = test_codec();
        let codec2 = TokenCodec::new(b"different-secret", DEFAULT_SESSION_TTL_SECS).unwrap();

        let token = codec1.issue("alice@example.com", &roles()).unwrap();
        assert!(!codec2.verify(&token, "alice@example.com"));
        assert!(matches!(codec2.parse_subject(&token), Err(Error::InvalidToken)));
    }

    #[test]
    fn malformed_or_tampered_token_is_invalid() {
        let codec = test_codec();
        assert!(matches!(codec.parse_subject("not-a-valid-token"), Err(Error::InvalidToken)));
        assert!(!codec.verify("", "alice@example.com"));

        let token = codec.issue("alice@example.com", &roles()).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = codec.issue("mallory@example.com", &roles()).unwrap();
        let forged_payload = forged.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_payload;
        let tampered = parts.join(".");
        assert!(matches!(codec.parse_subject(&tampered), Err(Error::InvalidToken)));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            TokenCodec::new(b"", DEFAULT_SESSION_TTL_SECS),
            Err(Error::Config(_))
        ));
        assert!(matches!(TokenCodec::new(b"k", 0), Err(Error::Config(_))));
    }
}
