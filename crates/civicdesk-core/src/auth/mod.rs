//! Authentication: session tokens, password hashing, email verification and
//! caller resolution.

pub mod claims;
pub mod jwt;
pub mod password;
pub mod session;
pub mod verification;

pub use claims::Claims;
pub use jwt::{DEFAULT_SESSION_TTL_SECS, TokenCodec};
pub use session::{AuthContext, Session, SessionAuthenticator, strip_bearer};
pub use verification::{DEFAULT_VERIFICATION_TTL_SECS, VerificationTokenManager};
