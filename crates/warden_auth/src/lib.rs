//! Warden Auth - credential verification and the token lifecycle.
//!
//! The [`Authenticator`] sits between the HTTP boundary and the entity store:
//! it checks a login and secret against the principal's active credential,
//! mints opaque tokens, resolves them back to principals, and revokes them.
//!
//! Hashing is CPU-bound and runs on Tokio's blocking pool. Time comes from the
//! store's [`warden_db::Clock`], so expiry can be driven by a manual clock in
//! tests.

pub mod engine;
pub mod error;
pub mod password;

pub use engine::{AuthConfig, Authenticator, Session, MAX_TOKEN_TTL_DAYS};
pub use error::{AuthError, AuthResult};
pub use password::{HashParams, SecretHasher};
