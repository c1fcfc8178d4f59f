//! Error types for warden_auth.

use miette::Diagnostic;
use thiserror::Error;
use warden_db::DbError;

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while authenticating or managing sessions.
///
/// Callers outside the service must not be able to tell the credential and
/// token variants apart; the HTTP layer collapses them into one response.
#[derive(Debug, Error, Diagnostic)]
pub enum AuthError {
    /// Unknown login, disabled principal, missing credential or wrong secret.
    #[error("Invalid credentials")]
    #[diagnostic(code(warden_auth::invalid_credentials))]
    InvalidCredentials,

    #[error("Token not found")]
    #[diagnostic(code(warden_auth::token_not_found))]
    TokenNotFound,

    #[error("Token expired")]
    #[diagnostic(code(warden_auth::token_expired))]
    TokenExpired,

    #[error("Token revoked")]
    #[diagnostic(code(warden_auth::token_revoked))]
    TokenRevoked,

    /// Login already taken, or a concurrent write won the race.
    #[error("Conflict: {detail}")]
    #[diagnostic(code(warden_auth::conflict))]
    Conflict { detail: String },

    /// No principal with the given login or ID.
    #[error("Unknown principal: {0}")]
    #[diagnostic(code(warden_auth::unknown_principal))]
    UnknownPrincipal(String),

    /// Rejected input (empty login or secret).
    #[error("Invalid request: {message}")]
    #[diagnostic(code(warden_auth::invalid_request))]
    InvalidRequest { message: String },

    #[error("Store unavailable: {0}")]
    #[diagnostic(
        code(warden_auth::store_unavailable),
        help("Check that the store is reachable and not saturated")
    )]
    StoreUnavailable(String),

    /// Hashing failed or the hashing task was lost.
    #[error("Hashing error: {0}")]
    #[diagnostic(code(warden_auth::hash))]
    Hash(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(DbError),
}

impl AuthError {
    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Whether this is one of the failures that must look identical to callers.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::TokenNotFound | Self::TokenExpired | Self::TokenRevoked
        )
    }
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict { detail, .. } => Self::Conflict { detail },
            DbError::Unavailable(detail) => Self::StoreUnavailable(detail),
            other => Self::Database(other),
        }
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Hash(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_classified() {
        let err = AuthError::from(DbError::Unavailable("pool timed out".into()));
        assert!(matches!(err, AuthError::StoreUnavailable(_)));

        let err = AuthError::from(DbError::conflict("principal", "login taken"));
        assert!(matches!(err, AuthError::Conflict { .. }));

        let err = AuthError::from(DbError::not_found("principal", "x"));
        assert!(matches!(err, AuthError::Database(_)));
    }

    #[test]
    fn token_and_credential_failures_are_unauthorized() {
        assert!(AuthError::InvalidCredentials.is_unauthorized());
        assert!(AuthError::TokenExpired.is_unauthorized());
        assert!(!AuthError::StoreUnavailable(String::new()).is_unauthorized());
    }
}
