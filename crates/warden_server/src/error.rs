//! Error types for the server.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use tracing::{error, warn};
use warden_auth::AuthError;
use warden_db::DbError;

/// Result type for server startup and lifecycle.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server from starting or serving.
#[derive(Debug, Error, Diagnostic)]
pub enum ServerError {
    #[error("Configuration error: {message}")]
    #[diagnostic(code(warden_server::config))]
    Config { message: String },

    #[error("Store schema is at version {recorded}, this build expects {expected}")]
    #[diagnostic(
        code(warden_server::schema_mismatch),
        help("Run `warden-migrate up` with the migration tool matching this build")
    )]
    SchemaMismatch { recorded: i64, expected: i64 },

    #[error("A migration is in progress (lock held by {holder})")]
    #[diagnostic(
        code(warden_server::migration_in_progress),
        help("Wait for the migration to finish, or clear a stale lock row")
    )]
    MigrationInProgress { holder: String },

    #[error("Store unreachable: {0}")]
    #[diagnostic(code(warden_server::store_unreachable))]
    StoreUnreachable(String),

    #[error("Failed to bind {addr}")]
    #[diagnostic(code(warden_server::bind))]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    #[diagnostic(code(warden_server::serve))]
    Serve(#[source] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Auth(AuthError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(DbError),
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::SchemaMismatch { .. } | Self::MigrationInProgress { .. } => 2,
            Self::StoreUnreachable(_) | Self::Auth(AuthError::StoreUnavailable(_)) => 3,
            _ => 1,
        }
    }
}

impl From<DbError> for ServerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Unavailable(detail) => Self::StoreUnreachable(detail),
            other => Self::Database(other),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::StoreUnavailable(detail) => Self::StoreUnreachable(detail),
            other => Self::Auth(other),
        }
    }
}

/// What an HTTP caller gets to see of a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Every credential and token failure
    Unauthorized,
    BadRequest(String),
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::TokenNotFound
            | AuthError::TokenExpired
            | AuthError::TokenRevoked => Self::Unauthorized,
            AuthError::InvalidRequest { message } => Self::BadRequest(message),
            AuthError::UnknownPrincipal(_) => Self::NotFound,
            AuthError::Conflict { detail } => {
                warn!("Request conflict: {}", detail);
                Self::Conflict
            }
            AuthError::StoreUnavailable(detail) => {
                warn!("Store unavailable: {}", detail);
                Self::Unavailable
            }
            other => {
                error!("Request failed: {}", other);
                Self::Internal
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        AuthError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Stable error code, e.g. `unauthorized`
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    fn code(error: &str) -> Self {
        Self {
            error: error.to_string(),
            message: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, ErrorBody::code("unauthorized")),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "invalid_request".to_string(),
                    message: Some(message),
                },
            ),
            Self::NotFound => (StatusCode::NOT_FOUND, ErrorBody::code("not_found")),
            Self::Conflict => (StatusCode::CONFLICT, ErrorBody::code("conflict")),
            Self::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::code("unavailable"),
            ),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::code("internal"),
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_collapse() {
        for err in [
            AuthError::InvalidCredentials,
            AuthError::TokenNotFound,
            AuthError::TokenExpired,
            AuthError::TokenRevoked,
        ] {
            assert_eq!(ApiError::from(err), ApiError::Unauthorized);
        }
        assert_eq!(
            ApiError::from(AuthError::StoreUnavailable("timeout".into())),
            ApiError::Unavailable
        );
        assert_eq!(
            ApiError::from(AuthError::Hash("boom".into())),
            ApiError::Internal
        );
        assert_eq!(
            ApiError::from(AuthError::UnknownPrincipal("bob".into())),
            ApiError::NotFound
        );
    }

    #[test]
    fn exit_codes() {
        assert_eq!(
            ServerError::SchemaMismatch {
                recorded: 2,
                expected: 3
            }
            .exit_code(),
            2
        );
        assert_eq!(
            ServerError::MigrationInProgress {
                holder: "x".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(
            ServerError::from(DbError::Unavailable("down".into())).exit_code(),
            3
        );
        assert_eq!(ServerError::config("bad").exit_code(), 1);
    }
}
