//! Error types for the entity store.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for repository operations.
pub type DbResult<T> = Result<T, DbError>;

/// SQLite extended result code for a write attempted on a stale WAL snapshot.
const SQLITE_BUSY_SNAPSHOT: &str = "517";
/// Plain SQLITE_BUSY / SQLITE_LOCKED, returned after the busy timeout expires.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

/// Repository error types.
#[derive(Debug, Error, Diagnostic)]
pub enum DbError {
    /// Any sqlx error that is not a conflict or an availability problem
    #[error("Database error: {0}")]
    #[diagnostic(code(warden_db::database))]
    Sqlx(sqlx::Error),

    /// Uniqueness violation or lost write race; the caller may retry with different input
    #[error("{entity_type} conflict: {detail}")]
    #[diagnostic(code(warden_db::conflict))]
    Conflict {
        entity_type: &'static str,
        detail: String,
    },

    /// Entity not found
    #[error("{entity_type} not found: {id}")]
    #[diagnostic(code(warden_db::not_found))]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Store could not be reached within the configured timeouts
    #[error("Store unavailable: {0}")]
    #[diagnostic(
        code(warden_db::unavailable),
        help("The store did not answer within the pool acquire or busy timeout")
    )]
    Unavailable(String),

    /// Argument the store cannot represent, such as a timestamp out of range
    #[error("Invalid argument: {message}")]
    #[diagnostic(code(warden_db::invalid_argument))]
    InvalidArgument { message: String },

    /// Invalid data read back from the store
    #[error("Invalid data: {message}")]
    #[diagnostic(code(warden_db::invalid_data))]
    InvalidData { message: String },
}

impl DbError {
    /// Create a not found error.
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(entity_type: &'static str, detail: impl Into<String>) -> Self {
        Self::Conflict {
            entity_type,
            detail: detail.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Whether this error is a `Conflict`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether this error is transient store unavailability.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Re-tag a conflict with the entity it concerns.
    pub(crate) fn for_entity(self, entity: &'static str) -> Self {
        match self {
            Self::Conflict { detail, .. } => Self::Conflict {
                entity_type: entity,
                detail,
            },
            other => other,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        enum Class {
            Unavailable,
            Conflict(String),
            Dangling(String),
            Other,
        }

        let class = match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Class::Unavailable
            }
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Class::Conflict(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Class::Dangling(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(SQLITE_BUSY_SNAPSHOT) => {
                    Class::Conflict("concurrent write invalidated this transaction".to_string())
                }
                Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => Class::Unavailable,
                _ => Class::Other,
            },
            _ => Class::Other,
        };

        match class {
            Class::Unavailable => Self::Unavailable(err.to_string()),
            Class::Conflict(detail) => Self::conflict("entity", detail),
            Class::Dangling(detail) => Self::not_found("referenced entity", detail),
            Class::Other => Self::Sqlx(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_unavailable() {
        let err = DbError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_unavailable());
    }

    #[test]
    fn row_not_found_is_plain_database_error() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Sqlx(_)));
    }

    #[test]
    fn conflict_retags_entity() {
        let err = DbError::conflict("entity", "dup").for_entity("principal");
        assert!(matches!(
            err,
            DbError::Conflict {
                entity_type: "principal",
                ..
            }
        ));
    }
}
