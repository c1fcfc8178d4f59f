//! Error types for the migration runner.

use miette::Diagnostic;
use thiserror::Error;

/// Errors that abort a migration run.
#[derive(Debug, Error, Diagnostic)]
pub enum MigrationError {
    /// Definitions are not strictly ascending, or use a non-positive version.
    #[error("Invalid migration definitions: {0}")]
    #[diagnostic(code(warden_migration::invalid_definitions))]
    InvalidDefinitions(String),

    /// Requested target is beyond the newest known migration.
    #[error("Unknown target version {target}; latest known is {latest}")]
    #[diagnostic(code(warden_migration::unknown_target))]
    UnknownTarget { target: i64, latest: i64 },

    /// Another run holds the migration lock.
    #[error("Migration lock is held by {holder}")]
    #[diagnostic(
        code(warden_migration::lock_held),
        help("Wait for the other run to finish, or clear the stale row in migration_lock")
    )]
    LockHeld { holder: String },

    /// A migration at or below the recorded version was about to be applied.
    #[error("Refusing to apply migration {attempted}: store already at version {recorded}")]
    #[diagnostic(code(warden_migration::out_of_order))]
    OutOfOrder { recorded: i64, attempted: i64 },

    /// A migration's transformation failed; its transaction was rolled back.
    #[error("Migration {failed} failed (store remains at version {last_applied}): {source}")]
    #[diagnostic(code(warden_migration::failed))]
    Failed {
        last_applied: i64,
        failed: i64,
        #[source]
        source: sqlx::Error,
    },

    /// Store error outside any single migration (bootstrap, lock, version read).
    #[error("Store error: {0}")]
    #[diagnostic(code(warden_migration::store))]
    Store(#[from] sqlx::Error),

    /// Connecting to or probing the store through the repository failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Db(#[from] warden_db::DbError),
}
