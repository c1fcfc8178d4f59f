//! Startup consistency check between the store and this build.

use tracing::{info, warn};
use warden_db::WardenDb;

use crate::config::SchemaCheck;
use crate::error::{ServerError, ServerResult};

/// Compare the store's recorded schema version with `expected`.
///
/// A held migration lock counts as a mismatch: the schema is mid-change.
/// Under [`SchemaCheck::Warn`] a mismatch is logged and the recorded version
/// returned; store failures are fatal either way.
pub async fn check_schema(db: &WardenDb, expected: i64, mode: SchemaCheck) -> ServerResult<i64> {
    let holder = db.migration_lock_holder().await?;
    let recorded = db.current_schema_version().await?;

    let problem = match holder {
        Some(holder) => Some(ServerError::MigrationInProgress { holder }),
        None if recorded != expected => Some(ServerError::SchemaMismatch { recorded, expected }),
        None => None,
    };

    match (problem, mode) {
        (None, _) => {
            info!(version = recorded, "Schema version matches");
            Ok(recorded)
        }
        (Some(err), SchemaCheck::Fatal) => Err(err),
        (Some(err), SchemaCheck::Warn) => {
            warn!("{}; continuing because schema_check = \"warn\"", err);
            Ok(recorded)
        }
    }
}
