//! Schema version record and migration lock probes.
//!
//! These are read-only: the tables are created and written by the migration
//! tool. Both tables may be missing on a store that was never migrated.

use sqlx::SqliteConnection;

use crate::error::DbResult;
use crate::{MIGRATION_LOCK_TABLE, SCHEMA_VERSION_TABLE};

async fn table_exists(conn: &mut SqliteConnection, table: &str) -> DbResult<bool> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(found.is_some())
}

/// Highest applied migration version, or 0 for an unmigrated store.
pub async fn get_schema_version(conn: &mut SqliteConnection) -> DbResult<i64> {
    if !table_exists(conn, SCHEMA_VERSION_TABLE).await? {
        return Ok(0);
    }
    let (version,): (Option<i64>,) =
        sqlx::query_as(&format!("SELECT MAX(version) FROM {SCHEMA_VERSION_TABLE}"))
            .fetch_one(&mut *conn)
            .await?;
    Ok(version.unwrap_or(0))
}

/// Holder of the migration lock, if a migration run is in progress.
pub async fn get_migration_lock_holder(conn: &mut SqliteConnection) -> DbResult<Option<String>> {
    if !table_exists(conn, MIGRATION_LOCK_TABLE).await? {
        return Ok(None);
    }
    let holder: Option<(String,)> =
        sqlx::query_as(&format!("SELECT holder FROM {MIGRATION_LOCK_TABLE} WHERE id = 1"))
            .fetch_optional(&mut *conn)
            .await?;
    Ok(holder.map(|(h,)| h))
}
