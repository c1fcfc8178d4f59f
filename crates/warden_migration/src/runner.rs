//! Applies pending migrations and maintains the schema version record.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};
use warden_db::{WardenDb, MIGRATION_LOCK_TABLE, SCHEMA_VERSION_TABLE};

use crate::error::MigrationError;
use crate::migrations::{Migration, MIGRATIONS};

/// A migration recorded as applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Where the store stands relative to the known migrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Version recorded in the store
    pub current: i64,
    /// Newest known migration
    pub latest: i64,
    /// Known migrations above `current`, ascending
    pub pending: Vec<(i64, &'static str)>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Applies an ordered list of migrations to one store.
#[derive(Debug, Clone)]
pub struct Migrator {
    pool: SqlitePool,
    migrations: Vec<Migration>,
    holder: String,
}

impl Migrator {
    /// Migrator over every migration shipped with this build.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_migrations(pool, MIGRATIONS.to_vec())
    }

    /// Migrator over a caller-supplied list of definitions.
    pub fn with_migrations(pool: SqlitePool, migrations: Vec<Migration>) -> Self {
        let holder = format!("warden-migrate:{}:{}", std::process::id(), uuid::Uuid::new_v4());
        Self {
            pool,
            migrations,
            holder,
        }
    }

    /// Newest version among this migrator's definitions.
    pub fn latest_version(&self) -> i64 {
        self.migrations.last().map(|m| m.version).unwrap_or(0)
    }

    /// Apply every migration above the recorded version, up to `target`
    /// (default: the newest known), in ascending order.
    ///
    /// Each migration runs in its own transaction together with the update of
    /// the version record. The first failure aborts the run; migrations applied
    /// before it stay applied. Nothing pending returns an empty list.
    pub async fn apply_pending(
        &self,
        target: Option<i64>,
    ) -> Result<Vec<AppliedMigration>, MigrationError> {
        self.validate()?;

        let latest = self.latest_version();
        let target = target.unwrap_or(latest);
        if target > latest {
            return Err(MigrationError::UnknownTarget { target, latest });
        }

        self.bootstrap().await?;
        self.acquire_lock().await?;

        let result = self.apply_locked(target).await;

        if let Err(e) = self.release_lock().await {
            error!("Failed to release migration lock: {}", e);
        }
        result
    }

    /// Recorded version, newest known version, and what is pending.
    pub async fn status(&self) -> Result<MigrationStatus, MigrationError> {
        self.validate()?;
        let current = WardenDb::from_pool(self.pool.clone())
            .current_schema_version()
            .await?;
        let pending = self
            .migrations
            .iter()
            .filter(|m| m.version > current)
            .map(|m| (m.version, m.name))
            .collect();
        Ok(MigrationStatus {
            current,
            latest: self.latest_version(),
            pending,
        })
    }

    /// Every migration recorded in the store, ascending.
    pub async fn applied(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        self.bootstrap().await?;
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(&format!(
            "SELECT version, name, applied_at FROM {SCHEMA_VERSION_TABLE} ORDER BY version"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(version, name, applied_at)| AppliedMigration {
                version,
                name,
                applied_at: DateTime::from_timestamp_millis(applied_at)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            })
            .collect())
    }

    fn validate(&self) -> Result<(), MigrationError> {
        if let Some(m) = self.migrations.iter().find(|m| m.version <= 0) {
            return Err(MigrationError::InvalidDefinitions(format!(
                "migration {} has non-positive version {}",
                m.name, m.version
            )));
        }
        if let Some(w) = self
            .migrations
            .windows(2)
            .find(|w| w[0].version >= w[1].version)
        {
            return Err(MigrationError::InvalidDefinitions(format!(
                "{} ({}) is not below {} ({})",
                w[0].name, w[0].version, w[1].name, w[1].version
            )));
        }
        Ok(())
    }

    /// Create the version record and lock tables if they are missing.
    async fn bootstrap(&self) -> Result<(), MigrationError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {SCHEMA_VERSION_TABLE} (
                version BIGINT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                applied_at BIGINT NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {MIGRATION_LOCK_TABLE} (
                id INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
                holder TEXT NOT NULL,
                acquired_at BIGINT NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn acquire_lock(&self) -> Result<(), MigrationError> {
        let inserted = sqlx::query(&format!(
            "INSERT INTO {MIGRATION_LOCK_TABLE} (id, holder, acquired_at) VALUES (1, ?, ?)"
        ))
        .bind(&self.holder)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                debug!(holder = %self.holder, "Acquired migration lock");
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let (holder,): (String,) = sqlx::query_as(&format!(
                    "SELECT holder FROM {MIGRATION_LOCK_TABLE} WHERE id = 1"
                ))
                .fetch_one(&self.pool)
                .await?;
                Err(MigrationError::LockHeld { holder })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release_lock(&self) -> Result<(), MigrationError> {
        sqlx::query(&format!(
            "DELETE FROM {MIGRATION_LOCK_TABLE} WHERE id = 1 AND holder = ?"
        ))
        .bind(&self.holder)
        .execute(&self.pool)
        .await?;
        debug!(holder = %self.holder, "Released migration lock");
        Ok(())
    }

    async fn apply_locked(&self, target: i64) -> Result<Vec<AppliedMigration>, MigrationError> {
        let mut conn = self.pool.acquire().await?;
        let current = recorded_version(&mut conn).await?;
        drop(conn);

        let pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| m.version > current && m.version <= target)
            .collect();

        if pending.is_empty() {
            info!("Schema is up to date at version {}", current);
            return Ok(Vec::new());
        }

        info!(
            "Applying {} migration(s): version {} -> {}",
            pending.len(),
            current,
            target
        );

        let mut applied = Vec::with_capacity(pending.len());
        let mut last_applied = current;
        for migration in pending {
            match self.apply_one(migration, last_applied).await {
                Ok(record) => {
                    info!("Applied migration {} ({})", record.version, record.name);
                    last_applied = record.version;
                    applied.push(record);
                }
                Err(e) => {
                    warn!(
                        "Migration {} ({}) failed; store remains at version {}",
                        migration.version, migration.name, last_applied
                    );
                    return Err(e);
                }
            }
        }
        Ok(applied)
    }

    async fn apply_one(
        &self,
        migration: &Migration,
        last_applied: i64,
    ) -> Result<AppliedMigration, MigrationError> {
        let failed = |source: sqlx::Error| MigrationError::Failed {
            last_applied,
            failed: migration.version,
            source,
        };

        let mut tx = self.pool.begin().await.map_err(failed)?;

        let recorded = recorded_version(&mut tx).await?;
        if recorded >= migration.version {
            return Err(MigrationError::OutOfOrder {
                recorded,
                attempted: migration.version,
            });
        }

        for statement in migration.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(failed)?;
        }

        let applied_at = Utc::now();
        sqlx::query(&format!(
            "INSERT INTO {SCHEMA_VERSION_TABLE} (version, name, applied_at) VALUES (?, ?, ?)"
        ))
        .bind(migration.version)
        .bind(migration.name)
        .bind(applied_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(failed)?;

        tx.commit().await.map_err(failed)?;

        Ok(AppliedMigration {
            version: migration.version,
            name: migration.name.to_string(),
            applied_at: DateTime::from_timestamp_millis(applied_at.timestamp_millis())
                .unwrap_or(applied_at),
        })
    }
}

async fn recorded_version(conn: &mut SqliteConnection) -> Result<i64, MigrationError> {
    let (version,): (Option<i64>,) =
        sqlx::query_as(&format!("SELECT MAX(version) FROM {SCHEMA_VERSION_TABLE}"))
            .fetch_one(&mut *conn)
            .await?;
    Ok(version.unwrap_or(0))
}
