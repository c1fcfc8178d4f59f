//! Store connection management.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::{DbError, DbResult};

/// Pool and timeout settings for the store.
///
/// Every store call is bounded: a connection must be acquired within
/// `acquire_timeout`, and a locked database is retried for at most
/// `busy_timeout` before the call fails with [`DbError::Unavailable`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 8,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(2),
        }
    }
}

/// Handle on the entity store.
///
/// Opening a store never touches its schema. The schema is created and evolved
/// exclusively by the `warden-migrate` tool; the service only checks that the
/// recorded version matches [`crate::SCHEMA_VERSION`].
#[derive(Debug, Clone)]
pub struct WardenDb {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl WardenDb {
    /// Connect to the store at `url` (e.g. `sqlite://warden.db?mode=rwc`).
    pub async fn connect(url: &str, opts: &StoreOptions) -> DbResult<Self> {
        info!("Opening entity store: {}", url);

        if !url.starts_with("sqlite:") {
            return Err(DbError::Unavailable(format!("unsupported store url: {url}")));
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DbError::Unavailable(format!("invalid store url: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(opts.busy_timeout)
            .pragma("synchronous", "NORMAL") // Safe with WAL
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(opts.max_connections)
            .acquire_timeout(opts.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Unavailable(e.to_string()))?;

        debug!("Store connection established");
        Ok(Self::from_pool(pool))
    }

    /// Open an in-memory store (for testing).
    pub async fn open_in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(1) // In-memory must be single connection to share state
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source used to stamp and expire entities.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The time source this store stamps entities with.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the store connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Check if the store is reachable.
    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
