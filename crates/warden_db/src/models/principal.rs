//! Principal models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::millis_to_datetime;

/// An authenticatable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// Login name, unique across the store
    pub login: String,

    /// Whether the principal may authenticate
    pub status: PrincipalStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    pub fn is_active(&self) -> bool {
        self.status == PrincipalStatus::Active
    }
}

/// Principal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PrincipalStatus {
    /// May authenticate
    Active,
    /// Every authentication attempt fails
    Disabled,
}

impl Default for PrincipalStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// Database row for the principals table.
#[derive(Debug, FromRow)]
pub(crate) struct PrincipalRow {
    pub id: String,
    pub login: String,
    pub status: PrincipalStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<PrincipalRow> for Principal {
    fn from(row: PrincipalRow) -> Self {
        Self {
            id: row.id,
            login: row.login,
            status: row.status,
            created_at: millis_to_datetime(row.created_at),
            updated_at: millis_to_datetime(row.updated_at),
        }
    }
}
