//! Credential models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::millis_to_datetime;

/// A verifiable secret bound to a principal.
///
/// Credentials are never updated in place: a rotation marks the previous row
/// `superseded` and inserts a new `active` one, so the full history stays
/// available for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// Owning principal
    pub principal_id: String,

    /// Credential type; at most one active credential per principal per kind
    pub kind: CredentialKind,

    /// Salted hash of the secret, in the format named by `algorithm`
    #[serde(skip_serializing)]
    pub secret_hash: String,

    /// Hash scheme tag, read back to pick the verifier
    pub algorithm: CredentialAlgorithm,

    pub status: CredentialStatus,

    pub created_at: DateTime<Utc>,

    /// When a later rotation replaced this credential
    pub superseded_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_active(&self) -> bool {
        self.status == CredentialStatus::Active
    }
}

/// Credential type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Password,
}

impl Default for CredentialKind {
    fn default() -> Self {
        Self::Password
    }
}

/// Credential lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Superseded,
}

/// Hash scheme used for a stored secret.
///
/// Stored as a free-form tag so rows written under a retired scheme still
/// load; unknown tags surface as [`CredentialAlgorithm::Unknown`] and never
/// verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum CredentialAlgorithm {
    /// Argon2id PHC string
    Argon2id,
    Unknown(String),
}

impl CredentialAlgorithm {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Argon2id => "argon2id",
            Self::Unknown(tag) => tag,
        }
    }
}

impl fmt::Display for CredentialAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialAlgorithm {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "argon2id" => Self::Argon2id,
            other => Self::Unknown(other.to_string()),
        })
    }
}

impl From<String> for CredentialAlgorithm {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "argon2id" => Self::Argon2id,
            _ => Self::Unknown(tag),
        }
    }
}

impl From<CredentialAlgorithm> for String {
    fn from(algo: CredentialAlgorithm) -> Self {
        algo.as_str().to_string()
    }
}

/// Database row for the credentials table.
#[derive(Debug, FromRow)]
pub(crate) struct CredentialRow {
    pub id: String,
    pub principal_id: String,
    pub kind: CredentialKind,
    pub secret_hash: String,
    pub algorithm: String,
    pub status: CredentialStatus,
    pub created_at: i64,
    pub superseded_at: Option<i64>,
}

impl From<CredentialRow> for Credential {
    fn from(row: CredentialRow) -> Self {
        Self {
            id: row.id,
            principal_id: row.principal_id,
            kind: row.kind,
            secret_hash: row.secret_hash,
            algorithm: CredentialAlgorithm::from(row.algorithm),
            status: row.status,
            created_at: millis_to_datetime(row.created_at),
            superseded_at: row.superseded_at.map(millis_to_datetime),
        }
    }
}
