//! Token models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::millis_to_datetime;

/// A stored session grant.
///
/// The store only knows the digest of the token identifier; `id` is the value
/// the caller presented when looking the token up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub principal_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Whether the token is past its expiry at `now` (expiry is exclusive).
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A freshly minted token. The raw identifier is only ever available here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub principal_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Database row for the tokens table.
#[derive(Debug, FromRow)]
pub(crate) struct TokenRow {
    pub principal_id: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub revoked: bool,
    pub revoked_at: Option<i64>,
}

impl TokenRow {
    pub(crate) fn into_token(self, id: &str) -> Token {
        Token {
            id: id.to_string(),
            principal_id: self.principal_id,
            issued_at: millis_to_datetime(self.issued_at),
            expires_at: millis_to_datetime(self.expires_at),
            revoked: self.revoked,
            revoked_at: self.revoked_at.map(millis_to_datetime),
        }
    }
}
