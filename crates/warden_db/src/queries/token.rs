//! Token queries.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqliteConnection;

use super::to_millis;
use crate::error::{DbError, DbResult};
use crate::models::{Token, TokenRow};

/// Random bytes in a token identifier.
pub const TOKEN_BYTES: usize = 32;

/// Mint a new opaque token identifier from the thread CSPRNG.
pub fn generate_token_id() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest under which a token identifier is stored.
pub fn token_digest(token_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token_id.as_bytes()))
}

/// Insert a token row keyed by the digest of `token_id`.
///
/// A digest collision surfaces as `Conflict` so the caller can mint again.
pub async fn insert_token(
    conn: &mut SqliteConnection,
    token_id: &str,
    principal_id: &str,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tokens (token_digest, principal_id, issued_at, expires_at, revoked)
        VALUES (?, ?, ?, ?, FALSE)
        "#,
    )
    .bind(token_digest(token_id))
    .bind(principal_id)
    .bind(to_millis(issued_at))
    .bind(to_millis(expires_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from(e).for_entity("token"))?;
    Ok(())
}

/// Get a token by its identifier.
pub async fn get_token(conn: &mut SqliteConnection, token_id: &str) -> DbResult<Option<Token>> {
    let row = sqlx::query_as::<_, TokenRow>(
        r#"
        SELECT principal_id, issued_at, expires_at, revoked, revoked_at
        FROM tokens WHERE token_digest = ?
        "#,
    )
    .bind(token_digest(token_id))
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|r| r.into_token(token_id)))
}

/// Set the revocation flag. Returns whether the token exists.
///
/// Revoking an already revoked token leaves its original `revoked_at` intact.
pub async fn set_token_revoked(
    conn: &mut SqliteConnection,
    token_id: &str,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE tokens
        SET revoked = TRUE, revoked_at = COALESCE(revoked_at, ?)
        WHERE token_digest = ?
        "#,
    )
    .bind(to_millis(now))
    .bind(token_digest(token_id))
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete tokens that expired, or were revoked, before `cutoff`.
pub async fn delete_dead_tokens(conn: &mut SqliteConnection, cutoff: DateTime<Utc>) -> DbResult<u64> {
    let cutoff = to_millis(cutoff);
    let result = sqlx::query(
        r#"
        DELETE FROM tokens
        WHERE expires_at < ? OR (revoked = TRUE AND revoked_at < ?)
        "#,
    )
    .bind(cutoff)
    .bind(cutoff)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}
