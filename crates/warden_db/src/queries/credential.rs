//! Credential queries.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::to_millis;
use crate::error::{DbError, DbResult};
use crate::models::{
    millis_to_datetime, Credential, CredentialAlgorithm, CredentialKind, CredentialRow,
    CredentialStatus,
};

/// Get the active credential of a kind for a principal.
pub async fn get_active_credential(
    conn: &mut SqliteConnection,
    principal_id: &str,
    kind: CredentialKind,
) -> DbResult<Option<Credential>> {
    let row = sqlx::query_as::<_, CredentialRow>(
        r#"
        SELECT id, principal_id, kind, secret_hash, algorithm, status, created_at, superseded_at
        FROM credentials
        WHERE principal_id = ? AND kind = ? AND status = 'active'
        "#,
    )
    .bind(principal_id)
    .bind(kind)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Credential::from))
}

/// List every credential a principal has held, oldest first.
pub async fn list_credentials(
    conn: &mut SqliteConnection,
    principal_id: &str,
) -> DbResult<Vec<Credential>> {
    let rows = sqlx::query_as::<_, CredentialRow>(
        r#"
        SELECT id, principal_id, kind, secret_hash, algorithm, status, created_at, superseded_at
        FROM credentials
        WHERE principal_id = ?
        ORDER BY created_at, rowid
        "#,
    )
    .bind(principal_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Credential::from).collect())
}

/// Mark a credential superseded, but only if it is still active.
///
/// Returns `Conflict` when the row was already superseded by someone else,
/// which is how a losing concurrent rotation is detected.
pub async fn supersede_credential(
    conn: &mut SqliteConnection,
    credential_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE credentials SET status = 'superseded', superseded_at = ?
        WHERE id = ? AND status = 'active'
        "#,
    )
    .bind(to_millis(now))
    .bind(credential_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from(e).for_entity("credential"))?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(
            "credential",
            format!("credential {credential_id} was rotated concurrently"),
        ));
    }
    Ok(())
}

/// Insert a new active credential.
///
/// The partial unique index on `(principal_id, kind) WHERE status = 'active'`
/// turns a second active row into a `Conflict`.
pub async fn insert_credential(
    conn: &mut SqliteConnection,
    principal_id: &str,
    kind: CredentialKind,
    secret_hash: &str,
    algorithm: &CredentialAlgorithm,
    now: DateTime<Utc>,
) -> DbResult<Credential> {
    let id = uuid::Uuid::new_v4().to_string();
    let at = to_millis(now);

    sqlx::query(
        r#"
        INSERT INTO credentials (id, principal_id, kind, secret_hash, algorithm, status, created_at)
        VALUES (?, ?, ?, ?, ?, 'active', ?)
        "#,
    )
    .bind(&id)
    .bind(principal_id)
    .bind(kind)
    .bind(secret_hash)
    .bind(algorithm.as_str())
    .bind(at)
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from(e).for_entity("credential"))?;

    Ok(Credential {
        id,
        principal_id: principal_id.to_string(),
        kind,
        secret_hash: secret_hash.to_string(),
        algorithm: algorithm.clone(),
        status: CredentialStatus::Active,
        created_at: millis_to_datetime(at),
        superseded_at: None,
    })
}
