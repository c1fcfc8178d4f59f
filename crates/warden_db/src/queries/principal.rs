//! Principal queries.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::to_millis;
use crate::error::{DbError, DbResult};
use crate::models::{millis_to_datetime, Principal, PrincipalRow, PrincipalStatus};

/// Get a principal by login name.
pub async fn get_principal_by_login(
    conn: &mut SqliteConnection,
    login: &str,
) -> DbResult<Option<Principal>> {
    let row = sqlx::query_as::<_, PrincipalRow>(
        r#"
        SELECT id, login, status, created_at, updated_at
        FROM principals WHERE login = ?
        "#,
    )
    .bind(login)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Principal::from))
}

/// Get a principal by ID.
pub async fn get_principal(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Principal>> {
    let row = sqlx::query_as::<_, PrincipalRow>(
        r#"
        SELECT id, login, status, created_at, updated_at
        FROM principals WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Principal::from))
}

/// Insert a new active principal.
///
/// Fails with `Conflict` when the login is already taken.
pub async fn insert_principal(
    conn: &mut SqliteConnection,
    login: &str,
    now: DateTime<Utc>,
) -> DbResult<Principal> {
    let id = uuid::Uuid::new_v4().to_string();
    let at = to_millis(now);

    sqlx::query(
        r#"
        INSERT INTO principals (id, login, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(login)
    .bind(PrincipalStatus::Active)
    .bind(at)
    .bind(at)
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from(e).for_entity("principal"))?;

    Ok(Principal {
        id,
        login: login.to_string(),
        status: PrincipalStatus::Active,
        created_at: millis_to_datetime(at),
        updated_at: millis_to_datetime(at),
    })
}

/// Update a principal's status. Returns whether a row was changed.
pub async fn update_principal_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: PrincipalStatus,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query("UPDATE principals SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(to_millis(now))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
