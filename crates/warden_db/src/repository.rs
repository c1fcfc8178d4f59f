//! Transactional repository operations.
//!
//! Every public operation here runs in exactly one store transaction, so a
//! caller either observes all of an operation's writes or none of them.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::connection::WardenDb;
use crate::error::{DbError, DbResult};
use crate::models::{
    millis_to_datetime, Credential, CredentialAlgorithm, CredentialKind, IssuedToken, Principal,
    PrincipalStatus, Token,
};
use crate::queries;

/// Attempts at minting a token before a digest collision is reported.
const TOKEN_MINT_ATTEMPTS: usize = 3;

impl WardenDb {
    /// Current time at the precision the store keeps.
    fn now(&self) -> DateTime<Utc> {
        millis_to_datetime(self.clock().now().timestamp_millis())
    }

    /// Find a principal by login name.
    pub async fn find_principal_by_login(&self, login: &str) -> DbResult<Option<Principal>> {
        let mut conn = self.pool().acquire().await?;
        queries::get_principal_by_login(&mut conn, login).await
    }

    /// Find a principal by ID.
    pub async fn find_principal(&self, id: &str) -> DbResult<Option<Principal>> {
        let mut conn = self.pool().acquire().await?;
        queries::get_principal(&mut conn, id).await
    }

    /// Create a new active principal. Fails with `Conflict` if the login exists.
    pub async fn create_principal(&self, login: &str) -> DbResult<Principal> {
        let now = self.now();
        let mut tx = self.pool().begin().await?;
        let principal = queries::insert_principal(&mut tx, login, now).await?;
        tx.commit().await?;
        debug!(principal_id = %principal.id, "Created principal");
        Ok(principal)
    }

    /// Create a principal together with its first password credential.
    pub async fn register_principal(
        &self,
        login: &str,
        secret_hash: &str,
        algorithm: CredentialAlgorithm,
    ) -> DbResult<(Principal, Credential)> {
        let now = self.now();
        let mut tx = self.pool().begin().await?;
        let principal = queries::insert_principal(&mut tx, login, now).await?;
        let credential = queries::insert_credential(
            &mut tx,
            &principal.id,
            CredentialKind::Password,
            secret_hash,
            &algorithm,
            now,
        )
        .await?;
        tx.commit().await?;
        debug!(principal_id = %principal.id, "Registered principal");
        Ok((principal, credential))
    }

    /// Enable or disable a principal.
    pub async fn set_principal_status(&self, id: &str, status: PrincipalStatus) -> DbResult<()> {
        let now = self.now();
        let mut tx = self.pool().begin().await?;
        if !queries::update_principal_status(&mut tx, id, status, now).await? {
            return Err(DbError::not_found("principal", id));
        }
        tx.commit().await?;
        debug!(principal_id = %id, ?status, "Updated principal status");
        Ok(())
    }

    /// The principal's active password credential, if any.
    pub async fn active_credential_for(&self, principal_id: &str) -> DbResult<Option<Credential>> {
        let mut conn = self.pool().acquire().await?;
        queries::get_active_credential(&mut conn, principal_id, CredentialKind::Password).await
    }

    /// Every credential the principal has held, oldest first.
    pub async fn credential_history(&self, principal_id: &str) -> DbResult<Vec<Credential>> {
        let mut conn = self.pool().acquire().await?;
        queries::list_credentials(&mut conn, principal_id).await
    }

    /// Replace the principal's active password credential.
    ///
    /// Supersedes the prior active credential and inserts the new one in one
    /// transaction. When two rotations race, the loser sees `Conflict`: either
    /// its compare-and-set on the prior credential finds it already
    /// superseded, the store rejects its stale snapshot, or the one-active
    /// unique index rejects its insert.
    pub async fn rotate_credential(
        &self,
        principal_id: &str,
        new_secret_hash: &str,
        algorithm: CredentialAlgorithm,
    ) -> DbResult<Credential> {
        let now = self.now();
        let kind = CredentialKind::Password;
        let mut tx = self.pool().begin().await?;

        if queries::get_principal(&mut tx, principal_id).await?.is_none() {
            return Err(DbError::not_found("principal", principal_id));
        }

        if let Some(prior) = queries::get_active_credential(&mut tx, principal_id, kind).await? {
            queries::supersede_credential(&mut tx, &prior.id, now)
                .await
                .map_err(lost_race)?;
        }

        let credential = queries::insert_credential(
            &mut tx,
            principal_id,
            kind,
            new_secret_hash,
            &algorithm,
            now,
        )
        .await
        .map_err(lost_race)?;

        tx.commit()
            .await
            .map_err(|e| lost_race(DbError::from(e)))?;
        debug!(principal_id = %principal_id, credential_id = %credential.id, "Rotated credential");
        Ok(credential)
    }

    /// Mint a token for the principal that expires `ttl` from now.
    pub async fn issue_token(&self, principal_id: &str, ttl: Duration) -> DbResult<IssuedToken> {
        let issued_at = self.now();
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| DbError::invalid_argument(format!("token ttl {ttl} out of range")))?;

        for attempt in 1..=TOKEN_MINT_ATTEMPTS {
            let token = queries::generate_token_id();
            let mut tx = self.pool().begin().await?;
            match queries::insert_token(&mut tx, &token, principal_id, issued_at, expires_at).await
            {
                Ok(()) => {
                    tx.commit().await?;
                    debug!(principal_id = %principal_id, "Issued token");
                    return Ok(IssuedToken {
                        token,
                        principal_id: principal_id.to_string(),
                        issued_at,
                        expires_at,
                    });
                }
                Err(e) if e.is_conflict() => {
                    warn!(attempt, "Token identifier collision, minting again");
                }
                Err(e) => return Err(e),
            }
        }

        Err(DbError::conflict(
            "token",
            format!("no unique identifier after {TOKEN_MINT_ATTEMPTS} attempts"),
        ))
    }

    /// Look up a token by its identifier.
    pub async fn find_token(&self, token_id: &str) -> DbResult<Option<Token>> {
        let mut conn = self.pool().acquire().await?;
        queries::get_token(&mut conn, token_id).await
    }

    /// Mark a token revoked. Fails with `NotFound` if it does not exist.
    pub async fn revoke_token(&self, token_id: &str) -> DbResult<()> {
        let now = self.now();
        let mut tx = self.pool().begin().await?;
        if !queries::set_token_revoked(&mut tx, token_id, now).await? {
            return Err(DbError::not_found("token", "<redacted>"));
        }
        tx.commit().await?;
        Ok(())
    }

    /// Delete tokens that expired or were revoked before `cutoff`.
    pub async fn purge_tokens(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let mut tx = self.pool().begin().await?;
        let deleted = queries::delete_dead_tokens(&mut tx, cutoff).await?;
        tx.commit().await?;
        if deleted > 0 {
            debug!("Purged {} dead tokens", deleted);
        }
        Ok(deleted)
    }

    /// Highest migration version recorded in the store (0 if never migrated).
    pub async fn current_schema_version(&self) -> DbResult<i64> {
        let mut conn = self.pool().acquire().await?;
        queries::get_schema_version(&mut conn).await
    }

    /// Holder of the migration lock, if a migration run is in progress.
    pub async fn migration_lock_holder(&self) -> DbResult<Option<String>> {
        let mut conn = self.pool().acquire().await?;
        queries::get_migration_lock_holder(&mut conn).await
    }
}

/// Classify a failure in the write phase of a rotation.
///
/// By the time a rotation writes it already holds a read snapshot, and SQLite
/// reports a competing writer as busy without waiting. Either way the other
/// rotation got there first, so it is a conflict rather than an outage.
fn lost_race(err: DbError) -> DbError {
    match err {
        DbError::Unavailable(detail) => {
            DbError::conflict("credential", format!("concurrent writer: {detail}"))
        }
        other => other.for_entity("credential"),
    }
}
