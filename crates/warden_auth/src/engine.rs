//! The authentication state machine.
//!
//! ```text
//! login + secret ──authenticate──▶ token ──validate──▶ principal
//!                                    │
//!                                    └──revoke──▶ revoked (terminal)
//! ```
//!
//! Expired and revoked tokens fail validation even while the rows still
//! exist; deleting them is left to a background purge.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use warden_db::{
    Credential, CredentialAlgorithm, DbError, IssuedToken, Principal, PrincipalStatus, WardenDb,
};

use crate::error::{AuthError, AuthResult};
use crate::password::{HashParams, SecretHasher};

/// Longest token lifetime the engine accepts.
pub const MAX_TOKEN_TTL_DAYS: i64 = 366;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Lifetime of newly issued tokens
    pub token_ttl: Duration,
    pub hashing: HashParams,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::hours(1),
            hashing: HashParams::default(),
        }
    }
}

/// A validated token together with its principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub principal: Principal,
    pub expires_at: DateTime<Utc>,
}

/// Verifies credentials and manages the token lifecycle.
#[derive(Debug, Clone)]
pub struct Authenticator {
    db: WardenDb,
    hasher: Arc<SecretHasher>,
    token_ttl: Duration,
}

impl Authenticator {
    pub fn new(db: WardenDb, config: AuthConfig) -> AuthResult<Self> {
        if config.token_ttl <= Duration::zero() {
            return Err(AuthError::invalid_request("token TTL must be positive"));
        }
        if config.token_ttl > Duration::days(MAX_TOKEN_TTL_DAYS) {
            return Err(AuthError::invalid_request(format!(
                "token TTL must not exceed {MAX_TOKEN_TTL_DAYS} days"
            )));
        }
        Ok(Self {
            db,
            hasher: Arc::new(SecretHasher::new(config.hashing)?),
            token_ttl: config.token_ttl,
        })
    }

    pub fn db(&self) -> &WardenDb {
        &self.db
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Create a principal with an initial secret.
    pub async fn register(&self, login: &str, secret: &str) -> AuthResult<Principal> {
        let login = login.trim();
        if login.is_empty() {
            return Err(AuthError::invalid_request("login must not be empty"));
        }
        if secret.is_empty() {
            return Err(AuthError::invalid_request("secret must not be empty"));
        }

        let hash = self.hash(secret).await?;
        let (principal, _) = self
            .db
            .register_principal(login, &hash, CredentialAlgorithm::Argon2id)
            .await?;
        info!(principal_id = %principal.id, login = %principal.login, "Registered principal");
        Ok(principal)
    }

    /// Check a login and secret and mint a token on success.
    ///
    /// Every credential failure is the same `InvalidCredentials` and costs
    /// one hash verification, whether or not the login exists.
    pub async fn authenticate(&self, login: &str, secret: &str) -> AuthResult<IssuedToken> {
        let principal = match self.db.find_principal_by_login(login).await? {
            Some(p) if p.is_active() => p,
            found => {
                debug!(known = found.is_some(), "Authentication rejected before verification");
                self.burn(secret).await?;
                return Err(AuthError::InvalidCredentials);
            }
        };

        let Some(credential) = self.db.active_credential_for(&principal.id).await? else {
            debug!(principal_id = %principal.id, "No active credential");
            self.burn(secret).await?;
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify(secret, credential).await? {
            debug!(principal_id = %principal.id, "Secret mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self.db.issue_token(&principal.id, self.token_ttl).await?;
        info!(principal_id = %principal.id, expires_at = %issued.expires_at, "Authenticated");
        Ok(issued)
    }

    /// Resolve a token to its principal. Never writes.
    pub async fn validate(&self, token: &str) -> AuthResult<Principal> {
        self.session(token).await.map(|s| s.principal)
    }

    /// Resolve a token to its principal and expiry. Never writes.
    ///
    /// Checks run in a fixed order: unknown, then expired, then revoked. A
    /// token whose principal has since been disabled counts as revoked.
    pub async fn session(&self, token: &str) -> AuthResult<Session> {
        let record = self
            .db
            .find_token(token)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if record.is_expired_at(self.db.clock().now()) {
            return Err(AuthError::TokenExpired);
        }
        if record.revoked {
            return Err(AuthError::TokenRevoked);
        }

        let principal = self
            .db
            .find_principal(&record.principal_id)
            .await?
            .ok_or(AuthError::TokenNotFound)?;
        if !principal.is_active() {
            return Err(AuthError::TokenRevoked);
        }

        Ok(Session {
            principal,
            expires_at: record.expires_at,
        })
    }

    /// Revoke a token. Revoking an already revoked token succeeds.
    pub async fn revoke(&self, token: &str) -> AuthResult<()> {
        match self.db.revoke_token(token).await {
            Ok(()) => {
                debug!("Revoked token");
                Ok(())
            }
            Err(DbError::NotFound { .. }) => Err(AuthError::TokenNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a principal's secret. The previous credential is kept as superseded.
    pub async fn change_secret(&self, principal_id: &str, secret: &str) -> AuthResult<Credential> {
        if secret.is_empty() {
            return Err(AuthError::invalid_request("secret must not be empty"));
        }
        let hash = self.hash(secret).await?;
        match self
            .db
            .rotate_credential(principal_id, &hash, CredentialAlgorithm::Argon2id)
            .await
        {
            Ok(credential) => {
                info!(principal_id = %principal_id, "Rotated secret");
                Ok(credential)
            }
            Err(DbError::NotFound { .. }) => Err(AuthError::UnknownPrincipal(principal_id.into())),
            Err(e) => Err(e.into()),
        }
    }

    /// Block every further authentication by this login.
    pub async fn disable(&self, login: &str) -> AuthResult<Principal> {
        self.set_status(login, PrincipalStatus::Disabled).await
    }

    pub async fn enable(&self, login: &str) -> AuthResult<Principal> {
        self.set_status(login, PrincipalStatus::Active).await
    }

    /// Look up a principal by login.
    pub async fn principal(&self, login: &str) -> AuthResult<Principal> {
        self.db
            .find_principal_by_login(login)
            .await?
            .ok_or_else(|| AuthError::UnknownPrincipal(login.into()))
    }

    async fn set_status(&self, login: &str, status: PrincipalStatus) -> AuthResult<Principal> {
        let principal = self.principal(login).await?;
        match self.db.set_principal_status(&principal.id, status).await {
            Ok(()) => {}
            Err(DbError::NotFound { .. }) => return Err(AuthError::UnknownPrincipal(login.into())),
            Err(e) => return Err(e.into()),
        }
        info!(principal_id = %principal.id, ?status, "Changed principal status");
        Ok(Principal {
            status,
            ..principal
        })
    }

    async fn hash(&self, secret: &str) -> AuthResult<String> {
        let hasher = self.hasher.clone();
        let secret = secret.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| AuthError::Hash(e.to_string()))?
    }

    async fn verify(&self, secret: &str, credential: Credential) -> AuthResult<bool> {
        let hasher = self.hasher.clone();
        let secret = secret.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&secret, &credential))
            .await
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    async fn burn(&self, secret: &str) -> AuthResult<()> {
        let hasher = self.hasher.clone();
        let secret = secret.to_owned();
        tokio::task::spawn_blocking(move || hasher.burn(&secret))
            .await
            .map_err(|e| AuthError::Hash(e.to_string()))
    }
}
