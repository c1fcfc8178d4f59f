//! Server configuration.
//!
//! Read once at startup: an optional TOML file, then environment overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_auth::{AuthConfig, HashParams, MAX_TOKEN_TTL_DAYS};
use warden_db::StoreOptions;

use crate::error::{ServerError, ServerResult};

/// File consulted when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "warden.toml";

const SECS_PER_DAY: u64 = 86_400;

/// Upper bound on `token_ttl_secs`.
pub const MAX_TOKEN_TTL_SECS: u64 = MAX_TOKEN_TTL_DAYS as u64 * SECS_PER_DAY;

/// Upper bound on `reap_grace_secs`.
pub const MAX_REAP_GRACE_SECS: u64 = 10 * 366 * SECS_PER_DAY;

/// What to do when the store's schema version does not match this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaCheck {
    /// Refuse to start
    #[default]
    Fatal,
    /// Log a warning and serve anyway
    Warn,
}

impl std::str::FromStr for SchemaCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fatal" => Ok(Self::Fatal),
            "warn" => Ok(Self::Warn),
            other => Err(format!("expected 'fatal' or 'warn', got '{other}'")),
        }
    }
}

/// Argon2 cost settings for newly written credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        let params = HashParams::default();
        Self {
            memory_kib: params.memory_kib,
            iterations: params.iterations,
            parallelism: params.parallelism,
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub token_ttl_secs: u64,
    pub schema_check: SchemaCheck,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    pub busy_timeout_ms: u64,
    /// Seconds between token purges; 0 disables the reaper
    pub reap_interval_secs: u64,
    /// How long expired or revoked tokens are kept before purging
    pub reap_grace_secs: u64,
    pub hashing: HashingConfig,
    /// Bearer token for the principal management routes; unset disables them
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://warden.db".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            token_ttl_secs: 3600,
            schema_check: SchemaCheck::Fatal,
            max_connections: 8,
            acquire_timeout_ms: 5000,
            busy_timeout_ms: 2000,
            reap_interval_secs: 300,
            reap_grace_secs: 86400,
            hashing: HashingConfig::default(),
            admin_token: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] if it
    /// exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            }
        };

        let mut config = match file {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file.
    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServerError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| ServerError::config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Overlay values from the environment (or any other key lookup).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ServerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(addr) = lookup("WARDEN_BIND_ADDR") {
            self.bind_addr = addr
                .parse()
                .map_err(|e| ServerError::config(format!("WARDEN_BIND_ADDR: {e}")))?;
        }
        if let Some(ttl) = lookup("WARDEN_TOKEN_TTL_SECS") {
            self.token_ttl_secs = ttl
                .parse()
                .map_err(|e| ServerError::config(format!("WARDEN_TOKEN_TTL_SECS: {e}")))?;
        }
        if let Some(token) = lookup("WARDEN_ADMIN_TOKEN") {
            self.admin_token = Some(token);
        }
        if let Some(mode) = lookup("WARDEN_SCHEMA_CHECK") {
            self.schema_check = mode
                .parse()
                .map_err(|e| ServerError::config(format!("WARDEN_SCHEMA_CHECK: {e}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.database_url.is_empty() {
            return Err(ServerError::config("database_url must be set"));
        }
        if self.token_ttl_secs == 0 {
            return Err(ServerError::config("token_ttl_secs must be positive"));
        }
        if self.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ServerError::config(format!(
                "token_ttl_secs must not exceed {MAX_TOKEN_TTL_SECS}"
            )));
        }
        if self.reap_grace_secs > MAX_REAP_GRACE_SECS {
            return Err(ServerError::config(format!(
                "reap_grace_secs must not exceed {MAX_REAP_GRACE_SECS}"
            )));
        }
        if self.admin_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServerError::config("admin_token must not be empty"));
        }
        if self.max_connections == 0 {
            return Err(ServerError::config("max_connections must be positive"));
        }
        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    pub fn auth_config(&self) -> ServerResult<AuthConfig> {
        Ok(AuthConfig {
            token_ttl: seconds("token_ttl_secs", self.token_ttl_secs)?,
            hashing: HashParams {
                memory_kib: self.hashing.memory_kib,
                iterations: self.hashing.iterations,
                parallelism: self.hashing.parallelism,
            },
        })
    }

    /// Reaper interval, or `None` when purging is disabled.
    pub fn reap_interval(&self) -> Option<Duration> {
        (self.reap_interval_secs > 0).then(|| Duration::from_secs(self.reap_interval_secs))
    }

    pub fn reap_grace(&self) -> ServerResult<chrono::Duration> {
        seconds("reap_grace_secs", self.reap_grace_secs)
    }
}

fn seconds(field: &str, secs: u64) -> ServerResult<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| ServerError::config(format!("{field} out of range: {secs}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_url = "sqlite:///var/lib/warden/warden.db"
schema_check = "warn"

[hashing]
memory_kib = 4096
"#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database_url, "sqlite:///var/lib/warden/warden.db");
        assert_eq!(config.schema_check, SchemaCheck::Warn);
        assert_eq!(config.hashing.memory_kib, 4096);
        assert_eq!(config.hashing.iterations, HashingConfig::default().iterations);
        assert_eq!(config.token_ttl_secs, 3600);
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite::memory:"),
            ("WARDEN_BIND_ADDR", "127.0.0.1:9000"),
            ("WARDEN_TOKEN_TTL_SECS", "60"),
            ("WARDEN_SCHEMA_CHECK", "WARN"),
            ("WARDEN_ADMIN_TOKEN", "op-secret"),
        ]
        .into_iter()
        .collect();

        let mut config = ServerConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.token_ttl_secs, 60);
        assert_eq!(config.schema_check, SchemaCheck::Warn);
        assert_eq!(config.admin_token.as_deref(), Some("op-secret"));
    }

    #[test]
    fn blank_admin_token_is_rejected() {
        let config = ServerConfig {
            admin_token: Some("  ".into()),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_override_is_a_config_error() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_overrides(|k| (k == "WARDEN_TOKEN_TTL_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ServerError::Config { .. }));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let config = ServerConfig {
            token_ttl_secs: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let mut config = ServerConfig::default();
        config
            .apply_overrides(|k| {
                (k == "WARDEN_TOKEN_TTL_SECS").then(|| "10000000000000".to_string())
            })
            .unwrap();
        assert!(matches!(config.validate(), Err(ServerError::Config { .. })));

        let config = ServerConfig {
            token_ttl_secs: MAX_TOKEN_TTL_SECS + 1,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            reap_grace_secs: u64::MAX,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ServerError::Config { .. })));
    }

    #[test]
    fn unchecked_durations_fail_without_panicking() {
        let config = ServerConfig {
            token_ttl_secs: 10_000_000_000_000_000,
            reap_grace_secs: u64::MAX,
            ..ServerConfig::default()
        };
        assert!(matches!(config.auth_config(), Err(ServerError::Config { .. })));
        assert!(matches!(config.reap_grace(), Err(ServerError::Config { .. })));
    }

    #[test]
    fn bounds_are_inclusive() {
        let config = ServerConfig {
            token_ttl_secs: MAX_TOKEN_TTL_SECS,
            reap_grace_secs: MAX_REAP_GRACE_SECS,
            ..ServerConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(
            config.auth_config().unwrap().token_ttl,
            chrono::Duration::days(MAX_TOKEN_TTL_DAYS)
        );
        config.reap_grace().unwrap();
    }

    #[test]
    fn zero_interval_disables_reaper() {
        let config = ServerConfig {
            reap_interval_secs: 0,
            ..ServerConfig::default()
        };
        assert!(config.reap_interval().is_none());
    }
}
