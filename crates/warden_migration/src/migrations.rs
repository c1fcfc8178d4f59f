//! Shipped schema migrations.
//!
//! Forward-only and append-only: never edit a migration that has shipped, add
//! a new one instead. Every statement is written so that running it against a
//! store that already has the object is a no-op.

/// A named, versioned schema transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    /// Strictly increasing identifier; recorded in `schema_migrations`
    pub version: i64,
    pub name: &'static str,
    /// Statements applied in order inside one transaction
    pub statements: &'static [&'static str],
}

/// Every migration shipped with this build, in ascending version order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_principals",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS principals (
                id TEXT PRIMARY KEY NOT NULL,
                login TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'disabled')),
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#,
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_principals_login ON principals (login)",
        ],
    },
    Migration {
        version: 2,
        name: "create_credentials",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                id TEXT PRIMARY KEY NOT NULL,
                principal_id TEXT NOT NULL REFERENCES principals (id),
                kind TEXT NOT NULL DEFAULT 'password',
                secret_hash TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'superseded')),
                created_at BIGINT NOT NULL,
                superseded_at BIGINT
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_credentials_one_active
                ON credentials (principal_id, kind) WHERE status = 'active'
            "#,
            "CREATE INDEX IF NOT EXISTS idx_credentials_principal ON credentials (principal_id)",
        ],
    },
    Migration {
        version: 3,
        name: "create_tokens",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS tokens (
                token_digest TEXT PRIMARY KEY NOT NULL,
                principal_id TEXT NOT NULL REFERENCES principals (id),
                issued_at BIGINT NOT NULL,
                expires_at BIGINT NOT NULL,
                revoked BOOLEAN NOT NULL DEFAULT FALSE,
                revoked_at BIGINT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_tokens_principal ON tokens (principal_id)",
            "CREATE INDEX IF NOT EXISTS idx_tokens_expires ON tokens (expires_at)",
        ],
    },
];

/// Newest shipped migration version.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_migration_matches_compiled_entity_version() {
        assert_eq!(latest_version(), warden_db::SCHEMA_VERSION);
    }

    #[test]
    fn shipped_versions_are_strictly_ascending() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
        assert!(MIGRATIONS.iter().all(|m| m.version > 0));
    }
}
