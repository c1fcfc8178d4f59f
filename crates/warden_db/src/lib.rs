//! Warden Entity Store
//!
//! Entity models and transactional repository for the Warden auth adapter.
//!
//! # Architecture
//!
//! - **Principals, credentials, tokens** - one table each, referenced by ID only
//! - **One transaction per operation** - the store's isolation is the only
//!   concurrency control; losers of a write race observe `Conflict`
//! - **No schema mutation** - this crate reads the schema version record but
//!   never creates or alters tables. That is the job of `warden-migration`,
//!   which ships as a separate tool and is not linked into the service.
//!
//! # Usage
//!
//! ```rust,ignore
//! use warden_db::{StoreOptions, WardenDb};
//!
//! let db = WardenDb::connect("sqlite://warden.db", &StoreOptions::default()).await?;
//! assert_eq!(db.current_schema_version().await?, warden_db::SCHEMA_VERSION);
//! ```

pub mod clock;
pub mod connection;
pub mod error;
pub mod models;
pub mod queries;
mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::{StoreOptions, WardenDb};
pub use error::{DbError, DbResult};

pub use models::{
    Credential, CredentialAlgorithm, CredentialKind, CredentialStatus, IssuedToken, Principal,
    PrincipalStatus, Token,
};

/// Schema version the entity models in this crate were written against.
///
/// Must equal the identifier of the newest migration shipped by
/// `warden-migration`; the service refuses to start on any other version.
pub const SCHEMA_VERSION: i64 = 3;

/// Ordered log of applied migrations.
pub const SCHEMA_VERSION_TABLE: &str = "schema_migrations";

/// Single-row advisory lock held while migrations are applied.
pub const MIGRATION_LOCK_TABLE: &str = "migration_lock";
