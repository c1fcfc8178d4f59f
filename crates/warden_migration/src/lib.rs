//! Warden Migration - out-of-band schema evolution for the Warden entity store.
//!
//! This crate is the only code that creates or alters store tables. It is
//! built into the `warden-migrate` tool and is never a dependency of the
//! service binary, so the running adapter has no way to change its own
//! schema. Deployments run `warden-migrate up` before starting the service;
//! the service then refuses to start unless the recorded version equals
//! [`warden_db::SCHEMA_VERSION`].
//!
//! While a run is in progress the migrator holds a single-row advisory lock
//! (`migration_lock`) which the service checks at startup.

pub mod error;
pub mod migrations;
pub mod runner;

pub use error::MigrationError;
pub use migrations::{latest_version, Migration, MIGRATIONS};
pub use runner::{AppliedMigration, MigrationStatus, Migrator};
