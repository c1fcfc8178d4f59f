//! Store query functions.
//!
//! Each function runs against a single connection so callers can compose
//! several of them inside one transaction. Organized by entity:
//! - `principal`: principal lookup and lifecycle
//! - `credential`: active credential lookup, supersede, insert
//! - `token`: token minting, lookup, revocation, reaping
//! - `schema`: schema version record and migration lock probes

mod credential;
mod principal;
mod schema;
mod token;

pub use credential::*;
pub use principal::*;
pub use schema::*;
pub use token::*;

use chrono::{DateTime, Utc};

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}
