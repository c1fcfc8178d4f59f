//! Entity models.
//!
//! These structs map directly to store tables via sqlx. Timestamps are stored
//! as integer Unix milliseconds and surfaced as `DateTime<Utc>`.

mod credential;
mod principal;
mod token;

pub use credential::{Credential, CredentialAlgorithm, CredentialKind, CredentialStatus};
pub use principal::{Principal, PrincipalStatus};
pub use token::{IssuedToken, Token};

pub(crate) use credential::CredentialRow;
pub(crate) use principal::PrincipalRow;
pub(crate) use token::TokenRow;

use chrono::{DateTime, Utc};

/// Convert stored Unix milliseconds to a `DateTime<Utc>`.
pub(crate) fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
