//! Secret hashing and verification.
//!
//! Hashes are Argon2id PHC strings. Verification reads the cost parameters
//! back out of the stored string, so raising [`HashParams`] only affects
//! credentials written afterwards.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use tracing::warn;
use warden_db::{Credential, CredentialAlgorithm};

use crate::error::{AuthError, AuthResult};

const SALT_BYTES: usize = 16;

/// Argon2 cost parameters for newly written credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Hashes and verifies secrets.
///
/// Holds a hash of a fixed throwaway secret, computed with the same cost
/// parameters, so failure paths that never reach a real credential still pay
/// for exactly one verification.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    params: Params,
    dummy: String,
}

impl SecretHasher {
    pub fn new(params: HashParams) -> AuthResult<Self> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            None,
        )
        .map_err(|e| AuthError::Hash(e.to_string()))?;

        let mut hasher = Self {
            params,
            dummy: String::new(),
        };
        hasher.dummy = hasher.hash("warden:unused-secret")?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a secret into a PHC string with a fresh random salt.
    pub fn hash(&self, secret: &str) -> AuthResult<String> {
        let salt_bytes: [u8; SALT_BYTES] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes)?;
        let phc = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)?
            .to_string();
        Ok(phc)
    }

    /// Check a secret against a stored credential.
    ///
    /// Returns `false` for a mismatch, an unsupported algorithm tag or an
    /// unreadable stored hash. In the last two cases the dummy hash is
    /// verified instead, so the call costs the same either way.
    pub fn verify(&self, secret: &str, credential: &Credential) -> bool {
        match &credential.algorithm {
            CredentialAlgorithm::Argon2id => {}
            CredentialAlgorithm::Unknown(tag) => {
                warn!(credential_id = %credential.id, algorithm = %tag, "Unsupported credential algorithm");
                self.burn(secret);
                return false;
            }
        }

        match PasswordHash::new(&credential.secret_hash) {
            Ok(parsed) => self
                .argon2()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!(credential_id = %credential.id, "Stored hash is unreadable: {}", e);
                self.burn(secret);
                false
            }
        }
    }

    /// Spend one verification on the dummy hash and discard the result.
    pub fn burn(&self, secret: &str) {
        if let Ok(parsed) = PasswordHash::new(&self.dummy) {
            let _ = self.argon2().verify_password(secret.as_bytes(), &parsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use warden_db::{CredentialKind, CredentialStatus};

    fn cheap() -> HashParams {
        HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn credential(hash: String, algorithm: CredentialAlgorithm) -> Credential {
        Credential {
            id: "c1".into(),
            principal_id: "p1".into(),
            kind: CredentialKind::Password,
            secret_hash: hash,
            algorithm,
            status: CredentialStatus::Active,
            created_at: Utc::now(),
            superseded_at: None,
        }
    }

    #[test]
    fn hash_then_verify() {
        let hasher = SecretHasher::new(cheap()).unwrap();
        let phc = hasher.hash("s3cret").unwrap();
        assert!(phc.starts_with("$argon2id$"));

        let cred = credential(phc, CredentialAlgorithm::Argon2id);
        assert!(hasher.verify("s3cret", &cred));
        assert!(!hasher.verify("S3cret", &cred));
    }

    #[test]
    fn salts_differ() {
        let hasher = SecretHasher::new(cheap()).unwrap();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn unknown_algorithm_never_verifies() {
        let hasher = SecretHasher::new(cheap()).unwrap();
        let phc = hasher.hash("s3cret").unwrap();
        let cred = credential(phc, CredentialAlgorithm::Unknown("md5".into()));
        assert!(!hasher.verify("s3cret", &cred));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        let hasher = SecretHasher::new(cheap()).unwrap();
        let cred = credential("not a phc string".into(), CredentialAlgorithm::Argon2id);
        assert!(!hasher.verify("anything", &cred));
    }

    #[test]
    fn rejects_impossible_params() {
        let err = SecretHasher::new(HashParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        })
        .unwrap_err();
        assert!(matches!(err, AuthError::Hash(_)));
    }
}
