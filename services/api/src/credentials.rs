//! services/api/src/credentials.rs
//!
//! One-way password hashing with Argon2id.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so the cost
//! parameters travel with each stored hash and verification always uses the parameters
//! the hash was created with, even after the configured work factor changes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Invalid password hashing parameters: {0}")]
    Params(String),
    #[error("Failed to hash password: {0}")]
    Hash(String),
}

/// Argon2 work factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PasswordHashing {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordHashing {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    argon2: Argon2<'static>,
    /// Verified against when the email is unknown, so both failure paths cost the same.
    dummy_hash: String,
}

impl Credentials {
    pub fn new(hashing: PasswordHashing) -> Result<Self, CredentialError> {
        let params = Params::new(
            hashing.memory_kib,
            hashing.iterations,
            hashing.parallelism,
            None,
        )
        .map_err(|e| CredentialError::Params(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, "not-a-real-password")?;
        Ok(Self { argon2, dummy_hash })
    }

    /// Hashes a password with a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        hash_with(&self.argon2, plaintext)
    }

    /// Checks a password against a stored PHC hash. A malformed hash never verifies.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password hash could not be parsed: {}", e);
                return false;
            }
        };
        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Burns the same verification cost as a real check, then fails.
    pub fn reject_unknown(&self, plaintext: &str) -> bool {
        let _ = self.verify(plaintext, &self.dummy_hash);
        false
    }
}

fn hash_with(argon2: &Argon2<'_>, plaintext: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}
