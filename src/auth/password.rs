//! Argon2id password hashing.
//!
//! Hashes are emitted in PHC string format, which embeds the algorithm,
//! version, cost parameters and salt. Verification reads the parameters back
//! out of the stored hash, so raising the configured cost never breaks
//! existing accounts; [`PasswordHasher::needs_rehash`] reports which hashes
//! are due for an upgrade.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};

/// Failures produced while hashing or checking a password.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password must be at least {min_length} characters")]
    WeakPassword { min_length: usize },

    /// The password did not match. An expected outcome, not a fault.
    #[error("password mismatch")]
    Mismatch,

    /// The stored hash could not be parsed or checked.
    #[error("password verification failed: {0}")]
    Verification(String),

    #[error("failed to hash password: {0}")]
    Hashing(String),

    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),
}

/// Cost and policy knobs for [`PasswordHasher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashConfig {
    pub min_length: usize,
    /// Argon2 t-cost. The main knob to raise as hardware gets faster.
    pub iterations: u32,
    /// Argon2 m-cost in KiB.
    pub memory_kib: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            iterations: 3,
            memory_kib: Params::DEFAULT_M_COST,
            parallelism: 1,
        }
    }
}

/// A PHC-formatted Argon2id hash. Never contains the raw password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedPassword(String);

impl HashedPassword {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for HashedPassword {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Stateless Argon2id hasher. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    min_length: usize,
    params: Params,
}

impl PasswordHasher {
    /// Builds a hasher, rejecting parameter combinations Argon2 refuses.
    pub fn new(config: HashConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            min_length: config.min_length,
            params,
        })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Checks only the length policy, without paying for a hash.
    pub fn check_strength(&self, password: &str) -> Result<(), PasswordError> {
        if password.chars().count() < self.min_length {
            return Err(PasswordError::WeakPassword {
                min_length: self.min_length,
            });
        }
        Ok(())
    }

    /// Hashes a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<HashedPassword, PasswordError> {
        self.check_strength(password)?;

        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| HashedPassword(hash.to_string()))
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    /// Verifies a password against a stored PHC hash.
    ///
    /// The comparison is done by the argon2 crate in constant time.
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), PasswordError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| PasswordError::Verification(e.to_string()))?;

        match self.argon2().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(()),
            Err(argon2::password_hash::Error::Password) => Err(PasswordError::Mismatch),
            Err(e) => Err(PasswordError::Verification(e.to_string())),
        }
    }

    /// True when `hash` was produced with a different algorithm or weaker
    /// parameters than this hasher is configured for.
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        if parsed.algorithm.as_str() != Algorithm::Argon2id.as_str() {
            return true;
        }

        match Params::try_from(&parsed) {
            Ok(stored) => {
                stored.t_cost() < self.params.t_cost()
                    || stored.m_cost() < self.params.m_cost()
                    || stored.p_cost() < self.params.p_cost()
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(HashConfig {
        min_length: 8,
        iterations: 1,
        memory_kib: 64,
        parallelism: 1,
    })
    .expect("test params are valid")
}
