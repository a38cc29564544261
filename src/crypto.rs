//! Password hashing.

use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::config::Argon2 as ArgonConfig;
use crate::error::{Result, ServerError};

/// Argon2id password manager.
#[derive(Clone, Debug)]
pub struct PasswordManager {
    params: Params,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| ServerError::internal("invalid argon2 parameters", err.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash password using Argon2id and a random salt.
    ///
    /// Returns a PHC string.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_ref(), &salt)
            .map_err(|err| ServerError::internal("failed to hash password", err.to_string()))?;

        Ok(hash.to_string())
    }

    /// Check a password against a PHC string.
    ///
    /// A malformed stored hash never matches.
    pub fn verify_password(
        &self,
        password: impl AsRef<[u8]>,
        phc: &str,
    ) -> bool {
        match PasswordHash::new(phc) {
            Ok(hash) => self
                .argon2()
                .verify_password(password.as_ref(), &hash)
                .is_ok(),
            Err(err) => {
                tracing::error!(error = %err, "stored password hash is malformed");
                false
            },
        }
    }
}

/// Light parameters so tests stay fast.
#[cfg(test)]
impl PasswordManager {
    pub fn fast() -> Self {
        Self::new(Some(ArgonConfig {
            memory_cost: 1024,
            iterations: 1,
            parallelism: 1,
            hash_length: 32,
        }))
        .expect("valid argon2 parameters")
    }
}
