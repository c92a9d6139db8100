//! Password hashing and validation for warden.
//!
//! Hashing sits behind the [`SecretHasher`] trait so the algorithm can be
//! swapped without touching the auth service. The default implementation
//! uses Argon2id and runs on the blocking thread pool.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use rand_core::OsRng;
use thiserror::Error;

use crate::config::PasswordConfig;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Password is too short.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    /// Password is too long.
    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    TooLong,

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),

    /// Password hash is invalid.
    #[error("invalid password hash format")]
    InvalidHash,
}

/// Validate password requirements.
///
/// Length is counted in characters, 8 to 128 inclusive.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}

/// One-way secret hashing.
#[async_trait]
pub trait SecretHasher: Send + Sync {
    /// Hash a secret into a self-describing digest.
    async fn hash(&self, secret: &str) -> Result<String, PasswordError>;

    /// Check a secret against a digest produced by [`SecretHasher::hash`].
    async fn verify(&self, secret: &str, digest: &str) -> Result<bool, PasswordError>;
}

/// Argon2id hasher.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Create a hasher with the configured cost parameters.
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| PasswordError::HashError(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

#[async_trait]
impl SecretHasher for Argon2Hasher {
    async fn hash(&self, secret: &str) -> Result<String, PasswordError> {
        let argon2 = self.argon2();
        let secret = secret.to_string();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(secret.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| PasswordError::HashError(e.to_string()))
        })
        .await
        .map_err(|e| PasswordError::HashError(e.to_string()))?
    }

    async fn verify(&self, secret: &str, digest: &str) -> Result<bool, PasswordError> {
        let secret = secret.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&digest).map_err(|_| PasswordError::InvalidHash)?;
            // Parameters come from the stored hash, not from this hasher.
            match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(password_hash::Error::Password) => Ok(false),
                Err(e) => Err(PasswordError::HashError(e.to_string())),
            }
        })
        .await
        .map_err(|e| PasswordError::HashError(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_hasher() -> Argon2Hasher {
        Argon2Hasher::new(&PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_hash_password_success() {
        let hash = cheap_hasher().hash("test_password_123").await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("$v=19$"));
    }

    #[tokio::test]
    async fn test_hash_password_unique_salts() {
        let hasher = cheap_hasher();
        let hash1 = hasher.hash("same_password").await.unwrap();
        let hash2 = hasher.hash("same_password").await.unwrap();
        assert_ne!(hash1, hash2);
    }

    #[tokio::test]
    async fn test_verify_password() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("Sw0rdfish!").await.unwrap();

        assert!(hasher.verify("Sw0rdfish!", &hash).await.unwrap());
        assert!(!hasher.verify("swordfish!", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_invalid_hash() {
        let result = cheap_hasher().verify("password", "not-a-hash").await;
        assert!(matches!(result, Err(PasswordError::InvalidHash)));
    }

    #[test]
    fn test_validate_password_bounds() {
        assert!(matches!(
            validate_password("1234567"),
            Err(PasswordError::TooShort)
        ));
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password(&"a".repeat(MAX_PASSWORD_LENGTH)).is_ok());
        assert!(matches!(
            validate_password(&"a".repeat(MAX_PASSWORD_LENGTH + 1)),
            Err(PasswordError::TooLong)
        ));
    }

    #[test]
    fn test_validate_password_counts_characters() {
        // Eight multi-byte characters.
        assert!(validate_password("ääääääää").is_ok());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = Argon2Hasher::new(&PasswordConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(result.is_err());
    }
}
