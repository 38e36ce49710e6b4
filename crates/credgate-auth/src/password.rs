//! Password hashing.
//!
//! The core needs a single hash/compare capability: registration hashes the
//! chosen password, and federated accounts receive the hash of a random
//! secret that nobody knows, so they can never log in with a password.
//!
//! Argon2 is CPU-bound. Async callers go through [`hash_blocking`] and
//! [`verify_blocking`], which run the hasher on the blocking pool.
//!
//! # Example
//!
//! ```
//! use credgate_auth::password::{Argon2SecretHasher, SecretHasher, generate_unusable_secret};
//!
//! let hasher = Argon2SecretHasher::default();
//! let hash = hasher.hash(&generate_unusable_secret()).unwrap();
//! assert!(hash.starts_with("$argon2id$"));
//! assert!(!hasher.verify("guess", &hash).unwrap());
//! ```

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

use crate::{AuthError, AuthResult};

/// Hash/compare capability for stored passwords.
pub trait SecretHasher: Send + Sync {
    /// Hashes a plaintext secret for storage.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if hashing fails.
    fn hash(&self, secret: &str) -> AuthResult<String>;

    /// Checks a plaintext secret against a stored hash.
    ///
    /// # Errors
    ///
    /// Returns `Internal` only if the stored hash cannot be parsed.
    fn verify(&self, secret: &str, hash: &str) -> AuthResult<bool>;
}

/// Argon2id hasher with default parameters and OS-random salts.
#[derive(Default)]
pub struct Argon2SecretHasher {
    argon2: Argon2<'static>,
}

impl SecretHasher for Argon2SecretHasher {
    fn hash(&self, secret: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| AuthError::internal(format!("password hashing failed: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify(&self, secret: &str, hash: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::internal(format!("invalid password hash: {}", e)))?;
        Ok(self
            .argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Hashes `secret` on the blocking thread pool.
///
/// # Errors
///
/// Returns `Internal` if hashing fails or the blocking task panics.
pub async fn hash_blocking(hasher: Arc<dyn SecretHasher>, secret: String) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || hasher.hash(&secret))
        .await
        .map_err(|e| AuthError::internal(format!("password hashing task failed: {}", e)))?
}

/// Checks `secret` against `hash` on the blocking thread pool.
///
/// # Errors
///
/// Returns `Internal` if the hash cannot be parsed or the blocking task
/// panics.
pub async fn verify_blocking(
    hasher: Arc<dyn SecretHasher>,
    secret: String,
    hash: String,
) -> AuthResult<bool> {
    tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
        .await
        .map_err(|e| AuthError::internal(format!("password verification task failed: {}", e)))?
}

/// Generates a 256-bit random secret, hex encoded.
///
/// Used as the password of federated accounts; the value is hashed and
/// then discarded.
#[must_use]
pub fn generate_unusable_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}
