//! Salted password hashing with Argon2id.

use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use thiserror::Error;

/// Salt length in bytes before base64 encoding.
const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

/// One-way password hasher.
///
/// Digests are PHC strings (`$argon2id$v=19$...`) carrying algorithm,
/// parameters and the per-call random salt, so verification needs nothing but
/// the stored string.
#[derive(Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes `password` with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Fails if the OS entropy source cannot provide a salt or if Argon2
    /// rejects its inputs. Callers treat both as fatal for the request.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let mut salt_bytes = [0u8; SALT_LEN];
        getrandom::fill(&mut salt_bytes).map_err(|e| PasswordError::Entropy(e.to_string()))?;

        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Checks `password` against a stored digest.
    ///
    /// A malformed digest is a mismatch, never an error.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}
