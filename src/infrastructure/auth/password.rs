//! Argon2 password hashing

use std::fmt::Debug;

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
};
use argon2::Argon2;

use crate::domain::DomainError;

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hashes and checks account passwords
pub trait PasswordHasher: Send + Sync + Debug {
    /// Hash a plaintext password into a PHC string
    fn hash(&self, password: &str) -> Result<String, DomainError>;

    /// Whether `password` matches the stored PHC string
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id with the crate's default cost parameters
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Debug for Argon2Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Hasher").finish_non_exhaustive()
    }
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, DomainError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| DomainError::internal(format!("Failed to hash password: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| {
                self.argon2
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = Argon2Hasher::new();
        let hash = hasher.hash("correct horse battery").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify("correct horse battery", &hash));
        assert!(!hasher.verify("wrong horse battery", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = Argon2Hasher::new();

        let first = hasher.hash("password123").unwrap();
        let second = hasher.hash("password123").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_short_password_rejected() {
        let result = Argon2Hasher::new().hash("short");
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_verify_garbage_hash() {
        let hasher = Argon2Hasher::new();

        assert!(!hasher.verify("password123", "not-a-phc-string"));
        assert!(!hasher.verify("password123", ""));
    }
}
