//! Argon2id password hashes stored as PHC strings (`$argon2id$v=19$...`).

use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::utils::error::AppError;

pub fn hash(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalServerError(format!("password hashing failed: {e}")))
}

/// Checks `password` against a stored PHC string. Malformed hashes never
/// match.
pub fn verify(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Runs a full verification against a throwaway hash, so a login for an
/// unknown email costs as much as one for a known email.
pub fn verify_dummy(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    if let Some(stored) = DUMMY_HASH.get_or_init(|| hash("billet-unknown-account").ok()) {
        let _ = verify(password, stored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies() {
        let stored = hash("correct horse").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify("correct horse", &stored));
        assert!(!verify("correct horse!", &stored));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash("same password").unwrap(), hash("same password").unwrap());
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify("x", ""));
        assert!(!verify("x", "v1$abc$def"));
        assert!(!verify("x", "$argon2id$garbage"));
    }

    #[test]
    fn test_dummy_verify_accepts_anything() {
        verify_dummy("whatever");
        verify_dummy("");
    }
}
