//! Password hashing.
//!
//! New hashes are Argon2id PHC strings with a per-password random salt, so
//! the stored value carries its own parameters and salt. Data files from
//! older deployments hold unsalted SHA-256 hex digests; those still verify
//! and are flagged by [`is_legacy_hash`] so the caller can upgrade them.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};

/// Length in bytes of a generated bootstrap secret before hex encoding.
const GENERATED_PASSWORD_BYTES: usize = 12;

/// Hex length of a SHA-256 digest.
const LEGACY_HASH_LEN: usize = 64;

pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::PasswordHash(e.to_string()))
}

/// Whether `stored` is an unsalted SHA-256 hex digest.
pub fn is_legacy_hash(stored: &str) -> bool {
    stored.len() == LEGACY_HASH_LEN && stored.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Check `plain` against a stored hash.
///
/// Accepts Argon2 PHC strings and legacy SHA-256 digests. A stored value in
/// neither form never matches.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    if is_legacy_hash(stored) {
        let digest = hex::encode(Sha256::digest(plain.as_bytes()));
        return digest.eq_ignore_ascii_case(stored);
    }

    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

/// Random secret for the bootstrap account when none is configured.
pub fn generate_password() -> String {
    let mut bytes = [0u8; GENERATED_PASSWORD_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("Sunny2024")
    const LEGACY_SUNNY: &str = "7e83fcd0384e24f5f0727a5004633e299bba2884dca6fec45b54878fea4c2c03";

    fn legacy(plain: &str) -> String {
        hex::encode(Sha256::digest(plain.as_bytes()))
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("Sunny2024").unwrap();
        assert!(verify_password("Sunny2024", &hash));
        assert!(!verify_password("sunny2024", &hash));
        assert!(!is_legacy_hash(&hash));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("pw").unwrap();
        let b = hash_password("pw").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn legacy_digest_verifies() {
        let stored = legacy("Sunny2024");
        assert!(is_legacy_hash(&stored));
        assert!(verify_password("Sunny2024", &stored));
        assert!(!verify_password("wrong", &stored));
        assert_eq!(stored, LEGACY_SUNNY);
    }

    #[test]
    fn unreadable_hash_never_matches() {
        assert!(!verify_password("pw", "not-a-hash"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn generated_passwords_differ() {
        let a = generate_password();
        assert_eq!(a.len(), GENERATED_PASSWORD_BYTES * 2);
        assert_ne!(a, generate_password());
    }
}
