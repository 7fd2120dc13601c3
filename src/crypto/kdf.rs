//! Key-wrapping-key derivation using PBKDF2-HMAC-SHA256
//!
//! Derives the KWK from a user password and the vault salt. The derivation
//! is deliberately slow (tunable iteration count) to resist offline
//! guessing. Same password + salt always yields the same KWK.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::error::{VaultError, VaultResult};

use super::keys::Kwk;

/// Derive a key-wrapping-key from a password and salt
///
/// # Errors
///
/// Fails only on malformed inputs (empty password or salt).
pub fn derive_kwk(password: &str, salt: &[u8], iterations: u32) -> VaultResult<Kwk> {
    if password.is_empty() {
        return Err(VaultError::Encryption("Password must not be empty".into()));
    }
    if salt.is_empty() {
        return Err(VaultError::Encryption("Salt must not be empty".into()));
    }

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);

    Ok(Kwk::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::primitives::random_salt;

    // Low iteration count keeps key-derivation tests fast
    const TEST_ITERATIONS: u32 = 1000;

    #[test]
    fn test_deterministic() {
        let salt = random_salt();
        let kwk1 = derive_kwk("correct-horse", &salt, TEST_ITERATIONS).unwrap();
        let kwk2 = derive_kwk("correct-horse", &salt, TEST_ITERATIONS).unwrap();
        assert_eq!(kwk1.as_bytes(), kwk2.as_bytes());
    }

    #[test]
    fn test_different_password_different_kwk() {
        let salt = random_salt();
        let kwk1 = derive_kwk("correct-horse", &salt, TEST_ITERATIONS).unwrap();
        let kwk2 = derive_kwk("wrong-horse", &salt, TEST_ITERATIONS).unwrap();
        assert_ne!(kwk1.as_bytes(), kwk2.as_bytes());
    }

    #[test]
    fn test_different_salt_different_kwk() {
        let kwk1 = derive_kwk("correct-horse", &random_salt(), TEST_ITERATIONS).unwrap();
        let kwk2 = derive_kwk("correct-horse", &random_salt(), TEST_ITERATIONS).unwrap();
        assert_ne!(kwk1.as_bytes(), kwk2.as_bytes());
    }

    #[test]
    fn test_iteration_count_changes_kwk() {
        let salt = random_salt();
        let kwk1 = derive_kwk("correct-horse", &salt, TEST_ITERATIONS).unwrap();
        let kwk2 = derive_kwk("correct-horse", &salt, TEST_ITERATIONS + 1).unwrap();
        assert_ne!(kwk1.as_bytes(), kwk2.as_bytes());
    }

    #[test]
    fn test_empty_password_rejected() {
        let salt = random_salt();
        assert!(derive_kwk("", &salt, TEST_ITERATIONS).is_err());
    }

    #[test]
    fn test_empty_salt_rejected() {
        assert!(derive_kwk("correct-horse", &[], TEST_ITERATIONS).is_err());
    }
}
