//! Key hierarchy: DEK generation and DEK wrapping under the KWK
//!
//! Two-tier key system: the KWK is derived from the user's password and is
//! never stored; the DEK is random, directly encrypts records, and is only
//! ever persisted wrapped under the KWK. Both key types zero their memory
//! on drop.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{VaultError, VaultResult};

use super::primitives::{self, EncryptedBlob};

/// Key-Wrapping-Key, derived from the user password
///
/// Capable only of wrap/unwrap; its bytes never leave this module family
/// and it is never serialized.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Kwk {
    key: [u8; 32],
}

impl Kwk {
    pub(crate) fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    #[cfg(test)]
    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for Kwk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Kwk([REDACTED])")
    }
}

/// Data-Encryption-Key, the AES-256 key that directly encrypts records
///
/// Exactly one DEK exists per vault. Cloneable within the crate so the
/// session can hold the resident copy; never written to disk in raw form.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Dek {
    key: [u8; 32],
}

impl Dek {
    pub(crate) fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for Dek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Dek([REDACTED])")
    }
}

/// Generate a cryptographically random 256-bit DEK
pub fn generate_dek() -> Dek {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    Dek::from_bytes(key)
}

/// Wrap (encrypt) the raw DEK bytes under the KWK with a fresh IV
///
/// A fresh IV is generated on every call, including re-wraps.
pub fn wrap_dek(dek: &Dek, kwk: &Kwk) -> VaultResult<EncryptedBlob> {
    primitives::encrypt(&kwk.key, dek.as_bytes())
}

/// Unwrap (decrypt) a wrapped DEK under the KWK
///
/// Fails with the same error for a mismatched KWK and for corrupted data;
/// the two cases are indistinguishable to the caller.
pub fn unwrap_dek(wrapped: &EncryptedBlob, kwk: &Kwk) -> VaultResult<Dek> {
    let mut plaintext = primitives::decrypt(&kwk.key, wrapped)?;

    if plaintext.len() != 32 {
        tracing::debug!(len = plaintext.len(), "unwrapped DEK has wrong length");
        plaintext.zeroize();
        return Err(VaultError::Crypto);
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&plaintext);
    plaintext.zeroize();

    Ok(Dek::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::derive_kwk;
    use crate::crypto::primitives::random_salt;

    const TEST_ITERATIONS: u32 = 1000;

    #[test]
    fn test_generate_dek_is_random() {
        let dek1 = generate_dek();
        let dek2 = generate_dek();
        assert_ne!(dek1.as_bytes(), dek2.as_bytes());
    }

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let salt = random_salt();
        let kwk = derive_kwk("correct-horse", &salt, TEST_ITERATIONS).unwrap();
        let dek = generate_dek();

        let wrapped = wrap_dek(&dek, &kwk).unwrap();
        let unwrapped = unwrap_dek(&wrapped, &kwk).unwrap();

        assert_eq!(dek.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_unwrapped_dek_encrypts_identically() {
        // The unwrapped DEK must encrypt/decrypt a sample record
        // interchangeably with the original DEK.
        let salt = random_salt();
        let kwk = derive_kwk("correct-horse", &salt, TEST_ITERATIONS).unwrap();
        let dek = generate_dek();

        let wrapped = wrap_dek(&dek, &kwk).unwrap();
        let unwrapped = unwrap_dek(&wrapped, &kwk).unwrap();

        let record = br#"{"id":"a1","balance":1200}"#;
        let encrypted = primitives::encrypt(dek.as_bytes(), record).unwrap();
        let decrypted = primitives::decrypt(unwrapped.as_bytes(), &encrypted).unwrap();
        assert_eq!(record.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_wrong_kwk_fails_unwrap() {
        let salt = random_salt();
        let kwk = derive_kwk("correct-horse", &salt, TEST_ITERATIONS).unwrap();
        let wrong = derive_kwk("wrong-horse", &salt, TEST_ITERATIONS).unwrap();
        let dek = generate_dek();

        let wrapped = wrap_dek(&dek, &kwk).unwrap();
        let err = unwrap_dek(&wrapped, &wrong).unwrap_err();
        assert!(err.is_crypto());
    }

    #[test]
    fn test_rewrap_uses_fresh_iv() {
        let salt = random_salt();
        let kwk = derive_kwk("correct-horse", &salt, TEST_ITERATIONS).unwrap();
        let dek = generate_dek();

        let wrapped1 = wrap_dek(&dek, &kwk).unwrap();
        let wrapped2 = wrap_dek(&dek, &kwk).unwrap();
        assert_ne!(wrapped1.iv, wrapped2.iv);
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let dek = generate_dek();
        let debug = format!("{:?}", dek);
        assert!(debug.contains("REDACTED"));
    }
}
