//! AES-256-GCM encryption/decryption and random material
//!
//! Stateless primitives: authenticated encryption for data at rest,
//! random salt/IV generation, and the base64 text encoding used by every
//! on-disk artifact. Each encryption operation generates a unique IV.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Size of the AES-GCM IV in bytes (96 bits)
pub const IV_SIZE: usize = 12;

/// Size of the vault salt in bytes (128 bits)
pub const SALT_SIZE: usize = 16;

/// An IV/ciphertext pair as stored on disk (both base64 encoded)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedBlob {
    /// The IV used for this encryption (base64 encoded)
    pub iv: String,
    /// The ciphertext with authentication tag (base64 encoded)
    pub ciphertext: String,
}

impl EncryptedBlob {
    /// Create a new EncryptedBlob from raw bytes
    pub(crate) fn new(iv: &[u8], ciphertext: &[u8]) -> Self {
        Self {
            iv: encode(iv),
            ciphertext: encode(ciphertext),
        }
    }
}

/// Base64-encode bytes for storage
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text; a malformed encoding is a structural error
pub fn decode(text: &str) -> VaultResult<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| VaultError::Structural(format!("Invalid base64 encoding: {}", e)))
}

/// Generate a random 128-bit salt
pub fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Encrypt plaintext under a 256-bit key with a fresh random IV
pub(crate) fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> VaultResult<EncryptedBlob> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::Encryption(format!("Failed to create cipher: {}", e)))?;

    let mut iv_bytes = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv_bytes);
    let iv = Nonce::from_slice(&iv_bytes);

    let ciphertext = cipher
        .encrypt(iv, plaintext)
        .map_err(|e| VaultError::Encryption(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedBlob::new(&iv_bytes, &ciphertext))
}

/// Decrypt an EncryptedBlob under a 256-bit key
///
/// An authentication-tag failure covers both "wrong key" and "corrupted
/// ciphertext"; the caller-facing error does not distinguish the two.
pub(crate) fn decrypt(key: &[u8; 32], blob: &EncryptedBlob) -> VaultResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::Encryption(format!("Failed to create cipher: {}", e)))?;

    let iv_bytes = decode(&blob.iv)?;
    if iv_bytes.len() != IV_SIZE {
        return Err(VaultError::Structural(format!(
            "Invalid IV size: expected {}, got {}",
            IV_SIZE,
            iv_bytes.len()
        )));
    }
    let iv = Nonce::from_slice(&iv_bytes);

    let ciphertext = decode(&blob.ciphertext)?;

    cipher.decrypt(iv, ciphertext.as_ref()).map_err(|_| {
        // The aead error carries no detail; log the event internally but
        // surface the single conflated message.
        tracing::debug!("authentication tag verification failed on decrypt");
        VaultError::Crypto
    })
}
