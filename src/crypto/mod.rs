//! Cryptographic layer for ledgervault
//!
//! AES-256-GCM authenticated encryption with PBKDF2-HMAC-SHA256 key
//! derivation, and the two-tier KWK/DEK key hierarchy.

pub mod kdf;
pub mod keys;
pub mod primitives;

pub use kdf::derive_kwk;
pub use keys::{generate_dek, unwrap_dek, wrap_dek, Dek, Kwk};
pub use primitives::{EncryptedBlob, IV_SIZE, SALT_SIZE};
