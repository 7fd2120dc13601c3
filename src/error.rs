//! Custom error types for ledgervault
//!
//! This module defines the error taxonomy for the vault using thiserror.
//! Callers are expected to pattern-match on the variant rather than on
//! message text: structural, version, cryptographic, vault-state, and
//! session failures are distinct classes with distinct recovery paths.

use thiserror::Error;

/// The main error type for vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Missing or malformed required fields in an envelope or payload
    #[error("Invalid structure: {0}")]
    Structural(String),

    /// Export file format version does not match the supported version
    #[error("Unsupported export format version: found {found}, supported {supported}")]
    UnsupportedVersion { found: String, supported: String },

    /// Import from a schema version newer than the one this build understands
    #[error("Cannot import from newer schema version {found} (current: {current})")]
    SchemaNewer { found: String, current: String },

    /// Authentication-tag failure on decrypt. Covers both "wrong key" and
    /// "corrupted ciphertext"; the two are deliberately not distinguished
    /// in the message (the internal signal is logged at debug level only).
    #[error("Decryption failed: invalid key or corrupted data")]
    Crypto,

    /// Key derivation or other cipher setup failures
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Operation attempted while the vault is locked (no resident DEK)
    #[error("Vault is locked: {0}")]
    VaultState(String),

    /// Expired or malformed session token
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage errors (file access, locking)
    #[error("Storage error: {0}")]
    Storage(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),
}

impl VaultError {
    /// Check if this is a cryptographic (auth-tag) failure
    pub fn is_crypto(&self) -> bool {
        matches!(self, Self::Crypto)
    }

    /// Check if this is a structural error
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural(_))
    }

    /// Check if this is a version error (format or schema)
    pub fn is_version(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedVersion { .. } | Self::SchemaNewer { .. }
        )
    }

    /// Check if this is a vault-state (locked) error
    pub fn is_vault_state(&self) -> bool {
        matches!(self, Self::VaultState(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::Structural("missing field 'iv'".into());
        assert_eq!(err.to_string(), "Invalid structure: missing field 'iv'");
    }

    #[test]
    fn test_crypto_error_conflates_causes() {
        // Wrong key and corrupted data must render identically
        let err = VaultError::Crypto;
        assert_eq!(
            err.to_string(),
            "Decryption failed: invalid key or corrupted data"
        );
        assert!(err.is_crypto());
    }

    #[test]
    fn test_version_errors() {
        let err = VaultError::UnsupportedVersion {
            found: "2.0".into(),
            supported: "1.0".into(),
        };
        assert!(err.is_version());
        assert!(err.to_string().contains("2.0"));
        assert!(err.to_string().contains("1.0"));

        let err = VaultError::SchemaNewer {
            found: "3.1.0".into(),
            current: "2.0.0".into(),
        };
        assert!(err.is_version());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let vault_err: VaultError = io_err.into();
        assert!(matches!(vault_err, VaultError::Io(_)));
    }
}
