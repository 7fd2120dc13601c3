//! Unencrypted crypto-metadata store
//!
//! A key→value side-channel holding the vault salt, the wrapped DEK, its
//! wrap-IV, and the "encryption enabled" flag. Written once at vault
//! initialization, read at every unlock, cleared only by a full wipe.
//! Its contents are deliberately plaintext: the wrapped DEK's
//! confidentiality rests on the password, not on storage secrecy.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::crypto::EncryptedBlob;
use crate::error::{VaultError, VaultResult};

use super::file_io::{load_json, store_json};

/// Metadata keys, fixed by the on-disk interface
pub const KEY_SALT: &str = "salt";
pub const KEY_WRAPPED_DEK: &str = "wrappedDEK";
pub const KEY_WRAPPED_DEK_IV: &str = "wrappedDEKIV";
pub const KEY_ENCRYPTION_ENABLED: &str = "encryptionEnabled";
pub const KEY_KDF_ITERATIONS: &str = "pbkdf2Iterations";

/// Unencrypted key→value store for cryptographic metadata
pub struct MetaStore {
    path: PathBuf,
    data: RwLock<HashMap<String, String>>,
}

impl MetaStore {
    /// Open (or lazily create) the metadata store at the given path
    pub fn open(path: PathBuf) -> VaultResult<Self> {
        let data: HashMap<String, String> = load_json(&path)?;
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Get a raw metadata value
    pub fn get(&self, key: &str) -> VaultResult<Option<String>> {
        let data = self
            .data
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(data.get(key).cloned())
    }

    /// Set a raw metadata value and persist
    pub fn set(&self, key: &str, value: String) -> VaultResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        data.insert(key.to_string(), value);
        store_json(&self.path, &*data)
    }

    /// The vault salt (base64), required at every unlock
    pub fn salt(&self) -> VaultResult<String> {
        self.get(KEY_SALT)?
            .ok_or_else(|| VaultError::Structural("Vault metadata is missing 'salt'".into()))
    }

    /// The wrapped DEK paired with its wrap-IV
    pub fn wrapped_dek(&self) -> VaultResult<EncryptedBlob> {
        let ciphertext = self.get(KEY_WRAPPED_DEK)?.ok_or_else(|| {
            VaultError::Structural("Vault metadata is missing 'wrappedDEK'".into())
        })?;
        let iv = self.get(KEY_WRAPPED_DEK_IV)?.ok_or_else(|| {
            VaultError::Structural("Vault metadata is missing 'wrappedDEKIV'".into())
        })?;
        Ok(EncryptedBlob { iv, ciphertext })
    }

    /// Whether encryption is enabled for this vault
    pub fn encryption_enabled(&self) -> VaultResult<bool> {
        Ok(self
            .get(KEY_ENCRYPTION_ENABLED)?
            .map(|v| v == "true")
            .unwrap_or(false))
    }

    /// The PBKDF2 iteration count the wrapped DEK was produced under
    ///
    /// Bound to the vault at initialization; the runtime setting must
    /// never override it, or the stored DEK becomes unreachable.
    pub fn kdf_iterations(&self) -> VaultResult<Option<u32>> {
        match self.get(KEY_KDF_ITERATIONS)? {
            Some(value) => value.parse().map(Some).map_err(|_| {
                VaultError::Structural(format!("Invalid 'pbkdf2Iterations' value: {:?}", value))
            }),
            None => Ok(None),
        }
    }

    /// Write all initialization-time metadata in one persisted update
    pub fn initialize(
        &self,
        salt_b64: &str,
        wrapped: &EncryptedBlob,
        kdf_iterations: u32,
    ) -> VaultResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        data.insert(KEY_SALT.into(), salt_b64.to_string());
        data.insert(KEY_WRAPPED_DEK.into(), wrapped.ciphertext.clone());
        data.insert(KEY_WRAPPED_DEK_IV.into(), wrapped.iv.clone());
        data.insert(KEY_ENCRYPTION_ENABLED.into(), "true".into());
        data.insert(KEY_KDF_ITERATIONS.into(), kdf_iterations.to_string());
        store_json(&self.path, &*data)
    }

    /// Check whether the vault has been initialized
    pub fn is_initialized(&self) -> VaultResult<bool> {
        Ok(self.get(KEY_SALT)?.is_some())
    }

    /// Clear all metadata (full vault wipe only)
    pub fn wipe(&self) -> VaultResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        data.clear();
        store_json(&self.path, &*data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, MetaStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = MetaStore::open(temp_dir.path().join("metadata.json")).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_empty_store() {
        let (_temp, store) = test_store();
        assert!(!store.is_initialized().unwrap());
        assert!(store.salt().is_err());
        assert!(!store.encryption_enabled().unwrap());
    }

    #[test]
    fn test_initialize_and_read_back() {
        let (temp, store) = test_store();

        let wrapped = EncryptedBlob {
            iv: "aXY=".into(),
            ciphertext: "Y3Q=".into(),
        };
        store.initialize("c2FsdA==", &wrapped, 100_000).unwrap();

        assert!(store.is_initialized().unwrap());
        assert_eq!(store.salt().unwrap(), "c2FsdA==");
        assert!(store.encryption_enabled().unwrap());
        assert_eq!(store.kdf_iterations().unwrap(), Some(100_000));

        let read_back = store.wrapped_dek().unwrap();
        assert_eq!(read_back.iv, "aXY=");
        assert_eq!(read_back.ciphertext, "Y3Q=");

        // Survives a reopen
        let reopened = MetaStore::open(temp.path().join("metadata.json")).unwrap();
        assert_eq!(reopened.salt().unwrap(), "c2FsdA==");
        assert_eq!(reopened.kdf_iterations().unwrap(), Some(100_000));
    }

    #[test]
    fn test_missing_wrapped_dek_is_structural() {
        let (_temp, store) = test_store();
        store.set(KEY_SALT, "c2FsdA==".into()).unwrap();

        let err = store.wrapped_dek().unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_kdf_iterations_absent_or_garbage() {
        let (_temp, store) = test_store();
        assert_eq!(store.kdf_iterations().unwrap(), None);

        store.set(KEY_KDF_ITERATIONS, "lots".into()).unwrap();
        assert!(store.kdf_iterations().unwrap_err().is_structural());
    }

    #[test]
    fn test_wipe_clears_everything() {
        let (_temp, store) = test_store();
        let wrapped = EncryptedBlob {
            iv: "aXY=".into(),
            ciphertext: "Y3Q=".into(),
        };
        store.initialize("c2FsdA==", &wrapped, 100_000).unwrap();

        store.wipe().unwrap();
        assert!(!store.is_initialized().unwrap());
        assert!(store.get(KEY_WRAPPED_DEK).unwrap().is_none());
    }
}
