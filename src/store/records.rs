//! Per-record encrypted key-value persistence
//!
//! One logical store per business collection (accounts, transactions,
//! categories, ...), each backed by a JSON file of `{id, iv, ciphertext}`
//! rows. Payloads are opaque bytes to this layer; the DEK is always
//! supplied by the caller, never sourced here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::crypto::{primitives, Dek, EncryptedBlob};
use crate::error::{VaultError, VaultResult};

use super::file_io::{load_json, store_json};

/// A single encrypted record row as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub id: String,
    /// Fresh random IV per write, base64 encoded
    pub iv: String,
    /// AES-256-GCM ciphertext with tag, base64 encoded
    pub ciphertext: String,
}

/// On-disk shape of one store file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    records: Vec<EncryptedRecord>,
}

/// Encrypted record store over a directory of per-store JSON files
pub struct RecordStore {
    stores_dir: PathBuf,
    cache: RwLock<HashMap<String, HashMap<String, EncryptedRecord>>>,
}

impl RecordStore {
    /// Create a record store rooted at the given stores directory
    pub fn new(stores_dir: PathBuf) -> Self {
        Self {
            stores_dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn store_path(&self, store: &str) -> VaultResult<PathBuf> {
        if store.is_empty()
            || !store
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(VaultError::Storage(format!(
                "Invalid store name: {:?}",
                store
            )));
        }
        Ok(self.stores_dir.join(format!("{}.json", store)))
    }

    /// Load a store file into the cache if it isn't resident yet
    fn ensure_loaded(&self, store: &str) -> VaultResult<()> {
        {
            let cache = self.cache.read().map_err(|e| {
                VaultError::Storage(format!("Failed to acquire read lock: {}", e))
            })?;
            if cache.contains_key(store) {
                return Ok(());
            }
        }

        let path = self.store_path(store)?;
        let file: StoreFile = load_json(&path)?;

        let mut cache = self
            .cache
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        cache.entry(store.to_string()).or_insert_with(|| {
            file.records.into_iter().map(|r| (r.id.clone(), r)).collect()
        });
        Ok(())
    }

    fn save_store(
        &self,
        store: &str,
        records: &HashMap<String, EncryptedRecord>,
    ) -> VaultResult<()> {
        let mut rows: Vec<EncryptedRecord> = records.values().cloned().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        store_json(self.store_path(store)?, &StoreFile { records: rows })
    }

    /// Encrypt and persist one record, replacing any prior record with the
    /// same id. A fresh IV is generated for every write, including updates.
    pub fn put_bytes(&self, store: &str, id: &str, data: &[u8], dek: &Dek) -> VaultResult<()> {
        self.ensure_loaded(store)?;

        let blob = primitives::encrypt(dek.as_bytes(), data)?;
        let record = EncryptedRecord {
            id: id.to_string(),
            iv: blob.iv,
            ciphertext: blob.ciphertext,
        };

        let mut cache = self
            .cache
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let records = cache.entry(store.to_string()).or_default();
        records.insert(id.to_string(), record);
        self.save_store(store, records)
    }

    /// Fetch and decrypt one record
    ///
    /// Returns `Ok(None)` for an absent record. A decryption failure on a
    /// present record is a hard error (tampering or wrong key), never
    /// treated as "not found".
    pub fn get_bytes(&self, store: &str, id: &str, dek: &Dek) -> VaultResult<Option<Vec<u8>>> {
        self.ensure_loaded(store)?;

        let cache = self
            .cache
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let record = match cache.get(store).and_then(|r| r.get(id)) {
            Some(record) => record.clone(),
            None => return Ok(None),
        };
        drop(cache);

        let blob = EncryptedBlob {
            iv: record.iv,
            ciphertext: record.ciphertext,
        };
        primitives::decrypt(dek.as_bytes(), &blob).map(Some)
    }

    /// Decrypt every record in a store, sorted by id
    pub fn get_all_bytes(&self, store: &str, dek: &Dek) -> VaultResult<Vec<Vec<u8>>> {
        self.ensure_loaded(store)?;

        let records: Vec<EncryptedRecord> = {
            let cache = self.cache.read().map_err(|e| {
                VaultError::Storage(format!("Failed to acquire read lock: {}", e))
            })?;
            let mut rows: Vec<_> = cache
                .get(store)
                .map(|r| r.values().cloned().collect())
                .unwrap_or_default();
            rows.sort_by(|a, b| a.id.cmp(&b.id));
            rows
        };

        records
            .into_iter()
            .map(|record| {
                let blob = EncryptedBlob {
                    iv: record.iv,
                    ciphertext: record.ciphertext,
                };
                primitives::decrypt(dek.as_bytes(), &blob)
            })
            .collect()
    }

    /// Encrypt and persist a batch of records in a single file write
    ///
    /// Each record gets its own fresh IV. Used for vault-wide migrations
    /// and import.
    pub fn bulk_put_bytes(
        &self,
        store: &str,
        records: &[(String, Vec<u8>)],
        dek: &Dek,
    ) -> VaultResult<()> {
        self.ensure_loaded(store)?;

        let mut encrypted = Vec::with_capacity(records.len());
        for (id, data) in records {
            let blob = primitives::encrypt(dek.as_bytes(), data)?;
            encrypted.push(EncryptedRecord {
                id: id.clone(),
                iv: blob.iv,
                ciphertext: blob.ciphertext,
            });
        }

        let mut cache = self
            .cache
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let store_records = cache.entry(store.to_string()).or_default();
        for record in encrypted {
            store_records.insert(record.id.clone(), record);
        }
        self.save_store(store, store_records)
    }

    /// Delete one record immediately
    ///
    /// Deletes are never routed through the write-coalescing queue, so they
    /// can never be silently dropped by debouncing.
    pub fn delete(&self, store: &str, id: &str) -> VaultResult<bool> {
        self.ensure_loaded(store)?;

        let mut cache = self
            .cache
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let records = cache.entry(store.to_string()).or_default();
        let removed = records.remove(id).is_some();
        if removed {
            self.save_store(store, records)?;
        }
        Ok(removed)
    }

    /// Names of all stores present on disk
    pub fn store_names(&self) -> VaultResult<Vec<String>> {
        if !self.stores_dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.stores_dir)
            .map_err(|e| VaultError::Storage(format!("Failed to read stores directory: {}", e)))?
        {
            let entry = entry
                .map_err(|e| VaultError::Storage(format!("Failed to read directory entry: {}", e)))?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Destroy all encrypted records (full vault wipe only)
    pub fn wipe(&self) -> VaultResult<()> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        cache.clear();

        if self.stores_dir.exists() {
            for entry in std::fs::read_dir(&self.stores_dir).map_err(|e| {
                VaultError::Storage(format!("Failed to read stores directory: {}", e))
            })? {
                let entry = entry.map_err(|e| {
                    VaultError::Storage(format!("Failed to read directory entry: {}", e))
                })?;
                if entry.path().extension().map_or(false, |ext| ext == "json") {
                    std::fs::remove_file(entry.path()).map_err(|e| {
                        VaultError::Storage(format!("Failed to delete store file: {}", e))
                    })?;
                }
            }
        }
        Ok(())
    }

    // Serde conveniences over the byte-level core.

    /// Serialize and persist one record
    pub fn put<T: Serialize>(&self, store: &str, id: &str, data: &T, dek: &Dek) -> VaultResult<()> {
        let bytes = serde_json::to_vec(data)?;
        self.put_bytes(store, id, &bytes, dek)
    }

    /// Fetch and deserialize one record
    pub fn get<T: DeserializeOwned>(
        &self,
        store: &str,
        id: &str,
        dek: &Dek,
    ) -> VaultResult<Option<T>> {
        match self.get_bytes(store, id, dek)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch and deserialize every record in a store
    pub fn get_all<T: DeserializeOwned>(&self, store: &str, dek: &Dek) -> VaultResult<Vec<T>> {
        self.get_all_bytes(store, dek)?
            .into_iter()
            .map(|bytes| serde_json::from_slice(&bytes).map_err(Into::into))
            .collect()
    }

    /// Serialize and persist a batch of records in one file write
    pub fn bulk_put<T: Serialize>(
        &self,
        store: &str,
        records: &[(String, T)],
        dek: &Dek,
    ) -> VaultResult<()> {
        let mut bytes = Vec::with_capacity(records.len());
        for (id, data) in records {
            bytes.push((id.clone(), serde_json::to_vec(data)?));
        }
        self.bulk_put_bytes(store, &bytes, dek)
    }

    /// Raw encrypted row for a record, without decrypting (test support)
    #[cfg(test)]
    pub(crate) fn raw_record(&self, store: &str, id: &str) -> Option<EncryptedRecord> {
        self.ensure_loaded(store).ok()?;
        let cache = self.cache.read().ok()?;
        cache.get(store).and_then(|r| r.get(id)).cloned()
    }
}
