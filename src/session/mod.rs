//! Session continuity: the single resident DEK slot
//!
//! `VaultSession` owns the only in-memory copy of the DEK over one vault
//! session. It moves between two observable states, `Locked` (no DEK
//! resident) and `Unlocked` (DEK resident); derivation/unwrap happen inside
//! the transition. Only `initialize`, `unlock`, `restore_from_token`,
//! `lock`, and `sign_out` mutate the slot; everything else sees the DEK as
//! a read-only capability.
//!
//! The KWK never leaves this module: it exists for the duration of a
//! derive-and-unwrap call and is zeroized immediately after.

pub mod token;

use std::sync::RwLock;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;

use crate::config::{VaultConfig, VaultPaths};
use crate::crypto::{self, primitives, Dek};
use crate::error::{VaultError, VaultResult};
use crate::store::metadata::MetaStore;

pub use token::{SessionToken, TokenStore};

/// Observable session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No DEK in memory; reads and writes fail fast
    Locked,
    /// DEK resident; vault operations may proceed
    Unlocked,
}

/// Owns the resident DEK and the session token lifecycle
pub struct VaultSession {
    meta: MetaStore,
    tokens: TokenStore,
    config: VaultConfig,
    paths: VaultPaths,
    dek: RwLock<Option<Dek>>,
}

impl VaultSession {
    /// Open a session against a vault directory (starts Locked)
    pub fn open(paths: VaultPaths, config: VaultConfig) -> VaultResult<Self> {
        paths.ensure_directories()?;
        let meta = MetaStore::open(paths.metadata_file())?;
        let tokens = TokenStore::new(paths.session_token_file());

        Ok(Self {
            meta,
            tokens,
            config,
            paths,
            dek: RwLock::new(None),
        })
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        match self.dek.read() {
            Ok(slot) if slot.is_some() => SessionState::Unlocked,
            _ => SessionState::Locked,
        }
    }

    /// Whether a DEK is resident
    pub fn is_unlocked(&self) -> bool {
        self.state() == SessionState::Unlocked
    }

    /// Whether the vault has been initialized on disk
    pub fn is_initialized(&self) -> VaultResult<bool> {
        self.meta.is_initialized()
    }

    /// Create a new vault: salt + DEK, wrap the DEK, persist metadata,
    /// transition to Unlocked
    ///
    /// The salt is generated exactly once here; it is never regenerated for
    /// the lifetime of the vault.
    pub fn initialize(&self, password: &str, persist_continuity: bool) -> VaultResult<()> {
        if self.meta.is_initialized()? {
            return Err(VaultError::VaultState(
                "Vault is already initialized".into(),
            ));
        }

        let salt = primitives::random_salt();
        let kwk = crypto::derive_kwk(password, &salt, self.config.pbkdf2_iterations)?;
        let dek = crypto::generate_dek();
        let wrapped = crypto::wrap_dek(&dek, &kwk)?;

        // The iteration count is bound to the vault alongside the salt:
        // both are KWK inputs, and a later config change must not change
        // what unlocks the stored DEK.
        self.meta.initialize(
            &primitives::encode(&salt),
            &wrapped,
            self.config.pbkdf2_iterations,
        )?;

        // The device secret backs password-less session restore; created
        // once per install alongside the vault.
        self.device_secret(true)?;

        if persist_continuity {
            self.persist_token(&dek)?;
        }

        self.set_resident(Some(dek))?;
        tracing::info!("vault initialized");
        Ok(())
    }

    /// Unlock with a password: derive KWK, unwrap the DEK
    ///
    /// On a KWK/DEK mismatch the session stays Locked and the error does
    /// not reveal whether the vault exists or the password was wrong.
    pub fn unlock(&self, password: &str, persist_continuity: bool) -> VaultResult<()> {
        if !self.meta.is_initialized()? {
            return Err(VaultError::VaultState("Vault is not initialized".into()));
        }
        if !self.meta.encryption_enabled()? {
            return Err(VaultError::VaultState(
                "Encryption is not enabled for this vault".into(),
            ));
        }

        let salt = primitives::decode(&self.meta.salt()?)?;
        let wrapped = self.meta.wrapped_dek()?;

        let kwk = crypto::derive_kwk(password, &salt, self.kdf_iterations()?)?;
        let dek = crypto::unwrap_dek(&wrapped, &kwk)?;

        if persist_continuity {
            self.persist_token(&dek)?;
        }

        self.set_resident(Some(dek))?;
        tracing::debug!("vault unlocked with password");
        Ok(())
    }

    /// Restore the session from a persisted token, if one is valid
    ///
    /// Fail-closed: any parse, expiry, or unwrap problem returns
    /// `Ok(false)` ("no session") and discards the token, never a hard
    /// error into caller code. Expiry is re-validated here, immediately
    /// before the DEK would become usable.
    pub fn restore_from_token(&self) -> VaultResult<bool> {
        let token = match self.tokens.load() {
            Some(token) => token,
            None => return Ok(false),
        };

        if token.is_expired() {
            tracing::debug!(expires_at = %token.expires_at, "session token expired, discarding");
            self.tokens.clear()?;
            return Ok(false);
        }

        let restored = self.try_unwrap_token(&token);
        match restored {
            Some(dek) => {
                self.set_resident(Some(dek))?;
                tracing::debug!("session restored from token");
                Ok(true)
            }
            None => {
                // Wrong device secret, corrupted token, or missing secret
                // file all read the same: no session.
                tracing::debug!("session token could not be unwrapped, discarding");
                self.tokens.clear()?;
                Ok(false)
            }
        }
    }

    fn try_unwrap_token(&self, token: &SessionToken) -> Option<Dek> {
        let secret = self.device_secret(false).ok()?;
        let salt = primitives::decode(&token.salt).ok()?;
        let iterations = self.kdf_iterations().ok()?;
        let kwk = crypto::derive_kwk(&secret, &salt, iterations).ok()?;

        let wrapped = crypto::EncryptedBlob {
            iv: token.iv.clone(),
            ciphertext: token.wrapped_dek.clone(),
        };
        crypto::unwrap_dek(&wrapped, &kwk).ok()
    }

    /// Drop the resident DEK but keep the session token
    pub fn lock(&self) -> VaultResult<()> {
        self.set_resident(None)?;
        tracing::debug!("vault locked");
        Ok(())
    }

    /// Drop the resident DEK and delete the session token
    pub fn sign_out(&self) -> VaultResult<()> {
        self.set_resident(None)?;
        self.tokens.clear()?;
        tracing::info!("signed out");
        Ok(())
    }

    /// Destroy crypto metadata, the token, and the device secret
    ///
    /// Record stores are wiped separately by the caller; after this the
    /// vault must be re-initialized from scratch.
    pub fn wipe(&self) -> VaultResult<()> {
        self.set_resident(None)?;
        self.tokens.clear()?;
        self.meta.wipe()?;

        let secret_path = self.paths.device_secret_file();
        if secret_path.exists() {
            std::fs::remove_file(&secret_path)
                .map_err(|e| VaultError::Io(format!("Failed to delete device secret: {}", e)))?;
        }
        Ok(())
    }

    /// Clone of the resident DEK, or a vault-state error when locked
    pub fn dek(&self) -> VaultResult<Dek> {
        let slot = self
            .dek
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        slot.clone()
            .ok_or_else(|| VaultError::VaultState("No key is resident".into()))
    }

    fn set_resident(&self, dek: Option<Dek>) -> VaultResult<()> {
        let mut slot = self
            .dek
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        *slot = dek;
        Ok(())
    }

    /// Write a fresh session token wrapping the given DEK
    ///
    /// Each token gets its own salt; the wrapping key is derived from the
    /// per-install device secret, so possession of the data directory
    /// stands in for the password.
    fn persist_token(&self, dek: &Dek) -> VaultResult<()> {
        let secret = self.device_secret(true)?;
        let salt = primitives::random_salt();
        let kwk = crypto::derive_kwk(&secret, &salt, self.kdf_iterations()?)?;
        let wrapped = crypto::wrap_dek(dek, &kwk)?;

        let token = SessionToken {
            wrapped_dek: wrapped.ciphertext,
            iv: wrapped.iv,
            salt: primitives::encode(&salt),
            expires_at: chrono::Utc::now() + self.config.continuity_window(),
        };
        self.tokens.save(&token)
    }

    /// Iteration count for every KWK derivation against this vault
    ///
    /// Reads the count the vault was created with; the runtime setting is
    /// only a fallback for metadata predating the stored value.
    fn kdf_iterations(&self) -> VaultResult<u32> {
        Ok(self
            .meta
            .kdf_iterations()?
            .unwrap_or(self.config.pbkdf2_iterations))
    }

    fn device_secret(&self, create: bool) -> VaultResult<String> {
        let path = self.paths.device_secret_file();

        if path.exists() {
            return std::fs::read_to_string(&path)
                .map(|s| s.trim().to_string())
                .map_err(|e| VaultError::Io(format!("Failed to read device secret: {}", e)));
        }

        if !create {
            return Err(VaultError::Session("No device secret present".into()));
        }

        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        let encoded = primitives::encode(&secret);
        std::fs::write(&path, &encoded)
            .map_err(|e| VaultError::Io(format!("Failed to write device secret: {}", e)))?;
        Ok(encoded)
    }

    /// Test hook: overwrite the persisted token
    #[cfg(test)]
    pub(crate) fn tokens(&self) -> &TokenStore {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast_config() -> VaultConfig {
        // 100k PBKDF2 iterations per derive makes session tests crawl;
        // the clamp only applies to settings loaded from disk.
        VaultConfig {
            pbkdf2_iterations: 1000,
            ..VaultConfig::default()
        }
    }

    fn test_session() -> (TempDir, VaultSession) {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let session = VaultSession::open(paths, fast_config()).unwrap();
        (temp_dir, session)
    }

    #[test]
    fn test_starts_locked() {
        let (_temp, session) = test_session();
        assert_eq!(session.state(), SessionState::Locked);
        assert!(session.dek().is_err());
        assert!(!session.is_initialized().unwrap());
    }

    #[test]
    fn test_initialize_unlocks() {
        let (_temp, session) = test_session();
        session.initialize("correct-horse", false).unwrap();

        assert_eq!(session.state(), SessionState::Unlocked);
        assert!(session.dek().is_ok());
        assert!(session.is_initialized().unwrap());
    }

    #[test]
    fn test_double_initialize_rejected() {
        let (_temp, session) = test_session();
        session.initialize("correct-horse", false).unwrap();

        let err = session.initialize("correct-horse", false).unwrap_err();
        assert!(err.is_vault_state());
    }

    #[test]
    fn test_unlock_with_correct_password() {
        let (temp, session) = test_session();
        session.initialize("correct-horse", false).unwrap();
        let original = session.dek().unwrap();
        drop(session);

        let paths = VaultPaths::with_base_dir(temp.path().to_path_buf());
        let session = VaultSession::open(paths, fast_config()).unwrap();
        session.unlock("correct-horse", false).unwrap();

        assert_eq!(session.dek().unwrap().as_bytes(), original.as_bytes());
    }

    #[test]
    fn test_unlock_with_wrong_password_stays_locked() {
        let (_temp, session) = test_session();
        session.initialize("correct-horse", false).unwrap();
        session.lock().unwrap();

        let err = session.unlock("wrong-horse", false).unwrap_err();
        assert!(err.is_crypto());
        assert_eq!(session.state(), SessionState::Locked);
    }

    #[test]
    fn test_unlock_uninitialized_vault() {
        let (_temp, session) = test_session();
        let err = session.unlock("correct-horse", false).unwrap_err();
        assert!(err.is_vault_state());
    }

    #[test]
    fn test_restore_from_token() {
        let (_temp, session) = test_session();
        session.initialize("correct-horse", true).unwrap();
        let original = session.dek().unwrap();

        session.lock().unwrap();
        assert!(session.restore_from_token().unwrap());
        assert_eq!(session.dek().unwrap().as_bytes(), original.as_bytes());
    }

    #[test]
    fn test_restore_without_token_is_no_session() {
        let (_temp, session) = test_session();
        session.initialize("correct-horse", false).unwrap();
        session.lock().unwrap();

        assert!(!session.restore_from_token().unwrap());
        assert_eq!(session.state(), SessionState::Locked);
    }

    #[test]
    fn test_expired_token_never_restores() {
        let (_temp, session) = test_session();
        session.initialize("correct-horse", true).unwrap();
        session.lock().unwrap();

        // Rewrite the token with an expiry in the past; the wrapped DEK
        // inside is otherwise still valid.
        let mut token = session.tokens().load().unwrap();
        token.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        session.tokens().save(&token).unwrap();

        assert!(!session.restore_from_token().unwrap());
        assert_eq!(session.state(), SessionState::Locked);
        // The expired token was discarded, not kept around
        assert!(!session.tokens().exists());
    }

    #[test]
    fn test_tampered_token_fails_closed() {
        let (_temp, session) = test_session();
        session.initialize("correct-horse", true).unwrap();
        session.lock().unwrap();

        let mut token = session.tokens().load().unwrap();
        token.wrapped_dek = primitives::encode(b"garbage garbage garbage garbage!");
        session.tokens().save(&token).unwrap();

        assert!(!session.restore_from_token().unwrap());
        assert_eq!(session.state(), SessionState::Locked);
    }

    #[test]
    fn test_sign_out_deletes_token() {
        let (_temp, session) = test_session();
        session.initialize("correct-horse", true).unwrap();
        assert!(session.tokens().exists());

        session.sign_out().unwrap();
        assert_eq!(session.state(), SessionState::Locked);
        assert!(!session.tokens().exists());
        assert!(!session.restore_from_token().unwrap());
    }

    #[test]
    fn test_lock_keeps_token() {
        let (_temp, session) = test_session();
        session.initialize("correct-horse", true).unwrap();

        session.lock().unwrap();
        assert!(session.tokens().exists());
        assert!(session.restore_from_token().unwrap());
    }

    #[test]
    fn test_unlock_survives_iteration_setting_change() {
        let (temp, session) = test_session();
        session.initialize("correct-horse", true).unwrap();
        drop(session);

        // Reopen with a raised iteration setting. The count bound to the
        // vault at creation time must still govern derivation; otherwise
        // the true password stops unlocking the vault.
        let paths = VaultPaths::with_base_dir(temp.path().to_path_buf());
        let config = VaultConfig {
            pbkdf2_iterations: 2000,
            ..VaultConfig::default()
        };
        let session = VaultSession::open(paths, config).unwrap();
        session.unlock("correct-horse", false).unwrap();
        assert!(session.is_unlocked());

        // Token restore is pinned to the stored count as well
        session.lock().unwrap();
        assert!(session.restore_from_token().unwrap());
    }

    #[test]
    fn test_unlock_requires_encryption_enabled() {
        let (temp, session) = test_session();
        session.initialize("correct-horse", false).unwrap();
        drop(session);

        let meta = MetaStore::open(temp.path().join("metadata.json")).unwrap();
        meta.set(crate::store::metadata::KEY_ENCRYPTION_ENABLED, "false".into())
            .unwrap();

        let paths = VaultPaths::with_base_dir(temp.path().to_path_buf());
        let session = VaultSession::open(paths, fast_config()).unwrap();
        let err = session.unlock("correct-horse", false).unwrap_err();
        assert!(err.is_vault_state());
    }

    #[test]
    fn test_wipe_destroys_metadata_and_token() {
        let (_temp, session) = test_session();
        session.initialize("correct-horse", true).unwrap();

        session.wipe().unwrap();
        assert!(!session.is_initialized().unwrap());
        assert!(!session.tokens().exists());
        assert_eq!(session.state(), SessionState::Locked);
    }
}
