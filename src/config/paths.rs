//! Path management for ledgervault
//!
//! Provides XDG-compliant path resolution for the vault data directory.
//!
//! ## Path Resolution Order
//!
//! 1. `LEDGERVAULT_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_DATA_HOME/ledgervault` or `~/.local/share/ledgervault`
//! 3. Windows: `%APPDATA%\ledgervault`

use std::path::PathBuf;

use crate::error::VaultError;

/// Manages all paths used by the vault
#[derive(Debug, Clone)]
pub struct VaultPaths {
    /// Base directory for all vault data
    base_dir: PathBuf,
}

impl VaultPaths {
    /// Create a new VaultPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, VaultError> {
        let base_dir = if let Ok(custom) = std::env::var("LEDGERVAULT_DATA_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create VaultPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Directory holding one JSON file per encrypted record store
    pub fn stores_dir(&self) -> PathBuf {
        self.base_dir.join("stores")
    }

    /// Path to the JSON file backing a named record store
    pub fn store_file(&self, store: &str) -> PathBuf {
        self.stores_dir().join(format!("{}.json", store))
    }

    /// Path to the unencrypted crypto metadata file (salt, wrapped DEK, flags)
    pub fn metadata_file(&self) -> PathBuf {
        self.base_dir.join("metadata.json")
    }

    /// Path to the persisted session token. Kept separate from the metadata
    /// file so it can be deleted without touching vault metadata.
    pub fn session_token_file(&self) -> PathBuf {
        self.base_dir.join("session.json")
    }

    /// Path to the per-install device secret used for session continuity
    pub fn device_secret_file(&self) -> PathBuf {
        self.base_dir.join("device.key")
    }

    /// Path to the vault settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<(), VaultError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| VaultError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.stores_dir())
            .map_err(|e| VaultError::Io(format!("Failed to create stores directory: {}", e)))?;

        Ok(())
    }

    /// Check if a vault has been initialized (metadata file exists)
    pub fn is_initialized(&self) -> bool {
        self.metadata_file().exists()
    }
}

/// Resolve the default data directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, VaultError> {
    // Unix (Linux/macOS): Use XDG_DATA_HOME if set, otherwise ~/.local/share
    let data_base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".local").join("share"))
        })
        .map_err(|_| VaultError::Config("Could not determine home directory".into()))?;
    Ok(data_base.join("ledgervault"))
}

/// Resolve the default data directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, VaultError> {
    // Windows: Use APPDATA
    let appdata = std::env::var("APPDATA")
        .map_err(|_| VaultError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("ledgervault"))
}
