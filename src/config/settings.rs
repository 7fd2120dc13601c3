//! Vault settings for ledgervault
//!
//! Tunable parameters for key derivation, session continuity, export
//! compression, and the write-coalescing queue. Persisted as JSON next to
//! the vault data so a vault carries its own parameters.

use serde::{Deserialize, Serialize};

use super::paths::VaultPaths;
use crate::error::{VaultError, VaultResult};

/// Floor for the PBKDF2 iteration count. Configured values below this are
/// clamped up; offline guessing resistance depends on it.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Tunable vault parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Schema version for migration support
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// PBKDF2-HMAC-SHA256 iteration count for KWK derivation
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,

    /// How long a persisted session token stays valid, in days
    #[serde(default = "default_continuity_window_days")]
    pub continuity_window_days: i64,

    /// Export payloads larger than this (serialized bytes) are compressed
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold_bytes: usize,

    /// Debounce window for the write-coalescing queue, in milliseconds
    #[serde(default = "default_write_debounce_ms")]
    pub write_debounce_ms: u64,
}

fn default_config_version() -> u32 {
    1
}

fn default_pbkdf2_iterations() -> u32 {
    MIN_PBKDF2_ITERATIONS
}

fn default_continuity_window_days() -> i64 {
    14
}

fn default_compression_threshold() -> usize {
    10 * 1024
}

fn default_write_debounce_ms() -> u64 {
    1000
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            pbkdf2_iterations: default_pbkdf2_iterations(),
            continuity_window_days: default_continuity_window_days(),
            compression_threshold_bytes: default_compression_threshold(),
            write_debounce_ms: default_write_debounce_ms(),
        }
    }
}

impl VaultConfig {
    /// Load settings from disk, creating the file with defaults if absent
    pub fn load_or_create(paths: &VaultPaths) -> VaultResult<Self> {
        let path = paths.settings_file();

        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| VaultError::Config(format!("Failed to read settings: {}", e)))?;
            let mut config: VaultConfig = serde_json::from_str(&contents)
                .map_err(|e| VaultError::Config(format!("Failed to parse settings: {}", e)))?;
            config.clamp();
            Ok(config)
        } else {
            let config = Self::default();
            config.save(paths)?;
            Ok(config)
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &VaultPaths) -> VaultResult<()> {
        paths.ensure_directories()?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| VaultError::Config(format!("Failed to serialize settings: {}", e)))?;
        std::fs::write(paths.settings_file(), json)
            .map_err(|e| VaultError::Config(format!("Failed to write settings: {}", e)))?;
        Ok(())
    }

    /// Enforce minimums on loaded values
    fn clamp(&mut self) {
        if self.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            tracing::warn!(
                configured = self.pbkdf2_iterations,
                minimum = MIN_PBKDF2_ITERATIONS,
                "pbkdf2_iterations below minimum, clamping"
            );
            self.pbkdf2_iterations = MIN_PBKDF2_ITERATIONS;
        }
    }

    /// Debounce window as a Duration
    pub fn write_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.write_debounce_ms)
    }

    /// Continuity window as a chrono Duration
    pub fn continuity_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.continuity_window_days)
    }
}
