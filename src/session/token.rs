//! Persisted session token for "stay signed in"
//!
//! The token carries a wrapped DEK, its wrap-IV, the salt that rebuilds the
//! wrapping key, and an expiry. It lives in its own file, separate from the
//! vault metadata, so signing out can delete it without touching anything
//! else. An expired token is inert: it is discarded, never extended.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::store::file_io::store_json;

/// A time-limited artifact allowing DEK recovery without a password
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    /// DEK wrapped under a KWK derived from the device secret + `salt`
    #[serde(rename = "wrappedDEK")]
    pub wrapped_dek: String,
    /// Wrap-IV paired with `wrapped_dek` (base64)
    pub iv: String,
    /// Fresh salt generated for this token (base64)
    pub salt: String,
    /// Hard expiry; enforced on every restore attempt
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    /// Whether the token has passed its expiry
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// File-backed persistence for the session token
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Persist a token, replacing any existing one
    pub fn save(&self, token: &SessionToken) -> VaultResult<()> {
        store_json(&self.path, token)
    }

    /// Load the persisted token, if any
    ///
    /// A malformed token file reads as "no token": restore is fail-closed,
    /// so a parse failure must never surface as a hard error.
    pub fn load(&self) -> Option<SessionToken> {
        if !self.path.exists() {
            return None;
        }

        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::debug!(error = %e, "session token file is malformed, ignoring");
                None
            }
        }
    }

    /// Delete the persisted token
    pub fn clear(&self) -> VaultResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| VaultError::Io(format!("Failed to delete session token: {}", e)))?;
        }
        Ok(())
    }

    /// Whether a token file exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
