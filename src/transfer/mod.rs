//! Encrypted export/import protocol
//!
//! Stateless, pure request/response. An export wraps user data in a
//! versioned payload, optionally gzips it, encrypts the result under the
//! active DEK, and emits a versioned envelope; import runs the inverse
//! path with ordered validation gates (structure, then format version
//! before any decryption, then crypto, then schema compatibility).

pub mod export;
pub mod import;
pub mod progress;
pub mod validate;

use serde::{Deserialize, Serialize};

pub use export::{export, export_to_string, export_with_threshold};
pub use import::{import, import_envelope};
pub use progress::ProgressCallback;
pub use validate::{validate, ValidationReport};

/// Export file format version; the only value this build reads or writes
pub const FORMAT_VERSION: &str = "1.0";

/// Schema version of the business payload this build produces
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Serialized payloads larger than this are compressed before encryption
pub const COMPRESSION_THRESHOLD: usize = 10 * 1024;

/// The outermost artifact: a UTF-8 JSON document, safe to store anywhere
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEnvelope {
    /// Format version, e.g. `"1.0"`
    pub version: String,
    /// Base64 IV for the envelope ciphertext
    pub iv: String,
    /// Base64 AES-256-GCM ciphertext with tag
    pub ciphertext: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Decrypted inner structure of the envelope ciphertext
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct InnerEnvelope {
    /// Base64 of the (possibly compressed) payload bytes
    pub compressed: String,
    #[serde(rename = "compressionUsed")]
    pub compression_used: bool,
}

/// Decompressed payload carrying the business data
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ExportPayload {
    #[serde(rename = "formatVersion")]
    pub format_version: String,
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub data: serde_json::Value,
}
