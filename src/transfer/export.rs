//! Export path: payload → (compress) → encrypt → envelope

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::crypto::{primitives, Dek};
use crate::error::{VaultError, VaultResult};

use super::progress::{ProgressCallback, ProgressReporter};
use super::{ExportEnvelope, ExportPayload, InnerEnvelope, COMPRESSION_THRESHOLD, FORMAT_VERSION, SCHEMA_VERSION};

/// Export user data as an encrypted envelope
///
/// Compression kicks in when the serialized payload exceeds 10 KB; it is
/// an optimization, never required for correctness.
pub fn export(
    user_data: &serde_json::Value,
    dek: &Dek,
    progress: ProgressCallback<'_>,
) -> VaultResult<ExportEnvelope> {
    export_with_threshold(user_data, dek, COMPRESSION_THRESHOLD, progress)
}

/// Export with an explicit compression threshold (from vault settings)
pub fn export_with_threshold(
    user_data: &serde_json::Value,
    dek: &Dek,
    compression_threshold: usize,
    progress: ProgressCallback<'_>,
) -> VaultResult<ExportEnvelope> {
    let mut progress = ProgressReporter::new(progress);
    progress.report(0);

    let created_at = chrono::Utc::now().to_rfc3339();
    let payload = ExportPayload {
        format_version: FORMAT_VERSION.to_string(),
        schema_version: SCHEMA_VERSION.to_string(),
        created_at: created_at.clone(),
        data: user_data.clone(),
    };
    let payload_bytes = serde_json::to_vec(&payload)?;
    progress.report(25);

    let compression_used = payload_bytes.len() > compression_threshold;
    let body = if compression_used {
        compress(&payload_bytes)?
    } else {
        payload_bytes
    };
    progress.report(55);

    let inner = InnerEnvelope {
        compressed: primitives::encode(&body),
        compression_used,
    };
    let inner_bytes = serde_json::to_vec(&inner)?;

    let blob = primitives::encrypt(dek.as_bytes(), &inner_bytes)?;
    progress.report(85);

    let envelope = ExportEnvelope {
        version: FORMAT_VERSION.to_string(),
        iv: blob.iv,
        ciphertext: blob.ciphertext,
        created_at,
    };
    progress.finish();
    Ok(envelope)
}

/// Export straight to the UTF-8 JSON document written to disk
pub fn export_to_string(
    user_data: &serde_json::Value,
    dek: &Dek,
    progress: ProgressCallback<'_>,
) -> VaultResult<String> {
    let envelope = export(user_data, dek, progress)?;
    serde_json::to_string_pretty(&envelope).map_err(Into::into)
}

pub(crate) fn compress(bytes: &[u8]) -> VaultResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| VaultError::Io(format!("Compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| VaultError::Io(format!("Compression failed: {}", e)))
}
