//! Import path: envelope → version gate → decrypt → decompress → schema gate
//!
//! Validation gates run in a fixed order so each failure class is
//! unambiguous: a structural problem is never reported as a crypto error,
//! and the format version is checked before any decryption is attempted.

use std::io::Read;

use flate2::read::GzDecoder;

use crate::crypto::{primitives, Dek, EncryptedBlob};
use crate::error::{VaultError, VaultResult};

use super::progress::{ProgressCallback, ProgressReporter};
use super::{ExportEnvelope, ExportPayload, InnerEnvelope, FORMAT_VERSION, SCHEMA_VERSION};

/// Import an export document (the raw file text)
///
/// Returns the original `data` object with an `importMetadata` object
/// merged in (`exportedAt`, `schemaVersion`, `formatVersion`).
pub fn import(
    text: &str,
    dek: &Dek,
    progress: ProgressCallback<'_>,
) -> VaultResult<serde_json::Value> {
    let envelope = parse_envelope(text)?;
    import_envelope(&envelope, dek, progress)
}

/// Import an already-parsed envelope
pub fn import_envelope(
    envelope: &ExportEnvelope,
    dek: &Dek,
    progress: ProgressCallback<'_>,
) -> VaultResult<serde_json::Value> {
    let mut progress = ProgressReporter::new(progress);
    progress.report(0);

    // Version gate runs before any decryption is attempted
    if envelope.version != FORMAT_VERSION {
        return Err(VaultError::UnsupportedVersion {
            found: envelope.version.clone(),
            supported: FORMAT_VERSION.to_string(),
        });
    }
    progress.report(10);

    let blob = EncryptedBlob {
        iv: envelope.iv.clone(),
        ciphertext: envelope.ciphertext.clone(),
    };
    let inner_bytes = primitives::decrypt(dek.as_bytes(), &blob)?;
    progress.report(45);

    let inner: InnerEnvelope = serde_json::from_slice(&inner_bytes).map_err(|e| {
        VaultError::Structural(format!("Invalid inner envelope: {}", e))
    })?;

    let body = primitives::decode(&inner.compressed)?;
    let payload_bytes = if inner.compression_used {
        decompress(&body)?
    } else {
        body
    };
    progress.report(75);

    let payload: ExportPayload = serde_json::from_slice(&payload_bytes)
        .map_err(|e| VaultError::Structural(format!("Invalid export payload: {}", e)))?;

    // Schema gate: importing from a newer schema is rejected; equal or
    // older is accepted as-is (forward migration is the caller's job).
    let found = parse_schema_version(&payload.schema_version)?;
    let current = parse_schema_version(SCHEMA_VERSION)?;
    if found > current {
        return Err(VaultError::SchemaNewer {
            found: payload.schema_version.clone(),
            current: SCHEMA_VERSION.to_string(),
        });
    }
    progress.report(90);

    let mut data = match payload.data {
        serde_json::Value::Object(map) => map,
        _ => {
            return Err(VaultError::Structural(
                "Export payload 'data' must be an object".into(),
            ))
        }
    };
    data.insert(
        "importMetadata".to_string(),
        serde_json::json!({
            "exportedAt": payload.created_at,
            "schemaVersion": payload.schema_version,
            "formatVersion": payload.format_version,
        }),
    );

    progress.finish();
    Ok(serde_json::Value::Object(data))
}

/// Parse the outer document, reporting every missing envelope key at once
fn parse_envelope(text: &str) -> VaultResult<ExportEnvelope> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| VaultError::Structural(format!("Not a valid export document: {}", e)))?;

    let obj = value
        .as_object()
        .ok_or_else(|| VaultError::Structural("Export document must be a JSON object".into()))?;

    let missing: Vec<&str> = ["version", "iv", "ciphertext"]
        .into_iter()
        .filter(|key| !obj.get(*key).map_or(false, |v| v.is_string()))
        .collect();
    if !missing.is_empty() {
        return Err(VaultError::Structural(format!(
            "Export document is missing required fields: {}",
            missing.join(", ")
        )));
    }

    serde_json::from_value(value)
        .map_err(|e| VaultError::Structural(format!("Invalid export document: {}", e)))
}

/// Compare "major.minor.patch" strings by semantic ordering
fn parse_schema_version(version: &str) -> VaultResult<(u64, u64, u64)> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 3 {
        return Err(VaultError::Structural(format!(
            "Invalid schema version: {:?}",
            version
        )));
    }

    let mut numbers = [0u64; 3];
    for (i, part) in parts.iter().enumerate() {
        numbers[i] = part.parse().map_err(|_| {
            VaultError::Structural(format!("Invalid schema version: {:?}", version))
        })?;
    }
    Ok((numbers[0], numbers[1], numbers[2]))
}

fn decompress(bytes: &[u8]) -> VaultResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| VaultError::Structural(format!("Decompression failed: {}", e)))?;
    Ok(out)
}
