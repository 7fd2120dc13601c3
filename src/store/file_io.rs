//! Durable JSON persistence
//!
//! Every on-disk artifact is replaced wholesale: the new document goes to
//! a sibling staging file, is fsynced, then renamed over the target.
//! Readers see either the old document or the new one, never a torn
//! write. Filesystem failures surface as `Io`, serialization failures as
//! `Json`, so callers can tell a full disk from a corrupted file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{VaultError, VaultResult};

/// Load a JSON document, falling back to `T::default()` when the file is
/// absent
pub fn load_json<T, P>(path: P) -> VaultResult<T>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(VaultError::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    serde_json::from_str(&contents).map_err(|e| {
        VaultError::Json(format!("Malformed JSON in {}: {}", path.display(), e))
    })
}

/// Atomically replace the document at `path`
///
/// Missing parent directories are created. On any failure the staging
/// file is removed and the previous document, if one existed, is left
/// untouched.
pub fn store_json<T, P>(path: P, value: &T) -> VaultResult<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            VaultError::Io(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let staging = path.with_extension("tmp");
    if let Err(e) = write_staged(&staging, path, value) {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    Ok(())
}

fn write_staged<T: Serialize>(staging: &Path, path: &Path, value: &T) -> VaultResult<()> {
    let file = File::create(staging)
        .map_err(|e| VaultError::Io(format!("Failed to create {}: {}", staging.display(), e)))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| VaultError::Json(format!("Failed to serialize document: {}", e)))?;

    writer
        .flush()
        .map_err(|e| VaultError::Io(format!("Failed to flush {}: {}", staging.display(), e)))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| VaultError::Io(format!("Failed to sync {}: {}", staging.display(), e)))?;

    fs::rename(staging, path)
        .map_err(|e| VaultError::Io(format!("Failed to replace {}: {}", path.display(), e)))
}
