use std::io;
use std::path::Path;

use serde::Serialize;

/// Errors from [`write_json_atomic`].
#[derive(Debug, thiserror::Error)]
pub enum AtomicWriteError {
    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write temp file: {0}")]
    Write(#[source] io::Error),
    #[error("failed to rename temp file into place: {0}")]
    Rename(#[source] io::Error),
}

/// Serializes `value` to pretty JSON and writes it to `path` by first
/// writing a sibling `.tmp` file and renaming it over the final path, so a
/// reader never observes a partially written file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), AtomicWriteError> {
    let body = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
        None => "tmp".to_string(),
    });
    std::fs::write(&tmp_path, &body).map_err(AtomicWriteError::Write)?;
    std::fs::rename(&tmp_path, path).map_err(AtomicWriteError::Rename)?;
    Ok(())
}
