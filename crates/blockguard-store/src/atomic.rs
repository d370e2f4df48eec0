//! Atomic JSON file writes: temp file in the target directory, then rename.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::StoreError;

/// Write `value` as pretty JSON to `path`, creating parent directories.
/// Readers see either the old file or the complete new one.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| StoreError::Io(err.error))?;
    Ok(())
}
