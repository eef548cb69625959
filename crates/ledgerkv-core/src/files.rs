//! Whole-file and append-only file access shared by the snapshot and the log.
//!
//! Regular writes do not guard against a torn write: there is no temp-file
//! rename, and the last write that completes wins. Compaction is the one
//! exception and goes through `replace_atomically`.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use crate::durability::sync_file;
use crate::error::{StoreError, StoreResult};

/// Read the whole file, or `None` if it does not exist.
pub(crate) fn read_if_exists(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, "Failed to open for reading", e)),
    };

    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)
        .map_err(|e| StoreError::io(path, "Failed to read", e))?;
    Ok(Some(buffer))
}

/// Truncate and overwrite the file with `bytes`.
pub(crate) fn write_whole(path: &Path, bytes: &[u8], sync: bool) -> StoreResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| StoreError::io(path, "Failed to open for writing", e))?;

    file.write_all(bytes)
        .map_err(|e| StoreError::io(path, "Write failed", e))?;

    if sync {
        sync_file(&file, path)?;
    }
    Ok(())
}

/// Append `bytes` to the end of the file, creating it if needed.
pub(crate) fn append(path: &Path, bytes: &[u8], sync: bool) -> StoreResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, "Failed to open for append", e))?;

    file.write_all(bytes)
        .map_err(|e| StoreError::io(path, "Append failed", e))?;

    if sync {
        sync_file(&file, path)?;
    }
    Ok(())
}

/// Cut the file back to `len` bytes, dropping a torn tail.
pub(crate) fn truncate(path: &Path, len: u64, sync: bool) -> StoreResult<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| StoreError::io(path, "Failed to open for truncation", e))?;

    file.set_len(len)
        .map_err(|e| StoreError::io(path, "Truncate failed", e))?;

    if sync {
        sync_file(&file, path)?;
    }
    Ok(())
}

/// Write `bytes` to `<path>.compact`, then rename it over `path`.
///
/// Only compaction uses this: a crash part-way leaves the old file intact.
pub(crate) fn replace_atomically(path: &Path, bytes: &[u8], sync: bool) -> StoreResult<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".compact");
    let temp = std::path::PathBuf::from(temp);

    write_whole(&temp, bytes, sync)?;
    std::fs::rename(&temp, path).map_err(|e| StoreError::io(path, "Failed to replace", e))
}

/// Size of the file in bytes, 0 if it does not exist.
pub(crate) fn len_or_zero(path: &Path) -> StoreResult<u64> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(StoreError::io(path, "Failed to stat", e)),
    }
}

/// Delete the file. A missing file is not an error.
pub(crate) fn remove_if_exists(path: &Path) -> StoreResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, "Failed to remove", e)),
    }
}

/// Create the parent directory of `path` if it has one.
pub(crate) fn ensure_parent(path: &Path) -> StoreResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::io(parent, "Failed to create directory", e)),
        _ => Ok(()),
    }
}
