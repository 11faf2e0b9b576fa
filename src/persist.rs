// 💾 Persistence - JSON documents on disk
// Atomic replace-on-save, one lock per file, content fingerprints
//
// Every persisted resource (registry, response log, feedback log) is a single
// JSON document that is rewritten in full. Writers go through `with_file_lock`
// so a load-modify-save cycle is a critical section, and `write_if_unchanged`
// refuses to overwrite content that changed underneath us.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to encode document for {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{} was modified by another writer, refusing to overwrite it", .path.display())]
    Conflict { path: PathBuf },
}

// ============================================================================
// PER-FILE LOCKS
// ============================================================================

/// Process-wide table of locks, one per persisted file.
static FILE_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// Normalize a path so `data/x.json` and `./data/x.json` share a lock.
fn lock_key(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

fn file_lock(path: &Path) -> Arc<Mutex<()>> {
    let table = FILE_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
    table
        .entry(lock_key(path))
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Run `op` while holding the lock for `path`.
///
/// The lock only guards the critical section; a panic inside a previous
/// holder does not poison later callers because the protected data lives on
/// disk, not in the mutex.
pub fn with_file_lock<T>(path: &Path, op: impl FnOnce() -> T) -> T {
    let lock = file_lock(path);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    op()
}

// ============================================================================
// READ / WRITE
// ============================================================================

/// SHA-256 of a document's bytes, hex encoded
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Read a file, mapping "not found" to `None`.
pub fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Serialize `value` the way every document in this crate is stored.
pub fn encode_pretty<T: serde::Serialize>(path: &Path, value: &T) -> Result<Vec<u8>, StoreError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write to a sibling temp file, fsync, then rename over `path`.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = File::create(&tmp).map_err(write_err)?;
    file.write_all(data).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    fs::rename(&tmp, path).map_err(write_err)?;
    Ok(())
}

/// Atomically replace `path` with `data`, but only if its current content
/// still has fingerprint `expected` (`None` = the file must not exist).
///
/// Callers hold `with_file_lock(path)`, so a mismatch means a writer outside
/// this process touched the file since we read it.
pub fn write_if_unchanged(
    path: &Path,
    expected: Option<&str>,
    data: &[u8],
) -> Result<String, StoreError> {
    let current = read_bytes(path)?.map(|bytes| fingerprint(&bytes));
    if current.as_deref() != expected {
        return Err(StoreError::Conflict {
            path: path.to_path_buf(),
        });
    }

    atomic_write(path, data)?;
    Ok(fingerprint(data))
}

// ============================================================================
// TESTS
// ============================================================================
