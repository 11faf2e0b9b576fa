// 📜 Response Log - append-only JSON journal of decisions
// The whole array is rewritten atomically on every append.

use crate::persist::{self, StoreError};
use crate::questionnaire::Decision;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Entries are looked up by this key (the questionnaire identifier)
pub trait JournalEntry: Serialize + DeserializeOwned {
    fn key(&self) -> &str;
}

impl JournalEntry for Decision {
    fn key(&self) -> &str {
        &self.questionnaire_id
    }
}

/// Ordered, append-only collection of entries stored as a JSON array.
///
/// Entries are never edited or removed. A missing or corrupt file reads as
/// an empty journal; the next append replaces it with a well-formed one.
#[derive(Debug, Clone)]
pub struct Journal<T> {
    path: PathBuf,
    _entry: PhantomData<T>,
}

/// Decisions, one per reviewed questionnaire
pub type ResponseLog = Journal<Decision>;

impl<T: JournalEntry> Journal<T> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Journal {
            path: path.as_ref().to_path_buf(),
            _entry: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(entry).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source,
        })?;

        persist::with_file_lock(&self.path, || {
            let bytes = persist::read_bytes(&self.path)?;
            let current = bytes.as_deref().map(persist::fingerprint);

            // Keep existing entries as raw JSON so nothing written by another
            // version of the tool is dropped on rewrite
            let mut entries: Vec<serde_json::Value> = match bytes.as_deref() {
                None => Vec::new(),
                Some(b) if b.iter().all(u8::is_ascii_whitespace) => Vec::new(),
                Some(b) => serde_json::from_slice(b).unwrap_or_else(|e| {
                    warn!(path = %self.path.display(), error = %e, "log is corrupt, starting a new one");
                    Vec::new()
                }),
            };
            entries.push(value);

            let data = persist::encode_pretty(&self.path, &entries)?;
            persist::write_if_unchanged(&self.path, current.as_deref(), &data)?;
            Ok(())
        })
    }

    /// All entries in append order. Entries that no longer decode as `T`
    /// are skipped.
    pub fn entries(&self) -> Result<Vec<T>, StoreError> {
        let Some(bytes) = persist::read_bytes(&self.path)? else {
            return Ok(Vec::new());
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let raw: Vec<serde_json::Value> = match serde_json::from_slice(&bytes) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "log is corrupt, reading as empty");
                return Ok(Vec::new());
            }
        };

        Ok(raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "skipping unreadable log entry");
                    None
                }
            })
            .collect())
    }

    /// Entries recorded under `key`, oldest first
    pub fn find(&self, key: &str) -> Result<Vec<T>, StoreError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|entry| entry.key() == key)
            .collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}
