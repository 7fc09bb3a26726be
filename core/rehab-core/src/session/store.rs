//! Durable key-value storage for the session slot.
//!
//! The tracker only needs three operations on a string-keyed store, so the
//! backends stay small:
//!
//! - [`FileStorage`]: one `<key>.json` file per key under a root directory
//! - [`MemoryStorage`]: shared in-process map for tests and embedding
//!
//! # Atomic Writes
//!
//! `FileStorage` uses temp file + rename so a crash mid-write never leaves a
//! half-written record behind. A partial record would be rejected by the
//! sanitizer anyway, but it would cost the user their session.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use fs_err as fs;
use tempfile::NamedTempFile;

use crate::error::{RehabError, Result};

pub trait SessionStorage {
    /// Returns `Ok(None)` when nothing is stored under `key`.
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Keys map straight to file names, so they must not escape the root.
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RehabError::InvalidStorageKey(key.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// File-backed storage
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl SessionStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            // Empty file is treated as nothing stored
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(RehabError::io("Failed to read storage file", err)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let parent_dir = path
            .parent()
            .ok_or_else(|| RehabError::NoParentDir(path.clone()))?;
        fs::create_dir_all(parent_dir)
            .map_err(|e| RehabError::io("Failed to create storage dir", e))?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|e| RehabError::io("Temp file error", e))?;
        temp_file
            .write_all(value.as_bytes())
            .map_err(|e| RehabError::io("Failed to write temp storage file", e))?;
        temp_file
            .flush()
            .map_err(|e| RehabError::io("Failed to flush temp storage file", e))?;
        temp_file
            .persist(&path)
            .map_err(|e| RehabError::io("Failed to persist storage file", e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RehabError::io("Failed to remove storage file", err)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory storage
// ═══════════════════════════════════════════════════════════════════════════════

/// In-process storage. Clones share the same map, so a second tracker built
/// from a clone sees what the first one wrote (a simulated reload).
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.entries().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.entries().remove(key);
        Ok(())
    }
}
