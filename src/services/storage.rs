//! Flat key-value storage for persisted JSON blobs

use std::{
    collections::HashMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// String-keyed storage holding JSON-encoded values
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value for a key, `None` if never written
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the raw value for a key
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a key; deleting a missing key is not an error
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Decode the JSON value stored under `key`
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StorageResult<Option<T>> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Json {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Encode `value` as JSON and store it under `key`
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Json {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}

/// In-process storage, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.values().remove(key);
        Ok(())
    }
}

/// Directory-backed storage with one `<key>.json` file per key
///
/// Writes go through a temporary file in the same directory followed by a
/// rename, so a crash never leaves a half-written value behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a storage directory
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        debug!("Opened file store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        let mut temp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        temp.write_all(value.as_bytes()).map_err(io_err)?;
        temp.flush().map_err(io_err)?;
        temp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}
