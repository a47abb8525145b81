//! Durable key/value storage
//!
//! A small JSON document on disk holding the client state that must survive
//! restarts. Every write replaces the whole file through a temp file and a
//! rename, so readers never observe a half-written document.
//!
//! The file is created with `0600` permissions on unix since it may hold a
//! bearer token.

use crate::storage::error::{StorageError, StorageResult};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File name of the durable storage document
pub const STORAGE_FILE: &str = "local_storage.json";

/// File-backed key/value store shared by every view context
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    lock: Arc<Mutex<()>>,
}

impl LocalStorage {
    /// Open storage rooted at `dir`. The directory is created lazily on first write.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(STORAGE_FILE),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a single key
    pub fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_map()?.remove(key))
    }

    /// Read a string key, ignoring values of other types
    pub fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(match self.get(key)? {
            Some(Value::String(s)) => Some(s),
            _ => None,
        })
    }

    /// Write a single key
    pub fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value);
        self.write_map(&map)
    }

    /// Remove a key. Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map()?;
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.write_map(&map)
    }

    fn read_map(&self) -> StorageResult<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StorageError::Corrupt {
                path: self.path.clone(),
                error: "top-level value is not an object".to_string(),
            }),
            Err(e) => Err(StorageError::Corrupt {
                path: self.path.clone(),
                error: e.to_string(),
            }),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> StorageResult<()> {
        let io_err = |source: std::io::Error| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let contents = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp).map_err(io_err)?;
        file.write_all(contents.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}
