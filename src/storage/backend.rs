//! Storage backend implementations.
//!
//! - [`InMemoryStore`]: ephemeral, for tests
//! - [`FileStore`]: single JSON file with hex-encoded keys and values,
//!   rewritten atomically on flush

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Key type for storage operations
pub type StorageKey = Vec<u8>;

/// Value type for storage operations
pub type StorageValue = Vec<u8>;

/// Trait for storage backends
pub trait StorageBackend: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>>;

    /// Set a value for a key
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// List all keys with a given prefix, sorted
    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>>;

    /// Flush any pending writes to persistent storage
    fn flush(&self) -> Result<()>;
}

type Table = BTreeMap<StorageKey, StorageValue>;

fn read(table: &RwLock<Table>) -> Result<RwLockReadGuard<'_, Table>> {
    table.read().map_err(|_| Error::Lock)
}

fn write(table: &RwLock<Table>) -> Result<RwLockWriteGuard<'_, Table>> {
    table.write().map_err(|_| Error::Lock)
}

fn keys_with_prefix(table: &Table, prefix: &[u8]) -> Vec<StorageKey> {
    table
        .range(prefix.to_vec()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, _)| k.clone())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory storage backend (for testing and ephemeral use)
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<Table>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        Ok(read(&self.data)?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        write(&self.data)?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        Ok(write(&self.data)?.remove(key).is_some())
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        Ok(keys_with_prefix(&*read(&self.data)?, prefix))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE-BASED STORE
// ═══════════════════════════════════════════════════════════════════════════════

const DATA_FILE: &str = "store.json";

/// File-based storage backend.
///
/// Reads are served from an in-memory table loaded at open. `flush` writes the
/// whole table to a temporary file and renames it over the data file.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    data: RwLock<Table>,
    dirty: RwLock<bool>,
}

impl FileStore {
    /// Open (or create) a store in `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Storage(format!("create {}: {}", dir.display(), e)))?;

        let data = Self::load(&dir.join(DATA_FILE))?;
        Ok(Self {
            dir,
            data: RwLock::new(data),
            dirty: RwLock::new(false),
        })
    }

    /// Directory holding the data file
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load(path: &Path) -> Result<Table> {
        if !path.exists() {
            return Ok(Table::new());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("read {}: {}", path.display(), e)))?;
        let encoded: BTreeMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| Error::Deserialization(format!("{}: {}", path.display(), e)))?;

        encoded
            .into_iter()
            .map(|(k, v)| {
                let key = hex::decode(&k).map_err(|e| Error::Deserialization(e.to_string()))?;
                let value = hex::decode(&v).map_err(|e| Error::Deserialization(e.to_string()))?;
                Ok((key, value))
            })
            .collect()
    }

    fn mark_dirty(&self) -> Result<()> {
        *self.dirty.write().map_err(|_| Error::Lock)? = true;
        Ok(())
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        Ok(read(&self.data)?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        write(&self.data)?.insert(key.to_vec(), value.to_vec());
        self.mark_dirty()
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let existed = write(&self.data)?.remove(key).is_some();
        if existed {
            self.mark_dirty()?;
        }
        Ok(existed)
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        Ok(keys_with_prefix(&*read(&self.data)?, prefix))
    }

    fn flush(&self) -> Result<()> {
        let mut dirty = self.dirty.write().map_err(|_| Error::Lock)?;
        if !*dirty {
            return Ok(());
        }

        let encoded: BTreeMap<String, String> = read(&self.data)?
            .iter()
            .map(|(k, v)| (hex::encode(k), hex::encode(v)))
            .collect();
        let json = serde_json::to_string_pretty(&encoded)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let path = self.dir.join(DATA_FILE);
        let tmp = self.dir.join(format!("{}.tmp", DATA_FILE));
        fs::write(&tmp, json).map_err(|e| Error::Storage(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| Error::Storage(format!("rename to {}: {}", path.display(), e)))?;

        *dirty = false;
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("Failed to flush {} on drop: {}", self.dir.display(), e);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPED STORE WRAPPER
// ═══════════════════════════════════════════════════════════════════════════════

/// Bincode-typed wrapper around a storage backend
#[derive(Debug)]
pub struct TypedStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> TypedStore<B> {
    /// Create a new typed store
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get a typed value
    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        self.backend
            .get(key)?
            .map(|data| {
                bincode::deserialize(&data).map_err(|e| Error::Deserialization(e.to_string()))
            })
            .transpose()
    }

    /// Set a typed value
    pub fn set<T: Serialize>(&self, key: &[u8], value: &T) -> Result<()> {
        let data = bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.backend.set(key, &data)
    }

    /// Delete a value
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.backend.delete(key)
    }

    /// Check if a key exists
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.backend.exists(key)
    }

    /// List keys with prefix
    pub fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        self.backend.list_prefix(prefix)
    }

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    /// Get the underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PREFIXES
// ═══════════════════════════════════════════════════════════════════════════════

/// Key prefixes for different data types
pub mod prefixes {
    /// Engine snapshot prefix
    pub const ENGINE: &[u8] = b"eng:";
    /// Collaborator state prefix
    pub const COLLABORATOR: &[u8] = b"col:";
    /// Save metadata prefix
    pub const META: &[u8] = b"meta:";
}

/// Create a key with a prefix
pub fn make_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    [prefix, key].concat()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
