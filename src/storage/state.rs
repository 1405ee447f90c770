//! Engine state persistence.
//!
//! Saves the engine snapshot together with a small metadata record holding the
//! snapshot's state hash, and checks that hash on load.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::engine::EngineSnapshot;
use crate::storage::backend::{make_key, prefixes, StorageBackend, TypedStore};
use crate::utils::crypto::Hash;

/// Current on-disk layout version
pub const STATE_VERSION: u32 = 1;

// ═══════════════════════════════════════════════════════════════════════════════
// SAVE RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// Metadata written alongside every engine snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRecord {
    /// Layout version
    pub version: u32,
    /// Hash of the saved snapshot
    pub state_hash: Hash,
    /// Unix time of the save
    pub saved_at: u64,
    /// Open positions at save time
    pub open_positions: u64,
    /// Events ever appended at save time
    pub total_events: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Persists engine snapshots and named collaborator records
#[derive(Debug)]
pub struct StateStore<B: StorageBackend> {
    store: TypedStore<B>,
}

impl<B: StorageBackend> StateStore<B> {
    /// Create a state store
    pub fn new(backend: B) -> Self {
        Self {
            store: TypedStore::new(backend),
        }
    }

    fn engine_key() -> Vec<u8> {
        make_key(prefixes::ENGINE, b"snapshot")
    }

    fn meta_key() -> Vec<u8> {
        make_key(prefixes::META, b"last_save")
    }

    /// Whether an engine snapshot has been saved
    pub fn is_initialized(&self) -> Result<bool> {
        self.store.exists(&Self::engine_key())
    }

    /// Save the engine snapshot and flush
    pub fn save_engine(&self, snapshot: &EngineSnapshot, saved_at: u64) -> Result<SaveRecord> {
        let record = SaveRecord {
            version: STATE_VERSION,
            state_hash: snapshot.state_hash(),
            saved_at,
            open_positions: snapshot.positions.open_count(),
            total_events: snapshot.events.len() as u64,
        };
        self.store.set(&Self::engine_key(), snapshot)?;
        self.store.set(&Self::meta_key(), &record)?;
        self.store.flush()?;

        tracing::debug!("Saved engine state {} at {}", record.state_hash, saved_at);
        Ok(record)
    }

    /// Load the engine snapshot, verifying it against the last save record
    pub fn load_engine(&self) -> Result<Option<EngineSnapshot>> {
        let snapshot: Option<EngineSnapshot> = self.store.get(&Self::engine_key())?;
        let Some(snapshot) = snapshot else {
            return Ok(None);
        };

        if let Some(record) = self.last_save()? {
            if record.version != STATE_VERSION {
                return Err(Error::Deserialization(format!(
                    "unsupported state version {}",
                    record.version
                )));
            }
            let actual = snapshot.state_hash();
            if actual != record.state_hash {
                return Err(Error::InvariantViolation(format!(
                    "stored state hash {} does not match contents {}",
                    record.state_hash, actual
                )));
            }
        }
        Ok(Some(snapshot))
    }

    /// Metadata from the last save
    pub fn last_save(&self) -> Result<Option<SaveRecord>> {
        self.store.get(&Self::meta_key())
    }

    /// Save a named collaborator record (balances of a local deployment)
    pub fn save_record<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        self.store
            .set(&make_key(prefixes::COLLABORATOR, name.as_bytes()), value)
    }

    /// Load a named collaborator record
    pub fn load_record<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.store
            .get(&make_key(prefixes::COLLABORATOR, name.as_bytes()))
    }

    /// Names of all saved collaborator records
    pub fn record_names(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .list_prefix(prefixes::COLLABORATOR)?
            .into_iter()
            .map(|k| String::from_utf8_lossy(&k[prefixes::COLLABORATOR.len()..]).into_owned())
            .collect())
    }

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    /// Underlying backend
    pub fn backend(&self) -> &B {
        self.store.backend()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
