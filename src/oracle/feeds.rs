//! Reserve feed implementations.
//!
//! - [`ManualReserveFeed`]: operator-updated reading held in memory, with
//!   failure injection for tests
//! - [`FileReserveFeed`]: JSON attestation file read on every call

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::oracle::attestation::{ReserveAttestation, ReserveFeed};

// ═══════════════════════════════════════════════════════════════════════════════
// MANUAL FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory feed updated by an operator
#[derive(Debug, Default)]
pub struct ManualReserveFeed {
    current: RwLock<ReserveAttestation>,
    faulted: AtomicBool,
}

impl ManualReserveFeed {
    /// Create a feed with an initial reading
    pub fn new(initial: ReserveAttestation) -> Self {
        Self {
            current: RwLock::new(initial),
            faulted: AtomicBool::new(false),
        }
    }

    /// Record a new healthy reading
    pub fn update(&self, total_vaulted_units: u64, timestamp: u64) -> Result<()> {
        self.set(ReserveAttestation::new(total_vaulted_units, timestamp))
    }

    /// Replace the reading
    pub fn set(&self, attestation: ReserveAttestation) -> Result<()> {
        let mut current = self.current.write().map_err(|_| Error::Lock)?;
        *current = attestation;
        Ok(())
    }

    /// Toggle the attester's health flag
    pub fn set_healthy(&self, healthy: bool) -> Result<()> {
        let mut current = self.current.write().map_err(|_| Error::Lock)?;
        current.healthy = healthy;
        Ok(())
    }

    /// Make every read fail until cleared
    pub fn fault(&self, faulted: bool) {
        self.faulted.store(faulted, Ordering::SeqCst);
    }

    /// Current reading, ignoring faults
    pub fn current(&self) -> Result<ReserveAttestation> {
        self.current.read().map(|a| *a).map_err(|_| Error::Lock)
    }

    fn reading(&self) -> Result<ReserveAttestation> {
        if self.faulted.load(Ordering::SeqCst) {
            return Err(Error::OracleReadFailed("reserve feed unavailable".into()));
        }
        self.current()
    }
}

impl ReserveFeed for ManualReserveFeed {
    fn total_vaulted_units(&self) -> Result<u64> {
        Ok(self.reading()?.total_vaulted_units)
    }

    fn last_update_timestamp(&self) -> Result<u64> {
        Ok(self.reading()?.last_update_timestamp)
    }

    fn is_healthy(&self) -> Result<bool> {
        Ok(self.reading()?.healthy)
    }

    fn read(&self) -> Result<ReserveAttestation> {
        self.reading()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// Feed backed by a JSON attestation file written by an external attester
#[derive(Debug, Clone)]
pub struct FileReserveFeed {
    path: PathBuf,
}

impl FileReserveFeed {
    /// Read attestations from `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Attestation file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an attestation to `path` (used by the local attester command)
    pub fn publish(path: &Path, attestation: &ReserveAttestation) -> Result<()> {
        let json = serde_json::to_string_pretty(attestation)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| Error::Storage(e.to_string()))
    }
}

impl ReserveFeed for FileReserveFeed {
    fn total_vaulted_units(&self) -> Result<u64> {
        Ok(self.read()?.total_vaulted_units)
    }

    fn last_update_timestamp(&self) -> Result<u64> {
        Ok(self.read()?.last_update_timestamp)
    }

    fn is_healthy(&self) -> Result<bool> {
        Ok(self.read()?.healthy)
    }

    fn read(&self) -> Result<ReserveAttestation> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::OracleReadFailed(format!("{}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| Error::OracleReadFailed(e.to_string()))
    }
}
