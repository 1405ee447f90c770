//! Reserve attestation data and the feed capability.

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// ATTESTATION
// ═══════════════════════════════════════════════════════════════════════════════

/// A single reading of the external reserve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReserveAttestation {
    /// Whole units held in the reserve vault
    pub total_vaulted_units: u64,
    /// Unix timestamp of the attestation
    pub last_update_timestamp: u64,
    /// Attester's own health flag
    pub healthy: bool,
}

impl ReserveAttestation {
    /// Create a healthy attestation
    pub fn new(total_vaulted_units: u64, last_update_timestamp: u64) -> Self {
        Self {
            total_vaulted_units,
            last_update_timestamp,
            healthy: true,
        }
    }

    /// Age in seconds. Readings from the future count as fresh.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_update_timestamp)
    }

    /// Whether the reading is within `max_age` seconds of `now`
    pub fn is_fresh(&self, now: u64, max_age: u64) -> bool {
        self.age(now) <= max_age
    }

    /// Healthy flag set and a non-zero reserve
    pub fn is_positive(&self) -> bool {
        self.healthy && self.total_vaulted_units > 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEED CAPABILITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of reserve attestations.
///
/// Implementations read from the attester on every call; the engine never
/// caches a reading across operations.
pub trait ReserveFeed: Send + Sync {
    /// Last attested reserve quantity
    fn total_vaulted_units(&self) -> Result<u64>;

    /// Timestamp of the last attestation
    fn last_update_timestamp(&self) -> Result<u64>;

    /// Attester health flag
    fn is_healthy(&self) -> Result<bool>;

    /// Read all three fields
    fn read(&self) -> Result<ReserveAttestation> {
        Ok(ReserveAttestation {
            total_vaulted_units: self.total_vaulted_units()?,
            last_update_timestamp: self.last_update_timestamp()?,
            healthy: self.is_healthy()?,
        })
    }
}
