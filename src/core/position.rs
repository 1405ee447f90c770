//! Position ledger.
//!
//! One record per staker. A position is created on stake and destroyed on
//! convert or emergency withdrawal; an owner can never hold two at once.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::tier::Tier;
use crate::error::{Error, Result};
use crate::utils::constants::RECEIPT_UNITS_PER_POSITION;
use crate::utils::crypto::{Address, Hash};
use crate::utils::math::{accrued_yield, safe_add};

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION
// ═══════════════════════════════════════════════════════════════════════════════

/// A staker's open stake record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Staker
    pub owner: Address,
    /// Tier chosen at stake time
    pub tier: Tier,
    /// Receipt units represented (always exactly one)
    pub unit_amount: u64,
    /// Stake timestamp
    pub start_time: u64,
    /// `start_time` + tier lock duration
    pub unlock_time: u64,
    /// Net value credited to the treasury for this stake
    pub deposited_amount: u64,
    /// Yield as of the last recomputation
    pub accrued_yield: u64,
}

impl Position {
    /// Create a position starting at `start_time`
    pub fn new(owner: Address, tier: Tier, deposited_amount: u64, start_time: u64) -> Result<Self> {
        let unlock_time = safe_add(start_time, tier.lock_duration())?;
        Ok(Self {
            owner,
            tier,
            unit_amount: RECEIPT_UNITS_PER_POSITION,
            start_time,
            unlock_time,
            deposited_amount,
            accrued_yield: 0,
        })
    }

    /// Whether the lock has expired at `now`
    pub fn is_unlocked(&self, now: u64) -> bool {
        now >= self.unlock_time
    }

    /// max(0, unlock_time - now)
    pub fn remaining_lock(&self, now: u64) -> u64 {
        self.unlock_time.saturating_sub(now)
    }

    /// Seconds since the stake
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.start_time)
    }

    /// Yield earned by this position at `now` for the given base rate
    pub fn yield_at(&self, now: u64, base_rate_bps: u64) -> Result<u64> {
        accrued_yield(
            self.deposited_amount,
            base_rate_bps,
            self.tier.multiplier_bps(),
            self.elapsed(now),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Table of open positions keyed by owner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionLedger {
    /// Open positions
    positions: HashMap<Address, Position>,
    /// Positions ever opened
    total_opened: u64,
    /// Positions ever closed
    total_closed: u64,
}

impl PositionLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a position for `owner`
    pub fn open(
        &mut self,
        owner: Address,
        tier: Tier,
        deposited_amount: u64,
        now: u64,
    ) -> Result<&Position> {
        if self.positions.contains_key(&owner) {
            return Err(Error::DuplicatePosition(owner.to_hex()));
        }

        let position = Position::new(owner, tier, deposited_amount, now)?;
        self.total_opened += 1;
        Ok(self.positions.entry(owner).or_insert(position))
    }

    /// Remove and return the owner's position
    pub fn close(&mut self, owner: &Address) -> Result<Position> {
        let position = self
            .positions
            .remove(owner)
            .ok_or_else(|| Error::NoPosition(owner.to_hex()))?;
        self.total_closed += 1;
        Ok(position)
    }

    /// Recompute the stored yield for an open position
    pub fn accrue(&mut self, owner: &Address, now: u64, base_rate_bps: u64) -> Result<u64> {
        let position = self
            .positions
            .get_mut(owner)
            .ok_or_else(|| Error::NoPosition(owner.to_hex()))?;
        position.accrued_yield = position.yield_at(now, base_rate_bps)?;
        Ok(position.accrued_yield)
    }

    /// Seconds until the owner's position unlocks
    pub fn remaining_lock(&self, owner: &Address, now: u64) -> Result<u64> {
        self.get(owner)
            .map(|p| p.remaining_lock(now))
            .ok_or_else(|| Error::NoPosition(owner.to_hex()))
    }

    /// Get an open position
    pub fn get(&self, owner: &Address) -> Option<&Position> {
        self.positions.get(owner)
    }

    /// Whether the owner has an open position
    pub fn contains(&self, owner: &Address) -> bool {
        self.positions.contains_key(owner)
    }

    /// Number of open positions
    pub fn open_count(&self) -> u64 {
        self.positions.len() as u64
    }

    /// Positions ever opened
    pub fn total_opened(&self) -> u64 {
        self.total_opened
    }

    /// Positions ever closed
    pub fn total_closed(&self) -> u64 {
        self.total_closed
    }

    /// Iterate open positions
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Sum of deposited amounts across open positions
    pub fn total_deposited(&self) -> u64 {
        self.positions
            .values()
            .fold(0u64, |acc, p| acc.saturating_add(p.deposited_amount))
    }

    /// opened - closed must equal the open count
    pub fn verify_invariant(&self) -> bool {
        self.total_opened.saturating_sub(self.total_closed) == self.open_count()
            && self.positions.iter().all(|(k, p)| *k == p.owner)
    }

    /// Deterministic hash of the ledger
    pub fn state_hash(&self) -> Hash {
        let mut sorted: Vec<_> = self.positions.values().collect();
        sorted.sort_by_key(|p| p.owner);

        let mut data = Vec::new();
        data.extend_from_slice(&self.total_opened.to_be_bytes());
        data.extend_from_slice(&self.total_closed.to_be_bytes());
        for p in sorted {
            data.extend_from_slice(p.owner.as_bytes());
            data.extend_from_slice(p.tier.name().as_bytes());
            data.extend_from_slice(&p.start_time.to_be_bytes());
            data.extend_from_slice(&p.unlock_time.to_be_bytes());
            data.extend_from_slice(&p.deposited_amount.to_be_bytes());
        }
        Hash::sha256(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::{SECS_PER_DAY, SECS_PER_YEAR};

    fn alice() -> Address {
        Address::from_label("alice")
    }

    #[test]
    fn test_open_sets_unlock_from_tier() {
        let mut ledger = PositionLedger::new();
        for (i, tier) in Tier::ALL.iter().enumerate() {
            let owner = Address::from_label(&format!("owner-{}", i));
            let p = ledger.open(owner, *tier, 1_000, 5_000).unwrap();
            assert_eq!(p.unlock_time - p.start_time, tier.lock_duration());
            assert_eq!(p.unit_amount, 1);
        }
        assert_eq!(ledger.open_count(), 3);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut ledger = PositionLedger::new();
        ledger.open(alice(), Tier::Standard, 1_000, 0).unwrap();
        let err = ledger.open(alice(), Tier::Elite, 5_000, 10).unwrap_err();
        assert!(matches!(err, Error::DuplicatePosition(_)));
        // Original untouched
        assert_eq!(ledger.get(&alice()).unwrap().tier, Tier::Standard);
        assert_eq!(ledger.total_opened(), 1);
    }

    #[test]
    fn test_close() {
        let mut ledger = PositionLedger::new();
        ledger.open(alice(), Tier::Premium, 1_000, 0).unwrap();
        let snapshot = ledger.close(&alice()).unwrap();
        assert_eq!(snapshot.tier, Tier::Premium);
        assert!(!ledger.contains(&alice()));
        assert!(matches!(ledger.close(&alice()), Err(Error::NoPosition(_))));
        assert!(ledger.verify_invariant());
    }

    #[test]
    fn test_remaining_lock() {
        let mut ledger = PositionLedger::new();
        ledger.open(alice(), Tier::Standard, 1_000, 100).unwrap();
        let lock = Tier::Standard.lock_duration();
        assert_eq!(ledger.remaining_lock(&alice(), 100).unwrap(), lock);
        assert_eq!(ledger.remaining_lock(&alice(), 100 + lock - 1).unwrap(), 1);
        assert_eq!(ledger.remaining_lock(&alice(), 100 + lock).unwrap(), 0);
        assert_eq!(ledger.remaining_lock(&alice(), u64::MAX).unwrap(), 0);
        assert!(ledger.remaining_lock(&Address::from_label("bob"), 0).is_err());
    }

    #[test]
    fn test_accrue() {
        let mut ledger = PositionLedger::new();
        ledger.open(alice(), Tier::Elite, 1_000_000, 0).unwrap();
        let y = ledger.accrue(&alice(), SECS_PER_YEAR, 500).unwrap();
        assert_eq!(y, 65_000);
        assert_eq!(ledger.get(&alice()).unwrap().accrued_yield, 65_000);

        let half = ledger.accrue(&alice(), 0, 500).unwrap();
        assert_eq!(half, 0);
    }

    #[test]
    fn test_unlock_boundary() {
        let p = Position::new(alice(), Tier::Standard, 1, 0).unwrap();
        assert!(!p.is_unlocked(150 * SECS_PER_DAY - 1));
        assert!(p.is_unlocked(150 * SECS_PER_DAY));
    }

    #[test]
    fn test_unlock_overflow_rejected() {
        assert!(Position::new(alice(), Tier::Elite, 1, u64::MAX).is_err());
    }

    #[test]
    fn test_state_hash_deterministic() {
        let mut a = PositionLedger::new();
        let mut b = PositionLedger::new();
        a.open(alice(), Tier::Standard, 10, 0).unwrap();
        a.open(Address::from_label("bob"), Tier::Elite, 20, 0).unwrap();
        b.open(Address::from_label("bob"), Tier::Elite, 20, 0).unwrap();
        b.open(alice(), Tier::Standard, 10, 0).unwrap();
        assert_eq!(a.state_hash(), b.state_hash());
    }
}
