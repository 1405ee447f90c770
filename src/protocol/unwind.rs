//! Journal of external effects applied during one operation.
//!
//! Ledger mutations are made on a staged copy and simply dropped on failure.
//! Effects on external collaborators cannot be dropped, so every one that
//! succeeds is recorded here and reversed, newest first, if the operation
//! fails later on.

use std::sync::Mutex;

use crate::error::Result;
use crate::integration::capabilities::{ReceiptToken, ValueTransfer};
use crate::utils::crypto::Address;

/// A reversible external effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Effect {
    /// Value pulled into custody
    PulledValue { from: Address, amount: u64 },
    /// Value pushed out of custody
    PushedValue { to: Address, amount: u64 },
    /// Receipt units issued
    MintedReceipt { to: Address, units: u64 },
    /// Receipt units burned
    BurnedReceipt { from: Address, units: u64 },
}

/// Records effects as they are applied and can reverse them
pub(crate) struct Journal<'a> {
    value: &'a dyn ValueTransfer,
    receipt: &'a dyn ReceiptToken,
    burner: Address,
    applied: Mutex<Vec<Effect>>,
}

impl<'a> Journal<'a> {
    pub(crate) fn new(
        value: &'a dyn ValueTransfer,
        receipt: &'a dyn ReceiptToken,
        burner: Address,
    ) -> Self {
        Self {
            value,
            receipt,
            burner,
            applied: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, effect: Effect) {
        self.applied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(effect);
    }

    /// Issue receipt units
    pub(crate) fn mint_receipt(&self, to: &Address, units: u64) -> Result<()> {
        self.receipt.mint(to, units)?;
        self.record(Effect::MintedReceipt { to: *to, units });
        Ok(())
    }

    /// Burn receipt units with the engine's burn privilege
    pub(crate) fn burn_receipt(&self, from: &Address, units: u64) -> Result<()> {
        self.receipt.burn_from(&self.burner, from, units)?;
        self.record(Effect::BurnedReceipt { from: *from, units });
        Ok(())
    }

    /// Number of effects applied so far
    pub(crate) fn len(&self) -> usize {
        self.applied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Reverse every applied effect, newest first. Returns the number of
    /// compensations that failed.
    pub(crate) fn rollback(self) -> usize {
        let applied = self
            .applied
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut failures = 0;
        for effect in applied.into_iter().rev() {
            let outcome = match effect {
                Effect::PulledValue { from, amount } => self.value.transfer_out(&from, amount),
                Effect::PushedValue { to, amount } => self.value.transfer_in(&to, amount),
                Effect::MintedReceipt { to, units } => {
                    self.receipt.burn_from(&self.burner, &to, units)
                }
                Effect::BurnedReceipt { from, units } => self.receipt.mint(&from, units),
            };
            if let Err(e) = outcome {
                failures += 1;
                tracing::error!("Failed to reverse {:?}: {}", effect, e);
            }
        }
        failures
    }
}

/// The treasury moves value through the journal so its transfers are recorded
impl ValueTransfer for Journal<'_> {
    fn transfer_in(&self, from: &Address, amount: u64) -> Result<()> {
        self.value.transfer_in(from, amount)?;
        self.record(Effect::PulledValue { from: *from, amount });
        Ok(())
    }

    fn transfer_out(&self, to: &Address, amount: u64) -> Result<()> {
        self.value.transfer_out(to, amount)?;
        self.record(Effect::PushedValue { to: *to, amount });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::memory::{InMemoryReceiptToken, InMemoryValueLedger};

    #[test]
    fn test_rollback_reverses_in_order() {
        let engine = Address::from_label("engine");
        let alice = Address::from_label("alice");
        let value = InMemoryValueLedger::new(Address::from_label("custody"));
        let receipt = InMemoryReceiptToken::new([engine]);
        value.fund(&alice, 100).unwrap();

        let journal = Journal::new(&value, &receipt, engine);
        journal.transfer_in(&alice, 60).unwrap();
        journal.mint_receipt(&alice, 1).unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(value.balance_of(&alice), 40);
        assert_eq!(receipt.balance_of(&alice), 1);

        assert_eq!(journal.rollback(), 0);
        assert_eq!(value.balance_of(&alice), 100);
        assert_eq!(receipt.balance_of(&alice), 0);
        assert_eq!(value.custody_balance(), 0);
    }

    #[test]
    fn test_failed_effect_not_recorded() {
        let engine = Address::from_label("engine");
        let alice = Address::from_label("alice");
        let value = InMemoryValueLedger::new(Address::from_label("custody"));
        let receipt = InMemoryReceiptToken::new([engine]);

        let journal = Journal::new(&value, &receipt, engine);
        // Alice has nothing to pull
        assert!(journal.transfer_in(&alice, 10).is_err());
        assert_eq!(journal.len(), 0);
    }

    #[test]
    fn test_burn_reversed_by_mint() {
        let engine = Address::from_label("engine");
        let alice = Address::from_label("alice");
        let value = InMemoryValueLedger::new(Address::from_label("custody"));
        let receipt = InMemoryReceiptToken::new([engine]);
        receipt.mint(&alice, 1).unwrap();

        let journal = Journal::new(&value, &receipt, engine);
        journal.burn_receipt(&alice, 1).unwrap();
        assert_eq!(receipt.total_supply(), 0);

        journal.rollback();
        assert_eq!(receipt.balance_of(&alice), 1);
    }
}
