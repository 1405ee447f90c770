//! Treasury ledger.
//!
//! Custodies pooled value on behalf of callers:
//! - Fee skim on deposit, per-caller net credit, pooled totals
//! - Pooled yield deposited by operators and paid out on conversion
//! - Fee withdrawal for the fee collector
//!
//! Every method validates and computes new totals before calling the external
//! transfer, and only mutates state after the transfer succeeds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::config::validate_fee_bps;
use crate::error::{Error, Result};
use crate::integration::capabilities::ValueTransfer;
use crate::utils::crypto::{Address, Hash};
use crate::utils::math::{safe_add, safe_sub, split_fee};

// ═══════════════════════════════════════════════════════════════════════════════
// RECEIPTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    /// Amount pulled from the depositor
    pub gross: u64,
    /// Fee skimmed
    pub fee: u64,
    /// Amount credited
    pub net: u64,
}

/// Read-only view of the treasury totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasurySummary {
    /// Σ per-caller credit
    pub total_staked: u64,
    /// Accrued fees and retained penalties, net of withdrawals
    pub total_fees: u64,
    /// Yield ever deposited
    pub total_yield_generated: u64,
    /// Yield ever paid out
    pub total_yield_paid: u64,
    /// Principal consumed by conversions
    pub total_settled: u64,
    /// Value held in custody
    pub custody_balance: u64,
    /// custody - fees
    pub available_balance: u64,
    /// Current deposit fee
    pub fee_bps: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREASURY LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Pooled custody with per-caller credit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreasuryLedger {
    /// Net credit by caller; accounts persist at zero
    credits: HashMap<Address, u64>,
    total_staked: u64,
    total_fees: u64,
    total_yield_generated: u64,
    total_yield_paid: u64,
    total_settled: u64,
    custody: u64,
    fee_bps: u64,
}

impl TreasuryLedger {
    /// Create a treasury with the given deposit fee
    pub fn new(fee_bps: u64) -> Result<Self> {
        Ok(Self {
            fee_bps: validate_fee_bps(fee_bps)?,
            ..Default::default()
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEPOSIT/WITHDRAW
    // ═══════════════════════════════════════════════════════════════════════════

    /// Pull `gross` from `depositor`, skim the fee, credit the rest to `caller`
    pub fn deposit(
        &mut self,
        transfer: &dyn ValueTransfer,
        depositor: &Address,
        caller: &Address,
        gross: u64,
    ) -> Result<DepositReceipt> {
        if gross == 0 {
            return Err(Error::InvalidAmount("deposit must be positive".into()));
        }

        let (net, fee) = split_fee(gross, self.fee_bps)?;
        let credit = safe_add(self.credit_of(caller), net)?;
        let total_staked = safe_add(self.total_staked, net)?;
        let total_fees = safe_add(self.total_fees, fee)?;
        let custody = safe_add(self.custody, gross)?;

        transfer.transfer_in(depositor, gross)?;

        self.credits.insert(*caller, credit);
        self.total_staked = total_staked;
        self.total_fees = total_fees;
        self.custody = custody;

        Ok(DepositReceipt { gross, fee, net })
    }

    /// Debit `caller`'s credit and push `amount` to `to`
    pub fn withdraw(
        &mut self,
        transfer: &dyn ValueTransfer,
        caller: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidAmount("withdrawal must be positive".into()));
        }

        let available = self.credit_of(caller);
        if available < amount {
            return Err(Error::InsufficientCredit {
                required: amount,
                available,
            });
        }
        self.check_liquidity(amount)?;

        transfer.transfer_out(to, amount)?;

        self.credits.insert(*caller, available - amount);
        self.total_staked -= amount;
        self.custody -= amount;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // YIELD
    // ═══════════════════════════════════════════════════════════════════════════

    /// Pull yield into the pool. Not attributed to any caller.
    pub fn deposit_yield(
        &mut self,
        transfer: &dyn ValueTransfer,
        from: &Address,
        amount: u64,
    ) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidAmount("yield deposit must be positive".into()));
        }
        let generated = safe_add(self.total_yield_generated, amount)?;
        let custody = safe_add(self.custody, amount)?;

        transfer.transfer_in(from, amount)?;

        self.total_yield_generated = generated;
        self.custody = custody;
        Ok(())
    }

    /// Pay `amount` out of the yield pool to `to`. Zero is a no-op.
    pub fn pay_yield(
        &mut self,
        transfer: &dyn ValueTransfer,
        to: &Address,
        amount: u64,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let pool = self.yield_pool();
        if pool < amount {
            return Err(Error::InsufficientYieldPool {
                required: amount,
                available: pool,
            });
        }
        self.check_liquidity(amount)?;

        transfer.transfer_out(to, amount)?;

        self.total_yield_paid += amount;
        self.custody -= amount;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FEES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Push accrued fees out to `to`
    pub fn withdraw_fees(
        &mut self,
        transfer: &dyn ValueTransfer,
        to: &Address,
        amount: u64,
    ) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidAmount("fee withdrawal must be positive".into()));
        }
        if amount > self.total_fees {
            return Err(Error::InsufficientFees {
                required: amount,
                available: self.total_fees,
            });
        }
        if amount > self.custody {
            return Err(Error::InsufficientLiquidity {
                required: amount,
                available: self.custody,
            });
        }

        transfer.transfer_out(to, amount)?;

        self.total_fees -= amount;
        self.custody -= amount;
        Ok(())
    }

    /// Reclassify part of `caller`'s credit as fee (early-exit penalty).
    /// No value leaves custody.
    pub fn retain_as_fee(&mut self, caller: &Address, amount: u64) -> Result<()> {
        let available = self.credit_of(caller);
        let remaining = safe_sub(available, amount).map_err(|_| Error::InsufficientCredit {
            required: amount,
            available,
        })?;
        let total_fees = safe_add(self.total_fees, amount)?;

        self.credits.insert(*caller, remaining);
        self.total_staked -= amount;
        self.total_fees = total_fees;
        Ok(())
    }

    /// Retire part of `caller`'s credit as settled principal. The value stays in
    /// custody backing issued units.
    pub fn settle(&mut self, caller: &Address, amount: u64) -> Result<()> {
        let available = self.credit_of(caller);
        let remaining = safe_sub(available, amount).map_err(|_| Error::InsufficientCredit {
            required: amount,
            available,
        })?;
        let settled = safe_add(self.total_settled, amount)?;

        self.credits.insert(*caller, remaining);
        self.total_staked -= amount;
        self.total_settled = settled;
        Ok(())
    }

    /// Change the deposit fee (≤ 5%)
    pub fn set_fee_bps(&mut self, fee_bps: u64) -> Result<u64> {
        let previous = self.fee_bps;
        self.fee_bps = validate_fee_bps(fee_bps)?;
        Ok(previous)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Net credit held by `caller`
    pub fn credit_of(&self, caller: &Address) -> u64 {
        self.credits.get(caller).copied().unwrap_or(0)
    }

    /// Whether `caller` has ever deposited
    pub fn has_account(&self, caller: &Address) -> bool {
        self.credits.contains_key(caller)
    }

    /// Σ per-caller credit
    pub fn total_staked(&self) -> u64 {
        self.total_staked
    }

    /// Accrued fees
    pub fn total_fees(&self) -> u64 {
        self.total_fees
    }

    /// Yield ever deposited
    pub fn total_yield_generated(&self) -> u64 {
        self.total_yield_generated
    }

    /// Yield not yet paid out
    pub fn yield_pool(&self) -> u64 {
        self.total_yield_generated.saturating_sub(self.total_yield_paid)
    }

    /// Value held in custody
    pub fn custody_balance(&self) -> u64 {
        self.custody
    }

    /// custody - fees
    pub fn available_balance(&self) -> u64 {
        self.custody.saturating_sub(self.total_fees)
    }

    /// Current deposit fee
    pub fn fee_bps(&self) -> u64 {
        self.fee_bps
    }

    /// Totals snapshot
    pub fn summary(&self) -> TreasurySummary {
        TreasurySummary {
            total_staked: self.total_staked,
            total_fees: self.total_fees,
            total_yield_generated: self.total_yield_generated,
            total_yield_paid: self.total_yield_paid,
            total_settled: self.total_settled,
            custody_balance: self.custody,
            available_balance: self.available_balance(),
            fee_bps: self.fee_bps,
        }
    }

    /// Σ credit == total_staked, custody covers fees, and custody equals the sum
    /// of everything it is holding
    pub fn verify_invariant(&self) -> bool {
        let credit_sum = self
            .credits
            .values()
            .try_fold(0u64, |acc, c| acc.checked_add(*c));

        let held = [
            self.total_staked,
            self.total_fees,
            self.yield_pool(),
            self.total_settled,
        ]
        .iter()
        .try_fold(0u64, |acc, v| acc.checked_add(*v));

        credit_sum == Some(self.total_staked)
            && self.custody >= self.total_fees
            && held == Some(self.custody)
    }

    /// Deterministic hash of the ledger
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        for v in [
            self.total_staked,
            self.total_fees,
            self.total_yield_generated,
            self.total_yield_paid,
            self.total_settled,
            self.custody,
            self.fee_bps,
        ] {
            data.extend_from_slice(&v.to_be_bytes());
        }

        let mut sorted: Vec<_> = self.credits.iter().collect();
        sorted.sort_by_key(|(k, _)| **k);
        for (caller, credit) in sorted {
            data.extend_from_slice(caller.as_bytes());
            data.extend_from_slice(&credit.to_be_bytes());
        }

        Hash::sha256(&data)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Outgoing transfers may not touch the fee balance
    fn check_liquidity(&self, amount: u64) -> Result<()> {
        let available = self.available_balance();
        if available < amount {
            return Err(Error::InsufficientLiquidity {
                required: amount,
                available,
            });
        }
        Ok(())
    }
}
