//! Redemption protocol - core orchestration engine.
//!
//! Composes the treasury, the position ledger and the coverage gate into three
//! user transitions:
//!
//! ```text
//! NONE --stake--> OPEN --convert-----------> NONE
//!                  |
//!                  +--emergency_withdraw---> NONE
//! ```
//!
//! All ledger state sits behind one mutex held for the whole operation. Each
//! operation mutates a staged copy that replaces the committed state only on
//! success; external effects are journaled and reversed on failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::auth::{Action, AuthorizationPolicy};
use crate::core::config::{
    validate_coverage_bps, validate_penalty_bps, validate_staleness_secs, EngineParams,
    YieldShortfallPolicy,
};
use crate::core::position::{Position, PositionLedger};
use crate::core::tier::Tier;
use crate::core::treasury::{TreasuryLedger, TreasurySummary};
use crate::error::{Error, Result};
use crate::integration::capabilities::{BackedAsset, ReceiptToken, ValueTransfer};
use crate::oracle::attestation::ReserveFeed;
use crate::oracle::gate::CoverageGate;
use crate::protocol::events::*;
use crate::protocol::operations::*;
use crate::protocol::unwind::Journal;
use crate::utils::constants::{BACKED_UNITS_PER_CONVERSION, RECEIPT_UNITS_PER_POSITION};
use crate::utils::crypto::{Address, Hash};
use crate::utils::math::{calculate_fee_bps, coverage_ratio_bps, safe_sub};
use crate::utils::time::Clock;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLABORATORS
// ═══════════════════════════════════════════════════════════════════════════════

/// External capabilities the engine is wired to
#[derive(Clone)]
pub struct Collaborators {
    /// Staked value asset
    pub value: Arc<dyn ValueTransfer>,
    /// Reserve-backed asset issued on conversion
    pub backed: Arc<dyn BackedAsset>,
    /// Non-transferable position receipt
    pub receipt: Arc<dyn ReceiptToken>,
    /// Reserve attestation feed
    pub feed: Arc<dyn ReserveFeed>,
    /// Authorization policy
    pub auth: Arc<dyn AuthorizationPolicy>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the engine owns, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Treasury ledger
    pub treasury: TreasuryLedger,
    /// Open positions
    pub positions: PositionLedger,
    /// Administrable parameters
    pub params: EngineParams,
    /// Event log
    pub events: EventLog,
}

impl EngineSnapshot {
    /// Fresh state for the given parameters
    pub fn new(params: EngineParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            treasury: TreasuryLedger::new(params.fee_bps)?,
            positions: PositionLedger::new(),
            params,
            events: EventLog::new(),
        })
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Deterministic hash of ledgers and parameters
    pub fn state_hash(&self) -> Hash {
        state_hash(&self.treasury, &self.positions, &self.params, &self.events)
    }
}

fn state_hash(
    treasury: &TreasuryLedger,
    positions: &PositionLedger,
    params: &EngineParams,
    events: &EventLog,
) -> Hash {
    let mut data = Vec::new();
    data.extend_from_slice(treasury.state_hash().as_bytes());
    data.extend_from_slice(positions.state_hash().as_bytes());
    data.extend_from_slice(&bincode::serialize(params).unwrap_or_default());
    data.extend_from_slice(events.head().as_bytes());
    Hash::sha256(&data)
}

/// The part of the state an operation stages and swaps in on success
#[derive(Debug, Clone)]
struct Ledgers {
    treasury: TreasuryLedger,
    positions: PositionLedger,
    params: EngineParams,
}

/// Live engine state. The event log is appended after commit and never staged.
#[derive(Debug)]
struct EngineState {
    ledgers: Ledgers,
    events: EventLog,
}

impl From<EngineSnapshot> for EngineState {
    fn from(snapshot: EngineSnapshot) -> Self {
        Self {
            ledgers: Ledgers {
                treasury: snapshot.treasury,
                positions: snapshot.positions,
                params: snapshot.params,
            },
            events: snapshot.events,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REDEMPTION PROTOCOL
// ═══════════════════════════════════════════════════════════════════════════════

/// The staking and redemption engine
pub struct RedemptionProtocol {
    /// Engine identity: treasury credit account and receipt burner
    address: Address,
    collaborators: Collaborators,
    state: Mutex<EngineState>,
}

impl fmt::Debug for RedemptionProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedemptionProtocol")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl RedemptionProtocol {
    /// Create an engine with empty ledgers
    pub fn new(address: Address, params: EngineParams, collaborators: Collaborators) -> Result<Self> {
        Ok(Self::from_snapshot(address, EngineSnapshot::new(params)?, collaborators))
    }

    /// Resume from persisted state
    pub fn from_snapshot(
        address: Address,
        snapshot: EngineSnapshot,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            address,
            collaborators,
            state: Mutex::new(snapshot.into()),
        }
    }

    /// Engine identity
    pub fn address(&self) -> Address {
        self.address
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineState>> {
        self.state.lock().map_err(|_| Error::Lock)
    }

    fn now(&self) -> u64 {
        self.collaborators.clock.now()
    }

    fn journal(&self) -> Journal<'_> {
        Journal::new(
            self.collaborators.value.as_ref(),
            self.collaborators.receipt.as_ref(),
            self.address,
        )
    }

    fn gate(&self, params: &EngineParams) -> Result<CoverageGate> {
        CoverageGate::new(
            self.collaborators.feed.clone(),
            params.staleness_threshold_secs,
        )
    }

    /// Swap in the staged ledgers and append the event on success; reverse
    /// external effects on failure
    fn finish<T>(
        &self,
        state: &mut EngineState,
        staged: Ledgers,
        journal: Journal<'_>,
        operation: &str,
        result: Result<(T, ProtocolEvent)>,
    ) -> Result<T> {
        match result {
            Ok((value, event)) => {
                state.ledgers = staged;
                state.events.push(event);
                Ok(value)
            }
            Err(e) => {
                let applied = journal.len();
                if applied > 0 {
                    tracing::warn!("{} failed after {} external effects, unwinding: {}", operation, applied, e);
                    let failures = journal.rollback();
                    if failures > 0 {
                        tracing::error!("{} unwind left {} effects unreversed", operation, failures);
                    }
                } else {
                    tracing::debug!("{} rejected: {}", operation, e);
                }
                Err(e)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // USER OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Open a position: pull `gross_amount`, credit it net of fee, issue one
    /// receipt unit.
    pub fn stake(&self, owner: &Address, gross_amount: u64, tier: Tier) -> Result<StakeResult> {
        self.collaborators.auth.authorize(owner, Action::Stake)?;
        if gross_amount == 0 {
            return Err(Error::InvalidAmount("stake must be positive".into()));
        }

        let mut state = self.lock()?;
        if state.ledgers.positions.contains(owner) {
            return Err(Error::DuplicatePosition(owner.to_hex()));
        }
        let now = self.now();

        let mut staged = state.ledgers.clone();
        let journal = self.journal();
        let result = (|| -> Result<(StakeResult, ProtocolEvent)> {
            let receipt = staged
                .treasury
                .deposit(&journal, owner, &self.address, gross_amount)?;
            let position = staged
                .positions
                .open(*owner, tier, receipt.net, now)?
                .clone();
            journal.mint_receipt(owner, RECEIPT_UNITS_PER_POSITION)?;

            let event = ProtocolEvent::Staked(StakedEvent {
                owner: *owner,
                tier,
                gross_amount,
                fee: receipt.fee,
                deposited_amount: receipt.net,
                unlock_time: position.unlock_time,
                timestamp: now,
            });

            let result = StakeResult {
                position,
                gross_amount,
                fee: receipt.fee,
                receipt_units: RECEIPT_UNITS_PER_POSITION,
            };
            Ok((result, event))
        })();

        let result = self.finish(&mut state, staged, journal, "stake", result)?;
        tracing::info!(
            "Staked {} ({} net) for {} in {} tier, unlocks at {}",
            gross_amount,
            result.position.deposited_amount,
            owner.short(),
            tier,
            result.position.unlock_time
        );
        Ok(result)
    }

    /// Convert an unlocked position into one backed unit plus yield
    pub fn convert(&self, owner: &Address) -> Result<ConvertResult> {
        self.collaborators.auth.authorize(owner, Action::Convert)?;

        let mut state = self.lock()?;
        let now = self.now();
        let position = state
            .ledgers.positions
            .get(owner)
            .cloned()
            .ok_or_else(|| Error::NoPosition(owner.to_hex()))?;

        if !position.is_unlocked(now) {
            let remaining_secs = position.remaining_lock(now);
            tracing::debug!("Convert for {} refused, {}s of lock left", owner.short(), remaining_secs);
            return Err(Error::Locked { remaining_secs });
        }

        let gate = self.gate(&state.ledgers.params)?;
        let coverage_bps = state.ledgers.params.coverage_bps;
        let outstanding = self.collaborators.backed.total_issued_whole_units()?;
        gate.check_coverage(now, outstanding, coverage_bps)?;

        let computed_yield = position.yield_at(now, state.ledgers.params.base_yield_rate_bps)?;
        let pool = state.ledgers.treasury.yield_pool();
        let (yield_paid, yield_shortfall) = if computed_yield <= pool {
            (computed_yield, 0)
        } else {
            match state.ledgers.params.yield_shortfall {
                YieldShortfallPolicy::Reject => {
                    return Err(Error::InsufficientYieldPool {
                        required: computed_yield,
                        available: pool,
                    });
                }
                YieldShortfallPolicy::CapToPool => (pool, computed_yield - pool),
            }
        };

        let mut staged = state.ledgers.clone();
        let journal = self.journal();
        let result = (|| -> Result<(ConvertResult, ProtocolEvent)> {
            staged
                .positions
                .accrue(owner, now, staged.params.base_yield_rate_bps)?;
            staged.treasury.pay_yield(&journal, owner, yield_paid)?;
            journal.burn_receipt(owner, position.unit_amount)?;
            staged.treasury.settle(&self.address, position.deposited_amount)?;
            let closed = staged.positions.close(owner)?;

            // Re-read the reserve right before issuing
            let outstanding = self.collaborators.backed.total_issued_whole_units()?;
            let reading = gate.check_coverage(now, outstanding, coverage_bps)?;
            let ratio = coverage_ratio_bps(reading.total_vaulted_units, outstanding);
            self.collaborators
                .backed
                .mint(owner, BACKED_UNITS_PER_CONVERSION)?;

            let event = ProtocolEvent::Converted(ConvertedEvent {
                owner: *owner,
                tier: closed.tier,
                deposited_amount: closed.deposited_amount,
                yield_paid,
                yield_shortfall,
                backed_units: BACKED_UNITS_PER_CONVERSION,
                coverage_ratio_bps: ratio,
                timestamp: now,
            });

            let result = ConvertResult {
                position: closed,
                yield_paid,
                yield_shortfall,
                backed_units: BACKED_UNITS_PER_CONVERSION,
                coverage_ratio_bps: ratio,
            };
            Ok((result, event))
        })();

        let result = self.finish(&mut state, staged, journal, "convert", result)?;
        if yield_shortfall > 0 {
            tracing::warn!(
                "Yield pool short by {} converting for {}",
                yield_shortfall,
                owner.short()
            );
        }
        tracing::info!(
            "Converted position of {}: {} backed unit, {} yield, coverage {} bps",
            owner.short(),
            result.backed_units,
            result.yield_paid,
            result.coverage_ratio_bps
        );
        Ok(result)
    }

    /// Exit a locked position, forfeiting the penalty
    pub fn emergency_withdraw(&self, owner: &Address) -> Result<WithdrawResult> {
        self.collaborators
            .auth
            .authorize(owner, Action::EmergencyWithdraw)?;

        let mut state = self.lock()?;
        let now = self.now();
        let position = state
            .ledgers.positions
            .get(owner)
            .cloned()
            .ok_or_else(|| Error::NoPosition(owner.to_hex()))?;

        if position.is_unlocked(now) {
            return Err(Error::UseConvertInstead {
                unlock_time: position.unlock_time,
            });
        }

        let penalty = calculate_fee_bps(position.deposited_amount, state.ledgers.params.penalty_bps)?;
        let payout = safe_sub(position.deposited_amount, penalty)?;
        let remaining_lock_secs = position.remaining_lock(now);

        let mut staged = state.ledgers.clone();
        let journal = self.journal();
        let result = (|| -> Result<(WithdrawResult, ProtocolEvent)> {
            staged.treasury.retain_as_fee(&self.address, penalty)?;
            journal.burn_receipt(owner, position.unit_amount)?;
            if payout > 0 {
                staged
                    .treasury
                    .withdraw(&journal, &self.address, owner, payout)?;
            }
            let closed = staged.positions.close(owner)?;

            let event = ProtocolEvent::EarlyWithdraw(EarlyWithdrawEvent {
                owner: *owner,
                tier: closed.tier,
                deposited_amount: closed.deposited_amount,
                penalty,
                payout,
                remaining_lock_secs,
                timestamp: now,
            });

            let result = WithdrawResult {
                position: closed,
                penalty,
                payout,
            };
            Ok((result, event))
        })();

        let result = self.finish(&mut state, staged, journal, "emergency_withdraw", result)?;
        tracing::info!(
            "Early withdraw for {}: paid {}, retained {} penalty",
            owner.short(),
            result.payout,
            result.penalty
        );
        Ok(result)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TREASURY OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add to the pooled yield balance
    pub fn deposit_yield(&self, caller: &Address, amount: u64) -> Result<u64> {
        self.collaborators
            .auth
            .authorize(caller, Action::DepositYield)?;

        let mut state = self.lock()?;
        let now = self.now();
        let mut staged = state.ledgers.clone();
        let journal = self.journal();
        let result = (|| -> Result<(u64, ProtocolEvent)> {
            staged.treasury.deposit_yield(&journal, caller, amount)?;
            let pool_balance = staged.treasury.yield_pool();
            let event = ProtocolEvent::YieldDeposited(YieldDepositedEvent {
                from: *caller,
                amount,
                pool_balance,
                timestamp: now,
            });
            Ok((pool_balance, event))
        })();

        let pool = self.finish(&mut state, staged, journal, "deposit_yield", result)?;
        tracing::info!("Yield deposited: {} from {}, pool now {}", amount, caller.short(), pool);
        Ok(pool)
    }

    /// Withdraw accrued fees to `to`
    pub fn withdraw_fees(&self, caller: &Address, to: &Address, amount: u64) -> Result<u64> {
        self.collaborators
            .auth
            .authorize(caller, Action::WithdrawFees)?;

        let mut state = self.lock()?;
        let now = self.now();
        let mut staged = state.ledgers.clone();
        let journal = self.journal();
        let result = (|| -> Result<(u64, ProtocolEvent)> {
            staged.treasury.withdraw_fees(&journal, to, amount)?;
            let remaining_fees = staged.treasury.total_fees();
            let event = ProtocolEvent::FeesWithdrawn(FeesWithdrawnEvent {
                to: *to,
                amount,
                remaining_fees,
                timestamp: now,
            });
            Ok((remaining_fees, event))
        })();

        let remaining = self.finish(&mut state, staged, journal, "withdraw_fees", result)?;
        tracing::info!("Fees withdrawn: {} to {}, {} left", amount, to.short(), remaining);
        Ok(remaining)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ADMIN SETTERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Change the deposit fee (≤ 500 bps)
    pub fn set_fee_bps(&self, caller: &Address, fee_bps: u64) -> Result<()> {
        self.set_parameter(caller, Action::SetFeeBps, "fee_bps", fee_bps, |s, v| {
            s.treasury.set_fee_bps(v)?;
            Ok(std::mem::replace(&mut s.params.fee_bps, v))
        })
    }

    /// Change the early-exit penalty (≤ 2000 bps)
    pub fn set_penalty_bps(&self, caller: &Address, penalty_bps: u64) -> Result<()> {
        self.set_parameter(caller, Action::SetPenaltyBps, "penalty_bps", penalty_bps, |s, v| {
            Ok(std::mem::replace(&mut s.params.penalty_bps, validate_penalty_bps(v)?))
        })
    }

    /// Change the required coverage (≥ 10000 bps)
    pub fn set_coverage_bps(&self, caller: &Address, coverage_bps: u64) -> Result<()> {
        self.set_parameter(caller, Action::SetCoverageBps, "coverage_bps", coverage_bps, |s, v| {
            Ok(std::mem::replace(&mut s.params.coverage_bps, validate_coverage_bps(v)?))
        })
    }

    /// Change the attestation staleness threshold (> 0)
    pub fn set_staleness_threshold(&self, caller: &Address, secs: u64) -> Result<()> {
        self.set_parameter(
            caller,
            Action::SetStalenessThreshold,
            "staleness_threshold_secs",
            secs,
            |s, v| {
                Ok(std::mem::replace(
                    &mut s.params.staleness_threshold_secs,
                    validate_staleness_secs(v)?,
                ))
            },
        )
    }

    fn set_parameter(
        &self,
        caller: &Address,
        action: Action,
        name: &str,
        value: u64,
        apply: impl FnOnce(&mut Ledgers, u64) -> Result<u64>,
    ) -> Result<()> {
        self.collaborators.auth.authorize(caller, action)?;

        let mut state = self.lock()?;
        let now = self.now();
        let mut staged = state.ledgers.clone();
        let old_value = apply(&mut staged, value)?;
        let event = ProtocolEvent::ParameterChanged(ParameterChangedEvent {
            parameter: name.into(),
            old_value,
            new_value: value,
            changed_by: *caller,
            timestamp: now,
        });
        state.ledgers = staged;
        state.events.push(event);

        tracing::info!("{} changed from {} to {} by {}", name, old_value, value, caller.short());
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Open position of `owner`
    pub fn position(&self, owner: &Address) -> Result<Option<Position>> {
        Ok(self.lock()?.ledgers.positions.get(owner).cloned())
    }

    /// Position with projections at the current time
    pub fn position_view(&self, owner: &Address) -> Result<PositionView> {
        let state = self.lock()?;
        let now = self.now();
        let position = state
            .ledgers.positions
            .get(owner)
            .ok_or_else(|| Error::NoPosition(owner.to_hex()))?;

        let early_exit_payout = if position.is_unlocked(now) {
            0
        } else {
            let penalty =
                calculate_fee_bps(position.deposited_amount, state.ledgers.params.penalty_bps)?;
            position.deposited_amount - penalty
        };

        Ok(PositionView {
            owner: *owner,
            tier: position.tier,
            deposited_amount: position.deposited_amount,
            start_time: position.start_time,
            unlock_time: position.unlock_time,
            remaining_lock_secs: position.remaining_lock(now),
            projected_yield: position.yield_at(now, state.ledgers.params.base_yield_rate_bps)?,
            early_exit_payout,
        })
    }

    /// Yield `owner` would receive on conversion now
    pub fn projected_yield(&self, owner: &Address) -> Result<u64> {
        let state = self.lock()?;
        let now = self.now();
        state
            .ledgers.positions
            .get(owner)
            .ok_or_else(|| Error::NoPosition(owner.to_hex()))?
            .yield_at(now, state.ledgers.params.base_yield_rate_bps)
    }

    /// Seconds until `owner`'s position unlocks
    pub fn remaining_lock(&self, owner: &Address) -> Result<u64> {
        let state = self.lock()?;
        state.ledgers.positions.remaining_lock(owner, self.now())
    }

    /// Coverage ratio the next conversion would see, regardless of feed health
    pub fn coverage_ratio(&self) -> Result<u64> {
        let vaulted = self.collaborators.feed.total_vaulted_units()?;
        let outstanding = self.collaborators.backed.total_issued_whole_units()?;
        Ok(coverage_ratio_bps(vaulted, outstanding))
    }

    /// Whether the reserve feed is currently fresh and positive
    pub fn is_oracle_healthy(&self) -> Result<bool> {
        let params = self.params()?;
        Ok(self.gate(&params)?.is_healthy(self.now()))
    }

    /// Treasury totals
    pub fn treasury_summary(&self) -> Result<TreasurySummary> {
        Ok(self.lock()?.ledgers.treasury.summary())
    }

    /// Current parameters
    pub fn params(&self) -> Result<EngineParams> {
        Ok(self.lock()?.ledgers.params.clone())
    }

    /// Number of open positions
    pub fn open_positions(&self) -> Result<u64> {
        Ok(self.lock()?.ledgers.positions.open_count())
    }

    /// The most recent `n` events, oldest first
    pub fn recent_events(&self, n: usize) -> Result<Vec<ProtocolEvent>> {
        Ok(self.lock()?.events.tail(n).into_iter().cloned().collect())
    }

    /// Events about `subject`
    pub fn events_for(&self, subject: &Address) -> Result<Vec<ProtocolEvent>> {
        Ok(self
            .lock()?
            .events
            .for_subject(subject)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Copy of the full engine state
    pub fn snapshot(&self) -> Result<EngineSnapshot> {
        let state = self.lock()?;
        Ok(EngineSnapshot {
            treasury: state.ledgers.treasury.clone(),
            positions: state.ledgers.positions.clone(),
            params: state.ledgers.params.clone(),
            events: state.events.clone(),
        })
    }

    /// Deterministic hash of the engine state
    pub fn state_hash(&self) -> Result<Hash> {
        let state = self.lock()?;
        let ledgers = &state.ledgers;
        Ok(state_hash(
            &ledgers.treasury,
            &ledgers.positions,
            &ledgers.params,
            &state.events,
        ))
    }

    /// Check cross-ledger invariants
    pub fn verify_invariants(&self) -> Result<()> {
        let state = self.lock()?;

        if !state.ledgers.treasury.verify_invariant() {
            return Err(Error::InvariantViolation(
                "treasury credit does not match totals".into(),
            ));
        }
        if !state.ledgers.positions.verify_invariant() {
            return Err(Error::InvariantViolation("position ledger inconsistent".into()));
        }

        let engine_credit = state.ledgers.treasury.credit_of(&self.address);
        let deposited = state.ledgers.positions.total_deposited();
        if engine_credit != deposited {
            return Err(Error::InvariantViolation(format!(
                "engine credit {} != open principal {}",
                engine_credit, deposited
            )));
        }

        let receipts = self.collaborators.receipt.total_supply();
        let expected = state.ledgers.positions.open_count() * RECEIPT_UNITS_PER_POSITION;
        if receipts != expected {
            return Err(Error::InvariantViolation(format!(
                "receipt supply {} != open positions {}",
                receipts, expected
            )));
        }

        Ok(())
    }
}
