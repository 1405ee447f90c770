//! Protocol operation results and read-only views.
//!
//! Each mutating operation on [`crate::protocol::RedemptionProtocol`] returns
//! one of these once it has committed.

use serde::{Deserialize, Serialize};

use crate::core::position::Position;
use crate::core::tier::Tier;
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of staking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeResult {
    /// The opened position
    pub position: Position,
    /// Amount pulled from the owner
    pub gross_amount: u64,
    /// Deposit fee skimmed
    pub fee: u64,
    /// Receipt units issued
    pub receipt_units: u64,
}

/// Result of converting an unlocked position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertResult {
    /// The closed position, with its final accrued yield
    pub position: Position,
    /// Yield actually paid
    pub yield_paid: u64,
    /// Computed yield the pool could not cover
    pub yield_shortfall: u64,
    /// Backed units issued
    pub backed_units: u64,
    /// Coverage ratio immediately before the mint
    pub coverage_ratio_bps: u64,
}

/// Result of an early exit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawResult {
    /// The closed position
    pub position: Position,
    /// Penalty retained as fee
    pub penalty: u64,
    /// Amount returned to the owner
    pub payout: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// VIEWS
// ═══════════════════════════════════════════════════════════════════════════════

/// Position plus its projections at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    /// Owner
    pub owner: Address,
    /// Tier
    pub tier: Tier,
    /// Net deposit
    pub deposited_amount: u64,
    /// Stake timestamp
    pub start_time: u64,
    /// Unlock timestamp
    pub unlock_time: u64,
    /// Seconds until unlock
    pub remaining_lock_secs: u64,
    /// Yield if converted now
    pub projected_yield: u64,
    /// Payout if withdrawn early now (zero once unlocked)
    pub early_exit_payout: u64,
}

impl PositionView {
    /// Whether conversion is allowed at the view's timestamp
    pub fn is_unlocked(&self) -> bool {
        self.remaining_lock_secs == 0
    }
}
