//! Authorization.
//!
//! The engine asks an injected [`AuthorizationPolicy`] before doing anything
//! else in a mutating operation. A rejection carries no side effects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// ACTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Mutating operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Open a position
    Stake,
    /// Convert an unlocked position
    Convert,
    /// Exit a locked position early
    EmergencyWithdraw,
    /// Add to the yield pool
    DepositYield,
    /// Withdraw accrued fees
    WithdrawFees,
    /// Change the deposit fee
    SetFeeBps,
    /// Change the early-exit penalty
    SetPenaltyBps,
    /// Change the required coverage
    SetCoverageBps,
    /// Change the attestation staleness threshold
    SetStalenessThreshold,
}

impl Action {
    /// Whether the action belongs to a position holder rather than an operator
    pub fn is_user_action(&self) -> bool {
        matches!(self, Action::Stake | Action::Convert | Action::EmergencyWithdraw)
    }

    /// Whether the action changes an administrable parameter
    pub fn is_parameter_change(&self) -> bool {
        matches!(
            self,
            Action::SetFeeBps
                | Action::SetPenaltyBps
                | Action::SetCoverageBps
                | Action::SetStalenessThreshold
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Stake => "stake",
            Action::Convert => "convert",
            Action::EmergencyWithdraw => "emergency_withdraw",
            Action::DepositYield => "deposit_yield",
            Action::WithdrawFees => "withdraw_fees",
            Action::SetFeeBps => "set_fee_bps",
            Action::SetPenaltyBps => "set_penalty_bps",
            Action::SetCoverageBps => "set_coverage_bps",
            Action::SetStalenessThreshold => "set_staleness_threshold",
        };
        write!(f, "{}", name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// Decides whether `caller` may perform `action`
pub trait AuthorizationPolicy: Send + Sync {
    /// `Ok(())` to allow, `Unauthorized` to reject
    fn authorize(&self, caller: &Address, action: Action) -> Result<()>;
}

/// Allows everything
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenPolicy;

impl AuthorizationPolicy for OpenPolicy {
    fn authorize(&self, _caller: &Address, _action: Action) -> Result<()> {
        Ok(())
    }
}

/// Role-based policy.
///
/// Anyone may stake, convert and withdraw their own position. Parameter
/// changes need an admin. Fee withdrawal needs an admin or a fee collector;
/// yield deposits need an admin or a yield provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePolicy {
    admins: BTreeSet<Address>,
    #[serde(default)]
    fee_collectors: BTreeSet<Address>,
    #[serde(default)]
    yield_providers: BTreeSet<Address>,
}

impl RolePolicy {
    /// Policy with a single admin
    pub fn with_admin(admin: Address) -> Self {
        let mut policy = Self::default();
        policy.admins.insert(admin);
        policy
    }

    /// Grant admin
    pub fn add_admin(&mut self, admin: Address) {
        self.admins.insert(admin);
    }

    /// Grant fee collection
    pub fn add_fee_collector(&mut self, collector: Address) {
        self.fee_collectors.insert(collector);
    }

    /// Grant yield deposits
    pub fn add_yield_provider(&mut self, provider: Address) {
        self.yield_providers.insert(provider);
    }

    /// Revoke every role held by `account`
    pub fn revoke(&mut self, account: &Address) {
        self.admins.remove(account);
        self.fee_collectors.remove(account);
        self.yield_providers.remove(account);
    }

    /// Whether `account` is an admin
    pub fn is_admin(&self, account: &Address) -> bool {
        self.admins.contains(account)
    }
}

impl AuthorizationPolicy for RolePolicy {
    fn authorize(&self, caller: &Address, action: Action) -> Result<()> {
        let allowed = match action {
            a if a.is_user_action() => true,
            Action::WithdrawFees => self.is_admin(caller) || self.fee_collectors.contains(caller),
            Action::DepositYield => self.is_admin(caller) || self.yield_providers.contains(caller),
            _ => self.is_admin(caller),
        };

        if !allowed {
            return Err(Error::Unauthorized(format!(
                "{} may not {}",
                caller.short(),
                action
            )));
        }
        Ok(())
    }
}
