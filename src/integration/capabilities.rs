//! Capabilities consumed from external collaborators.
//!
//! The engine never moves value or issues tokens itself. It calls these
//! traits, which real deployments back with their own asset primitives. Every
//! call is synchronous and fallible; failures surface as integration errors.

use crate::error::Result;
use crate::utils::crypto::Address;

/// Moves the staked value asset in and out of treasury custody
pub trait ValueTransfer: Send + Sync {
    /// Pull `amount` from `from` into custody
    fn transfer_in(&self, from: &Address, amount: u64) -> Result<()>;

    /// Push `amount` out of custody to `to`
    fn transfer_out(&self, to: &Address, amount: u64) -> Result<()>;
}

/// The reserve-backed asset issued on conversion
pub trait BackedAsset: Send + Sync {
    /// Issue `whole_units` to `to`
    fn mint(&self, to: &Address, whole_units: u64) -> Result<()>;

    /// Outstanding supply in whole units
    fn total_issued_whole_units(&self) -> Result<u64>;

    /// Holder balance in whole units
    fn balance_of(&self, holder: &Address) -> u64;
}

/// Non-transferable claim representing an open position
pub trait ReceiptToken: Send + Sync {
    /// Issue `units` to `to`
    fn mint(&self, to: &Address, units: u64) -> Result<()>;

    /// Privileged burn on behalf of `from`.
    ///
    /// Bypasses the transferability restriction for an authorized `burner`;
    /// fails with `Unauthorized` for anyone else.
    fn burn_from(&self, burner: &Address, from: &Address, units: u64) -> Result<()>;

    /// Holder balance
    fn balance_of(&self, holder: &Address) -> u64;

    /// Outstanding receipt units
    fn total_supply(&self) -> u64;
}
