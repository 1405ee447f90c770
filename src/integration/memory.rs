//! In-memory collaborators.
//!
//! Reference implementations of the capability traits, used by tests and by
//! the local CLI deployment. Each one can be told to fail so rollback paths
//! can be exercised.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::integration::capabilities::{BackedAsset, ReceiptToken, ValueTransfer};
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// FAULT SWITCH
// ═══════════════════════════════════════════════════════════════════════════════

/// Failure injection: lets N calls through, then fails until healed
#[derive(Debug)]
pub struct FaultSwitch(AtomicI64);

impl Default for FaultSwitch {
    fn default() -> Self {
        Self(AtomicI64::new(-1))
    }
}

impl FaultSwitch {
    /// Allow `successes` more calls, then fail every call
    pub fn fail_after(&self, successes: u64) {
        self.0.store(successes.min(i64::MAX as u64) as i64, Ordering::SeqCst);
    }

    /// Fail every call from now on
    pub fn fail_always(&self) {
        self.fail_after(0);
    }

    /// Stop failing
    pub fn heal(&self) {
        self.0.store(-1, Ordering::SeqCst);
    }

    /// Consume one call; true when this call must fail
    fn trip(&self) -> bool {
        loop {
            let current = self.0.load(Ordering::SeqCst);
            if current < 0 {
                return false;
            }
            if current == 0 {
                return true;
            }
            if self
                .0
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return false;
            }
        }
    }
}

fn lock_err<T>(_: T) -> Error {
    Error::Lock
}

fn credit(balances: &mut HashMap<Address, u64>, who: Address, amount: u64) -> Result<()> {
    let entry = balances.entry(who).or_insert(0);
    *entry = entry.checked_add(amount).ok_or(Error::Overflow {
        operation: "credit balance".into(),
    })?;
    Ok(())
}

fn debit(balances: &mut HashMap<Address, u64>, who: &Address, amount: u64) -> Option<()> {
    let current = balances.get(who).copied().unwrap_or(0);
    let remaining = current.checked_sub(amount)?;
    if remaining == 0 {
        balances.remove(who);
    } else {
        balances.insert(*who, remaining);
    }
    Some(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUE LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Serializable state of [`InMemoryValueLedger`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueLedgerSnapshot {
    /// Account that holds treasury custody
    pub custody: Option<Address>,
    /// Balances by account
    pub balances: HashMap<Address, u64>,
}

/// Simple balance table standing in for the staked value asset
#[derive(Debug)]
pub struct InMemoryValueLedger {
    custody: Address,
    balances: RwLock<HashMap<Address, u64>>,
    faults: FaultSwitch,
}

impl InMemoryValueLedger {
    /// Create a ledger whose custody account is `custody`
    pub fn new(custody: Address) -> Self {
        Self {
            custody,
            balances: RwLock::new(HashMap::new()),
            faults: FaultSwitch::default(),
        }
    }

    /// Restore from a snapshot
    pub fn from_snapshot(snapshot: ValueLedgerSnapshot, default_custody: Address) -> Self {
        Self {
            custody: snapshot.custody.unwrap_or(default_custody),
            balances: RwLock::new(snapshot.balances),
            faults: FaultSwitch::default(),
        }
    }

    /// Capture current balances
    pub fn snapshot(&self) -> Result<ValueLedgerSnapshot> {
        Ok(ValueLedgerSnapshot {
            custody: Some(self.custody),
            balances: self.balances.read().map_err(lock_err)?.clone(),
        })
    }

    /// Credit an account out of thin air (test faucet)
    pub fn fund(&self, account: &Address, amount: u64) -> Result<()> {
        let mut balances = self.balances.write().map_err(lock_err)?;
        credit(&mut balances, *account, amount)
    }

    /// Balance of an account
    pub fn balance_of(&self, account: &Address) -> u64 {
        self.balances
            .read()
            .map(|b| b.get(account).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Balance held in custody
    pub fn custody_balance(&self) -> u64 {
        self.balance_of(&self.custody)
    }

    /// Custody account
    pub fn custody(&self) -> Address {
        self.custody
    }

    /// Failure injection
    pub fn faults(&self) -> &FaultSwitch {
        &self.faults
    }

    fn move_value(&self, from: &Address, to: &Address, amount: u64) -> Result<()> {
        if self.faults.trip() {
            return Err(Error::TransferFailed("injected fault".into()));
        }
        let mut balances = self.balances.write().map_err(lock_err)?;
        debit(&mut balances, from, amount).ok_or_else(|| {
            Error::TransferFailed(format!("{} has insufficient balance for {}", from.short(), amount))
        })?;
        credit(&mut balances, *to, amount)
    }
}

impl ValueTransfer for InMemoryValueLedger {
    fn transfer_in(&self, from: &Address, amount: u64) -> Result<()> {
        let custody = self.custody;
        self.move_value(from, &custody, amount)
    }

    fn transfer_out(&self, to: &Address, amount: u64) -> Result<()> {
        let custody = self.custody;
        self.move_value(&custody, to, amount)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Serializable balances and supply of an in-memory token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    /// Balances by holder
    pub balances: HashMap<Address, u64>,
    /// Outstanding supply
    pub total_supply: u64,
    /// Accounts allowed to burn on behalf of holders
    #[serde(default)]
    pub burners: HashSet<Address>,
}

impl TokenSnapshot {
    fn mint(&mut self, to: &Address, units: u64) -> Result<()> {
        if units == 0 {
            return Err(Error::MintFailed("zero units".into()));
        }
        let supply = self.total_supply.checked_add(units).ok_or(Error::Overflow {
            operation: "token supply".into(),
        })?;
        credit(&mut self.balances, *to, units)?;
        self.total_supply = supply;
        Ok(())
    }

    fn burn(&mut self, from: &Address, units: u64) -> Result<()> {
        debit(&mut self.balances, from, units).ok_or_else(|| {
            Error::BurnFailed(format!("{} holds fewer than {} units", from.short(), units))
        })?;
        self.total_supply = self.total_supply.saturating_sub(units);
        Ok(())
    }

    fn balance_of(&self, holder: &Address) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BACKED ASSET
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory reserve-backed asset
#[derive(Debug, Default)]
pub struct InMemoryBackedAsset {
    state: RwLock<TokenSnapshot>,
    faults: FaultSwitch,
}

impl InMemoryBackedAsset {
    /// Create with zero supply
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from a snapshot
    pub fn from_snapshot(snapshot: TokenSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            faults: FaultSwitch::default(),
        }
    }

    /// Capture current state
    pub fn snapshot(&self) -> Result<TokenSnapshot> {
        Ok(self.state.read().map_err(lock_err)?.clone())
    }

    /// Issue units outside the engine (simulates other issuers)
    pub fn issue_external(&self, to: &Address, units: u64) -> Result<()> {
        self.state.write().map_err(lock_err)?.mint(to, units)
    }

    /// Failure injection
    pub fn faults(&self) -> &FaultSwitch {
        &self.faults
    }
}

impl BackedAsset for InMemoryBackedAsset {
    fn mint(&self, to: &Address, whole_units: u64) -> Result<()> {
        if self.faults.trip() {
            return Err(Error::MintFailed("injected fault".into()));
        }
        self.state.write().map_err(lock_err)?.mint(to, whole_units)
    }

    fn total_issued_whole_units(&self) -> Result<u64> {
        Ok(self.state.read().map_err(lock_err)?.total_supply)
    }

    fn balance_of(&self, holder: &Address) -> u64 {
        self.state.read().map(|s| s.balance_of(holder)).unwrap_or(0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECEIPT TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory non-transferable receipt token
#[derive(Debug, Default)]
pub struct InMemoryReceiptToken {
    state: RwLock<TokenSnapshot>,
    mint_faults: FaultSwitch,
    burn_faults: FaultSwitch,
}

impl InMemoryReceiptToken {
    /// Create with a set of authorized burners
    pub fn new(burners: impl IntoIterator<Item = Address>) -> Self {
        Self {
            state: RwLock::new(TokenSnapshot {
                burners: burners.into_iter().collect(),
                ..Default::default()
            }),
            mint_faults: FaultSwitch::default(),
            burn_faults: FaultSwitch::default(),
        }
    }

    /// Restore from a snapshot
    pub fn from_snapshot(snapshot: TokenSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            mint_faults: FaultSwitch::default(),
            burn_faults: FaultSwitch::default(),
        }
    }

    /// Capture current state
    pub fn snapshot(&self) -> Result<TokenSnapshot> {
        Ok(self.state.read().map_err(lock_err)?.clone())
    }

    /// Grant burn rights
    pub fn authorize_burner(&self, burner: Address) -> Result<()> {
        self.state.write().map_err(lock_err)?.burners.insert(burner);
        Ok(())
    }

    /// Holder-initiated transfers are always refused
    pub fn transfer(&self, _from: &Address, _to: &Address, _units: u64) -> Result<()> {
        Err(Error::NonTransferable)
    }

    /// Failure injection for mints
    pub fn mint_faults(&self) -> &FaultSwitch {
        &self.mint_faults
    }

    /// Failure injection for burns
    pub fn burn_faults(&self) -> &FaultSwitch {
        &self.burn_faults
    }
}

impl ReceiptToken for InMemoryReceiptToken {
    fn mint(&self, to: &Address, units: u64) -> Result<()> {
        if self.mint_faults.trip() {
            return Err(Error::MintFailed("injected fault".into()));
        }
        self.state.write().map_err(lock_err)?.mint(to, units)
    }

    fn burn_from(&self, burner: &Address, from: &Address, units: u64) -> Result<()> {
        let mut state = self.state.write().map_err(lock_err)?;
        if !state.burners.contains(burner) {
            return Err(Error::Unauthorized(format!(
                "{} may not burn receipt units",
                burner.short()
            )));
        }
        if self.burn_faults.trip() {
            return Err(Error::BurnFailed("injected fault".into()));
        }
        state.burn(from, units)
    }

    fn balance_of(&self, holder: &Address) -> u64 {
        self.state.read().map(|s| s.balance_of(holder)).unwrap_or(0)
    }

    fn total_supply(&self) -> u64 {
        self.state.read().map(|s| s.total_supply).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    #[test]
    fn test_fault_switch() {
        let switch = FaultSwitch::default();
        assert!(!switch.trip());
        switch.fail_after(2);
        assert!(!switch.trip());
        assert!(!switch.trip());
        assert!(switch.trip());
        assert!(switch.trip());
        switch.heal();
        assert!(!switch.trip());
    }

    #[test]
    fn test_value_ledger_transfers() {
        let ledger = InMemoryValueLedger::new(addr("custody"));
        ledger.fund(&addr("alice"), 1_000).unwrap();

        ledger.transfer_in(&addr("alice"), 400).unwrap();
        assert_eq!(ledger.balance_of(&addr("alice")), 600);
        assert_eq!(ledger.custody_balance(), 400);

        ledger.transfer_out(&addr("bob"), 100).unwrap();
        assert_eq!(ledger.balance_of(&addr("bob")), 100);
        assert_eq!(ledger.custody_balance(), 300);

        let err = ledger.transfer_in(&addr("alice"), 10_000).unwrap_err();
        assert!(matches!(err, Error::TransferFailed(_)));
        assert_eq!(ledger.balance_of(&addr("alice")), 600);
    }

    #[test]
    fn test_value_ledger_fault() {
        let ledger = InMemoryValueLedger::new(addr("custody"));
        ledger.fund(&addr("alice"), 1_000).unwrap();
        ledger.faults().fail_always();
        assert!(ledger.transfer_in(&addr("alice"), 1).is_err());
        assert_eq!(ledger.balance_of(&addr("alice")), 1_000);
    }

    #[test]
    fn test_backed_asset_supply() {
        let asset = InMemoryBackedAsset::new();
        asset.mint(&addr("alice"), 1).unwrap();
        asset.issue_external(&addr("bob"), 2).unwrap();
        assert_eq!(asset.total_issued_whole_units().unwrap(), 3);
        assert_eq!(asset.balance_of(&addr("alice")), 1);
        assert!(asset.mint(&addr("alice"), 0).is_err());
    }

    #[test]
    fn test_receipt_burn_requires_burner() {
        let receipt = InMemoryReceiptToken::new([addr("engine")]);
        receipt.mint(&addr("alice"), 1).unwrap();

        let err = receipt.burn_from(&addr("mallory"), &addr("alice"), 1).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
        assert_eq!(receipt.balance_of(&addr("alice")), 1);

        receipt.burn_from(&addr("engine"), &addr("alice"), 1).unwrap();
        assert_eq!(receipt.balance_of(&addr("alice")), 0);
        assert_eq!(receipt.total_supply(), 0);
    }

    #[test]
    fn test_receipt_non_transferable() {
        let receipt = InMemoryReceiptToken::new(Vec::<Address>::new());
        receipt.mint(&addr("alice"), 1).unwrap();
        assert_eq!(
            receipt.transfer(&addr("alice"), &addr("bob"), 1),
            Err(Error::NonTransferable)
        );
    }

    #[test]
    fn test_receipt_burn_more_than_held() {
        let receipt = InMemoryReceiptToken::new([addr("engine")]);
        let err = receipt.burn_from(&addr("engine"), &addr("alice"), 1).unwrap_err();
        assert!(matches!(err, Error::BurnFailed(_)));
    }

    #[test]
    fn test_snapshot_restore() {
        let ledger = InMemoryValueLedger::new(addr("custody"));
        ledger.fund(&addr("alice"), 77).unwrap();
        let restored = InMemoryValueLedger::from_snapshot(ledger.snapshot().unwrap(), addr("x"));
        assert_eq!(restored.balance_of(&addr("alice")), 77);
        assert_eq!(restored.custody(), addr("custody"));
    }
}
