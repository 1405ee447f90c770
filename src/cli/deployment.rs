//! Local file-backed deployment.
//!
//! Wires a [`RedemptionProtocol`] to the in-memory reference collaborators and
//! persists all of it through a [`StateStore`] in the data directory, so the
//! CLI can run one operation per invocation.

use std::path::Path;
use std::sync::Arc;

use crate::auth::RolePolicy;
use crate::core::config::EngineParams;
use crate::error::{Error, Result};
use crate::integration::memory::{
    InMemoryBackedAsset, InMemoryReceiptToken, InMemoryValueLedger, TokenSnapshot,
    ValueLedgerSnapshot,
};
use crate::oracle::attestation::ReserveAttestation;
use crate::oracle::feeds::ManualReserveFeed;
use crate::protocol::engine::{Collaborators, RedemptionProtocol};
use crate::storage::backend::FileStore;
use crate::storage::state::{SaveRecord, StateStore};
use crate::utils::crypto::Address;
use crate::utils::time::{Clock, ManualClock, SystemClock};

/// Engine identity of a local deployment
pub const ENGINE_LABEL: &str = "tierstake-engine";

/// Custody account of a local deployment
pub const CUSTODY_LABEL: &str = "tierstake-custody";

mod records {
    pub const VALUE: &str = "value";
    pub const BACKED: &str = "backed";
    pub const RECEIPT: &str = "receipt";
    pub const ATTESTATION: &str = "attestation";
    pub const POLICY: &str = "policy";
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCAL DEPLOYMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine plus collaborators restored from a data directory
pub struct LocalDeployment {
    store: StateStore<FileStore>,
    engine: RedemptionProtocol,
    value: Arc<InMemoryValueLedger>,
    backed: Arc<InMemoryBackedAsset>,
    receipt: Arc<InMemoryReceiptToken>,
    feed: Arc<ManualReserveFeed>,
    policy: RolePolicy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LocalDeployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDeployment")
            .field("dir", &self.store.backend().dir())
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

fn make_clock(now: Option<u64>) -> Arc<dyn Clock> {
    match now {
        Some(ts) => Arc::new(ManualClock::new(ts)),
        None => Arc::new(SystemClock),
    }
}

impl LocalDeployment {
    /// Create a fresh deployment administered by `admin`.
    ///
    /// Refuses to overwrite an existing deployment unless `force` is set.
    pub fn init(
        dir: &Path,
        params: EngineParams,
        admin: Address,
        now: Option<u64>,
        force: bool,
    ) -> Result<Self> {
        let store = StateStore::new(FileStore::open(dir)?);
        if store.is_initialized()? && !force {
            return Err(Error::Config(format!(
                "deployment already exists at {}",
                dir.display()
            )));
        }

        let engine_address = Address::from_label(ENGINE_LABEL);
        let clock = make_clock(now);
        let value = Arc::new(InMemoryValueLedger::new(Address::from_label(CUSTODY_LABEL)));
        let backed = Arc::new(InMemoryBackedAsset::new());
        let receipt = Arc::new(InMemoryReceiptToken::new([engine_address]));
        let feed = Arc::new(ManualReserveFeed::new(ReserveAttestation::default()));
        let policy = RolePolicy::with_admin(admin);

        let collaborators = Collaborators {
            value: value.clone(),
            backed: backed.clone(),
            receipt: receipt.clone(),
            feed: feed.clone(),
            auth: Arc::new(policy.clone()),
            clock: clock.clone(),
        };
        let engine = RedemptionProtocol::new(engine_address, params, collaborators)?;

        let deployment = Self {
            store,
            engine,
            value,
            backed,
            receipt,
            feed,
            policy,
            clock,
        };
        deployment.save()?;

        tracing::info!(
            "Initialized deployment at {} (admin {})",
            dir.display(),
            admin.short()
        );
        Ok(deployment)
    }

    /// Restore a deployment saved by [`LocalDeployment::init`]
    pub fn open(dir: &Path, now: Option<u64>) -> Result<Self> {
        let store = StateStore::new(FileStore::open(dir)?);
        let snapshot = store.load_engine()?.ok_or_else(|| {
            Error::Config(format!(
                "no deployment at {}; run `tierstake init` first",
                dir.display()
            ))
        })?;

        let engine_address = Address::from_label(ENGINE_LABEL);
        let custody = Address::from_label(CUSTODY_LABEL);

        let value_state: ValueLedgerSnapshot = store.load_record(records::VALUE)?.unwrap_or_default();
        let backed_state: TokenSnapshot = store.load_record(records::BACKED)?.unwrap_or_default();
        let receipt_state: Option<TokenSnapshot> = store.load_record(records::RECEIPT)?;
        let attestation: ReserveAttestation =
            store.load_record(records::ATTESTATION)?.unwrap_or_default();
        let policy: RolePolicy = store
            .load_record(records::POLICY)?
            .ok_or_else(|| Error::Config("deployment has no authorization policy".into()))?;

        let value = Arc::new(InMemoryValueLedger::from_snapshot(value_state, custody));
        let backed = Arc::new(InMemoryBackedAsset::from_snapshot(backed_state));
        let receipt = Arc::new(match receipt_state {
            Some(state) => InMemoryReceiptToken::from_snapshot(state),
            None => InMemoryReceiptToken::new([engine_address]),
        });
        let feed = Arc::new(ManualReserveFeed::new(attestation));
        let clock = make_clock(now);

        let collaborators = Collaborators {
            value: value.clone(),
            backed: backed.clone(),
            receipt: receipt.clone(),
            feed: feed.clone(),
            auth: Arc::new(policy.clone()),
            clock: clock.clone(),
        };
        let engine = RedemptionProtocol::from_snapshot(engine_address, snapshot, collaborators);

        tracing::debug!("Opened deployment at {}", dir.display());
        Ok(Self {
            store,
            engine,
            value,
            backed,
            receipt,
            feed,
            policy,
            clock,
        })
    }

    /// Persist engine state and collaborator balances
    pub fn save(&self) -> Result<SaveRecord> {
        self.store.save_record(records::VALUE, &self.value.snapshot()?)?;
        self.store.save_record(records::BACKED, &self.backed.snapshot()?)?;
        self.store.save_record(records::RECEIPT, &self.receipt.snapshot()?)?;
        self.store.save_record(records::ATTESTATION, &self.feed.current()?)?;
        self.store.save_record(records::POLICY, &self.policy)?;
        self.store.save_engine(&self.engine.snapshot()?, self.clock.now())
    }

    /// Publish a reserve attestation
    pub fn attest(&self, total_vaulted_units: u64, timestamp: Option<u64>) -> Result<ReserveAttestation> {
        let attestation =
            ReserveAttestation::new(total_vaulted_units, timestamp.unwrap_or_else(|| self.now()));
        self.feed.set(attestation)?;
        tracing::info!(
            "Reserve attestation: {} units at {}",
            attestation.total_vaulted_units,
            attestation.last_update_timestamp
        );
        Ok(attestation)
    }

    /// Credit an account with the staked value asset (local faucet)
    pub fn fund(&self, account: &Address, amount: u64) -> Result<u64> {
        self.value.fund(account, amount)?;
        Ok(self.value.balance_of(account))
    }

    /// The engine
    pub fn engine(&self) -> &RedemptionProtocol {
        &self.engine
    }

    /// Staked value ledger
    pub fn value(&self) -> &InMemoryValueLedger {
        &self.value
    }

    /// Backed asset
    pub fn backed(&self) -> &InMemoryBackedAsset {
        &self.backed
    }

    /// Receipt token
    pub fn receipt(&self) -> &InMemoryReceiptToken {
        &self.receipt
    }

    /// Current reserve attestation
    pub fn attestation(&self) -> Result<ReserveAttestation> {
        self.feed.current()
    }

    /// Authorization policy
    pub fn policy(&self) -> &RolePolicy {
        &self.policy
    }

    /// Current time as seen by the engine
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Metadata from the last save
    pub fn last_save(&self) -> Result<Option<SaveRecord>> {
        self.store.last_save()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
