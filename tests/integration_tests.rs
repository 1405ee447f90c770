//! Integration tests for the tierstake engine.
//!
//! These tests drive complete position lifecycles through the public API,
//! wired to the in-memory collaborators.

use std::sync::Arc;
use std::thread;

use tierstake::auth::{AuthorizationPolicy, OpenPolicy, RolePolicy};
use tierstake::core::{EngineParams, Tier, YieldShortfallPolicy};
use tierstake::error::Error;
use tierstake::integration::{
    BackedAsset, InMemoryBackedAsset, InMemoryReceiptToken, InMemoryValueLedger, ReceiptToken,
};
use tierstake::oracle::{ManualReserveFeed, ReserveAttestation};
use tierstake::protocol::{Collaborators, ProtocolEvent, RedemptionProtocol};
use tierstake::storage::{FileStore, StateStore};
use tierstake::utils::constants::{
    ELITE_LOCK_SECS, PREMIUM_LOCK_SECS, SECS_PER_DAY, STANDARD_LOCK_SECS,
};
use tierstake::utils::crypto::Address;
use tierstake::utils::time::{Clock, ManualClock};

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

const T0: u64 = 1_700_000_000;

struct Deployment {
    engine: Arc<RedemptionProtocol>,
    value: Arc<InMemoryValueLedger>,
    backed: Arc<InMemoryBackedAsset>,
    receipt: Arc<InMemoryReceiptToken>,
    feed: Arc<ManualReserveFeed>,
    clock: Arc<ManualClock>,
}

fn addr(label: &str) -> Address {
    Address::from_label(label)
}

fn collaborators(d: &Deployment, auth: Arc<dyn AuthorizationPolicy>) -> Collaborators {
    Collaborators {
        value: d.value.clone(),
        backed: d.backed.clone(),
        receipt: d.receipt.clone(),
        feed: d.feed.clone(),
        auth,
        clock: d.clock.clone(),
    }
}

fn deploy_with(params: EngineParams, auth: Arc<dyn AuthorizationPolicy>) -> Deployment {
    let engine_addr = addr("engine");
    let value = Arc::new(InMemoryValueLedger::new(addr("custody")));
    let backed = Arc::new(InMemoryBackedAsset::new());
    let receipt = Arc::new(InMemoryReceiptToken::new([engine_addr]));
    let feed = Arc::new(ManualReserveFeed::new(ReserveAttestation::new(100, T0)));
    let clock = Arc::new(ManualClock::new(T0));

    for user in ["alice", "bob", "carol", "admin"] {
        value.fund(&addr(user), 1_000_000).unwrap();
    }

    let engine = Arc::new(
        RedemptionProtocol::new(
            engine_addr,
            params,
            Collaborators {
                value: value.clone(),
                backed: backed.clone(),
                receipt: receipt.clone(),
                feed: feed.clone(),
                auth,
                clock: clock.clone(),
            },
        )
        .unwrap(),
    );

    Deployment {
        engine,
        value,
        backed,
        receipt,
        feed,
        clock,
    }
}

fn deploy() -> Deployment {
    deploy_with(EngineParams::default(), Arc::new(OpenPolicy))
}

/// Move the clock and publish a fresh attestation
fn advance(d: &Deployment, secs: u64, vaulted: u64) {
    d.clock.advance(secs);
    d.feed.update(vaulted, d.clock.now()).unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIFECYCLE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_full_standard_lifecycle() {
    let d = deploy();
    let alice = addr("alice");

    // Step 1: Fund the yield pool
    d.engine.deposit_yield(&addr("admin"), 1_000).unwrap();

    // Step 2: Stake
    let staked = d.engine.stake(&alice, 10_000, Tier::Standard).unwrap();
    assert_eq!(staked.fee, 100);
    assert_eq!(staked.position.deposited_amount, 9_900);
    assert_eq!(d.receipt.balance_of(&alice), 1);

    // Step 3: Still locked one second before expiry
    advance(&d, STANDARD_LOCK_SECS - 1, 100);
    assert!(matches!(
        d.engine.convert(&alice),
        Err(Error::Locked { remaining_secs: 1 })
    ));

    // Step 4: 150 days + 1s after the stake
    advance(&d, 2, 100);
    let converted = d.engine.convert(&alice).unwrap();
    assert_eq!(converted.backed_units, 1);
    assert_eq!(converted.yield_paid, 203);
    assert_eq!(converted.yield_shortfall, 0);

    assert_eq!(d.backed.balance_of(&alice), 1);
    assert_eq!(d.receipt.balance_of(&alice), 0);
    assert_eq!(d.receipt.total_supply(), 0);
    assert_eq!(d.value.balance_of(&alice), 1_000_000 - 10_000 + 203);

    // Step 5: Position is gone
    assert!(matches!(d.engine.convert(&alice), Err(Error::NoPosition(_))));
    assert!(d.engine.position(&alice).unwrap().is_none());

    let summary = d.engine.treasury_summary().unwrap();
    assert_eq!(summary.total_staked, 0);
    assert_eq!(summary.total_fees, 100);
    assert_eq!(summary.total_yield_paid, 203);
    d.engine.verify_invariants().unwrap();
}

#[test]
fn test_round_trip_without_yield_funding() {
    for amount in [1, 9_999, 10_000, 250_000, 1_000_000] {
        let d = deploy();
        let alice = addr("alice");

        d.engine.stake(&alice, amount, Tier::Standard).unwrap();
        advance(&d, STANDARD_LOCK_SECS + 1, 100);

        let converted = d.engine.convert(&alice).unwrap();
        assert_eq!(converted.backed_units, 1);
        assert_eq!(converted.yield_paid, 0);
        assert_eq!(d.backed.balance_of(&alice), 1);
        assert_eq!(d.receipt.balance_of(&alice), 0);
        d.engine.verify_invariants().unwrap();
    }
}

#[test]
fn test_tier_lock_durations() {
    let d = deploy();
    let cases = [
        ("alice", Tier::Standard, STANDARD_LOCK_SECS),
        ("bob", Tier::Premium, PREMIUM_LOCK_SECS),
        ("carol", Tier::Elite, ELITE_LOCK_SECS),
    ];

    for (user, tier, lock) in cases {
        let result = d.engine.stake(&addr(user), 50_000, tier).unwrap();
        assert_eq!(result.position.unlock_time - result.position.start_time, lock);
        assert_eq!(d.engine.remaining_lock(&addr(user)).unwrap(), lock);
    }
    assert_eq!(d.engine.open_positions().unwrap(), 3);
    assert_eq!(PREMIUM_LOCK_SECS, 300 * SECS_PER_DAY);
}

#[test]
fn test_restake_after_convert() {
    let d = deploy();
    let alice = addr("alice");
    d.engine.deposit_yield(&addr("admin"), 10_000).unwrap();

    d.engine.stake(&alice, 10_000, Tier::Standard).unwrap();
    advance(&d, STANDARD_LOCK_SECS, 100);
    d.engine.convert(&alice).unwrap();

    let again = d.engine.stake(&alice, 5_000, Tier::Premium).unwrap();
    assert_eq!(again.position.tier, Tier::Premium);
    assert_eq!(d.receipt.balance_of(&alice), 1);
    d.engine.verify_invariants().unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// COVERAGE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_coverage_boundary() {
    let d = deploy();
    let alice = addr("alice");
    d.engine.deposit_yield(&addr("admin"), 1_000).unwrap();
    d.engine.stake(&alice, 10_000, Tier::Standard).unwrap();

    // One vaulted unit against the unit about to be issued: 100% < 125%
    advance(&d, STANDARD_LOCK_SECS, 1);
    assert!(matches!(
        d.engine.convert(&alice),
        Err(Error::InsufficientCoverage {
            ratio_bps: 10_000,
            required_bps: 12_500
        })
    ));
    assert_eq!(d.receipt.balance_of(&alice), 1);

    // Two vaulted units: 200% ≥ 125%
    d.feed.update(2, d.clock.now()).unwrap();
    let converted = d.engine.convert(&alice).unwrap();
    assert_eq!(converted.coverage_ratio_bps, 20_000);
    assert_eq!(d.backed.total_issued_whole_units().unwrap(), 1);
}

#[test]
fn test_coverage_counts_outstanding_supply() {
    let d = deploy();
    d.backed.issue_external(&addr("someone"), 3).unwrap();
    d.engine.deposit_yield(&addr("admin"), 1_000).unwrap();
    d.engine.stake(&addr("alice"), 10_000, Tier::Standard).unwrap();

    // 4 vaulted for 3 + 1 units is exactly 100%
    advance(&d, STANDARD_LOCK_SECS, 4);
    assert!(matches!(
        d.engine.convert(&addr("alice")),
        Err(Error::InsufficientCoverage { ratio_bps: 10_000, .. })
    ));

    d.feed.update(5, d.clock.now()).unwrap();
    assert!(d.engine.convert(&addr("alice")).is_ok());
}

#[test]
fn test_stale_attestation_blocks_convert() {
    let d = deploy();
    let alice = addr("alice");
    d.engine.deposit_yield(&addr("admin"), 1_000).unwrap();
    d.engine.stake(&alice, 10_000, Tier::Standard).unwrap();

    // Attestation still dated T0
    d.clock.advance(STANDARD_LOCK_SECS);
    assert!(matches!(d.engine.convert(&alice), Err(Error::OracleStale { .. })));
    assert!(!d.engine.is_oracle_healthy().unwrap());

    // Unhealthy feeds fail even when fresh
    d.feed.update(100, d.clock.now()).unwrap();
    d.feed.set_healthy(false).unwrap();
    assert!(matches!(d.engine.convert(&alice), Err(Error::OracleStale { .. })));

    d.feed.set_healthy(true).unwrap();
    assert!(d.engine.convert(&alice).is_ok());
}

// ═══════════════════════════════════════════════════════════════════════════════
// EARLY EXIT AND FEES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_emergency_withdraw_penalty() {
    let d = deploy();
    let bob = addr("bob");

    let staked = d.engine.stake(&bob, 20_000, Tier::Elite).unwrap();
    assert_eq!(staked.position.deposited_amount, 19_800);

    advance(&d, 30 * SECS_PER_DAY, 100);
    let result = d.engine.emergency_withdraw(&bob).unwrap();
    assert_eq!(result.penalty, 1_980);
    assert_eq!(result.payout, 17_820);
    assert_eq!(d.value.balance_of(&bob), 1_000_000 - 20_000 + 17_820);
    assert_eq!(d.receipt.balance_of(&bob), 0);

    let summary = d.engine.treasury_summary().unwrap();
    assert_eq!(summary.total_fees, 200 + 1_980);
    assert_eq!(summary.total_staked, 0);
    d.engine.verify_invariants().unwrap();
}

#[test]
fn test_emergency_after_unlock_points_to_convert() {
    let d = deploy();
    d.engine.stake(&addr("alice"), 10_000, Tier::Standard).unwrap();
    advance(&d, STANDARD_LOCK_SECS, 100);

    assert!(matches!(
        d.engine.emergency_withdraw(&addr("alice")),
        Err(Error::UseConvertInstead { unlock_time }) if unlock_time == T0 + STANDARD_LOCK_SECS
    ));
}

#[test]
fn test_total_fees_accounting() {
    let admin = addr("admin");
    let d = deploy_with(
        EngineParams::default(),
        Arc::new(RolePolicy::with_admin(admin)),
    );

    d.engine.stake(&addr("alice"), 10_000, Tier::Standard).unwrap();
    d.engine.stake(&addr("bob"), 20_000, Tier::Elite).unwrap();
    d.engine.emergency_withdraw(&addr("bob")).unwrap();
    assert_eq!(d.engine.treasury_summary().unwrap().total_fees, 2_280);

    // Only admins and collectors may withdraw
    assert!(matches!(
        d.engine.withdraw_fees(&addr("mallory"), &addr("mallory"), 10),
        Err(Error::Unauthorized(_))
    ));

    let remaining = d.engine.withdraw_fees(&admin, &admin, 280).unwrap();
    assert_eq!(remaining, 2_000);
    assert_eq!(d.value.balance_of(&admin), 1_000_000 + 280);

    assert!(matches!(
        d.engine.withdraw_fees(&admin, &admin, 2_001),
        Err(Error::InsufficientFees {
            required: 2_001,
            available: 2_000
        })
    ));
    d.engine.verify_invariants().unwrap();
}

#[test]
fn test_yield_shortfall_capped() {
    let d = deploy_with(
        EngineParams::default().with_yield_shortfall(YieldShortfallPolicy::CapToPool),
        Arc::new(OpenPolicy),
    );
    let alice = addr("alice");
    d.engine.deposit_yield(&addr("admin"), 50).unwrap();
    d.engine.stake(&alice, 10_000, Tier::Standard).unwrap();
    advance(&d, STANDARD_LOCK_SECS + 1, 100);

    let converted = d.engine.convert(&alice).unwrap();
    assert_eq!(converted.yield_paid, 50);
    assert_eq!(converted.yield_shortfall, 153);

    let last = d.engine.recent_events(1).unwrap();
    assert!(matches!(&last[0], ProtocolEvent::Converted(e) if e.yield_shortfall == 153));
}

#[test]
fn test_yield_shortfall_rejected_when_opted_in() {
    let d = deploy_with(
        EngineParams::default().with_yield_shortfall(YieldShortfallPolicy::Reject),
        Arc::new(OpenPolicy),
    );
    let alice = addr("alice");
    d.engine.stake(&alice, 10_000, Tier::Standard).unwrap();
    advance(&d, STANDARD_LOCK_SECS + 1, 100);

    assert_eq!(
        d.engine.convert(&alice).unwrap_err(),
        Error::InsufficientYieldPool { required: 203, available: 0 }
    );
    assert_eq!(d.backed.balance_of(&alice), 0);
    assert_eq!(d.receipt.balance_of(&alice), 1);

    d.engine.deposit_yield(&addr("admin"), 203).unwrap();
    assert_eq!(d.engine.convert(&alice).unwrap().yield_paid, 203);
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATOMICITY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_stake_rolls_back_on_receipt_failure() {
    let d = deploy();
    let alice = addr("alice");
    let before = d.engine.state_hash().unwrap();

    d.receipt.mint_faults().fail_always();
    assert!(d.engine.stake(&alice, 10_000, Tier::Standard).is_err());

    assert_eq!(d.engine.state_hash().unwrap(), before);
    assert_eq!(d.value.balance_of(&alice), 1_000_000);
    assert_eq!(d.value.custody_balance(), 0);
    assert!(d.engine.position(&alice).unwrap().is_none());

    d.receipt.mint_faults().heal();
    d.engine.stake(&alice, 10_000, Tier::Standard).unwrap();
    d.engine.verify_invariants().unwrap();
}

#[test]
fn test_convert_rolls_back_on_mint_failure() {
    let d = deploy();
    let alice = addr("alice");
    d.engine.deposit_yield(&addr("admin"), 1_000).unwrap();
    d.engine.stake(&alice, 10_000, Tier::Standard).unwrap();
    advance(&d, STANDARD_LOCK_SECS + 1, 100);

    let before = d.engine.state_hash().unwrap();
    let balance = d.value.balance_of(&alice);

    d.backed.faults().fail_always();
    assert!(matches!(d.engine.convert(&alice), Err(Error::MintFailed(_))));

    assert_eq!(d.engine.state_hash().unwrap(), before);
    assert_eq!(d.value.balance_of(&alice), balance);
    assert_eq!(d.receipt.balance_of(&alice), 1);
    assert_eq!(d.backed.balance_of(&alice), 0);
    d.engine.verify_invariants().unwrap();

    d.backed.faults().heal();
    assert_eq!(d.engine.convert(&alice).unwrap().yield_paid, 203);
}

#[test]
fn test_withdraw_rolls_back_on_transfer_failure() {
    let d = deploy();
    let bob = addr("bob");
    d.engine.stake(&bob, 20_000, Tier::Premium).unwrap();
    let before = d.engine.state_hash().unwrap();

    d.value.faults().fail_always();
    assert!(d.engine.emergency_withdraw(&bob).is_err());
    d.value.faults().heal();

    assert_eq!(d.engine.state_hash().unwrap(), before);
    assert_eq!(d.receipt.balance_of(&bob), 1);
    assert_eq!(d.engine.treasury_summary().unwrap().total_fees, 200);
    d.engine.verify_invariants().unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONCURRENCY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_concurrent_stakes_single_position() {
    let d = deploy();
    let alice = addr("alice");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&d.engine);
            thread::spawn(move || engine.stake(&alice, 10_000, Tier::Standard))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, Error::DuplicatePosition(_))));

    assert_eq!(d.receipt.balance_of(&alice), 1);
    assert_eq!(d.value.balance_of(&alice), 990_000);
    d.engine.verify_invariants().unwrap();
}

#[test]
fn test_concurrent_mixed_owners() {
    let d = deploy();
    let users = ["alice", "bob", "carol"];

    let handles: Vec<_> = users
        .iter()
        .flat_map(|user| {
            let owner = addr(user);
            (0..4).map(move |_| owner)
        })
        .map(|owner| {
            let engine = Arc::clone(&d.engine);
            thread::spawn(move || engine.stake(&owner, 1_000, Tier::Premium).is_ok())
        })
        .collect();

    let opened = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(opened, users.len());
    assert_eq!(d.engine.open_positions().unwrap(), 3);
    assert_eq!(d.engine.treasury_summary().unwrap().total_staked, 3 * 990);
    d.engine.verify_invariants().unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// PERSISTENCE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_file_backed_resume() {
    let dir = tempfile::tempdir().unwrap();
    let d = deploy();
    let alice = addr("alice");
    d.engine.deposit_yield(&addr("admin"), 1_000).unwrap();
    d.engine.stake(&alice, 10_000, Tier::Standard).unwrap();

    let expected = d.engine.state_hash().unwrap();
    {
        let store = StateStore::new(FileStore::open(dir.path()).unwrap());
        store.save_engine(&d.engine.snapshot().unwrap(), d.clock.now()).unwrap();
    }

    let store = StateStore::new(FileStore::open(dir.path()).unwrap());
    let snapshot = store.load_engine().unwrap().unwrap();
    let resumed = RedemptionProtocol::from_snapshot(
        d.engine.address(),
        snapshot,
        collaborators(&d, Arc::new(OpenPolicy)),
    );
    assert_eq!(resumed.state_hash().unwrap(), expected);

    advance(&d, STANDARD_LOCK_SECS + 1, 100);
    assert_eq!(resumed.convert(&alice).unwrap().yield_paid, 203);
    resumed.verify_invariants().unwrap();
}
