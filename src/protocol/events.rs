//! Protocol events for state change notifications.
//!
//! Every committed transition appends one event. The log is append-only: no
//! entry is ever removed. A running sha256 chain hash over every appended event
//! lets a consumer check an exported copy against the head.

use serde::{Deserialize, Serialize};

use crate::core::tier::Tier;
use crate::utils::crypto::{Address, Hash};

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All protocol event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    /// Position opened
    Staked(StakedEvent),
    /// Position converted into the backed asset
    Converted(ConvertedEvent),
    /// Position exited before unlock
    EarlyWithdraw(EarlyWithdrawEvent),
    /// Yield added to the pool
    YieldDeposited(YieldDepositedEvent),
    /// Fees withdrawn from the treasury
    FeesWithdrawn(FeesWithdrawnEvent),
    /// Administrable parameter changed
    ParameterChanged(ParameterChangedEvent),
}

impl ProtocolEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Staked(_) => "Staked",
            Self::Converted(_) => "Converted",
            Self::EarlyWithdraw(_) => "EarlyWithdraw",
            Self::YieldDeposited(_) => "YieldDeposited",
            Self::FeesWithdrawn(_) => "FeesWithdrawn",
            Self::ParameterChanged(_) => "ParameterChanged",
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Staked(e) => e.timestamp,
            Self::Converted(e) => e.timestamp,
            Self::EarlyWithdraw(e) => e.timestamp,
            Self::YieldDeposited(e) => e.timestamp,
            Self::FeesWithdrawn(e) => e.timestamp,
            Self::ParameterChanged(e) => e.timestamp,
        }
    }

    /// Account the event is about
    pub fn subject(&self) -> &Address {
        match self {
            Self::Staked(e) => &e.owner,
            Self::Converted(e) => &e.owner,
            Self::EarlyWithdraw(e) => &e.owner,
            Self::YieldDeposited(e) => &e.from,
            Self::FeesWithdrawn(e) => &e.to,
            Self::ParameterChanged(e) => &e.changed_by,
        }
    }

    /// Compute event hash
    pub fn hash(&self) -> Hash {
        let data = bincode::serialize(self).unwrap_or_default();
        Hash::sha256(&data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when a position is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakedEvent {
    /// Position owner
    pub owner: Address,
    /// Selected tier
    pub tier: Tier,
    /// Amount pulled from the owner
    pub gross_amount: u64,
    /// Deposit fee skimmed
    pub fee: u64,
    /// Net amount credited to the position
    pub deposited_amount: u64,
    /// Unlock timestamp
    pub unlock_time: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a position is converted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedEvent {
    /// Position owner
    pub owner: Address,
    /// Tier of the closed position
    pub tier: Tier,
    /// Principal settled
    pub deposited_amount: u64,
    /// Yield paid
    pub yield_paid: u64,
    /// Computed yield the pool could not cover
    pub yield_shortfall: u64,
    /// Backed units issued
    pub backed_units: u64,
    /// Coverage ratio at mint time
    pub coverage_ratio_bps: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a position is exited early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyWithdrawEvent {
    /// Position owner
    pub owner: Address,
    /// Tier of the closed position
    pub tier: Tier,
    /// Net deposit of the position
    pub deposited_amount: u64,
    /// Penalty retained as fee
    pub penalty: u64,
    /// Amount returned to the owner
    pub payout: u64,
    /// Lock time that was left
    pub remaining_lock_secs: u64,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREASURY EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when yield is added to the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldDepositedEvent {
    /// Source account
    pub from: Address,
    /// Amount added
    pub amount: u64,
    /// Pool balance afterwards
    pub pool_balance: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when fees leave the treasury
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeesWithdrawnEvent {
    /// Recipient
    pub to: Address,
    /// Amount withdrawn
    pub amount: u64,
    /// Fees left
    pub remaining_fees: u64,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when an administrable parameter changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterChangedEvent {
    /// Parameter that changed
    pub parameter: String,
    /// Old value
    pub old_value: u64,
    /// New value
    pub new_value: u64,
    /// Who changed it
    pub changed_by: Address,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Append-only event log with a running chain hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<ProtocolEvent>,
    head: Hash,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            head: Hash::zero(),
        }
    }

    /// Append an event
    pub fn push(&mut self, event: ProtocolEvent) {
        self.head = self.head.chain(event.hash().as_bytes());
        self.events.push(event);
    }

    /// All events, oldest first
    pub fn events(&self) -> impl Iterator<Item = &ProtocolEvent> {
        self.events.iter()
    }

    /// The most recent `n` events, oldest first
    pub fn tail(&self, n: usize) -> Vec<&ProtocolEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events[skip..].iter().collect()
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&ProtocolEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Events about `subject`
    pub fn for_subject(&self, subject: &Address) -> Vec<&ProtocolEvent> {
        self.events.iter().filter(|e| e.subject() == subject).collect()
    }

    /// Most recent event
    pub fn last(&self) -> Option<&ProtocolEvent> {
        self.events.last()
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Chain hash over every event appended
    pub fn head(&self) -> Hash {
        self.head
    }

    /// Recompute the chain over the stored events and compare with the head
    pub fn verify_chain(&self) -> bool {
        let recomputed = self
            .events
            .iter()
            .fold(Hash::zero(), |head, event| head.chain(event.hash().as_bytes()));
        recomputed == self.head
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn staked(label: &str, timestamp: u64) -> ProtocolEvent {
        ProtocolEvent::Staked(StakedEvent {
            owner: Address::from_label(label),
            tier: Tier::Standard,
            gross_amount: 10_000,
            fee: 100,
            deposited_amount: 9_900,
            unlock_time: timestamp + Tier::Standard.lock_duration(),
            timestamp,
        })
    }

    #[test]
    fn test_event_types() {
        let event = staked("alice", 1234567890);
        assert_eq!(event.event_type(), "Staked");
        assert_eq!(event.timestamp(), 1234567890);
        assert_eq!(event.subject(), &Address::from_label("alice"));
    }

    #[test]
    fn test_event_log() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        log.push(staked("alice", 100));
        log.push(ProtocolEvent::FeesWithdrawn(FeesWithdrawnEvent {
            to: Address::from_label("ops"),
            amount: 50,
            remaining_fees: 50,
            timestamp: 101,
        }));

        assert_eq!(log.len(), 2);
        assert_eq!(log.filter_by_type("Staked").len(), 1);
        assert_eq!(log.filter_by_type("FeesWithdrawn").len(), 1);
        assert_eq!(log.for_subject(&Address::from_label("alice")).len(), 1);
        assert_eq!(log.last().map(|e| e.event_type()), Some("FeesWithdrawn"));
    }

    #[test]
    fn test_event_hash() {
        let event = staked("alice", 100);
        assert_eq!(event.hash(), event.hash());
        assert!(!event.hash().is_zero());
        assert_ne!(event.hash(), staked("alice", 101).hash());
    }

    #[test]
    fn test_chain_head() {
        let mut a = EventLog::new();
        let mut b = EventLog::new();
        assert!(a.head().is_zero());

        a.push(staked("alice", 1));
        a.push(staked("bob", 2));
        b.push(staked("bob", 2));
        b.push(staked("alice", 1));

        // Order matters
        assert_ne!(a.head(), b.head());
    }

    #[test]
    fn test_log_keeps_every_event() {
        let mut log = EventLog::new();
        for t in 0..=10_000 {
            log.push(staked("alice", t));
        }

        assert_eq!(log.len(), 10_001);
        assert_eq!(log.events().next().map(|e| e.timestamp()), Some(0));
        let timestamps: Vec<u64> = log.events().map(|e| e.timestamp()).collect();
        assert_eq!(timestamps, (0..=10_000).collect::<Vec<u64>>());
        assert_eq!(log.tail(1)[0].timestamp(), 10_000);
        assert_eq!(log.tail(20_000).len(), 10_001);
        assert!(log.verify_chain());
    }

    #[test]
    fn test_verify_chain_detects_missing_event() {
        let mut log = EventLog::new();
        for t in 0..3 {
            log.push(staked("alice", t));
        }
        assert!(log.verify_chain());

        let mut tampered = log.clone();
        tampered.events.remove(0);
        assert!(!tampered.verify_chain());
    }
}
