//! # tierstake
//!
//! A tiered staking engine with a fee-taking treasury and a reserve-gated
//! redemption path. Users lock value in one of three tiers, receive a
//! non-transferable receipt, and after the lock either convert the position
//! into one unit of a reserve-backed asset plus yield, or leave early and pay
//! a penalty.
//!
//! ## Architecture
//!
//! - **Core**: tiers, the position ledger, the treasury ledger and parameters
//! - **Oracle**: reserve attestations and the coverage gate
//! - **Protocol**: the redemption engine, its events and results
//! - **Integration**: capabilities consumed from asset collaborators
//! - **Storage**: snapshot persistence
//! - **CLI**: operator tooling over a local deployment
//!
//! ## Example
//!
//! ```rust,ignore
//! use tierstake::prelude::*;
//!
//! let engine = RedemptionProtocol::new(address, EngineParams::default(), collaborators)?;
//! let staked = engine.stake(&alice, 1_000, Tier::Standard)?;
//! // ... 150 days later
//! let converted = engine.convert(&alice)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod auth;
pub mod cli;
pub mod core;
pub mod error;
pub mod integration;
pub mod oracle;
pub mod protocol;
pub mod storage;
pub mod utils;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::auth::{Action, AuthorizationPolicy, OpenPolicy, RolePolicy};
    pub use crate::core::{
        config::{EngineParams, YieldShortfallPolicy},
        position::{Position, PositionLedger},
        tier::Tier,
        treasury::{TreasuryLedger, TreasurySummary},
    };
    pub use crate::error::{Error, Result};
    pub use crate::integration::capabilities::{BackedAsset, ReceiptToken, ValueTransfer};
    pub use crate::oracle::{
        attestation::{ReserveAttestation, ReserveFeed},
        gate::CoverageGate,
    };
    pub use crate::protocol::{
        engine::{Collaborators, RedemptionProtocol},
        events::ProtocolEvent,
        operations::{ConvertResult, PositionView, StakeResult, WithdrawResult},
    };
    pub use crate::utils::{
        crypto::{Address, Hash},
        time::{Clock, ManualClock, SystemClock},
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name
pub const ENGINE_NAME: &str = "tierstake";
