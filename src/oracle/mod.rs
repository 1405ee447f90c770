//! Reserve attestation oracle.
//!
//! - [`ReserveFeed`] capability and [`ReserveAttestation`] readings
//! - Manual and file-backed feeds
//! - [`CoverageGate`]: freshness, health and coverage checks

pub mod attestation;
pub mod feeds;
pub mod gate;

pub use attestation::{ReserveAttestation, ReserveFeed};
pub use feeds::{FileReserveFeed, ManualReserveFeed};
pub use gate::CoverageGate;
