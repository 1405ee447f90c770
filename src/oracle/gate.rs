//! Reserve coverage gate.
//!
//! Wraps a [`ReserveFeed`] and decides whether its reading may be trusted:
//! - Healthy: the attester flag is set and the reserve is non-zero
//! - Fresh: `now - last_update <= staleness_threshold`
//!
//! The coverage ratio itself lives in [`crate::utils::math::coverage_ratio_bps`].

use std::fmt;
use std::sync::Arc;

use crate::core::config::validate_staleness_secs;
use crate::error::{Error, Result};
use crate::oracle::attestation::{ReserveAttestation, ReserveFeed};
use crate::utils::math::coverage_ratio_bps;

/// Freshness/health check in front of a reserve feed
#[derive(Clone)]
pub struct CoverageGate {
    feed: Arc<dyn ReserveFeed>,
    staleness_threshold: u64,
}

impl fmt::Debug for CoverageGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageGate")
            .field("staleness_threshold", &self.staleness_threshold)
            .finish_non_exhaustive()
    }
}

impl CoverageGate {
    /// Create a gate over `feed`
    pub fn new(feed: Arc<dyn ReserveFeed>, staleness_threshold: u64) -> Result<Self> {
        Ok(Self {
            feed,
            staleness_threshold: validate_staleness_secs(staleness_threshold)?,
        })
    }

    /// Raw feed reading, unchecked
    pub fn read(&self) -> Result<ReserveAttestation> {
        self.feed.read()
    }

    /// Last attested reserve quantity. Check [`Self::is_healthy`] before
    /// trusting it.
    pub fn total_vaulted_units(&self) -> Result<u64> {
        self.feed.total_vaulted_units()
    }

    /// Whether a fresh, positive reading is available at `now`. Read failures
    /// count as unhealthy.
    pub fn is_healthy(&self, now: u64) -> bool {
        self.check(now).is_ok()
    }

    /// Fresh positive reading or `OracleStale`
    pub fn check(&self, now: u64) -> Result<ReserveAttestation> {
        let reading = self.feed.read()?;
        let age = reading.age(now);
        if !reading.is_positive() || age > self.staleness_threshold {
            return Err(Error::OracleStale {
                age_secs: age,
                max_age_secs: self.staleness_threshold,
            });
        }
        Ok(reading)
    }

    /// Validated reading plus the coverage ratio if one more unit were issued
    /// on top of `outstanding`
    pub fn check_coverage(
        &self,
        now: u64,
        outstanding: u64,
        required_bps: u64,
    ) -> Result<ReserveAttestation> {
        let reading = self.check(now)?;
        let ratio_bps = coverage_ratio_bps(reading.total_vaulted_units, outstanding);
        if ratio_bps < required_bps {
            return Err(Error::InsufficientCoverage {
                ratio_bps,
                required_bps,
            });
        }
        Ok(reading)
    }
}
