//! Engine configuration and parameters.
//!
//! Parameters are divided into:
//! - Fixed: the tier policy table (see [`crate::core::tier`])
//! - Administrable: fee, penalty, coverage and staleness, each with hard bounds
//!   enforced here regardless of who sets them
//!
//! Parameters load from JSON and may be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::constants::*;

// ═══════════════════════════════════════════════════════════════════════════════
// BOUNDS
// ═══════════════════════════════════════════════════════════════════════════════

fn check_bounds(name: &str, value: u64, min: u64, max: u64) -> Result<u64> {
    if value < min || value > max {
        return Err(Error::ParameterOutOfBounds {
            name: name.into(),
            value,
            min,
            max,
        });
    }
    Ok(value)
}

/// Deposit fee: [0, 500] bps
pub fn validate_fee_bps(value: u64) -> Result<u64> {
    check_bounds("fee_bps", value, 0, MAX_FEE_BPS)
}

/// Early-exit penalty: [0, 2000] bps
pub fn validate_penalty_bps(value: u64) -> Result<u64> {
    check_bounds("penalty_bps", value, 0, MAX_PENALTY_BPS)
}

/// Required coverage: at least 100%
pub fn validate_coverage_bps(value: u64) -> Result<u64> {
    check_bounds("coverage_bps", value, MIN_COVERAGE_BPS, MAX_COVERAGE_BPS)
}

/// Staleness threshold: (0, 7d]
pub fn validate_staleness_secs(value: u64) -> Result<u64> {
    check_bounds("staleness_threshold_secs", value, 1, MAX_STALENESS_SECS)
}

/// Base yield rate: [0, 10000] bps
pub fn validate_base_yield_bps(value: u64) -> Result<u64> {
    check_bounds("base_yield_rate_bps", value, 0, MAX_BASE_YIELD_BPS)
}

// ═══════════════════════════════════════════════════════════════════════════════
// YIELD SHORTFALL POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// What convert does when the pooled yield cannot cover the computed yield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldShortfallPolicy {
    /// Pay what the pool holds and record the shortfall
    #[default]
    CapToPool,
    /// Fail the conversion with `InsufficientYieldPool`
    Reject,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Administrable engine parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Deposit fee in basis points (≤ 5%)
    pub fee_bps: u64,
    /// Early-exit penalty in basis points (≤ 20%)
    pub penalty_bps: u64,
    /// Required reserve coverage in basis points (≥ 100%)
    pub coverage_bps: u64,
    /// Maximum age of a reserve attestation in seconds
    pub staleness_threshold_secs: u64,
    /// Annual base yield in basis points, before tier multiplier
    pub base_yield_rate_bps: u64,
    /// Behavior when the yield pool is short
    pub yield_shortfall: YieldShortfallPolicy,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            fee_bps: DEFAULT_FEE_BPS,
            penalty_bps: DEFAULT_PENALTY_BPS,
            coverage_bps: DEFAULT_COVERAGE_BPS,
            staleness_threshold_secs: DEFAULT_STALENESS_SECS,
            base_yield_rate_bps: DEFAULT_BASE_YIELD_BPS,
            yield_shortfall: YieldShortfallPolicy::CapToPool,
        }
    }
}

impl EngineParams {
    /// Create with custom fee and penalty (for testing)
    pub fn with_fees(mut self, fee_bps: u64, penalty_bps: u64) -> Self {
        self.fee_bps = fee_bps;
        self.penalty_bps = penalty_bps;
        self
    }

    /// Create with custom coverage requirement
    pub fn with_coverage(mut self, coverage_bps: u64) -> Self {
        self.coverage_bps = coverage_bps;
        self
    }

    /// Create with custom base yield rate
    pub fn with_base_yield(mut self, base_yield_rate_bps: u64) -> Self {
        self.base_yield_rate_bps = base_yield_rate_bps;
        self
    }

    /// Create with a yield shortfall policy
    pub fn with_yield_shortfall(mut self, policy: YieldShortfallPolicy) -> Self {
        self.yield_shortfall = policy;
        self
    }

    /// Check every parameter against its hard bounds
    pub fn validate(&self) -> Result<()> {
        validate_fee_bps(self.fee_bps)?;
        validate_penalty_bps(self.penalty_bps)?;
        validate_coverage_bps(self.coverage_bps)?;
        validate_staleness_secs(self.staleness_threshold_secs)?;
        validate_base_yield_bps(self.base_yield_rate_bps)?;
        Ok(())
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let params: Self =
            serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Override fields from `TIERSTAKE_*` environment variables
    pub fn apply_env(mut self) -> Result<Self> {
        fn read(var: &str) -> Result<Option<u64>> {
            match std::env::var(var) {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| Error::Config(format!("{} is not an integer: {}", var, raw))),
                Err(_) => Ok(None),
            }
        }

        if let Some(v) = read("TIERSTAKE_FEE_BPS")? {
            self.fee_bps = v;
        }
        if let Some(v) = read("TIERSTAKE_PENALTY_BPS")? {
            self.penalty_bps = v;
        }
        if let Some(v) = read("TIERSTAKE_COVERAGE_BPS")? {
            self.coverage_bps = v;
        }
        if let Some(v) = read("TIERSTAKE_STALENESS_SECS")? {
            self.staleness_threshold_secs = v;
        }
        if let Some(v) = read("TIERSTAKE_BASE_YIELD_BPS")? {
            self.base_yield_rate_bps = v;
        }
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_valid() {
        let params = EngineParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.coverage_bps, DEFAULT_COVERAGE_BPS);
        assert_eq!(params.yield_shortfall, YieldShortfallPolicy::CapToPool);
    }

    #[test]
    fn test_bounds() {
        assert!(validate_fee_bps(500).is_ok());
        assert!(validate_fee_bps(501).is_err());
        assert!(validate_penalty_bps(2_000).is_ok());
        assert!(validate_penalty_bps(2_001).is_err());
        assert!(validate_coverage_bps(9_999).is_err());
        assert!(validate_coverage_bps(10_000).is_ok());
        assert!(validate_staleness_secs(0).is_err());
        assert!(validate_staleness_secs(3_600).is_ok());
    }

    #[test]
    fn test_out_of_bounds_reports_limits() {
        let err = EngineParams::default().with_fees(600, 0).validate().unwrap_err();
        assert_eq!(
            err,
            Error::ParameterOutOfBounds {
                name: "fee_bps".into(),
                value: 600,
                min: 0,
                max: MAX_FEE_BPS,
            }
        );
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        let params = EngineParams::default()
            .with_coverage(15_000)
            .with_yield_shortfall(YieldShortfallPolicy::Reject);
        params.save(&path).unwrap();
        assert_eq!(EngineParams::load(&path).unwrap(), params);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: EngineParams = serde_json::from_str(r#"{"fee_bps": 250}"#).unwrap();
        assert_eq!(params.fee_bps, 250);
        assert_eq!(params.penalty_bps, DEFAULT_PENALTY_BPS);
    }

    #[test]
    fn test_load_rejects_out_of_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, r#"{"penalty_bps": 5000}"#).unwrap();
        assert!(matches!(
            EngineParams::load(&path),
            Err(Error::ParameterOutOfBounds { .. })
        ));
    }
}
