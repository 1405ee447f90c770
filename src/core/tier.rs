//! Staking tiers and their fixed policy table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::constants::*;

/// Lock duration and yield multiplier for a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Seconds between stake and unlock
    pub lock_duration_secs: u64,
    /// Yield multiplier in basis points (10000 = 1.0x)
    pub yield_multiplier_bps: u64,
}

/// Staking tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// 150 days, 1.00x
    Standard,
    /// 300 days, 1.15x
    Premium,
    /// 540 days, 1.30x
    Elite,
}

impl Tier {
    /// All tiers, shortest lock first
    pub const ALL: [Tier; 3] = [Tier::Standard, Tier::Premium, Tier::Elite];

    /// Policy for this tier. The table is fixed and not configurable per instance.
    pub const fn policy(&self) -> TierPolicy {
        match self {
            Tier::Standard => TierPolicy {
                lock_duration_secs: STANDARD_LOCK_SECS,
                yield_multiplier_bps: STANDARD_MULTIPLIER_BPS,
            },
            Tier::Premium => TierPolicy {
                lock_duration_secs: PREMIUM_LOCK_SECS,
                yield_multiplier_bps: PREMIUM_MULTIPLIER_BPS,
            },
            Tier::Elite => TierPolicy {
                lock_duration_secs: ELITE_LOCK_SECS,
                yield_multiplier_bps: ELITE_MULTIPLIER_BPS,
            },
        }
    }

    /// Lock duration in seconds
    pub const fn lock_duration(&self) -> u64 {
        self.policy().lock_duration_secs
    }

    /// Yield multiplier in basis points
    pub const fn multiplier_bps(&self) -> u64 {
        self.policy().yield_multiplier_bps
    }

    /// Lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::Premium => "premium",
            Tier::Elite => "elite",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "standard" | "std" => Ok(Tier::Standard),
            "premium" | "prem" => Ok(Tier::Premium),
            "elite" => Ok(Tier::Elite),
            other => Err(Error::UnknownTier(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_table() {
        assert_eq!(Tier::Standard.lock_duration(), 150 * SECS_PER_DAY);
        assert_eq!(Tier::Premium.lock_duration(), 300 * SECS_PER_DAY);
        assert_eq!(Tier::Elite.lock_duration(), 540 * SECS_PER_DAY);

        assert_eq!(Tier::Standard.multiplier_bps(), 10_000);
        assert_eq!(Tier::Premium.multiplier_bps(), 11_500);
        assert_eq!(Tier::Elite.multiplier_bps(), 13_000);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Standard".parse::<Tier>().unwrap(), Tier::Standard);
        assert_eq!("premium".parse::<Tier>().unwrap(), Tier::Premium);
        assert_eq!("ELITE".parse::<Tier>().unwrap(), Tier::Elite);
        assert!(matches!("gold".parse::<Tier>(), Err(Error::UnknownTier(_))));
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Tier::Elite).unwrap(), "\"elite\"");
    }
}
