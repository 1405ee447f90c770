//! Engine constants and fixed policy values.
//!
//! All engine-wide constants are defined here for easy auditing.

// ═══════════════════════════════════════════════════════════════════════════════
// ARITHMETIC
// ═══════════════════════════════════════════════════════════════════════════════

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// TIME CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Seconds per day
pub const SECS_PER_DAY: u64 = 86_400;

/// Seconds per (365-day) year, used for yield accrual
pub const SECS_PER_YEAR: u64 = 365 * SECS_PER_DAY;

// ═══════════════════════════════════════════════════════════════════════════════
// TIER POLICY TABLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Standard tier lock duration - 150 days
pub const STANDARD_LOCK_SECS: u64 = 150 * SECS_PER_DAY;

/// Premium tier lock duration - 300 days
pub const PREMIUM_LOCK_SECS: u64 = 300 * SECS_PER_DAY;

/// Elite tier lock duration - 540 days
pub const ELITE_LOCK_SECS: u64 = 540 * SECS_PER_DAY;

/// Standard tier yield multiplier - 1.00x
pub const STANDARD_MULTIPLIER_BPS: u64 = 10_000;

/// Premium tier yield multiplier - 1.15x
pub const PREMIUM_MULTIPLIER_BPS: u64 = 11_500;

/// Elite tier yield multiplier - 1.30x
pub const ELITE_MULTIPLIER_BPS: u64 = 13_000;

/// Receipt units minted per position (always exactly one)
pub const RECEIPT_UNITS_PER_POSITION: u64 = 1;

/// Backed-asset whole units minted per conversion
pub const BACKED_UNITS_PER_CONVERSION: u64 = 1;

// ═══════════════════════════════════════════════════════════════════════════════
// FEE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default deposit fee - 1% (100 basis points)
pub const DEFAULT_FEE_BPS: u64 = 100;

/// Hard ceiling on the deposit fee - 5%
pub const MAX_FEE_BPS: u64 = 500;

/// Default early-exit penalty - 10%
pub const DEFAULT_PENALTY_BPS: u64 = 1_000;

/// Hard ceiling on the early-exit penalty - 20%
pub const MAX_PENALTY_BPS: u64 = 2_000;

// ═══════════════════════════════════════════════════════════════════════════════
// COVERAGE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default required reserve coverage - 125%
pub const DEFAULT_COVERAGE_BPS: u64 = 12_500;

/// Coverage can never be configured below 100%
pub const MIN_COVERAGE_BPS: u64 = BPS_DIVISOR;

/// Sanity ceiling on coverage - 1000%
pub const MAX_COVERAGE_BPS: u64 = 100_000;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default reserve attestation staleness threshold (1 hour)
pub const DEFAULT_STALENESS_SECS: u64 = 3_600;

/// Maximum configurable staleness threshold (7 days)
pub const MAX_STALENESS_SECS: u64 = 7 * SECS_PER_DAY;

// ═══════════════════════════════════════════════════════════════════════════════
// YIELD CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default base yield rate - 5% APR
pub const DEFAULT_BASE_YIELD_BPS: u64 = 500;

/// Maximum base yield rate - 100% APR
pub const MAX_BASE_YIELD_BPS: u64 = BPS_DIVISOR;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of a hash in bytes (SHA256)
pub const HASH_LENGTH: usize = 32;

/// Length of an account address in bytes
pub const ADDRESS_LENGTH: usize = 32;
