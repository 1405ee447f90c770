//! Fixed-point integer arithmetic.
//!
//! Every payout in the engine is computed here with checked integer math and
//! floor division over `u128` intermediates. Nothing in this module touches
//! floating point.

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, SECS_PER_YEAR};

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u64, b: u64) -> Result<u64> {
    a.checked_sub(b).ok_or(Error::Underflow {
        operation: format!("{} - {}", a, b),
    })
}

/// Safe multiplication then division, rounding down.
/// Computes (a * b) / c with u128 intermediate to prevent overflow
pub fn safe_mul_div(a: u64, b: u64, c: u64) -> Result<u64> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    let result = (a as u128) * (b as u128) / (c as u128);
    if result > u64::MAX as u128 {
        return Err(Error::Overflow {
            operation: format!("({} * {}) / {}", a, b, c),
        });
    }
    Ok(result as u64)
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEE CALCULATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// floor(amount * bps / 10000)
pub fn calculate_fee_bps(amount: u64, bps: u64) -> Result<u64> {
    safe_mul_div(amount, bps, BPS_DIVISOR)
}

/// Split a gross amount into (net, fee)
pub fn split_fee(gross: u64, fee_bps: u64) -> Result<(u64, u64)> {
    let fee = calculate_fee_bps(gross, fee_bps)?;
    Ok((safe_sub(gross, fee)?, fee))
}

// ═══════════════════════════════════════════════════════════════════════════════
// COVERAGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Reserve coverage in basis points after issuing one more unit.
///
/// `vaulted * 10000 / (outstanding + 1)`. The `+1` accounts for the unit about
/// to be minted so the mint itself can never push coverage below the threshold.
pub fn coverage_ratio_bps(vaulted_units: u64, outstanding_units: u64) -> u64 {
    let denominator = (outstanding_units as u128) + 1;
    let ratio = (vaulted_units as u128) * (BPS_DIVISOR as u128) / denominator;
    ratio.min(u64::MAX as u128) as u64
}

// ═══════════════════════════════════════════════════════════════════════════════
// YIELD
// ═══════════════════════════════════════════════════════════════════════════════

/// Linear yield on `principal` over `elapsed_secs`.
///
/// floor(principal * base_rate_bps * multiplier_bps * elapsed / (10000^2 * year))
///
/// This is the only yield formula in the crate; both the payout path and the
/// read-only projection call it.
pub fn accrued_yield(
    principal: u64,
    base_rate_bps: u64,
    multiplier_bps: u64,
    elapsed_secs: u64,
) -> Result<u64> {
    let overflow = || Error::Overflow {
        operation: "accrued_yield".into(),
    };

    let numerator = (principal as u128)
        .checked_mul(base_rate_bps as u128)
        .and_then(|v| v.checked_mul(multiplier_bps as u128))
        .and_then(|v| v.checked_mul(elapsed_secs as u128))
        .ok_or_else(overflow)?;
    let denominator = (BPS_DIVISOR as u128) * (BPS_DIVISOR as u128) * (SECS_PER_YEAR as u128);

    let result = numerator / denominator;
    if result > u64::MAX as u128 {
        return Err(overflow());
    }
    Ok(result as u64)
}
