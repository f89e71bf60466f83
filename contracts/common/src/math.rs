//! Mathematical Utilities
//!
//! Checked basis-point arithmetic. Everything widens to `u128` before
//! multiplying so `u64` prices and amounts cannot overflow mid-computation.

use crate::constants::bps::BPS_DENOMINATOR;
use crate::errors::{RiskError, RiskResult};

/// Compute `a * b / c` without intermediate overflow
pub fn mul_div(a: u64, b: u64, c: u64) -> RiskResult<u64> {
    if c == 0 {
        return Err(RiskError::DivisionByZero);
    }
    let result = (a as u128)
        .checked_mul(b as u128)
        .ok_or(RiskError::Overflow)?
        / c as u128;

    u64::try_from(result).map_err(|_| RiskError::Overflow)
}

/// Express `part / whole` in basis points
///
/// A zero `whole` yields 0 rather than an error: an empty vault has no
/// liquidity ratio to speak of.
pub fn ratio_bps(part: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    ((part as u128 * BPS_DENOMINATOR as u128) / whole as u128).min(u64::MAX as u128) as u64
}

/// Drop from `previous` to `current` in basis points (0 on a rise)
///
/// drop_bps = (previous - current) * 10000 / previous
pub fn drop_bps(previous: u64, current: u64) -> RiskResult<u64> {
    if previous == 0 {
        return Err(RiskError::DivisionByZero);
    }
    if current >= previous {
        return Ok(0);
    }
    mul_div(previous - current, BPS_DENOMINATOR, previous)
}

/// Absolute deviation of `value` from `reference` in basis points
pub fn deviation_bps(value: u64, reference: u64) -> u64 {
    if reference == 0 {
        return 0;
    }
    let diff = value.abs_diff(reference);
    ((diff as u128 * BPS_DENOMINATOR as u128) / reference as u128).min(u64::MAX as u128) as u64
}

/// Weighted mean of `(value, weight)` pairs
pub fn weighted_mean(pairs: &[(u64, u64)]) -> RiskResult<u64> {
    let mut weighted_sum: u128 = 0;
    let mut total_weight: u128 = 0;

    for &(value, weight) in pairs {
        weighted_sum = weighted_sum
            .checked_add(value as u128 * weight as u128)
            .ok_or(RiskError::Overflow)?;
        total_weight += weight as u128;
    }

    if total_weight == 0 {
        return Err(RiskError::DivisionByZero);
    }

    u64::try_from(weighted_sum / total_weight).map_err(|_| RiskError::Overflow)
}

/// Checked addition
pub fn safe_add(a: u64, b: u64) -> RiskResult<u64> {
    a.checked_add(b).ok_or(RiskError::Overflow)
}

/// Checked subtraction
pub fn safe_sub(a: u64, b: u64) -> RiskResult<u64> {
    a.checked_sub(b).ok_or(RiskError::Underflow)
}
