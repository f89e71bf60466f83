//! Validation Helpers
//!
//! Reusable input checks shared by every component.
//!
//! ```rust,ignore
//! use vaultguard_common::check;
//!
//! check!(amount > 0, RiskError::ZeroAmount);
//! ```

use crate::constants::bps::BPS_DENOMINATOR;
use crate::errors::{RiskError, RiskResult};
use crate::types::{is_zero_address, Address};

/// Return `Err($error)` from the enclosing function unless `$condition` holds
#[macro_export]
macro_rules! check {
    ($condition:expr, $error:expr) => {
        if !($condition) {
            return Err($error);
        }
    };
}

/// Reject the all-zero identifier
pub fn require_nonzero_address(address: &Address, reason: &'static str) -> RiskResult<()> {
    check!(!is_zero_address(address), RiskError::InvalidAddress { reason });
    Ok(())
}

/// Reject zero amounts
pub fn require_nonzero_amount(amount: u64) -> RiskResult<()> {
    check!(amount > 0, RiskError::ZeroAmount);
    Ok(())
}

/// Reject basis-point values outside `1..=10000`
pub fn require_bps(value: u64, param: &'static str) -> RiskResult<()> {
    check!(
        value > 0 && value <= BPS_DENOMINATOR,
        RiskError::InvalidInput {
            param,
            reason: "must be within 1..=10000",
        }
    );
    Ok(())
}
