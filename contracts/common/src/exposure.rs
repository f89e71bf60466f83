//! Exposure Guards
//!
//! Limits applied to target positions before they are traded: gross
//! leverage over NAV, each asset's notional over NAV, and estimated order
//! slippage. Notionals are absolute values; direction does not matter.

use tracing::warn;

use crate::config::ExposureParams;
use crate::constants::bps::BPS_DENOMINATOR;
use crate::errors::{RiskError, RiskResult};
use crate::math::{mul_div, safe_add};

/// Gross leverage of `notionals` over `nav`, in basis points
///
/// Fails with `LeverageExceeded` above `max_leverage_bps`.
pub fn check_leverage(notionals: &[u64], nav: u64, max_leverage_bps: u64) -> RiskResult<u64> {
    if nav == 0 {
        return Err(RiskError::InvalidInput {
            param: "nav",
            reason: "must be positive",
        });
    }

    let gross = notionals.iter().try_fold(0u64, |acc, n| safe_add(acc, *n))?;
    let leverage_bps = mul_div(gross, BPS_DENOMINATOR, nav)?;
    if leverage_bps > max_leverage_bps {
        warn!(leverage_bps, max_leverage_bps, "leverage cap exceeded");
        return Err(RiskError::LeverageExceeded {
            leverage_bps,
            max_leverage_bps,
        });
    }
    Ok(leverage_bps)
}

/// Every notional must stay within `max_asset_share_bps` of `nav`
pub fn check_asset_caps(notionals: &[u64], nav: u64, max_asset_share_bps: u64) -> RiskResult<()> {
    let limit = mul_div(nav, max_asset_share_bps, BPS_DENOMINATOR)?;
    match notionals.iter().position(|n| *n > limit) {
        Some(index) => {
            warn!(index, notional = notionals[index], limit, "per-asset cap exceeded");
            Err(RiskError::AssetCapExceeded {
                index,
                notional: notionals[index],
                limit,
            })
        }
        None => Ok(()),
    }
}

/// Pass an estimated slippage through the tolerance
pub fn check_slippage(slippage_bps: u64, max_slippage_bps: u64) -> RiskResult<u64> {
    if slippage_bps > max_slippage_bps {
        warn!(slippage_bps, max_slippage_bps, "slippage cap exceeded");
        return Err(RiskError::SlippageExceeded {
            slippage_bps,
            max_slippage_bps,
        });
    }
    Ok(slippage_bps)
}

impl ExposureParams {
    /// Leverage then per-asset check of a target book; returns the leverage
    pub fn check_targets(&self, notionals: &[u64], nav: u64) -> RiskResult<u64> {
        let leverage_bps = check_leverage(notionals, nav, self.max_leverage_bps)?;
        check_asset_caps(notionals, nav, self.max_asset_share_bps)?;
        Ok(leverage_bps)
    }

    /// Slippage check against the configured tolerance
    pub fn check_slippage(&self, slippage_bps: u64) -> RiskResult<u64> {
        check_slippage(slippage_bps, self.max_slippage_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leverage() {
        assert_eq!(check_leverage(&[6_000, 9_000], 10_000, 20_000).unwrap(), 15_000);
        assert_eq!(check_leverage(&[10_000, 10_000], 10_000, 20_000).unwrap(), 20_000);

        let over = check_leverage(&[10_000, 10_001], 10_000, 20_000);
        assert!(matches!(
            over,
            Err(RiskError::LeverageExceeded { leverage_bps: 20_001, max_leverage_bps: 20_000 })
        ));
    }

    #[test]
    fn test_leverage_requires_nav() {
        assert!(matches!(
            check_leverage(&[1], 0, 20_000),
            Err(RiskError::InvalidInput { param: "nav", .. })
        ));
        assert_eq!(check_leverage(&[], 1_000, 20_000).unwrap(), 0);
    }

    #[test]
    fn test_asset_caps() {
        assert!(check_asset_caps(&[15_000, 4_000], 10_000, 15_000).is_ok());

        let result = check_asset_caps(&[4_000, 15_001], 10_000, 15_000);
        assert!(matches!(
            result,
            Err(RiskError::AssetCapExceeded { index: 1, notional: 15_001, limit: 15_000 })
        ));
    }

    #[test]
    fn test_slippage() {
        assert_eq!(check_slippage(50, 50).unwrap(), 50);
        assert!(matches!(
            check_slippage(51, 50),
            Err(RiskError::SlippageExceeded { slippage_bps: 51, max_slippage_bps: 50 })
        ));
    }

    #[test]
    fn test_params_check_targets() {
        let params = ExposureParams::default();
        assert_eq!(params.check_targets(&[10_000, 5_000], 10_000).unwrap(), 15_000);

        // Within leverage but one leg above its share
        let lopsided = params.check_targets(&[16_000, 0], 10_000);
        assert!(matches!(lopsided, Err(RiskError::AssetCapExceeded { index: 0, .. })));

        let levered = params.check_targets(&[15_000, 15_000, 1], 10_000);
        assert!(matches!(levered, Err(RiskError::LeverageExceeded { .. })));
    }
}
