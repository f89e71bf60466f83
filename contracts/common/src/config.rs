//! Risk Configuration
//!
//! Tunable parameters for every component, loadable from TOML. Missing keys
//! fall back to the defaults in [`crate::constants`].

use serde::{Deserialize, Serialize};

use crate::constants::{bps::BPS_DENOMINATOR, exposure, liquidity, mev, oracle};
use crate::errors::{RiskError, RiskResult};
use crate::types::{is_zero_address, AssetId};

/// What the aggregator does when a round looks manipulated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManipulationPolicy {
    /// Commit the price and raise the manipulation flag
    #[default]
    Flag,
    /// Abort the round with `PriceManipulation`
    Reject,
}

/// Complete risk core configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Oracle aggregation settings
    #[serde(default)]
    pub oracle: OracleParams,
    /// Liquidity guardian settings
    #[serde(default)]
    pub liquidity: LiquidityParams,
    /// Commit-reveal settings
    #[serde(default)]
    pub mev: MevParams,
    /// Position exposure limits
    #[serde(default)]
    pub exposure: ExposureParams,
}

/// Oracle aggregation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleParams {
    /// Deviation that counts as manipulation
    pub max_deviation_bps: u64,
    /// TWAP retention window in seconds
    pub twap_window_secs: u64,
    /// Samples needed for a valid TWAP
    pub twap_min_samples: usize,
    /// Time span needed for a valid TWAP
    pub twap_min_span_secs: u64,
    /// TWAP ring capacity
    pub twap_max_samples: usize,
    /// Reaction to a manipulated round
    pub manipulation_policy: ManipulationPolicy,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            max_deviation_bps: oracle::DEFAULT_MAX_DEVIATION_BPS,
            twap_window_secs: oracle::DEFAULT_TWAP_WINDOW_SECS,
            twap_min_samples: oracle::DEFAULT_TWAP_MIN_SAMPLES,
            twap_min_span_secs: oracle::DEFAULT_TWAP_MIN_SPAN_SECS,
            twap_max_samples: oracle::DEFAULT_TWAP_MAX_SAMPLES,
            manipulation_policy: ManipulationPolicy::Flag,
        }
    }
}

/// Liquidity guardian settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidityParams {
    /// Ratio at or above which a vault is healthy
    pub healthy_ratio_bps: u64,
    /// Ratio below which a bank run is declared
    pub critical_ratio_bps: u64,
    /// Gradual redemption queue capacity
    pub max_queue_size: usize,
    /// Minimum seconds an emergency stays active
    pub emergency_cooldown_secs: u64,
    /// Seconds between two releases of one request
    pub redemption_interval_secs: u64,
    /// Asset paid out by redemptions
    pub redemption_asset: AssetId,
}

impl Default for LiquidityParams {
    fn default() -> Self {
        Self {
            healthy_ratio_bps: liquidity::DEFAULT_HEALTHY_RATIO_BPS,
            critical_ratio_bps: liquidity::DEFAULT_CRITICAL_RATIO_BPS,
            max_queue_size: liquidity::DEFAULT_MAX_QUEUE_SIZE,
            emergency_cooldown_secs: liquidity::DEFAULT_EMERGENCY_COOLDOWN_SECS,
            redemption_interval_secs: liquidity::DEFAULT_REDEMPTION_INTERVAL_SECS,
            redemption_asset: liquidity::DEFAULT_REDEMPTION_ASSET,
        }
    }
}

/// Commit-reveal settings, all in blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MevParams {
    /// Earliest reveal, relative to the commit block
    pub min_reveal_delay_blocks: u64,
    /// Latest reveal, relative to the commit block
    pub max_reveal_delay_blocks: u64,
    /// Spacing between commitments of one committer
    pub min_commit_interval_blocks: u64,
}

impl Default for MevParams {
    fn default() -> Self {
        Self {
            min_reveal_delay_blocks: mev::DEFAULT_MIN_REVEAL_DELAY_BLOCKS,
            max_reveal_delay_blocks: mev::DEFAULT_MAX_REVEAL_DELAY_BLOCKS,
            min_commit_interval_blocks: mev::DEFAULT_MIN_COMMIT_INTERVAL_BLOCKS,
        }
    }
}

/// Position exposure limits, relative to NAV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureParams {
    /// Gross notional over NAV
    pub max_leverage_bps: u64,
    /// Notional of any single asset over NAV
    pub max_asset_share_bps: u64,
    /// Estimated slippage tolerated per order
    pub max_slippage_bps: u64,
}

impl Default for ExposureParams {
    fn default() -> Self {
        Self {
            max_leverage_bps: exposure::DEFAULT_MAX_LEVERAGE_BPS,
            max_asset_share_bps: exposure::DEFAULT_MAX_ASSET_SHARE_BPS,
            max_slippage_bps: exposure::DEFAULT_MAX_SLIPPAGE_BPS,
        }
    }
}

impl OracleParams {
    /// Check parameter bounds
    pub fn validate(&self) -> RiskResult<()> {
        if self.max_deviation_bps == 0 || self.max_deviation_bps > BPS_DENOMINATOR {
            return Err(RiskError::InvalidInput {
                param: "oracle.max_deviation_bps",
                reason: "must be within 1..=10000",
            });
        }
        if self.twap_max_samples < 2 {
            return Err(RiskError::InvalidInput {
                param: "oracle.twap_max_samples",
                reason: "must be at least 2",
            });
        }
        if self.twap_min_samples > self.twap_max_samples {
            return Err(RiskError::InvalidInput {
                param: "oracle.twap_min_samples",
                reason: "cannot exceed twap_max_samples",
            });
        }
        Ok(())
    }
}

impl LiquidityParams {
    /// Check parameter bounds
    pub fn validate(&self) -> RiskResult<()> {
        if self.healthy_ratio_bps > BPS_DENOMINATOR {
            return Err(RiskError::InvalidInput {
                param: "liquidity.healthy_ratio_bps",
                reason: "cannot exceed 10000",
            });
        }
        if self.critical_ratio_bps >= self.healthy_ratio_bps {
            return Err(RiskError::InvalidInput {
                param: "liquidity.critical_ratio_bps",
                reason: "must be below healthy_ratio_bps",
            });
        }
        if self.max_queue_size == 0 {
            return Err(RiskError::InvalidInput {
                param: "liquidity.max_queue_size",
                reason: "must be at least 1",
            });
        }
        if is_zero_address(&self.redemption_asset) {
            return Err(RiskError::InvalidAddress {
                reason: "redemption asset cannot be zero",
            });
        }
        Ok(())
    }
}

impl MevParams {
    /// Check parameter bounds
    pub fn validate(&self) -> RiskResult<()> {
        if self.min_reveal_delay_blocks == 0 {
            return Err(RiskError::InvalidInput {
                param: "mev.min_reveal_delay_blocks",
                reason: "must be at least 1",
            });
        }
        if self.max_reveal_delay_blocks < self.min_reveal_delay_blocks {
            return Err(RiskError::InvalidInput {
                param: "mev.max_reveal_delay_blocks",
                reason: "must be at least min_reveal_delay_blocks",
            });
        }
        Ok(())
    }
}

impl ExposureParams {
    /// Check parameter bounds
    pub fn validate(&self) -> RiskResult<()> {
        if self.max_leverage_bps == 0 {
            return Err(RiskError::InvalidInput {
                param: "exposure.max_leverage_bps",
                reason: "must be non-zero",
            });
        }
        if self.max_asset_share_bps == 0 || self.max_asset_share_bps > self.max_leverage_bps {
            return Err(RiskError::InvalidInput {
                param: "exposure.max_asset_share_bps",
                reason: "must be within 1..=max_leverage_bps",
            });
        }
        if self.max_slippage_bps > BPS_DENOMINATOR {
            return Err(RiskError::InvalidInput {
                param: "exposure.max_slippage_bps",
                reason: "cannot exceed 10000",
            });
        }
        Ok(())
    }
}

impl RiskConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> RiskResult<Self> {
        let config: RiskConfig = toml::from_str(content).map_err(|e| RiskError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> RiskResult<()> {
        self.oracle.validate()?;
        self.liquidity.validate()?;
        self.mev.validate()?;
        self.exposure.validate()
    }
}
