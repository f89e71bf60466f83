//! Protocol Constants
//!
//! Default values for every tunable parameter of the risk core. The values
//! here only seed [`crate::config::RiskConfig`]; deployments override them
//! through configuration rather than by editing this file.

/// Basis point arithmetic
pub mod bps {
    /// Basis points denominator (10_000 bps = 100%)
    pub const BPS_DENOMINATOR: u64 = 10_000;

    /// Largest weight a single oracle source may carry
    pub const MAX_WEIGHT_BPS: u64 = BPS_DENOMINATOR;
}

/// Oracle aggregation defaults
pub mod oracle {
    use super::time::SECS_PER_HOUR;

    /// Maximum sources registered per asset
    pub const MAX_SOURCES_PER_ASSET: usize = 10;

    /// Deviation (vs TWAP or vs peer sources) that flags manipulation (5%)
    pub const DEFAULT_MAX_DEVIATION_BPS: u64 = 500;

    /// TWAP retention window (1 hour)
    pub const DEFAULT_TWAP_WINDOW_SECS: u64 = SECS_PER_HOUR;

    /// Samples required before the TWAP is considered valid
    pub const DEFAULT_TWAP_MIN_SAMPLES: usize = 3;

    /// Minimum time span covered by retained samples (10 minutes)
    pub const DEFAULT_TWAP_MIN_SPAN_SECS: u64 = 600;

    /// Hard capacity of the TWAP ring
    pub const DEFAULT_TWAP_MAX_SAMPLES: usize = 64;

    /// Failures tolerated per source before exclusion
    pub const DEFAULT_MAX_FAILURES: u32 = 3;
}

/// Liquidity guardian defaults
pub mod liquidity {
    use super::time::{SECS_PER_DAY, SECS_PER_HOUR};

    /// Ratio at or above which a vault is healthy (20%)
    pub const DEFAULT_HEALTHY_RATIO_BPS: u64 = 2_000;

    /// Ratio below which a bank run is declared (5%)
    pub const DEFAULT_CRITICAL_RATIO_BPS: u64 = 500;

    /// Capacity of the gradual redemption queue
    pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

    /// Minimum time an emergency stays active (6 hours)
    pub const DEFAULT_EMERGENCY_COOLDOWN_SECS: u64 = 6 * SECS_PER_HOUR;

    /// Spacing between releases for a single request (1 day)
    pub const DEFAULT_REDEMPTION_INTERVAL_SECS: u64 = SECS_PER_DAY;

    /// Asset paid out by redemptions until a deployment configures its own
    pub const DEFAULT_REDEMPTION_ASSET: [u8; 32] = [0xEE; 32];
}

/// Commit-reveal defaults (all in blocks)
pub mod mev {
    /// Blocks that must pass before a commitment can be revealed
    pub const DEFAULT_MIN_REVEAL_DELAY_BLOCKS: u64 = 1;

    /// Blocks after which a commitment lapses
    pub const DEFAULT_MAX_REVEAL_DELAY_BLOCKS: u64 = 256;

    /// Anti-spam spacing between commitments of one committer
    pub const DEFAULT_MIN_COMMIT_INTERVAL_BLOCKS: u64 = 1;
}

/// Exposure guard defaults
pub mod exposure {
    /// Gross notional over NAV (3x)
    pub const DEFAULT_MAX_LEVERAGE_BPS: u64 = 30_000;

    /// Notional of a single asset over NAV (1.5x)
    pub const DEFAULT_MAX_ASSET_SHARE_BPS: u64 = 15_000;

    /// Estimated slippage a single order may incur
    pub const DEFAULT_MAX_SLIPPAGE_BPS: u64 = 50;
}

/// Time-related constants
pub mod time {
    /// Seconds per hour
    pub const SECS_PER_HOUR: u64 = 3_600;

    /// Seconds per day
    pub const SECS_PER_DAY: u64 = 86_400;
}
