//! Error Types for the Risk Core
//!
//! Every failure of a public operation is a [`RiskError`]. Each variant
//! carries a stable code for logs and belongs to one [`ErrorKind`] so
//! callers can decide whether to fix the input, wait, or take the gradual
//! redemption path.

use crate::types::{Address, AssetId, CommitHash, VaultId};
use crate::access_control::Role;

/// Result type alias for risk core operations
pub type RiskResult<T> = Result<T, RiskError>;

/// Main error enum for all risk core errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RiskError {
    // ============ Validation Errors ============
    /// Zero or otherwise unusable identifier
    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },

    /// Zero amount not allowed
    #[error("amount must be non-zero")]
    ZeroAmount,

    /// Oracle weight outside 1..=10000
    #[error("invalid weight {weight_bps} bps")]
    InvalidWeight { weight_bps: u64 },

    /// Daily release larger than the whole request
    #[error("daily amount {daily_amount} exceeds total {total_amount}")]
    DailyAmountExceedsTotal { daily_amount: u64, total_amount: u64 },

    /// Invalid input parameter
    #[error("invalid {param}: {reason}")]
    InvalidInput { param: &'static str, reason: &'static str },

    // ============ Authorization Errors ============
    /// Caller lacks the role required for the operation
    #[error("caller lacks role {role:?}")]
    AccessDenied { role: Role },

    // ============ State Errors ============
    /// Global pause flag is set
    #[error("system is paused")]
    Paused,

    /// Redemption queue at capacity
    #[error("redemption queue full ({capacity} requests)")]
    QueueFull { capacity: usize },

    /// Cooldown or health precondition not met yet
    #[error("cooldown not finished, ready at {ready_at}")]
    CooldownNotFinished { ready_at: u64 },

    /// Reveal attempted before the minimum delay
    #[error("reveal too early: current block {current_block}, earliest {earliest_block}")]
    RevealTooEarly { current_block: u64, earliest_block: u64 },

    /// Reveal attempted after the commitment lapsed
    #[error("reveal deadline {deadline_block} passed at block {current_block}")]
    RevealDeadlinePassed { current_block: u64, deadline_block: u64 },

    /// Committer inside the anti-spam interval
    #[error("commitment too frequent: last at block {last_block}, next allowed at {next_block}")]
    TooFrequent { last_block: u64, next_block: u64 },

    /// No commitment matches the revealed parameters
    #[error("commitment not found")]
    CommitmentNotFound,

    /// Commitment hash already recorded
    #[error("commitment already exists")]
    CommitmentExists { commit_hash: CommitHash },

    /// Commitment already consumed
    #[error("commitment already revealed")]
    AlreadyRevealed,

    /// Operation not valid for the current state
    #[error("invalid state transition")]
    InvalidStateTransition,

    /// Vault has never reported liquidity
    #[error("vault not found")]
    VaultNotFound { vault_id: VaultId },

    /// Redemption request id unknown
    #[error("redemption request {request_id} not found")]
    RequestNotFound { request_id: u64 },

    /// No circuit breaker configured for the asset
    #[error("circuit breaker not configured")]
    CircuitBreakerNotConfigured { asset: AssetId },

    // ============ Oracle Errors ============
    /// Every source failed in this round
    #[error("no valid oracle sources responded")]
    NoValidSources { asset: AssetId },

    /// Asset has no aggregated price yet
    #[error("price unavailable")]
    PriceUnavailable { asset: AssetId },

    /// Price deviated beyond the threshold and the policy rejects it
    #[error("price manipulation detected: {deviation_bps} bps > {max_deviation_bps} bps")]
    PriceManipulation { deviation_bps: u64, max_deviation_bps: u64 },

    /// Source registry for the asset is full
    #[error("too many sources ({maximum} max)")]
    TooManySources { maximum: usize },

    /// Feed already registered for the asset
    #[error("duplicate oracle source")]
    DuplicateSource { feed: Address },

    /// Feed not registered for the asset
    #[error("oracle source not found")]
    SourceNotFound { feed: Address },

    // ============ Liquidity Errors ============
    /// Not enough liquid assets for an immediate redemption
    #[error("insufficient liquidity: available {available}, requested {requested}")]
    InsufficientLiquidity { available: u64, requested: u64 },

    /// Immediate redemption blocked while the emergency protocol is active
    #[error("emergency active, use gradual redemption")]
    EmergencyActiveRedemptionBlocked { vault_id: VaultId },

    // ============ Exposure Errors ============
    /// Gross notional over NAV above the leverage limit
    #[error("leverage {leverage_bps} bps exceeds cap {max_leverage_bps} bps")]
    LeverageExceeded { leverage_bps: u64, max_leverage_bps: u64 },

    /// A single asset's notional above its share of NAV
    #[error("asset {index} notional {notional} exceeds cap {limit}")]
    AssetCapExceeded { index: usize, notional: u64, limit: u64 },

    /// Estimated order slippage above the tolerance
    #[error("slippage {slippage_bps} bps exceeds cap {max_slippage_bps} bps")]
    SlippageExceeded { slippage_bps: u64, max_slippage_bps: u64 },

    // ============ Transfer Errors ============
    /// Token collaborator refused a transfer
    #[error("token transfer of {amount} failed")]
    TransferFailed { to: Address, amount: u64 },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    #[error("arithmetic overflow")]
    Overflow,

    /// Arithmetic underflow occurred
    #[error("arithmetic underflow")]
    Underflow,

    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,

    // ============ Configuration Errors ============
    /// Configuration file could not be parsed
    #[error("config parse error: {0}")]
    ConfigParse(String),
}

/// Error taxonomy used by callers to pick a recovery path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-fixable input problem, raised before any state change
    Validation,
    /// Role check failed
    AccessDenied,
    /// Caller must wait or take another path
    State,
    /// Oracle round failed, retry later
    Oracle,
    /// Use the gradual redemption path instead
    Liquidity,
    /// Position outside the exposure limits
    Exposure,
    /// External token collaborator failed
    Transfer,
    /// Arithmetic failure
    Math,
}

impl RiskError {
    /// Returns a stable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAddress { .. } => "E001_INVALID_ADDRESS",
            Self::ZeroAmount => "E002_ZERO_AMOUNT",
            Self::InvalidWeight { .. } => "E003_INVALID_WEIGHT",
            Self::DailyAmountExceedsTotal { .. } => "E004_DAILY_EXCEEDS_TOTAL",
            Self::InvalidInput { .. } => "E005_INVALID_INPUT",
            Self::AccessDenied { .. } => "E020_ACCESS_DENIED",
            Self::Paused => "E100_PAUSED",
            Self::QueueFull { .. } => "E101_QUEUE_FULL",
            Self::CooldownNotFinished { .. } => "E102_COOLDOWN",
            Self::RevealTooEarly { .. } => "E103_REVEAL_TOO_EARLY",
            Self::RevealDeadlinePassed { .. } => "E104_REVEAL_DEADLINE",
            Self::TooFrequent { .. } => "E105_TOO_FREQUENT",
            Self::CommitmentNotFound => "E106_COMMIT_NOT_FOUND",
            Self::CommitmentExists { .. } => "E107_COMMIT_EXISTS",
            Self::AlreadyRevealed => "E108_ALREADY_REVEALED",
            Self::InvalidStateTransition => "E109_INVALID_STATE",
            Self::VaultNotFound { .. } => "E110_VAULT_NOT_FOUND",
            Self::RequestNotFound { .. } => "E111_REQUEST_NOT_FOUND",
            Self::CircuitBreakerNotConfigured { .. } => "E112_CB_NOT_CONFIGURED",
            Self::NoValidSources { .. } => "E030_NO_VALID_SOURCES",
            Self::PriceUnavailable { .. } => "E031_PRICE_UNAVAILABLE",
            Self::PriceManipulation { .. } => "E032_PRICE_MANIPULATION",
            Self::TooManySources { .. } => "E033_TOO_MANY_SOURCES",
            Self::DuplicateSource { .. } => "E034_DUPLICATE_SOURCE",
            Self::SourceNotFound { .. } => "E035_SOURCE_NOT_FOUND",
            Self::InsufficientLiquidity { .. } => "E050_INSUFFICIENT_LIQUIDITY",
            Self::EmergencyActiveRedemptionBlocked { .. } => "E051_EMERGENCY_BLOCKED",
            Self::LeverageExceeded { .. } => "E060_LEVERAGE_EXCEEDED",
            Self::AssetCapExceeded { .. } => "E061_ASSET_CAP_EXCEEDED",
            Self::SlippageExceeded { .. } => "E062_SLIPPAGE_EXCEEDED",
            Self::TransferFailed { .. } => "E070_TRANSFER_FAILED",
            Self::Overflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
            Self::ConfigParse(_) => "E090_CONFIG_PARSE",
        }
    }

    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAddress { .. }
            | Self::ZeroAmount
            | Self::InvalidWeight { .. }
            | Self::DailyAmountExceedsTotal { .. }
            | Self::InvalidInput { .. }
            | Self::ConfigParse(_) => ErrorKind::Validation,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::Paused
            | Self::QueueFull { .. }
            | Self::CooldownNotFinished { .. }
            | Self::RevealTooEarly { .. }
            | Self::RevealDeadlinePassed { .. }
            | Self::TooFrequent { .. }
            | Self::CommitmentNotFound
            | Self::CommitmentExists { .. }
            | Self::AlreadyRevealed
            | Self::InvalidStateTransition
            | Self::VaultNotFound { .. }
            | Self::RequestNotFound { .. }
            | Self::CircuitBreakerNotConfigured { .. } => ErrorKind::State,
            Self::NoValidSources { .. }
            | Self::PriceUnavailable { .. }
            | Self::PriceManipulation { .. }
            | Self::TooManySources { .. }
            | Self::DuplicateSource { .. }
            | Self::SourceNotFound { .. } => ErrorKind::Oracle,
            Self::InsufficientLiquidity { .. }
            | Self::EmergencyActiveRedemptionBlocked { .. } => ErrorKind::Liquidity,
            Self::LeverageExceeded { .. } | Self::AssetCapExceeded { .. } | Self::SlippageExceeded { .. } => {
                ErrorKind::Exposure
            }
            Self::TransferFailed { .. } => ErrorKind::Transfer,
            Self::Overflow | Self::Underflow | Self::DivisionByZero => ErrorKind::Math,
        }
    }

    /// Returns true if waiting or switching paths can make the call succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Paused => true,                 // Wait for unpause
            Self::QueueFull { .. } => true,       // Wait for queue to drain
            Self::CooldownNotFinished { .. } => true,
            Self::RevealTooEarly { .. } => true,  // Wait for more blocks
            Self::TooFrequent { .. } => true,
            Self::NoValidSources { .. } => true,  // Retry once a feed recovers
            Self::InsufficientLiquidity { .. } => true, // Use the gradual queue
            Self::EmergencyActiveRedemptionBlocked { .. } => true,
            _ => false,
        }
    }
}
