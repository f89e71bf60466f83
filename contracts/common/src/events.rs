//! Risk Events
//!
//! Every state transition that off-chain monitoring cares about appends a
//! [`RiskEvent`] to the [`EventLog`]. Events are Borsh-encoded for storage
//! and carry the block height they occurred at.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::access_control::Role;
use crate::types::{Address, AssetId, CommitHash, FeedId, RequestId, VaultId};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Oracle Events (0x01 - 0x1F)
    PriceUpdated = 0x01,
    PriceManipulationDetected = 0x02,
    OracleSourceAdded = 0x03,
    OracleSourceUpdated = 0x04,
    OracleSourceFailed = 0x05,

    // Circuit Breaker / Pause Events (0x20 - 0x3F)
    CircuitBreakerConfigured = 0x20,
    CircuitBreakerTriggered = 0x21,
    CircuitBreakerReset = 0x22,
    SystemPaused = 0x23,
    SystemUnpaused = 0x24,

    // Access Events (0x40 - 0x5F)
    RoleGranted = 0x40,
    RoleRevoked = 0x41,

    // Liquidity Events (0x60 - 0x7F)
    LiquidityUpdated = 0x60,
    BankRunDetected = 0x61,
    EmergencyActivated = 0x62,
    EmergencyDeactivated = 0x63,
    EmergencyLiquidityInjected = 0x64,
    RedemptionQueued = 0x65,
    RedemptionProcessed = 0x66,
    RedemptionCompleted = 0x67,
    ImmediateRedemption = 0x68,

    // Commit-Reveal Events (0x80 - 0x9F)
    TransactionCommitted = 0x80,
    TransactionRevealed = 0x81,
}

/// Main event enum containing all risk core events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum RiskEvent {
    // ============ Oracle Events ============

    /// Emitted when an aggregated price is committed
    PriceUpdated {
        asset: AssetId,
        price: u64,
        confidence_bps: u64,
        sources_used: u8,
        block_height: u64,
    },

    /// Emitted when a round deviates beyond the manipulation threshold
    PriceManipulationDetected {
        asset: AssetId,
        price: u64,
        reference_price: u64,
        deviation_bps: u64,
        block_height: u64,
    },

    /// Emitted when a source is registered
    OracleSourceAdded {
        asset: AssetId,
        feed: FeedId,
        weight_bps: u64,
        block_height: u64,
    },

    /// Emitted when an admin edits or resets a source
    OracleSourceUpdated {
        asset: AssetId,
        feed: FeedId,
        weight_bps: u64,
        failure_count: u32,
        block_height: u64,
    },

    /// Emitted when a source read fails
    OracleSourceFailed {
        asset: AssetId,
        feed: FeedId,
        failure_count: u32,
        excluded: bool,
        block_height: u64,
    },

    // ============ Circuit Breaker / Pause Events ============

    /// Emitted when a breaker is configured
    CircuitBreakerConfigured {
        asset: AssetId,
        drop_threshold_bps: u64,
        cooldown_seconds: u64,
        block_height: u64,
    },

    /// Emitted when a price drop trips a breaker
    CircuitBreakerTriggered {
        asset: AssetId,
        previous_price: u64,
        current_price: u64,
        drop_bps: u64,
        block_height: u64,
    },

    /// Emitted when a breaker is reset after its cooldown
    CircuitBreakerReset {
        asset: AssetId,
        block_height: u64,
    },

    /// Emitted when the global pause flag is set
    SystemPaused {
        by: Address,
        block_height: u64,
    },

    /// Emitted when the global pause flag is cleared
    SystemUnpaused {
        by: Address,
        block_height: u64,
    },

    // ============ Access Events ============

    /// Emitted when a role is granted
    RoleGranted {
        account: Address,
        role: Role,
        by: Address,
        block_height: u64,
    },

    /// Emitted when a role is revoked
    RoleRevoked {
        account: Address,
        role: Role,
        by: Address,
        block_height: u64,
    },

    // ============ Liquidity Events ============

    /// Emitted on every liquidity snapshot
    LiquidityUpdated {
        vault_id: VaultId,
        total_assets: u64,
        liquid_assets: u64,
        ratio_bps: u64,
        block_height: u64,
    },

    /// Emitted when the ratio falls below the critical threshold
    BankRunDetected {
        vault_id: VaultId,
        ratio_bps: u64,
        critical_ratio_bps: u64,
        block_height: u64,
    },

    /// Emitted when the emergency protocol switches on
    EmergencyActivated {
        vault_id: VaultId,
        activated_at: u64,
        block_height: u64,
    },

    /// Emitted when the emergency protocol switches off
    EmergencyDeactivated {
        vault_id: VaultId,
        ratio_bps: u64,
        block_height: u64,
    },

    /// Emitted when liquidity is pushed into a vault
    EmergencyLiquidityInjected {
        vault_id: VaultId,
        provider: Address,
        asset: AssetId,
        amount: u64,
        new_liquid_assets: u64,
        block_height: u64,
    },

    /// Emitted when a gradual redemption is queued
    RedemptionQueued {
        request_id: RequestId,
        vault_id: VaultId,
        owner: Address,
        total_amount: u64,
        daily_amount: u64,
        is_emergency: bool,
        block_height: u64,
    },

    /// Emitted for every partial release
    RedemptionProcessed {
        request_id: RequestId,
        released: u64,
        remaining: u64,
        block_height: u64,
    },

    /// Emitted when a request is fully paid out
    RedemptionCompleted {
        request_id: RequestId,
        owner: Address,
        total_amount: u64,
        block_height: u64,
    },

    /// Emitted for an immediate (non-queued) redemption
    ImmediateRedemption {
        vault_id: VaultId,
        owner: Address,
        amount: u64,
        block_height: u64,
    },

    // ============ Commit-Reveal Events ============

    /// Emitted when a commitment is recorded
    TransactionCommitted {
        committer: Address,
        commit_hash: CommitHash,
        reveal_deadline_block: u64,
        block_height: u64,
    },

    /// Emitted when a commitment is revealed and executed
    TransactionRevealed {
        committer: Address,
        commit_hash: CommitHash,
        amount: u64,
        block_height: u64,
    },
}

impl RiskEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::PriceUpdated { .. } => EventType::PriceUpdated,
            Self::PriceManipulationDetected { .. } => EventType::PriceManipulationDetected,
            Self::OracleSourceAdded { .. } => EventType::OracleSourceAdded,
            Self::OracleSourceUpdated { .. } => EventType::OracleSourceUpdated,
            Self::OracleSourceFailed { .. } => EventType::OracleSourceFailed,
            Self::CircuitBreakerConfigured { .. } => EventType::CircuitBreakerConfigured,
            Self::CircuitBreakerTriggered { .. } => EventType::CircuitBreakerTriggered,
            Self::CircuitBreakerReset { .. } => EventType::CircuitBreakerReset,
            Self::SystemPaused { .. } => EventType::SystemPaused,
            Self::SystemUnpaused { .. } => EventType::SystemUnpaused,
            Self::RoleGranted { .. } => EventType::RoleGranted,
            Self::RoleRevoked { .. } => EventType::RoleRevoked,
            Self::LiquidityUpdated { .. } => EventType::LiquidityUpdated,
            Self::BankRunDetected { .. } => EventType::BankRunDetected,
            Self::EmergencyActivated { .. } => EventType::EmergencyActivated,
            Self::EmergencyDeactivated { .. } => EventType::EmergencyDeactivated,
            Self::EmergencyLiquidityInjected { .. } => EventType::EmergencyLiquidityInjected,
            Self::RedemptionQueued { .. } => EventType::RedemptionQueued,
            Self::RedemptionProcessed { .. } => EventType::RedemptionProcessed,
            Self::RedemptionCompleted { .. } => EventType::RedemptionCompleted,
            Self::ImmediateRedemption { .. } => EventType::ImmediateRedemption,
            Self::TransactionCommitted { .. } => EventType::TransactionCommitted,
            Self::TransactionRevealed { .. } => EventType::TransactionRevealed,
        }
    }

    /// Get the block height when event occurred
    pub fn block_height(&self) -> u64 {
        match self {
            Self::PriceUpdated { block_height, .. }
            | Self::PriceManipulationDetected { block_height, .. }
            | Self::OracleSourceAdded { block_height, .. }
            | Self::OracleSourceUpdated { block_height, .. }
            | Self::OracleSourceFailed { block_height, .. }
            | Self::CircuitBreakerConfigured { block_height, .. }
            | Self::CircuitBreakerTriggered { block_height, .. }
            | Self::CircuitBreakerReset { block_height, .. }
            | Self::SystemPaused { block_height, .. }
            | Self::SystemUnpaused { block_height, .. }
            | Self::RoleGranted { block_height, .. }
            | Self::RoleRevoked { block_height, .. }
            | Self::LiquidityUpdated { block_height, .. }
            | Self::BankRunDetected { block_height, .. }
            | Self::EmergencyActivated { block_height, .. }
            | Self::EmergencyDeactivated { block_height, .. }
            | Self::EmergencyLiquidityInjected { block_height, .. }
            | Self::RedemptionQueued { block_height, .. }
            | Self::RedemptionProcessed { block_height, .. }
            | Self::RedemptionCompleted { block_height, .. }
            | Self::ImmediateRedemption { block_height, .. }
            | Self::TransactionCommitted { block_height, .. }
            | Self::TransactionRevealed { block_height, .. } => *block_height,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Append-only event log consumed by monitoring
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<RiskEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: RiskEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[RiskEvent] {
        &self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&RiskEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Number of events of a given type
    pub fn count(&self, event_type: EventType) -> usize {
        self.events.iter().filter(|e| e.event_type() == event_type).count()
    }

    /// Drain all events, leaving the log empty
    pub fn drain(&mut self) -> Vec<RiskEvent> {
        core::mem::take(&mut self.events)
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
