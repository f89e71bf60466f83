//! Emergency Module
//!
//! The global pause flag and the per-asset price-drop circuit breakers.
//!
//! ## Key Features
//!
//! - **Global Pause**: One flag, consulted by every mutator in every component
//! - **Circuit Breakers**: Auto-pause when a price drops past a threshold
//! - **Cooldown Reset**: A tripped breaker can only be reset after its cooldown
//! - **Manual Override**: Admin pause/unpause independent of breakers

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::access_control::Role;
use crate::errors::{RiskError, RiskResult};
use crate::events::RiskEvent;
use crate::math::drop_bps;
use crate::system::SystemState;
use crate::types::{is_zero_address, Address, AssetId, CallContext};
use crate::constants::bps::BPS_DENOMINATOR;

// ============================================================================
// Pause
// ============================================================================

/// Why the system is paused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Admin override
    Manual,
    /// Automatic trip of the breaker for `asset`
    CircuitBreaker { asset: AssetId },
}

/// Global pause flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PauseState {
    /// Whether every mutator must refuse
    pub paused: bool,
    /// Timestamp of the latest pause
    pub paused_at: u64,
    /// Who or what paused the system
    pub reason: Option<PauseReason>,
    /// Address that set the flag
    pub paused_by: Option<Address>,
}

impl PauseState {
    fn set(&mut self, reason: PauseReason, by: Address, timestamp: u64) {
        self.paused = true;
        self.paused_at = timestamp;
        self.reason = Some(reason);
        self.paused_by = Some(by);
    }

    fn clear(&mut self) {
        self.paused = false;
        self.reason = None;
        self.paused_by = None;
    }
}

/// Admin-only manual pause
///
/// Pausing an already paused system upgrades the reason to `Manual`, so a
/// later breaker reset no longer lifts it.
pub fn emergency_pause(system: &mut SystemState, ctx: &CallContext) -> RiskResult<()> {
    system.require_role(ctx, Role::Admin)?;

    let was_paused = system.pause.paused;
    system.pause.set(PauseReason::Manual, ctx.caller, ctx.timestamp);

    if !was_paused {
        system.emit(RiskEvent::SystemPaused {
            by: ctx.caller,
            block_height: ctx.block,
        });
    }
    warn!(block = ctx.block, "system paused manually");
    Ok(())
}

/// Admin-only manual unpause
pub fn emergency_unpause(system: &mut SystemState, ctx: &CallContext) -> RiskResult<()> {
    system.require_role(ctx, Role::Admin)?;

    if !system.pause.paused {
        return Err(RiskError::InvalidStateTransition);
    }

    system.pause.clear();
    system.emit(RiskEvent::SystemUnpaused {
        by: ctx.caller,
        block_height: ctx.block,
    });
    info!(block = ctx.block, "system unpaused manually");
    Ok(())
}

// ============================================================================
// Circuit Breakers
// ============================================================================

/// Circuit breaker configuration for one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Guarded asset
    pub asset: AssetId,
    /// Drop (bps) at or above which the breaker trips
    pub drop_threshold_bps: u64,
    /// Seconds that must pass after a trip before reset
    pub cooldown_seconds: u64,
    /// Timestamp of the latest trip
    pub last_triggered_at: u64,
    /// Whether currently tripped
    pub is_tripped: bool,
    /// Number of trips since configuration
    pub trip_count: u32,
}

impl CircuitBreakerConfig {
    /// Create an untripped breaker
    pub fn new(asset: AssetId, drop_threshold_bps: u64, cooldown_seconds: u64) -> Self {
        Self {
            asset,
            drop_threshold_bps,
            cooldown_seconds,
            last_triggered_at: 0,
            is_tripped: false,
            trip_count: 0,
        }
    }

    /// Timestamp from which a reset is allowed
    pub fn ready_at(&self) -> u64 {
        self.last_triggered_at.saturating_add(self.cooldown_seconds)
    }

    /// Check if breaker is in cooldown
    pub fn in_cooldown(&self, now: u64) -> bool {
        self.is_tripped && now < self.ready_at()
    }

    /// Whether a move from `previous` to `current` trips this breaker
    pub fn should_trip(&self, previous: u64, current: u64) -> RiskResult<(bool, u64)> {
        let drop = drop_bps(previous, current)?;
        Ok((drop >= self.drop_threshold_bps, drop))
    }
}

/// Trip record returned when a breaker fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerTrip {
    /// Asset whose breaker fired
    pub asset: AssetId,
    /// Measured drop
    pub drop_bps: u64,
    /// Threshold that was met
    pub threshold_bps: u64,
    /// Timestamp of the trip
    pub triggered_at: u64,
}

/// Per-asset circuit breakers sharing the global pause flag
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakers {
    configs: BTreeMap<AssetId, CircuitBreakerConfig>,
}

impl CircuitBreakers {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Admin-only: configure (or reconfigure) the breaker for an asset
    ///
    /// Reconfiguring keeps the trip state of an existing breaker.
    pub fn configure(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        asset: AssetId,
        drop_threshold_bps: u64,
        cooldown_seconds: u64,
    ) -> RiskResult<()> {
        system.ensure_not_paused()?;
        system.require_role(ctx, Role::Admin)?;

        if is_zero_address(&asset) {
            return Err(RiskError::InvalidAddress { reason: "asset cannot be zero" });
        }
        if drop_threshold_bps == 0 || drop_threshold_bps > BPS_DENOMINATOR {
            return Err(RiskError::InvalidInput {
                param: "drop_threshold_bps",
                reason: "must be within 1..=10000",
            });
        }

        self.configs
            .entry(asset)
            .and_modify(|cb| {
                cb.drop_threshold_bps = drop_threshold_bps;
                cb.cooldown_seconds = cooldown_seconds;
            })
            .or_insert_with(|| CircuitBreakerConfig::new(asset, drop_threshold_bps, cooldown_seconds));

        system.emit(RiskEvent::CircuitBreakerConfigured {
            asset,
            drop_threshold_bps,
            cooldown_seconds,
            block_height: ctx.block,
        });
        info!(drop_threshold_bps, cooldown_seconds, "circuit breaker configured");
        Ok(())
    }

    /// Oracle-manager or admin: evaluate a price move and trip if needed
    ///
    /// Returns true when the breaker tripped on this call.
    pub fn check(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        asset: AssetId,
        current_price: u64,
        previous_price: u64,
    ) -> RiskResult<bool> {
        system.require_any_role(ctx, &[Role::OracleManager, Role::Admin])?;
        Ok(self.observe(system, ctx, asset, current_price, previous_price)?.is_some())
    }

    /// Evaluate a price move on behalf of an already-authorized caller
    ///
    /// Used when the aggregator forwards its own (previous, current) prices.
    pub fn observe(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        asset: AssetId,
        current_price: u64,
        previous_price: u64,
    ) -> RiskResult<Option<CircuitBreakerTrip>> {
        system.ensure_not_paused()?;

        if previous_price == 0 {
            return Err(RiskError::InvalidInput {
                param: "previous_price",
                reason: "must be non-zero",
            });
        }

        let cb = self
            .configs
            .get_mut(&asset)
            .ok_or(RiskError::CircuitBreakerNotConfigured { asset })?;

        let (trips, drop) = cb.should_trip(previous_price, current_price)?;
        if !trips {
            return Ok(None);
        }

        cb.is_tripped = true;
        cb.last_triggered_at = ctx.timestamp;
        cb.trip_count = cb.trip_count.saturating_add(1);

        let trip = CircuitBreakerTrip {
            asset,
            drop_bps: drop,
            threshold_bps: cb.drop_threshold_bps,
            triggered_at: ctx.timestamp,
        };

        system
            .pause
            .set(PauseReason::CircuitBreaker { asset }, ctx.caller, ctx.timestamp);

        system.emit(RiskEvent::CircuitBreakerTriggered {
            asset,
            previous_price,
            current_price,
            drop_bps: drop,
            block_height: ctx.block,
        });
        system.emit(RiskEvent::SystemPaused {
            by: ctx.caller,
            block_height: ctx.block,
        });
        warn!(
            drop_bps = drop,
            threshold_bps = trip.threshold_bps,
            previous_price,
            current_price,
            "circuit breaker tripped, system paused"
        );

        Ok(Some(trip))
    }

    /// Admin-only: reset a tripped breaker once its cooldown has elapsed
    ///
    /// Lifts the global pause unless it was set manually or another breaker
    /// is still tripped.
    pub fn reset(&mut self, system: &mut SystemState, ctx: &CallContext, asset: AssetId) -> RiskResult<()> {
        system.require_role(ctx, Role::Admin)?;

        let cb = self
            .configs
            .get(&asset)
            .ok_or(RiskError::CircuitBreakerNotConfigured { asset })?;

        if !cb.is_tripped {
            return Err(RiskError::InvalidStateTransition);
        }
        if cb.in_cooldown(ctx.timestamp) {
            return Err(RiskError::CooldownNotFinished { ready_at: cb.ready_at() });
        }

        if let Some(cb) = self.configs.get_mut(&asset) {
            cb.is_tripped = false;
        }

        system.emit(RiskEvent::CircuitBreakerReset {
            asset,
            block_height: ctx.block,
        });

        let manual = system.pause.reason == Some(PauseReason::Manual);
        let others_tripped = self.any_tripped();
        if system.pause.paused && !manual && !others_tripped {
            system.pause.clear();
            system.emit(RiskEvent::SystemUnpaused {
                by: ctx.caller,
                block_height: ctx.block,
            });
            info!(block = ctx.block, "circuit breaker reset, system unpaused");
        } else {
            info!(block = ctx.block, manual, others_tripped, "circuit breaker reset, pause kept");
        }
        Ok(())
    }

    /// Breaker configuration for an asset
    pub fn get(&self, asset: &AssetId) -> Option<&CircuitBreakerConfig> {
        self.configs.get(asset)
    }

    /// Whether a breaker exists for the asset
    pub fn is_configured(&self, asset: &AssetId) -> bool {
        self.configs.contains_key(asset)
    }

    /// Whether any breaker is currently tripped
    pub fn any_tripped(&self) -> bool {
        self.configs.values().any(|cb| cb.is_tripped)
    }
}

// ============================================================================
// Tests
// ============================================================================
