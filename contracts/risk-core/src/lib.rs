//! VaultGuard Risk Core
//!
//! Single entry point owning the shared [`SystemState`] and every risk
//! component.
//!
//! ## Wiring
//!
//! ```text
//! update_price ──► OracleAggregator ──(previous, current)──► CircuitBreakers ──► global pause
//! update_liquidity ──► LiquidityGuardian ──► emergency flag ──► redemption route
//! commit / reveal_redemption ──► MevGuard ──► LiquidityGuardian (immediate or queued)
//! ```
//!
//! Every operation takes a [`CallContext`] naming the caller and the logical
//! time of the call.

pub mod stress;

#[cfg(test)]
mod integration_tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use vaultguard_common::{
    emergency, Address, AssetId, CallContext, CircuitBreakerConfig, CircuitBreakers, CommitHash, EventLog, FeedId,
    PriceFeeds, RequestId, RiskConfig, RiskResult, Role, SystemState, TokenTransfer, VaultId,
};
use vaultguard_liquidity_guardian::{
    LiquidityGuardian, ProcessingSummary, RedemptionEligibility, RedemptionRequest, VaultLiquidityState,
};
use vaultguard_mev_guard::{Commitment, MevGuard, PruneOutcome};
use vaultguard_price_oracle::{AggregatedPrice, OracleAggregator, OracleSource};

pub use vaultguard_common as common;
pub use vaultguard_liquidity_guardian as liquidity;
pub use vaultguard_mev_guard as mev;
pub use vaultguard_price_oracle as oracle;

/// How a revealed redemption was served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedemptionRoute {
    /// Paid out in full right away
    Immediate { amount: u64 },
    /// Placed on the gradual redemption queue
    Queued { request_id: RequestId },
}

/// The assembled risk core
#[derive(Debug, Clone)]
pub struct RiskCore {
    system: SystemState,
    oracle: OracleAggregator,
    breakers: CircuitBreakers,
    liquidity: LiquidityGuardian,
    mev: MevGuard,
    config: RiskConfig,
}

impl RiskCore {
    /// Build every component from a validated configuration
    pub fn new(admin: Address, block: u64, config: RiskConfig) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self {
            system: SystemState::new(admin, block),
            oracle: OracleAggregator::new(config.oracle.clone())?,
            breakers: CircuitBreakers::new(),
            liquidity: LiquidityGuardian::new(config.liquidity.clone())?,
            mev: MevGuard::new(config.mev.clone())?,
            config,
        })
    }

    // ============ Access & Pause ============

    /// Admin-only permanent role grant
    pub fn grant_role(&mut self, ctx: &CallContext, account: Address, role: Role) -> RiskResult<bool> {
        self.system.grant_role(ctx, account, role)
    }

    /// Admin-only grant expiring after `duration_blocks`
    pub fn grant_role_for(
        &mut self,
        ctx: &CallContext,
        account: Address,
        role: Role,
        duration_blocks: u64,
    ) -> RiskResult<bool> {
        self.system.grant_role_for(ctx, account, role, Some(duration_blocks))
    }

    /// Admin-only revoke
    pub fn revoke_role(&mut self, ctx: &CallContext, account: Address, role: Role) -> RiskResult<bool> {
        self.system.revoke_role(ctx, account, role)
    }

    /// Whether `account` holds `role` at `block`
    pub fn has_role(&self, account: &Address, role: Role, block: u64) -> bool {
        self.system.has_role(account, role, block)
    }

    /// Admin-only manual pause
    pub fn emergency_pause(&mut self, ctx: &CallContext) -> RiskResult<()> {
        emergency::emergency_pause(&mut self.system, ctx)
    }

    /// Admin-only manual unpause
    pub fn emergency_unpause(&mut self, ctx: &CallContext) -> RiskResult<()> {
        emergency::emergency_unpause(&mut self.system, ctx)
    }

    /// Whether the global pause flag is set
    pub fn is_paused(&self) -> bool {
        self.system.is_paused()
    }

    // ============ Oracle ============

    /// Admin-only: register a price source
    #[allow(clippy::too_many_arguments)]
    pub fn add_source(
        &mut self,
        ctx: &CallContext,
        asset: AssetId,
        feed: FeedId,
        weight_bps: u64,
        max_failures: u32,
        label: impl Into<String>,
    ) -> RiskResult<()> {
        self.oracle
            .add_source(&mut self.system, ctx, asset, feed, weight_bps, max_failures, label)
    }

    /// Admin-only: change a source's weight
    pub fn set_source_weight(
        &mut self,
        ctx: &CallContext,
        asset: AssetId,
        feed: FeedId,
        weight_bps: u64,
    ) -> RiskResult<()> {
        self.oracle.set_source_weight(&mut self.system, ctx, asset, feed, weight_bps)
    }

    /// Admin-only: readmit an excluded source
    pub fn reset_source(&mut self, ctx: &CallContext, asset: AssetId, feed: FeedId) -> RiskResult<()> {
        self.oracle.reset_source(&mut self.system, ctx, asset, feed)
    }

    /// Oracle-manager only: aggregate a new price and feed the move into
    /// the asset's circuit breaker
    pub fn update_price<F: PriceFeeds + ?Sized>(
        &mut self,
        ctx: &CallContext,
        asset: AssetId,
        feeds: &F,
    ) -> RiskResult<AggregatedPrice> {
        let previous = self.oracle.latest_price(&asset);
        let aggregated = self.oracle.update_price(&mut self.system, ctx, asset, feeds)?;

        if let Some(previous) = previous.filter(|_| self.breakers.is_configured(&asset)) {
            if let Some(trip) = self
                .breakers
                .observe(&mut self.system, ctx, asset, aggregated.price, previous)?
            {
                debug!(drop_bps = trip.drop_bps, "price update tripped the circuit breaker");
            }
        }
        Ok(aggregated)
    }

    /// Latest committed price
    pub fn get_price(&self, asset: &AssetId) -> RiskResult<AggregatedPrice> {
        self.oracle.get_price(asset)
    }

    /// Current TWAP and its validity
    pub fn get_twap(&self, asset: &AssetId) -> RiskResult<(u64, bool)> {
        self.oracle.get_twap(asset)
    }

    /// Whether the latest round for `asset` looked manipulated
    pub fn is_manipulation_detected(&self, asset: &AssetId) -> bool {
        self.oracle.is_manipulation_detected(asset)
    }

    /// Oracle failures across all sources
    pub fn total_failures(&self) -> u64 {
        self.oracle.total_failures()
    }

    /// Update rounds in which no source answered
    pub fn failed_rounds(&self) -> u64 {
        self.oracle.failed_rounds()
    }

    /// Registered sources of an asset
    pub fn sources(&self, asset: &AssetId) -> &[OracleSource] {
        self.oracle.sources(asset)
    }

    // ============ Circuit Breakers ============

    /// Admin-only: configure the breaker of an asset
    pub fn configure_circuit_breaker(
        &mut self,
        ctx: &CallContext,
        asset: AssetId,
        drop_threshold_bps: u64,
        cooldown_seconds: u64,
    ) -> RiskResult<()> {
        self.breakers
            .configure(&mut self.system, ctx, asset, drop_threshold_bps, cooldown_seconds)
    }

    /// Oracle-manager or admin: check an explicit price move
    pub fn check_circuit_breaker(
        &mut self,
        ctx: &CallContext,
        asset: AssetId,
        current_price: u64,
        previous_price: u64,
    ) -> RiskResult<bool> {
        self.breakers
            .check(&mut self.system, ctx, asset, current_price, previous_price)
    }

    /// Admin-only: reset a tripped breaker after its cooldown
    pub fn reset_circuit_breaker(&mut self, ctx: &CallContext, asset: AssetId) -> RiskResult<()> {
        self.breakers.reset(&mut self.system, ctx, asset)
    }

    /// Breaker state of an asset
    pub fn circuit_breaker(&self, asset: &AssetId) -> Option<&CircuitBreakerConfig> {
        self.breakers.get(asset)
    }

    // ============ Liquidity ============

    /// Liquidity-manager only: record a vault snapshot
    pub fn update_liquidity(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        total_assets: u64,
        liquid_assets: u64,
        illiquid_assets: u64,
    ) -> RiskResult<()> {
        self.liquidity
            .update_liquidity(&mut self.system, ctx, vault_id, total_assets, liquid_assets, illiquid_assets)
    }

    /// Whether `amount` can be redeemed right away
    pub fn can_redeem_immediately(&self, vault_id: &VaultId, amount: u64) -> RedemptionEligibility {
        self.liquidity.can_redeem_immediately(vault_id, amount)
    }

    /// Redeem right away without commit-reveal
    pub fn redeem_immediately<T: TokenTransfer + ?Sized>(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        amount: u64,
        tokens: &mut T,
    ) -> RiskResult<()> {
        self.liquidity
            .redeem_immediately(&mut self.system, ctx, vault_id, amount, tokens)
    }

    /// Queue a gradual redemption
    pub fn queue_gradual_redemption(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        total_amount: u64,
        daily_amount: u64,
        is_emergency: bool,
    ) -> RiskResult<RequestId> {
        self.liquidity
            .queue_gradual_redemption(&mut self.system, ctx, vault_id, total_amount, daily_amount, is_emergency)
    }

    /// Liquidity-manager only: release due queue slices
    pub fn process_redemption_queue<T: TokenTransfer + ?Sized>(
        &mut self,
        ctx: &CallContext,
        max_to_process: usize,
        tokens: &mut T,
    ) -> RiskResult<ProcessingSummary> {
        self.liquidity
            .process_redemption_queue(&mut self.system, ctx, max_to_process, tokens)
    }

    /// Push liquidity into a vault from the caller
    pub fn inject_emergency_liquidity<T: TokenTransfer + ?Sized>(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        amount: u64,
        asset: AssetId,
        tokens: &mut T,
    ) -> RiskResult<()> {
        self.liquidity
            .inject_emergency_liquidity(&mut self.system, ctx, vault_id, amount, asset, tokens)
    }

    /// Liquidity-manager or admin: end a vault's emergency protocol
    pub fn deactivate_emergency_protocol(&mut self, ctx: &CallContext, vault_id: VaultId) -> RiskResult<()> {
        self.liquidity
            .deactivate_emergency_protocol(&mut self.system, ctx, vault_id)
    }

    /// `(ratio_bps, is_healthy, emergency_active)`
    pub fn get_vault_status(&self, vault_id: &VaultId) -> RiskResult<(u64, bool, bool)> {
        self.liquidity.get_vault_status(vault_id)
    }

    /// Vault snapshot
    pub fn vault(&self, vault_id: &VaultId) -> Option<&VaultLiquidityState> {
        self.liquidity.vault(vault_id)
    }

    /// Requests waiting in the queue
    pub fn get_active_redemption_count(&self) -> usize {
        self.liquidity.get_active_redemption_count()
    }

    /// Queued request by id
    pub fn redemption_request(&self, request_id: RequestId) -> Option<&RedemptionRequest> {
        self.liquidity.redemption_request(request_id)
    }

    // ============ Commit-Reveal ============

    /// Record a commitment for the caller
    pub fn commit_transaction(&mut self, ctx: &CallContext, commit_hash: CommitHash) -> RiskResult<()> {
        self.mev.commit_transaction(&mut self.system, ctx, commit_hash)
    }

    /// Reveal a committed redemption and serve it
    ///
    /// Pays immediately when the vault allows it, otherwise queues the
    /// amount on the standard lane with `daily_amount` releases.
    pub fn reveal_redemption<T: TokenTransfer + ?Sized>(
        &mut self,
        ctx: &CallContext,
        vault_id: VaultId,
        amount: u64,
        nonce: [u8; 32],
        daily_amount: u64,
        tokens: &mut T,
    ) -> RiskResult<RedemptionRoute> {
        let liquidity = &mut self.liquidity;
        self.mev
            .reveal_and_execute(&mut self.system, ctx, amount, nonce, |system, amount| {
                if liquidity.can_redeem_immediately(&vault_id, amount).allowed {
                    liquidity.redeem_immediately(system, ctx, vault_id, amount, tokens)?;
                    Ok(RedemptionRoute::Immediate { amount })
                } else {
                    let request_id =
                        liquidity.queue_gradual_redemption(system, ctx, vault_id, amount, daily_amount, false)?;
                    Ok(RedemptionRoute::Queued { request_id })
                }
            })
    }

    /// Remove lapsed or executed commitments in bounded batches
    pub fn prune_commitments(
        &mut self,
        ctx: &CallContext,
        after: Option<CommitHash>,
        max: usize,
    ) -> RiskResult<PruneOutcome> {
        self.mev.prune_expired(&self.system, ctx, after, max)
    }

    /// Commitment by hash
    pub fn get_commitment(&self, hash: &CommitHash) -> Option<&Commitment> {
        self.mev.get_commitment(hash)
    }

    // ============ Exposure ============

    /// Check a target book against the configured leverage and per-asset caps
    ///
    /// `notionals` are absolute position sizes in the NAV unit. Returns the
    /// gross leverage in basis points.
    pub fn check_exposure(&self, notionals: &[u64], nav: u64) -> RiskResult<u64> {
        self.config.exposure.check_targets(notionals, nav)
    }

    /// Check an estimated trade slippage against the configured tolerance
    pub fn check_slippage(&self, slippage_bps: u64) -> RiskResult<u64> {
        self.config.exposure.check_slippage(slippage_bps)
    }

    // ============ State ============

    /// Every event emitted so far
    pub fn events(&self) -> &EventLog {
        &self.system.events
    }

    /// Drain the event log
    pub fn drain_events(&mut self) -> Vec<vaultguard_common::RiskEvent> {
        self.system.events.drain()
    }

    /// Shared access, pause and event state
    pub fn system(&self) -> &SystemState {
        &self.system
    }

    /// Active configuration
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }
}
