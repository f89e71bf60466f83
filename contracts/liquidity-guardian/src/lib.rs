//! VaultGuard Liquidity Guardian
//!
//! Tracks each vault's liquid/illiquid split and protects it against bank
//! runs.
//!
//! ## Key Features
//!
//! - **Bank-run detection**: a ratio below the critical threshold switches
//!   the vault's emergency protocol on
//! - **Immediate redemption**: only while it keeps the vault healthy
//! - **Gradual redemption**: bounded queue paid out in daily slices, with an
//!   emergency lane served first
//! - **Emergency liquidity**: anyone can top up a vault's liquid assets
//!
//! ## Ratio Thresholds
//!
//! ```text
//! ratio >= healthy           healthy
//! critical <= ratio < healthy degraded
//! ratio < critical           bank run, emergency protocol
//! ```

pub mod queue;

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vaultguard_common::{
    math::{ratio_bps, safe_add, safe_sub},
    validation::{require_nonzero_address, require_nonzero_amount},
    AssetId, CallContext, LiquidityParams, RequestId, RiskError, RiskEvent, RiskResult, Role, SystemState,
    TokenTransfer, VaultId,
};

pub use queue::{Lane, RedemptionQueue, RedemptionRequest};

// ============ Types ============

/// Liquidity snapshot of one vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VaultLiquidityState {
    /// Vault identifier
    pub vault_id: VaultId,
    /// Total assets
    pub total_assets: u64,
    /// Assets available for immediate payout
    pub liquid_assets: u64,
    /// Assets that need time to unwind
    pub illiquid_assets: u64,
    /// liquid * 10000 / total
    pub ratio_bps: u64,
    /// ratio_bps >= healthy threshold
    pub is_healthy: bool,
    /// Emergency protocol switched on
    pub emergency_active: bool,
    /// Timestamp of the latest activation
    pub emergency_activated_at: u64,
    /// Timestamp of the latest change
    pub updated_at: u64,
}

impl VaultLiquidityState {
    fn new(vault_id: VaultId) -> Self {
        Self {
            vault_id,
            total_assets: 0,
            liquid_assets: 0,
            illiquid_assets: 0,
            ratio_bps: 0,
            is_healthy: false,
            emergency_active: false,
            emergency_activated_at: 0,
            updated_at: 0,
        }
    }

    /// Recompute the derived fields
    fn refresh(&mut self, healthy_ratio_bps: u64, now: u64) {
        self.ratio_bps = ratio_bps(self.liquid_assets, self.total_assets);
        self.is_healthy = self.ratio_bps >= healthy_ratio_bps;
        self.updated_at = now;
    }

    /// Take `amount` out of the liquid (and therefore total) assets
    fn withdraw(&mut self, amount: u64, healthy_ratio_bps: u64, now: u64) -> RiskResult<()> {
        self.liquid_assets = safe_sub(self.liquid_assets, amount)?;
        self.total_assets = safe_sub(self.total_assets, amount)?;
        self.refresh(healthy_ratio_bps, now);
        Ok(())
    }

    /// Ratio after paying out `amount` immediately
    ///
    /// `None` when the payout empties the vault.
    pub fn ratio_after(&self, amount: u64) -> Option<u64> {
        let post_total = self.total_assets.checked_sub(amount)?;
        if post_total == 0 {
            return None;
        }
        let post_liquid = self.liquid_assets.saturating_sub(amount);
        Some(ratio_bps(post_liquid, post_total))
    }
}

/// Why an immediate redemption is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    /// Vault is under the emergency protocol
    EmergencyActive,
    /// Amount exceeds the liquid assets
    InsufficientLiquidity,
    /// Payout would leave the vault below the healthy ratio
    WouldBreachHealthyRatio,
    /// No snapshot for the vault
    UnknownVault,
}

/// Answer of [`LiquidityGuardian::can_redeem_immediately`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionEligibility {
    /// Whether the immediate path is open
    pub allowed: bool,
    /// Set whenever `allowed` is false
    pub reason: Option<DenialReason>,
}

impl RedemptionEligibility {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn denied(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Outcome of one queue processing call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingSummary {
    /// Requests visited (eligible or not)
    pub visited: usize,
    /// Requests that received a release
    pub released: usize,
    /// Requests paid out in full and removed
    pub completed: usize,
    /// Sum of all releases
    pub amount_released: u64,
}

// ============ Guardian ============

/// Vault liquidity tracker and redemption gatekeeper
#[derive(Debug, Clone)]
pub struct LiquidityGuardian {
    params: LiquidityParams,
    vaults: BTreeMap<VaultId, VaultLiquidityState>,
    queue: RedemptionQueue,
}

impl LiquidityGuardian {
    /// Create a guardian with validated parameters
    pub fn new(params: LiquidityParams) -> RiskResult<Self> {
        params.validate()?;
        Ok(Self {
            queue: RedemptionQueue::new(params.max_queue_size),
            params,
            vaults: BTreeMap::new(),
        })
    }

    /// Liquidity-manager only: record a vault snapshot
    pub fn update_liquidity(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        vault_id: VaultId,
        total_assets: u64,
        liquid_assets: u64,
        illiquid_assets: u64,
    ) -> RiskResult<()> {
        system.ensure_not_paused()?;
        system.require_role(ctx, Role::LiquidityManager)?;

        require_nonzero_address(&vault_id, "vault id cannot be zero")?;
        require_nonzero_amount(total_assets)?;
        if safe_add(liquid_assets, illiquid_assets)? != total_assets {
            return Err(RiskError::InvalidInput {
                param: "total_assets",
                reason: "must equal liquid + illiquid",
            });
        }

        let healthy = self.params.healthy_ratio_bps;
        let critical = self.params.critical_ratio_bps;
        let vault = self
            .vaults
            .entry(vault_id)
            .or_insert_with(|| VaultLiquidityState::new(vault_id));
        vault.total_assets = total_assets;
        vault.liquid_assets = liquid_assets;
        vault.illiquid_assets = illiquid_assets;
        vault.refresh(healthy, ctx.timestamp);

        let ratio = vault.ratio_bps;
        let bank_run = ratio < critical && !vault.emergency_active;
        if bank_run {
            vault.emergency_active = true;
            vault.emergency_activated_at = ctx.timestamp;
        }

        system.emit(RiskEvent::LiquidityUpdated {
            vault_id,
            total_assets,
            liquid_assets,
            ratio_bps: ratio,
            block_height: ctx.block,
        });
        debug!(total_assets, liquid_assets, ratio_bps = ratio, "liquidity updated");

        if bank_run {
            system.emit(RiskEvent::BankRunDetected {
                vault_id,
                ratio_bps: ratio,
                critical_ratio_bps: critical,
                block_height: ctx.block,
            });
            system.emit(RiskEvent::EmergencyActivated {
                vault_id,
                activated_at: ctx.timestamp,
                block_height: ctx.block,
            });
            warn!(ratio_bps = ratio, critical_ratio_bps = critical, "bank run detected, emergency protocol on");
        }
        Ok(())
    }

    /// Whether `amount` can be paid out right away
    pub fn can_redeem_immediately(&self, vault_id: &VaultId, amount: u64) -> RedemptionEligibility {
        let Some(vault) = self.vaults.get(vault_id) else {
            return RedemptionEligibility::denied(DenialReason::UnknownVault);
        };
        if vault.emergency_active {
            return RedemptionEligibility::denied(DenialReason::EmergencyActive);
        }
        if amount > vault.liquid_assets {
            return RedemptionEligibility::denied(DenialReason::InsufficientLiquidity);
        }
        match vault.ratio_after(amount) {
            Some(post_ratio) if post_ratio < self.params.healthy_ratio_bps => {
                RedemptionEligibility::denied(DenialReason::WouldBreachHealthyRatio)
            }
            _ => RedemptionEligibility::allowed(),
        }
    }

    /// Pay `amount` of the redemption asset to the caller right away
    ///
    /// No role is required. Burning or locking the caller's vault shares
    /// belongs to the collaborator that calls this; only liquidity is
    /// checked here.
    pub fn redeem_immediately<T: TokenTransfer + ?Sized>(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        vault_id: VaultId,
        amount: u64,
        tokens: &mut T,
    ) -> RiskResult<()> {
        system.ensure_not_paused()?;
        require_nonzero_amount(amount)?;

        let eligibility = self.can_redeem_immediately(&vault_id, amount);
        if let Some(reason) = eligibility.reason {
            return Err(self.denial_error(&vault_id, amount, reason));
        }

        let healthy = self.params.healthy_ratio_bps;
        let vault = self.vault_mut(&vault_id)?;
        let snapshot = vault.clone();
        vault.withdraw(amount, healthy, ctx.timestamp)?;

        if let Err(e) = tokens.transfer(&self.params.redemption_asset, &ctx.caller, amount) {
            warn!(error = %e, amount, "immediate redemption payout failed, rolled back");
            self.vaults.insert(vault_id, snapshot);
            return Err(RiskError::TransferFailed { to: ctx.caller, amount });
        }

        system.emit(RiskEvent::ImmediateRedemption {
            vault_id,
            owner: ctx.caller,
            amount,
            block_height: ctx.block,
        });
        info!(amount, "immediate redemption paid");
        Ok(())
    }

    /// Queue a redemption paid out in slices of at most `daily_amount`
    ///
    /// Open to any caller, who becomes the request owner. Share
    /// authorization is left to the calling collaborator.
    pub fn queue_gradual_redemption(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        vault_id: VaultId,
        total_amount: u64,
        daily_amount: u64,
        is_emergency: bool,
    ) -> RiskResult<RequestId> {
        system.ensure_not_paused()?;

        require_nonzero_amount(total_amount)?;
        require_nonzero_amount(daily_amount)?;
        if daily_amount > total_amount {
            return Err(RiskError::DailyAmountExceedsTotal {
                daily_amount,
                total_amount,
            });
        }
        if !self.vaults.contains_key(&vault_id) {
            return Err(RiskError::VaultNotFound { vault_id });
        }

        let request_id = self.queue.push(
            ctx.caller,
            vault_id,
            total_amount,
            daily_amount,
            is_emergency,
            ctx.timestamp,
        )?;

        system.emit(RiskEvent::RedemptionQueued {
            request_id,
            vault_id,
            owner: ctx.caller,
            total_amount,
            daily_amount,
            is_emergency,
            block_height: ctx.block,
        });
        debug!(request_id, total_amount, daily_amount, is_emergency, "redemption queued");
        Ok(request_id)
    }

    /// Liquidity-manager only: release due slices for at most
    /// `max_to_process` requests
    ///
    /// Every visited request consumes budget whether or not it is due. A
    /// failed payout restores that request and its vault and aborts; releases
    /// paid earlier in the same call stay paid.
    pub fn process_redemption_queue<T: TokenTransfer + ?Sized>(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        max_to_process: usize,
        tokens: &mut T,
    ) -> RiskResult<ProcessingSummary> {
        system.ensure_not_paused()?;
        system.require_role(ctx, Role::LiquidityManager)?;

        let mut summary = ProcessingSummary::default();
        let mut budget = max_to_process;

        for lane in Lane::SERVICE_ORDER {
            let mut to_visit = self.queue.lane_len(lane);
            while budget > 0 && to_visit > 0 {
                budget -= 1;
                to_visit -= 1;

                let Some(request) = self.queue.pop_front(lane) else {
                    break;
                };
                summary.visited += 1;

                match self.release_slice(system, ctx, request, tokens)? {
                    Some((amount, completed)) => {
                        summary.released += 1;
                        summary.amount_released = summary.amount_released.saturating_add(amount);
                        if completed {
                            summary.completed += 1;
                        }
                    }
                    None => continue,
                }
            }
        }

        debug!(
            visited = summary.visited,
            released = summary.released,
            completed = summary.completed,
            "redemption queue processed"
        );
        Ok(summary)
    }

    /// Pay one slice of `request` and requeue it unless finished
    ///
    /// Returns the amount released and whether the request completed, or
    /// `None` when nothing was due.
    fn release_slice<T: TokenTransfer + ?Sized>(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        mut request: RedemptionRequest,
        tokens: &mut T,
    ) -> RiskResult<Option<(u64, bool)>> {
        if !request.is_due(ctx.timestamp, self.params.redemption_interval_secs) {
            self.queue.push_back(request);
            return Ok(None);
        }

        let healthy = self.params.healthy_ratio_bps;
        let Some(vault) = self.vaults.get_mut(&request.vault_id) else {
            self.queue.push_back(request);
            return Ok(None);
        };

        let amount = request.next_release(vault.liquid_assets);
        if amount == 0 {
            self.queue.push_back(request);
            return Ok(None);
        }

        let vault_snapshot = vault.clone();
        let request_snapshot = request.clone();
        vault.withdraw(amount, healthy, ctx.timestamp)?;
        request.remaining_amount -= amount;
        request.last_processed_at = Some(ctx.timestamp);

        if let Err(e) = tokens.transfer(&self.params.redemption_asset, &request.owner, amount) {
            warn!(request_id = request.id, error = %e, amount, "redemption payout failed, rolled back");
            self.vaults.insert(vault_snapshot.vault_id, vault_snapshot);
            self.queue.push_front(request_snapshot);
            return Err(RiskError::TransferFailed {
                to: request.owner,
                amount,
            });
        }

        system.emit(RiskEvent::RedemptionProcessed {
            request_id: request.id,
            released: amount,
            remaining: request.remaining_amount,
            block_height: ctx.block,
        });

        let completed = request.is_complete();
        if completed {
            system.emit(RiskEvent::RedemptionCompleted {
                request_id: request.id,
                owner: request.owner,
                total_amount: request.total_amount,
                block_height: ctx.block,
            });
            info!(request_id = request.id, total_amount = request.total_amount, "redemption completed");
        } else {
            self.queue.push_back(request);
        }
        Ok(Some((amount, completed)))
    }

    /// Top up a vault's liquid assets from the caller
    ///
    /// Any caller may inject. The emergency protocol stays on until it is
    /// explicitly deactivated.
    pub fn inject_emergency_liquidity<T: TokenTransfer + ?Sized>(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        vault_id: VaultId,
        amount: u64,
        asset: AssetId,
        tokens: &mut T,
    ) -> RiskResult<()> {
        system.ensure_not_paused()?;
        require_nonzero_amount(amount)?;
        require_nonzero_address(&asset, "asset cannot be zero")?;

        let healthy = self.params.healthy_ratio_bps;
        let vault = self.vault_mut(&vault_id)?;
        let snapshot = vault.clone();

        vault.liquid_assets = safe_add(vault.liquid_assets, amount)?;
        vault.total_assets = safe_add(vault.total_assets, amount)?;
        vault.refresh(healthy, ctx.timestamp);
        let new_liquid_assets = vault.liquid_assets;

        if let Err(e) = tokens.transfer_from(&asset, &ctx.caller, &vault_id, amount) {
            warn!(error = %e, amount, "emergency liquidity transfer failed, rolled back");
            self.vaults.insert(vault_id, snapshot);
            return Err(RiskError::TransferFailed { to: vault_id, amount });
        }

        system.emit(RiskEvent::EmergencyLiquidityInjected {
            vault_id,
            provider: ctx.caller,
            asset,
            amount,
            new_liquid_assets,
            block_height: ctx.block,
        });
        info!(amount, new_liquid_assets, "emergency liquidity injected");
        Ok(())
    }

    /// Liquidity-manager or admin: switch the emergency protocol off
    pub fn deactivate_emergency_protocol(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        vault_id: VaultId,
    ) -> RiskResult<()> {
        system.ensure_not_paused()?;
        system.require_any_role(ctx, &[Role::LiquidityManager, Role::Admin])?;

        let cooldown = self.params.emergency_cooldown_secs;
        let vault = self.vault_mut(&vault_id)?;
        if !vault.emergency_active {
            return Err(RiskError::InvalidStateTransition);
        }

        let ready_at = vault.emergency_activated_at.saturating_add(cooldown);
        if ctx.timestamp < ready_at || !vault.is_healthy {
            return Err(RiskError::CooldownNotFinished { ready_at });
        }

        vault.emergency_active = false;
        let ratio = vault.ratio_bps;

        system.emit(RiskEvent::EmergencyDeactivated {
            vault_id,
            ratio_bps: ratio,
            block_height: ctx.block,
        });
        info!(ratio_bps = ratio, "emergency protocol deactivated");
        Ok(())
    }

    // ============ Queries ============

    /// `(ratio_bps, is_healthy, emergency_active)` of a vault
    pub fn get_vault_status(&self, vault_id: &VaultId) -> RiskResult<(u64, bool, bool)> {
        let vault = self
            .vaults
            .get(vault_id)
            .ok_or(RiskError::VaultNotFound { vault_id: *vault_id })?;
        Ok((vault.ratio_bps, vault.is_healthy, vault.emergency_active))
    }

    /// Full snapshot of a vault
    pub fn vault(&self, vault_id: &VaultId) -> Option<&VaultLiquidityState> {
        self.vaults.get(vault_id)
    }

    /// Requests still waiting for payouts
    pub fn get_active_redemption_count(&self) -> usize {
        self.queue.len()
    }

    /// Queued request by id
    pub fn redemption_request(&self, request_id: RequestId) -> Option<&RedemptionRequest> {
        self.queue.get(request_id)
    }

    /// The redemption queue
    pub fn queue(&self) -> &RedemptionQueue {
        &self.queue
    }

    /// Active parameters
    pub fn params(&self) -> &LiquidityParams {
        &self.params
    }

    fn vault_mut(&mut self, vault_id: &VaultId) -> RiskResult<&mut VaultLiquidityState> {
        self.vaults
            .get_mut(vault_id)
            .ok_or(RiskError::VaultNotFound { vault_id: *vault_id })
    }

    fn denial_error(&self, vault_id: &VaultId, amount: u64, reason: DenialReason) -> RiskError {
        match reason {
            DenialReason::UnknownVault => RiskError::VaultNotFound { vault_id: *vault_id },
            DenialReason::EmergencyActive => RiskError::EmergencyActiveRedemptionBlocked { vault_id: *vault_id },
            DenialReason::InsufficientLiquidity | DenialReason::WouldBreachHealthyRatio => {
                RiskError::InsufficientLiquidity {
                    available: self.vaults.get(vault_id).map_or(0, |v| v.liquid_assets),
                    requested: amount,
                }
            }
        }
    }
}

// ============ Tests ============
