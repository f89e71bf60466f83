//! Stress Testing Framework
//!
//! Deterministic scenarios run against a fresh [`RiskCore`] with in-memory
//! price feeds and an in-memory token ledger.
//!
//! ## Scenarios
//!
//! 1. Flash crash: every source drops by `drop_bps` in one round
//! 2. Bank run: liquidity collapses, then `requests` holders redeem
//! 3. Oracle outage: `failing_sources` of the three sources stop answering

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use vaultguard_common::{
    constants::{bps::BPS_DENOMINATOR, oracle::DEFAULT_MAX_FAILURES},
    math::mul_div, Address, AssetId, CallContext, FeedError, FeedId, PriceFeeds,
    RiskConfig, RiskError, RiskResult, Role, TokenTransfer, TransferError, VaultId,
};
use vaultguard_mev_guard::commit_hash;

use crate::{RedemptionRoute, RiskCore};

// ============================================================================
// Constants
// ============================================================================

/// Asset priced by every scenario
pub const SCENARIO_ASSET: AssetId = [0xAA; 32];

/// Vault stressed by every scenario
pub const SCENARIO_VAULT: VaultId = [0xBB; 32];

/// Starting price of the scenario asset
pub const INITIAL_PRICE: u64 = 100_000;

/// Starting vault size
pub const INITIAL_TOTAL_ASSETS: u64 = 1_000_000;

/// Circuit breaker threshold used by the scenarios (20%)
pub const SCENARIO_BREAKER_BPS: u64 = 2_000;

/// Scenarios run by the simulation binary
pub const DEFAULT_SCENARIOS: [ScenarioType; 3] = [
    ScenarioType::FlashCrash { drop_bps: 3_000 },
    ScenarioType::BankRun {
        liquid_bps: 300,
        requests: 20,
    },
    ScenarioType::OracleOutage { failing_sources: 2 },
];

const ADMIN: Address = [1u8; 32];
const ORACLE_MANAGER: Address = [2u8; 32];
const LIQUIDITY_MANAGER: Address = [3u8; 32];
const FEEDS: [(FeedId, u64); 3] = [([0xF1; 32], 4_000), ([0xF2; 32], 3_000), ([0xF3; 32], 3_000)];

// ============================================================================
// Types
// ============================================================================

/// Stress test scenario type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioType {
    /// Sudden price crash across all sources
    FlashCrash { drop_bps: u64 },
    /// Liquidity collapse followed by mass redemption
    BankRun { liquid_bps: u64, requests: u32 },
    /// Some price sources stop answering
    OracleOutage { failing_sources: u8 },
}

/// Outcome of a scenario run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Global pause flag at the end
    pub paused: bool,
    /// The scenario asset's breaker tripped
    pub breaker_tripped: bool,
    /// The scenario vault entered the emergency protocol
    pub emergency_activated: bool,
    /// Latest committed price
    pub final_price: Option<u64>,
    /// Confidence of the latest committed price
    pub confidence_bps: Option<u64>,
    /// Oracle rounds the harness saw fail, pause refusals included
    pub failed_rounds: u32,
    /// Rounds the aggregator counted as answered by no source
    pub oracle_failed_rounds: u64,
    /// Oracle source failures recorded
    pub oracle_failures: u64,
    /// Redemptions paid immediately
    pub immediate_redemptions: u32,
    /// Redemptions placed on the queue
    pub queued_redemptions: u32,
    /// Redemptions refused (queue full, paused, ...)
    pub rejected_redemptions: u32,
    /// Amount paid out by the queue
    pub released_amount: u64,
    /// Requests still waiting at the end
    pub pending_requests: usize,
    /// Events emitted during the run
    pub events_emitted: usize,
    /// Vault accounting and queue bounds held throughout
    pub invariants_hold: bool,
}

// ============================================================================
// In-memory collaborators
// ============================================================================

/// Price feeds answering from a table
#[derive(Debug, Clone, Default)]
pub struct StaticFeeds {
    prices: BTreeMap<FeedId, u64>,
    failing: BTreeSet<FeedId>,
}

impl StaticFeeds {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the price quoted by `feed`
    pub fn set_price(&mut self, feed: FeedId, price: u64) {
        self.prices.insert(feed, price);
    }

    /// Make `feed` answer with an error
    pub fn fail(&mut self, feed: FeedId) {
        self.failing.insert(feed);
    }

    /// Make `feed` answer again
    pub fn recover(&mut self, feed: &FeedId) {
        self.failing.remove(feed);
    }
}

impl PriceFeeds for StaticFeeds {
    fn read_price(&self, feed: &FeedId, _asset: &AssetId) -> Result<u64, FeedError> {
        if self.failing.contains(feed) {
            return Err(FeedError::Unavailable);
        }
        self.prices.get(feed).copied().ok_or(FeedError::UnsupportedAsset)
    }
}

/// Balance table standing in for token custody
///
/// `transfer` pays out of the `custody` account.
#[derive(Debug, Clone)]
pub struct TokenLedger {
    custody: Address,
    balances: BTreeMap<(AssetId, Address), u64>,
    frozen: bool,
}

impl TokenLedger {
    /// Empty ledger paying redemptions out of `custody`
    pub fn new(custody: Address) -> Self {
        Self {
            custody,
            balances: BTreeMap::new(),
            frozen: false,
        }
    }

    /// Credit `amount` of `asset` to `account`
    pub fn mint(&mut self, asset: AssetId, account: Address, amount: u64) {
        let balance = self.balances.entry((asset, account)).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Balance of `account` in `asset`
    pub fn balance_of(&self, asset: &AssetId, account: &Address) -> u64 {
        self.balances.get(&(*asset, *account)).copied().unwrap_or(0)
    }

    /// Reject every transfer while set
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    fn move_balance(&mut self, asset: &AssetId, from: &Address, to: &Address, amount: u64) -> Result<(), TransferError> {
        if self.frozen {
            return Err(TransferError::Rejected("ledger frozen".into()));
        }
        let available = self.balance_of(asset, from);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        self.balances.insert((*asset, *from), available - amount);
        self.mint(*asset, *to, amount);
        Ok(())
    }
}

impl TokenTransfer for TokenLedger {
    fn transfer_from(&mut self, asset: &AssetId, owner: &Address, to: &Address, amount: u64) -> Result<(), TransferError> {
        self.move_balance(asset, owner, to, amount)
    }

    fn transfer(&mut self, asset: &AssetId, to: &Address, amount: u64) -> Result<(), TransferError> {
        let custody = self.custody;
        self.move_balance(asset, &custody, to, amount)
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A configured core plus collaborators and a logical clock
pub struct Harness {
    /// Core under test
    pub core: RiskCore,
    /// Price feeds of the scenario asset
    pub feeds: StaticFeeds,
    /// Token custody
    pub ledger: TokenLedger,
    /// Current block
    pub block: u64,
    /// Current timestamp
    pub timestamp: u64,
}

impl Harness {
    /// Core with three sources, a breaker and one healthy vault
    pub fn new(config: &RiskConfig) -> RiskResult<Self> {
        let mut core = RiskCore::new(ADMIN, 1, config.clone())?;
        let mut harness_ctx = CallContext::new(ADMIN, 1, 1_000);

        core.grant_role(&harness_ctx, ORACLE_MANAGER, Role::OracleManager)?;
        core.grant_role(&harness_ctx, LIQUIDITY_MANAGER, Role::LiquidityManager)?;

        let mut feeds = StaticFeeds::new();
        for (i, (feed, weight)) in FEEDS.iter().enumerate() {
            core.add_source(&harness_ctx, SCENARIO_ASSET, *feed, *weight, DEFAULT_MAX_FAILURES, format!("source-{i}"))?;
            feeds.set_price(*feed, INITIAL_PRICE);
        }
        core.configure_circuit_breaker(&harness_ctx, SCENARIO_ASSET, SCENARIO_BREAKER_BPS, 3_600)?;

        harness_ctx = harness_ctx.with_caller(LIQUIDITY_MANAGER);
        core.update_liquidity(
            &harness_ctx,
            SCENARIO_VAULT,
            INITIAL_TOTAL_ASSETS,
            INITIAL_TOTAL_ASSETS * 4 / 10,
            INITIAL_TOTAL_ASSETS * 6 / 10,
        )?;

        let mut ledger = TokenLedger::new(SCENARIO_VAULT);
        ledger.mint(config.liquidity.redemption_asset, SCENARIO_VAULT, INITIAL_TOTAL_ASSETS);

        Ok(Self {
            core,
            feeds,
            ledger,
            block: 1,
            timestamp: 1_000,
        })
    }

    /// Context for `caller` at the current clock
    pub fn ctx(&self, caller: Address) -> CallContext {
        CallContext::new(caller, self.block, self.timestamp)
    }

    /// Advance the clock
    pub fn tick(&mut self, blocks: u64, secs: u64) {
        self.block += blocks;
        self.timestamp += secs;
    }

    /// One oracle round at the current clock
    pub fn price_round(&mut self) -> RiskResult<u64> {
        let ctx = self.ctx(ORACLE_MANAGER);
        let price = self.core.update_price(&ctx, SCENARIO_ASSET, &self.feeds)?;
        Ok(price.price)
    }

    /// Set every feed to `price`
    pub fn set_all_prices(&mut self, price: u64) {
        for (feed, _) in FEEDS {
            self.feeds.set_price(feed, price);
        }
    }

    /// Commit then reveal a redemption for `holder`
    pub fn commit_reveal_redemption(&mut self, holder: Address, amount: u64, daily: u64) -> RiskResult<RedemptionRoute> {
        let mut nonce = holder;
        nonce.iter_mut().for_each(|b| *b ^= 0x5A);
        let ctx = self.ctx(holder);
        self.core.commit_transaction(&ctx, commit_hash(amount, &nonce, &holder))?;

        self.tick(1, 12);
        let ctx = self.ctx(holder);
        self.core
            .reveal_redemption(&ctx, SCENARIO_VAULT, amount, nonce, daily, &mut self.ledger)
    }

    fn report(&self) -> ScenarioReport {
        let vault = self.core.vault(&SCENARIO_VAULT);
        let latest = self.core.get_price(&SCENARIO_ASSET).ok();
        let queue_bounded = self.core.get_active_redemption_count() <= self.core.config().liquidity.max_queue_size;
        let vault_consistent = vault.is_some_and(|v| v.liquid_assets <= v.total_assets);

        ScenarioReport {
            paused: self.core.is_paused(),
            breaker_tripped: self
                .core
                .circuit_breaker(&SCENARIO_ASSET)
                .is_some_and(|cb| cb.is_tripped),
            emergency_activated: vault.is_some_and(|v| v.emergency_active),
            final_price: latest.map(|p| p.price),
            confidence_bps: latest.map(|p| p.confidence_bps),
            oracle_failures: self.core.total_failures(),
            oracle_failed_rounds: self.core.failed_rounds(),
            pending_requests: self.core.get_active_redemption_count(),
            events_emitted: self.core.events().len(),
            invariants_hold: queue_bounded && vault_consistent,
            ..Default::default()
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

/// Run one scenario against a fresh core
pub fn run_scenario(config: &RiskConfig, scenario: ScenarioType) -> RiskResult<ScenarioReport> {
    let mut harness = Harness::new(config)?;
    harness.price_round()?;
    harness.tick(1, 60);

    let report = match scenario {
        ScenarioType::FlashCrash { drop_bps } => run_flash_crash(&mut harness, drop_bps)?,
        ScenarioType::BankRun { liquid_bps, requests } => run_bank_run(&mut harness, liquid_bps, requests)?,
        ScenarioType::OracleOutage { failing_sources } => run_oracle_outage(&mut harness, failing_sources)?,
    };

    info!(
        ?scenario,
        paused = report.paused,
        emergency = report.emergency_activated,
        invariants_hold = report.invariants_hold,
        "scenario finished"
    );
    Ok(report)
}

/// Run every scenario, keeping going past failures
pub fn run_all(config: &RiskConfig, scenarios: &[ScenarioType]) -> Vec<(ScenarioType, RiskResult<ScenarioReport>)> {
    scenarios
        .iter()
        .map(|scenario| (*scenario, run_scenario(config, *scenario)))
        .collect()
}

fn run_flash_crash(harness: &mut Harness, drop_bps: u64) -> RiskResult<ScenarioReport> {
    let drop_bps = drop_bps.min(BPS_DENOMINATOR - 1);
    let crashed = mul_div(INITIAL_PRICE, BPS_DENOMINATOR - drop_bps, BPS_DENOMINATOR)?;
    harness.set_all_prices(crashed);
    harness.price_round()?;

    // The pause blocks follow-up rounds until the breaker is reset
    harness.tick(1, 60);
    let mut failed_rounds = 0;
    if harness.price_round().is_err() {
        failed_rounds += 1;
    }

    Ok(ScenarioReport {
        failed_rounds,
        ..harness.report()
    })
}

fn run_bank_run(harness: &mut Harness, liquid_bps: u64, requests: u32) -> RiskResult<ScenarioReport> {
    let liquid = mul_div(INITIAL_TOTAL_ASSETS, liquid_bps.min(BPS_DENOMINATOR), BPS_DENOMINATOR)?;
    let ctx = harness.ctx(LIQUIDITY_MANAGER);
    harness
        .core
        .update_liquidity(&ctx, SCENARIO_VAULT, INITIAL_TOTAL_ASSETS, liquid, INITIAL_TOTAL_ASSETS - liquid)?;

    let amount = INITIAL_TOTAL_ASSETS / 100;
    let mut immediate = 0;
    let mut queued = 0;
    let mut rejected = 0;
    for i in 0..requests {
        let holder = holder_address(i);
        match harness.commit_reveal_redemption(holder, amount, amount / 4) {
            Ok(RedemptionRoute::Immediate { .. }) => immediate += 1,
            Ok(RedemptionRoute::Queued { .. }) => queued += 1,
            Err(e) => {
                debug!(error = %e, "redemption refused");
                rejected += 1;
            }
        }
        harness.tick(1, 12);
    }

    let mut released = 0;
    for _ in 0..4 {
        let ctx = harness.ctx(LIQUIDITY_MANAGER);
        match harness.core.process_redemption_queue(&ctx, 10, &mut harness.ledger) {
            Ok(summary) => released += summary.amount_released,
            Err(RiskError::TransferFailed { .. }) => break,
            Err(e) => return Err(e),
        }
        harness.tick(7_200, 86_400);
    }

    Ok(ScenarioReport {
        immediate_redemptions: immediate,
        queued_redemptions: queued,
        rejected_redemptions: rejected,
        released_amount: released,
        ..harness.report()
    })
}

/// Distinct nonzero address for the `i`-th bank-run holder
fn holder_address(i: u32) -> Address {
    let mut holder = [0x40u8; 32];
    holder[..4].copy_from_slice(&i.to_le_bytes());
    holder
}

fn run_oracle_outage(harness: &mut Harness, failing_sources: u8) -> RiskResult<ScenarioReport> {
    for (feed, _) in FEEDS.iter().take(failing_sources as usize) {
        harness.feeds.fail(*feed);
    }

    let mut failed_rounds = 0;
    for _ in 0..4 {
        match harness.price_round() {
            Ok(_) => {}
            Err(RiskError::NoValidSources { .. }) => failed_rounds += 1,
            Err(e) => return Err(e),
        }
        harness.tick(1, 60);
    }

    Ok(ScenarioReport {
        failed_rounds,
        ..harness.report()
    })
}

// ============================================================================
// Tests
// ============================================================================
