//! VaultGuard Price Oracle
//!
//! Multi-source price aggregation with graceful degradation.
//!
//! ## Features
//!
//! - **Weighted aggregation**: each responding source contributes in
//!   proportion to its weight
//! - **Confidence**: responding weight over active weight, in bps
//! - **Failure tracking**: sources that keep failing are excluded until an
//!   admin resets them
//! - **TWAP**: time-weighted average over a bounded window per asset
//! - **Manipulation flagging**: deviation from the TWAP or between sources
//!
//! ## Round Atomicity
//!
//! A round either commits completely (price, TWAP sample, failure counters,
//! flag, events) or leaves no trace at all.

pub mod registry;
pub mod twap;

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vaultguard_common::{
    constants::bps::{BPS_DENOMINATOR, MAX_WEIGHT_BPS},
    math::{deviation_bps, mul_div, weighted_mean},
    validation::require_nonzero_address,
    AssetId, CallContext, FeedId, ManipulationPolicy, OracleParams, PriceFeeds, RiskError, RiskEvent,
    RiskResult, Role, SystemState,
};

pub use registry::{OracleSource, SourceRegistry};
pub use twap::{PriceSample, TwapWindow};

// ============ Types ============

/// Latest committed price of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AggregatedPrice {
    /// Weighted average of responding sources
    pub price: u64,
    /// Responding weight / active weight in bps
    pub confidence_bps: u64,
    /// Timestamp of the round
    pub observed_at: u64,
    /// Number of sources that answered
    pub sources_used: u8,
}

/// One answer collected during a round
#[derive(Debug, Clone, Copy)]
struct SourceQuote {
    price: u64,
    weight_bps: u64,
}

/// Everything read from the feeds before anything is committed
#[derive(Debug, Default)]
struct Round {
    quotes: Vec<SourceQuote>,
    failed: Vec<FeedId>,
    active_weight: u64,
}

/// Deviation that crossed the manipulation threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Suspicion {
    observed: u64,
    reference: u64,
    deviation_bps: u64,
}

// ============ Aggregator ============

/// Price aggregator over all registered assets
#[derive(Debug, Clone)]
pub struct OracleAggregator {
    params: OracleParams,
    registry: SourceRegistry,
    prices: BTreeMap<AssetId, AggregatedPrice>,
    twaps: BTreeMap<AssetId, TwapWindow>,
    flagged: BTreeSet<AssetId>,
    total_failures: u64,
    failed_rounds: u64,
}

impl OracleAggregator {
    /// Create an aggregator with validated parameters
    pub fn new(params: OracleParams) -> RiskResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            registry: SourceRegistry::new(),
            prices: BTreeMap::new(),
            twaps: BTreeMap::new(),
            flagged: BTreeSet::new(),
            total_failures: 0,
            failed_rounds: 0,
        })
    }

    /// Admin-only: register a weighted source for an asset
    #[allow(clippy::too_many_arguments)]
    pub fn add_source(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        asset: AssetId,
        feed: FeedId,
        weight_bps: u64,
        max_failures: u32,
        label: impl Into<String>,
    ) -> RiskResult<()> {
        system.ensure_not_paused()?;
        system.require_role(ctx, Role::Admin)?;

        require_nonzero_address(&asset, "asset cannot be zero")?;
        require_nonzero_address(&feed, "feed cannot be zero")?;
        validate_weight(weight_bps)?;
        if max_failures == 0 {
            return Err(RiskError::InvalidInput {
                param: "max_failures",
                reason: "must be at least 1",
            });
        }

        let source = OracleSource::new(feed, weight_bps, max_failures, label.into(), ctx.block);
        self.registry.insert(asset, source)?;

        system.emit(RiskEvent::OracleSourceAdded {
            asset,
            feed,
            weight_bps,
            block_height: ctx.block,
        });
        info!(weight_bps, max_failures, "oracle source added");
        Ok(())
    }

    /// Admin-only: change the weight of a source
    pub fn set_source_weight(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        asset: AssetId,
        feed: FeedId,
        weight_bps: u64,
    ) -> RiskResult<()> {
        system.ensure_not_paused()?;
        system.require_role(ctx, Role::Admin)?;
        validate_weight(weight_bps)?;

        let source = self.registry.get_mut(&asset, &feed)?;
        source.weight_bps = weight_bps;
        let failure_count = source.failure_count;

        system.emit(RiskEvent::OracleSourceUpdated {
            asset,
            feed,
            weight_bps,
            failure_count,
            block_height: ctx.block,
        });
        info!(weight_bps, "oracle source weight updated");
        Ok(())
    }

    /// Admin-only: clear the failure count, readmitting an excluded source
    pub fn reset_source(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        asset: AssetId,
        feed: FeedId,
    ) -> RiskResult<()> {
        system.ensure_not_paused()?;
        system.require_role(ctx, Role::Admin)?;

        let source = self.registry.get_mut(&asset, &feed)?;
        source.failure_count = 0;
        let weight_bps = source.weight_bps;

        system.emit(RiskEvent::OracleSourceUpdated {
            asset,
            feed,
            weight_bps,
            failure_count: 0,
            block_height: ctx.block,
        });
        info!("oracle source reset");
        Ok(())
    }

    /// Oracle-manager only: run one aggregation round for `asset`
    pub fn update_price<F: PriceFeeds + ?Sized>(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        asset: AssetId,
        feeds: &F,
    ) -> RiskResult<AggregatedPrice> {
        system.ensure_not_paused()?;
        system.require_role(ctx, Role::OracleManager)?;
        require_nonzero_address(&asset, "asset cannot be zero")?;
        if let Some(window) = self.twaps.get(&asset) {
            window.check_timestamp(ctx.timestamp)?;
        }

        let round = self.collect_round(&asset, feeds);
        if round.quotes.is_empty() {
            self.failed_rounds = self.failed_rounds.saturating_add(1);
            warn!(failed = round.failed.len(), failed_rounds = self.failed_rounds, "no oracle source responded");
            return Err(RiskError::NoValidSources { asset });
        }

        let pairs: Vec<(u64, u64)> = round.quotes.iter().map(|q| (q.price, q.weight_bps)).collect();
        let price = weighted_mean(&pairs)?;
        let responding_weight: u64 = round.quotes.iter().map(|q| q.weight_bps).sum();
        let confidence_bps = mul_div(responding_weight, BPS_DENOMINATOR, round.active_weight)?.min(BPS_DENOMINATOR);

        let suspicion = self.detect_manipulation(&asset, price, &round.quotes)?;
        if let Some(s) = suspicion {
            if self.params.manipulation_policy == ManipulationPolicy::Reject {
                warn!(deviation_bps = s.deviation_bps, "price round rejected as manipulated");
                return Err(RiskError::PriceManipulation {
                    deviation_bps: s.deviation_bps,
                    max_deviation_bps: self.params.max_deviation_bps,
                });
            }
        }

        // Commit
        self.record_failures(system, ctx, &asset, &round.failed);

        let aggregated = AggregatedPrice {
            price,
            confidence_bps,
            observed_at: ctx.timestamp,
            sources_used: round.quotes.len() as u8,
        };
        self.prices.insert(asset, aggregated);
        self.twaps
            .entry(asset)
            .or_insert_with(|| TwapWindow::new(&self.params))
            .record(price, ctx.timestamp)?;

        match suspicion {
            Some(s) => {
                self.flagged.insert(asset);
                system.emit(RiskEvent::PriceManipulationDetected {
                    asset,
                    price: s.observed,
                    reference_price: s.reference,
                    deviation_bps: s.deviation_bps,
                    block_height: ctx.block,
                });
                warn!(
                    observed = s.observed,
                    reference = s.reference,
                    deviation_bps = s.deviation_bps,
                    "possible price manipulation"
                );
            }
            None => {
                self.flagged.remove(&asset);
            }
        }

        system.emit(RiskEvent::PriceUpdated {
            asset,
            price,
            confidence_bps,
            sources_used: aggregated.sources_used,
            block_height: ctx.block,
        });
        debug!(price, confidence_bps, sources_used = aggregated.sources_used, "price updated");

        Ok(aggregated)
    }

    /// Read every non-excluded source without touching state
    fn collect_round<F: PriceFeeds + ?Sized>(&self, asset: &AssetId, feeds: &F) -> Round {
        let mut round = Round::default();

        for source in self.registry.sources(asset).iter().filter(|s| !s.is_excluded()) {
            round.active_weight += source.weight_bps;
            match feeds.read_price(&source.feed, asset) {
                Ok(price) if price > 0 => round.quotes.push(SourceQuote {
                    price,
                    weight_bps: source.weight_bps,
                }),
                Ok(_) => {
                    debug!(label = %source.label, "source returned zero price");
                    round.failed.push(source.feed);
                }
                Err(e) => {
                    debug!(label = %source.label, error = %e, "source read failed");
                    round.failed.push(source.feed);
                }
            }
        }
        round
    }

    /// Largest deviation above the threshold, vs TWAP or vs peer sources
    fn detect_manipulation(
        &self,
        asset: &AssetId,
        price: u64,
        quotes: &[SourceQuote],
    ) -> RiskResult<Option<Suspicion>> {
        let max = self.params.max_deviation_bps;
        let mut worst: Option<Suspicion> = None;
        let mut consider = |candidate: Suspicion| {
            if candidate.deviation_bps > max && worst.map_or(true, |w| candidate.deviation_bps > w.deviation_bps) {
                worst = Some(candidate);
            }
        };

        if let Some(window) = self.twaps.get(asset).filter(|w| w.is_valid()) {
            if let Some(twap) = window.twap() {
                consider(Suspicion {
                    observed: price,
                    reference: twap,
                    deviation_bps: deviation_bps(price, twap),
                });
            }
        }

        if quotes.len() >= 2 {
            for (i, quote) in quotes.iter().enumerate() {
                let others: Vec<(u64, u64)> = quotes
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, q)| (q.price, q.weight_bps))
                    .collect();
                let reference = weighted_mean(&others)?;
                consider(Suspicion {
                    observed: quote.price,
                    reference,
                    deviation_bps: deviation_bps(quote.price, reference),
                });
            }
        }

        Ok(worst)
    }

    fn record_failures(&mut self, system: &mut SystemState, ctx: &CallContext, asset: &AssetId, failed: &[FeedId]) {
        let Some(sources) = self.registry.sources_mut(asset) else {
            return;
        };

        for feed in failed {
            let Some(source) = sources.iter_mut().find(|s| s.feed == *feed) else {
                continue;
            };
            source.failure_count = source.failure_count.saturating_add(1);
            self.total_failures = self.total_failures.saturating_add(1);

            let excluded = source.is_excluded();
            system.emit(RiskEvent::OracleSourceFailed {
                asset: *asset,
                feed: *feed,
                failure_count: source.failure_count,
                excluded,
                block_height: ctx.block,
            });
            warn!(
                label = %source.label,
                failure_count = source.failure_count,
                excluded,
                "oracle source failed"
            );
        }
    }

    // ============ Queries ============

    /// Latest committed price
    pub fn get_price(&self, asset: &AssetId) -> RiskResult<AggregatedPrice> {
        self.prices
            .get(asset)
            .copied()
            .ok_or(RiskError::PriceUnavailable { asset: *asset })
    }

    /// Latest committed price value, if any
    pub fn latest_price(&self, asset: &AssetId) -> Option<u64> {
        self.prices.get(asset).map(|p| p.price)
    }

    /// Current TWAP and whether the window is valid
    pub fn get_twap(&self, asset: &AssetId) -> RiskResult<(u64, bool)> {
        let window = self
            .twaps
            .get(asset)
            .ok_or(RiskError::PriceUnavailable { asset: *asset })?;
        let twap = window.twap().ok_or(RiskError::PriceUnavailable { asset: *asset })?;
        Ok((twap, window.is_valid()))
    }

    /// TWAP window of an asset
    pub fn twap_window(&self, asset: &AssetId) -> Option<&TwapWindow> {
        self.twaps.get(asset)
    }

    /// Whether the latest committed round looked manipulated
    pub fn is_manipulation_detected(&self, asset: &AssetId) -> bool {
        self.flagged.contains(asset)
    }

    /// Failures recorded across all sources and assets
    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    /// Update rounds in which no source answered
    ///
    /// Only this counter moves on such a round; prices, TWAPs and
    /// per-source failure counts are left as they were.
    pub fn failed_rounds(&self) -> u64 {
        self.failed_rounds
    }

    /// Registered sources of an asset
    pub fn sources(&self, asset: &AssetId) -> &[OracleSource] {
        self.registry.sources(asset)
    }

    /// Single source lookup
    pub fn source(&self, asset: &AssetId, feed: &FeedId) -> Option<&OracleSource> {
        self.registry.get(asset, feed)
    }

    /// Active parameters
    pub fn params(&self) -> &OracleParams {
        &self.params
    }
}

fn validate_weight(weight_bps: u64) -> RiskResult<()> {
    if weight_bps == 0 || weight_bps > MAX_WEIGHT_BPS {
        return Err(RiskError::InvalidWeight { weight_bps });
    }
    Ok(())
}

// ============ Tests ============
