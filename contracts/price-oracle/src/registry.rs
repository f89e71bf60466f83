//! Oracle source registry.
//!
//! Sources are registered per asset, never deleted, and excluded from
//! aggregation once their failure count reaches `max_failures`.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use vaultguard_common::constants::oracle::MAX_SOURCES_PER_ASSET;
use vaultguard_common::{AssetId, FeedId, RiskError, RiskResult};

/// One weighted price source for an asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OracleSource {
    /// Feed handle passed to `PriceFeeds::read_price`
    pub feed: FeedId,
    /// Weight in bps (1..=10000)
    pub weight_bps: u64,
    /// Failures tolerated before exclusion
    pub max_failures: u32,
    /// Failures since registration or the last reset
    pub failure_count: u32,
    /// Human-readable name
    pub label: String,
    /// Block the source was registered at
    pub added_at: u64,
}

impl OracleSource {
    /// Create a healthy source
    pub fn new(feed: FeedId, weight_bps: u64, max_failures: u32, label: String, added_at: u64) -> Self {
        Self {
            feed,
            weight_bps,
            max_failures,
            failure_count: 0,
            label,
            added_at,
        }
    }

    /// Whether the source is skipped by aggregation
    pub fn is_excluded(&self) -> bool {
        self.failure_count >= self.max_failures
    }
}

/// Sources of every asset
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<AssetId, Vec<OracleSource>>,
}

impl SourceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail if `feed` cannot be added to `asset`
    pub fn check_insert(&self, asset: &AssetId, feed: &FeedId) -> RiskResult<()> {
        let existing = self.sources(asset);
        if existing.iter().any(|s| s.feed == *feed) {
            return Err(RiskError::DuplicateSource { feed: *feed });
        }
        if existing.len() >= MAX_SOURCES_PER_ASSET {
            return Err(RiskError::TooManySources {
                maximum: MAX_SOURCES_PER_ASSET,
            });
        }
        Ok(())
    }

    /// Register a source
    pub fn insert(&mut self, asset: AssetId, source: OracleSource) -> RiskResult<()> {
        self.check_insert(&asset, &source.feed)?;
        self.sources.entry(asset).or_default().push(source);
        Ok(())
    }

    /// Sources of an asset in registration order
    pub fn sources(&self, asset: &AssetId) -> &[OracleSource] {
        self.sources.get(asset).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up a source
    pub fn get(&self, asset: &AssetId, feed: &FeedId) -> Option<&OracleSource> {
        self.sources(asset).iter().find(|s| s.feed == *feed)
    }

    /// Mutable source lookup
    pub fn get_mut(&mut self, asset: &AssetId, feed: &FeedId) -> RiskResult<&mut OracleSource> {
        self.sources
            .get_mut(asset)
            .and_then(|list| list.iter_mut().find(|s| s.feed == *feed))
            .ok_or(RiskError::SourceNotFound { feed: *feed })
    }

    /// Mutable access to all sources of an asset
    pub(crate) fn sources_mut(&mut self, asset: &AssetId) -> Option<&mut Vec<OracleSource>> {
        self.sources.get_mut(asset)
    }

    /// Sum of weights of non-excluded sources
    pub fn active_weight(&self, asset: &AssetId) -> u64 {
        self.sources(asset)
            .iter()
            .filter(|s| !s.is_excluded())
            .map(|s| s.weight_bps)
            .sum()
    }

    /// Number of assets with at least one source
    pub fn asset_count(&self) -> usize {
        self.sources.len()
    }
}
