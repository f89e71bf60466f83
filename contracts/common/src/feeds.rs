//! Price Feed Boundary
//!
//! How prices are fetched is outside the risk core. The aggregator reads
//! every registered feed through this trait once per round.

use crate::types::{AssetId, FeedId};

/// Failure reported by a price feed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// Feed did not answer
    #[error("feed unavailable")]
    Unavailable,

    /// Feed answered with data older than it is willing to vouch for
    #[error("stale price, last update at {last_update}")]
    Stale { last_update: u64 },

    /// Feed does not quote the requested asset
    #[error("asset not supported by feed")]
    UnsupportedAsset,
}

/// Price source collaborator
pub trait PriceFeeds {
    /// Latest price of `asset` as quoted by `feed`
    fn read_price(&self, feed: &FeedId, asset: &AssetId) -> Result<u64, FeedError>;
}

impl<T: PriceFeeds + ?Sized> PriceFeeds for &T {
    fn read_price(&self, feed: &FeedId, asset: &AssetId) -> Result<u64, FeedError> {
        (**self).read_price(feed, asset)
    }
}
