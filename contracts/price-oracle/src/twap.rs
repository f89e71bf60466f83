//! TWAP (Time-Weighted Average Price) window.
//!
//! Keeps a bounded, insertion-ordered series of `(price, timestamp)` samples
//! per asset and computes
//!
//! ```text
//! TWAP = sum(price_i * (t_{i+1} - t_i)) / sum(t_{i+1} - t_i)
//! ```
//!
//! where `price_i` is the price that prevailed from `t_i` until the next
//! sample. The newest sample's price only counts once a later sample exists.

use std::collections::VecDeque;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use vaultguard_common::{OracleParams, RiskError, RiskResult};

/// A single committed price observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PriceSample {
    /// Aggregated price
    pub price: u64,
    /// Observation time (seconds)
    pub timestamp: u64,
}

/// Bounded ring of price samples for one asset
#[derive(Debug, Clone)]
pub struct TwapWindow {
    samples: VecDeque<PriceSample>,
    window_secs: u64,
    max_samples: usize,
    min_samples: usize,
    min_span_secs: u64,
}

impl TwapWindow {
    /// Empty window sized from the oracle parameters
    pub fn new(params: &OracleParams) -> Self {
        Self {
            samples: VecDeque::with_capacity(params.twap_max_samples),
            window_secs: params.twap_window_secs,
            max_samples: params.twap_max_samples.max(2),
            min_samples: params.twap_min_samples,
            min_span_secs: params.twap_min_span_secs,
        }
    }

    /// Fail if a sample at `timestamp` would go back in time
    pub fn check_timestamp(&self, timestamp: u64) -> RiskResult<()> {
        match self.samples.back() {
            Some(newest) if timestamp < newest.timestamp => Err(RiskError::InvalidInput {
                param: "timestamp",
                reason: "precedes the newest TWAP sample",
            }),
            _ => Ok(()),
        }
    }

    /// Append a sample, evicting by age and capacity
    ///
    /// A sample at the newest timestamp replaces the newest sample.
    pub fn record(&mut self, price: u64, timestamp: u64) -> RiskResult<()> {
        self.check_timestamp(timestamp)?;

        let same_instant = self.samples.back().is_some_and(|s| s.timestamp == timestamp);
        if same_instant {
            if let Some(newest) = self.samples.back_mut() {
                newest.price = price;
            }
        } else {
            self.samples.push_back(PriceSample { price, timestamp });
        }

        let horizon = timestamp.saturating_sub(self.window_secs);
        while self.samples.front().is_some_and(|s| s.timestamp < horizon) {
            self.samples.pop_front();
        }
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
        Ok(())
    }

    /// Time-weighted average over retained samples
    ///
    /// `None` when empty; the newest price when all samples share a timestamp.
    pub fn twap(&self) -> Option<u64> {
        let newest = self.samples.back()?;

        let mut weighted_sum: u128 = 0;
        let mut total_duration: u128 = 0;
        for (prev, next) in self.samples.iter().zip(self.samples.iter().skip(1)) {
            let duration = next.timestamp.saturating_sub(prev.timestamp) as u128;
            weighted_sum = weighted_sum.saturating_add(prev.price as u128 * duration);
            total_duration += duration;
        }

        if total_duration == 0 {
            return Some(newest.price);
        }
        Some((weighted_sum / total_duration) as u64)
    }

    /// Enough samples spread over enough time
    pub fn is_valid(&self) -> bool {
        self.samples.len() >= self.min_samples && self.span() >= self.min_span_secs
    }

    /// Seconds between the oldest and newest retained samples
    pub fn span(&self) -> u64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(oldest), Some(newest)) => newest.timestamp - oldest.timestamp,
            _ => 0,
        }
    }

    /// Most recent sample
    pub fn newest(&self) -> Option<&PriceSample> {
        self.samples.back()
    }

    /// Retained samples, oldest first
    pub fn samples(&self) -> impl Iterator<Item = &PriceSample> {
        self.samples.iter()
    }

    /// Number of retained samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample was recorded yet
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
