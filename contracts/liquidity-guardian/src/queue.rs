//! Gradual redemption queue.
//!
//! Two FIFO lanes sharing one capacity. The emergency lane is always served
//! before the standard lane.

use std::collections::VecDeque;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use vaultguard_common::{Address, RequestId, RiskError, RiskResult, VaultId};

/// Queue lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum Lane {
    /// Served first
    Emergency,
    /// Served once the emergency lane had its turn
    Standard,
}

impl Lane {
    /// Lanes in service order
    pub const SERVICE_ORDER: [Lane; 2] = [Lane::Emergency, Lane::Standard];

    /// Lane for a request flag
    pub fn for_request(is_emergency: bool) -> Self {
        if is_emergency {
            Lane::Emergency
        } else {
            Lane::Standard
        }
    }
}

/// A redemption paid out in daily slices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RedemptionRequest {
    /// Request identifier, increasing from 1
    pub id: RequestId,
    /// Recipient of every release
    pub owner: Address,
    /// Vault being redeemed from
    pub vault_id: VaultId,
    /// Amount requested in total
    pub total_amount: u64,
    /// Upper bound of a single release
    pub daily_amount: u64,
    /// Amount still owed
    pub remaining_amount: u64,
    /// Emergency lane request
    pub is_emergency: bool,
    /// Timestamp of queueing
    pub queued_at: u64,
    /// Timestamp of the latest release
    pub last_processed_at: Option<u64>,
}

impl RedemptionRequest {
    /// Whether a release is allowed at `now`
    ///
    /// The first release is due immediately.
    pub fn is_due(&self, now: u64, interval_secs: u64) -> bool {
        match self.last_processed_at {
            None => true,
            Some(last) => now >= last.saturating_add(interval_secs),
        }
    }

    /// Size of the next release given the vault's liquid assets
    pub fn next_release(&self, liquid_assets: u64) -> u64 {
        self.daily_amount.min(self.remaining_amount).min(liquid_assets)
    }

    /// Whether everything was paid out
    pub fn is_complete(&self) -> bool {
        self.remaining_amount == 0
    }

    /// Lane the request lives in
    pub fn lane(&self) -> Lane {
        Lane::for_request(self.is_emergency)
    }
}

/// Bounded two-lane queue
#[derive(Debug, Clone)]
pub struct RedemptionQueue {
    emergency: VecDeque<RedemptionRequest>,
    standard: VecDeque<RedemptionRequest>,
    capacity: usize,
    next_id: RequestId,
}

impl RedemptionQueue {
    /// Empty queue holding at most `capacity` requests
    pub fn new(capacity: usize) -> Self {
        Self {
            emergency: VecDeque::new(),
            standard: VecDeque::new(),
            capacity,
            next_id: 1,
        }
    }

    /// Fail with `QueueFull` at capacity
    pub fn ensure_capacity(&self) -> RiskResult<()> {
        if self.is_full() {
            return Err(RiskError::QueueFull {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Append a new request to its lane and return its id
    pub fn push(
        &mut self,
        owner: Address,
        vault_id: VaultId,
        total_amount: u64,
        daily_amount: u64,
        is_emergency: bool,
        now: u64,
    ) -> RiskResult<RequestId> {
        self.ensure_capacity()?;

        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).ok_or(RiskError::Overflow)?;

        let request = RedemptionRequest {
            id,
            owner,
            vault_id,
            total_amount,
            daily_amount,
            remaining_amount: total_amount,
            is_emergency,
            queued_at: now,
            last_processed_at: None,
        };
        self.lane_mut(request.lane()).push_back(request);
        Ok(id)
    }

    /// Take the oldest request of a lane
    pub fn pop_front(&mut self, lane: Lane) -> Option<RedemptionRequest> {
        self.lane_mut(lane).pop_front()
    }

    /// Rotate a request to the back of its lane
    pub fn push_back(&mut self, request: RedemptionRequest) {
        self.lane_mut(request.lane()).push_back(request);
    }

    /// Put a request back at the head of its lane
    pub fn push_front(&mut self, request: RedemptionRequest) {
        self.lane_mut(request.lane()).push_front(request);
    }

    /// Look up a queued request
    pub fn get(&self, id: RequestId) -> Option<&RedemptionRequest> {
        self.iter().find(|r| r.id == id)
    }

    /// All queued requests in service order
    pub fn iter(&self) -> impl Iterator<Item = &RedemptionRequest> {
        self.emergency.iter().chain(self.standard.iter())
    }

    /// Requests waiting in a lane
    pub fn lane_len(&self, lane: Lane) -> usize {
        match lane {
            Lane::Emergency => self.emergency.len(),
            Lane::Standard => self.standard.len(),
        }
    }

    /// Requests waiting in both lanes
    pub fn len(&self) -> usize {
        self.emergency.len() + self.standard.len()
    }

    /// Whether both lanes are empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether no further request fits
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Maximum number of queued requests
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lane_mut(&mut self, lane: Lane) -> &mut VecDeque<RedemptionRequest> {
        match lane {
            Lane::Emergency => &mut self.emergency,
            Lane::Standard => &mut self.standard,
        }
    }
}
