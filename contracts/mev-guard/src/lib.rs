//! VaultGuard MEV Guard
//!
//! Commit-reveal protection against front-running. A caller first commits
//! to `SHA-256(amount || nonce || committer)`, then reveals the preimage
//! inside the reveal window to run the protected action exactly once.
//!
//! ## Reveal Window
//!
//! ```text
//! commit_block + min_delay <= reveal block <= commit_block + max_delay
//! ```
//!
//! All delays are counted in blocks and `min_delay >= 1`, so a commitment
//! can never be revealed in the block it was made.

use std::collections::BTreeMap;
use std::ops::Bound;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use vaultguard_common::{
    Address, CallContext, CommitHash, MevParams, RiskError, RiskEvent, RiskResult, SystemState,
};

// ============ Hashing ============

/// Commitment hash over `amount (u64 LE) || nonce || committer`
pub fn commit_hash(amount: u64, nonce: &[u8; 32], committer: &Address) -> CommitHash {
    let mut hasher = Sha256::new();
    hasher.update(amount.to_le_bytes());
    hasher.update(nonce);
    hasher.update(committer);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

// ============ Types ============

/// A recorded commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Commitment {
    /// Address that committed and must reveal
    pub committer: Address,
    /// Committed hash
    pub commit_hash: CommitHash,
    /// Block of the commit
    pub commit_block: u64,
    /// Last block at which a reveal is accepted
    pub reveal_deadline_block: u64,
    /// Preimage was revealed
    pub is_revealed: bool,
    /// Protected action ran
    pub is_executed: bool,
}

impl Commitment {
    /// First block at which a reveal is accepted
    pub fn earliest_reveal_block(&self, min_delay_blocks: u64) -> u64 {
        self.commit_block.saturating_add(min_delay_blocks)
    }

    /// Reveal window has closed
    pub fn is_expired(&self, current_block: u64) -> bool {
        current_block > self.reveal_deadline_block
    }
}

/// Result of a bounded prune pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Commitments removed
    pub removed: usize,
    /// Pass `after` to continue; `None` once the end was reached
    pub next_cursor: Option<CommitHash>,
}

// ============ Guard ============

/// Commit-reveal registry
#[derive(Debug, Clone)]
pub struct MevGuard {
    params: MevParams,
    commitments: BTreeMap<CommitHash, Commitment>,
    last_commit_block: BTreeMap<Address, u64>,
}

impl MevGuard {
    /// Create a guard with validated parameters
    pub fn new(params: MevParams) -> RiskResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            commitments: BTreeMap::new(),
            last_commit_block: BTreeMap::new(),
        })
    }

    /// Record a commitment for the caller
    pub fn commit_transaction(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        commit_hash: CommitHash,
    ) -> RiskResult<()> {
        system.ensure_not_paused()?;

        if commit_hash == [0u8; 32] {
            return Err(RiskError::InvalidInput {
                param: "commit_hash",
                reason: "cannot be zero",
            });
        }
        if self.commitments.contains_key(&commit_hash) {
            return Err(RiskError::CommitmentExists { commit_hash });
        }
        if let Some(&last_block) = self.last_commit_block.get(&ctx.caller) {
            let next_block = last_block.saturating_add(self.params.min_commit_interval_blocks);
            if ctx.block < next_block {
                return Err(RiskError::TooFrequent { last_block, next_block });
            }
        }

        let reveal_deadline_block = ctx.block.saturating_add(self.params.max_reveal_delay_blocks);
        self.commitments.insert(
            commit_hash,
            Commitment {
                committer: ctx.caller,
                commit_hash,
                commit_block: ctx.block,
                reveal_deadline_block,
                is_revealed: false,
                is_executed: false,
            },
        );
        self.last_commit_block.insert(ctx.caller, ctx.block);

        system.emit(RiskEvent::TransactionCommitted {
            committer: ctx.caller,
            commit_hash,
            reveal_deadline_block,
            block_height: ctx.block,
        });
        debug!(block = ctx.block, reveal_deadline_block, "transaction committed");
        Ok(())
    }

    /// Reveal `(amount, nonce)` and run `action` exactly once
    ///
    /// If `action` fails the commitment is restored so it can be revealed
    /// again inside the window.
    pub fn reveal_and_execute<R, F>(
        &mut self,
        system: &mut SystemState,
        ctx: &CallContext,
        amount: u64,
        nonce: [u8; 32],
        action: F,
    ) -> RiskResult<R>
    where
        F: FnOnce(&mut SystemState, u64) -> RiskResult<R>,
    {
        system.ensure_not_paused()?;

        let hash = commit_hash(amount, &nonce, &ctx.caller);
        let commitment = self.commitments.get(&hash).ok_or(RiskError::CommitmentNotFound)?;

        if commitment.is_executed {
            return Err(RiskError::AlreadyRevealed);
        }
        let earliest_block = commitment.earliest_reveal_block(self.params.min_reveal_delay_blocks);
        if ctx.block < earliest_block {
            return Err(RiskError::RevealTooEarly {
                current_block: ctx.block,
                earliest_block,
            });
        }
        if commitment.is_expired(ctx.block) {
            return Err(RiskError::RevealDeadlinePassed {
                current_block: ctx.block,
                deadline_block: commitment.reveal_deadline_block,
            });
        }

        self.set_executed(&hash, true);
        let output = match action(system, amount) {
            Ok(output) => output,
            Err(e) => {
                self.set_executed(&hash, false);
                return Err(e);
            }
        };

        system.emit(RiskEvent::TransactionRevealed {
            committer: ctx.caller,
            commit_hash: hash,
            amount,
            block_height: ctx.block,
        });
        info!(block = ctx.block, amount, "commitment revealed and executed");
        Ok(output)
    }

    fn set_executed(&mut self, hash: &CommitHash, executed: bool) {
        if let Some(commitment) = self.commitments.get_mut(hash) {
            commitment.is_revealed = executed;
            commitment.is_executed = executed;
        }
    }

    /// Remove lapsed or executed commitments, visiting at most `max`
    /// entries after `after`
    ///
    /// The same pass forgets committers whose rate-limit interval has
    /// elapsed. `max == 0` does nothing and hands `after` back as the cursor.
    pub fn prune_expired(
        &mut self,
        system: &SystemState,
        ctx: &CallContext,
        after: Option<CommitHash>,
        max: usize,
    ) -> RiskResult<PruneOutcome> {
        system.ensure_not_paused()?;

        if max == 0 {
            return Ok(PruneOutcome {
                removed: 0,
                next_cursor: after,
            });
        }

        let lower = match after {
            Some(hash) => Bound::Excluded(hash),
            None => Bound::Unbounded,
        };

        let mut visited = 0;
        let mut last_visited = None;
        let mut dead = Vec::new();
        for (hash, commitment) in self.commitments.range((lower, Bound::Unbounded)).take(max) {
            visited += 1;
            last_visited = Some(*hash);
            if commitment.is_executed || commitment.is_expired(ctx.block) {
                dead.push(*hash);
            }
        }

        for hash in &dead {
            self.commitments.remove(hash);
        }

        let interval = self.params.min_commit_interval_blocks;
        let committers_before = self.last_commit_block.len();
        self.last_commit_block
            .retain(|_, last| last.saturating_add(interval) > ctx.block);
        let committers_forgotten = committers_before - self.last_commit_block.len();

        let reached_end = visited < max
            || last_visited.map_or(true, |last| {
                self.commitments
                    .range((Bound::Excluded(last), Bound::Unbounded))
                    .next()
                    .is_none()
            });

        debug!(visited, removed = dead.len(), committers_forgotten, "commitments pruned");
        Ok(PruneOutcome {
            removed: dead.len(),
            next_cursor: if reached_end { None } else { last_visited },
        })
    }

    // ============ Queries ============

    /// Commitment by hash
    pub fn get_commitment(&self, hash: &CommitHash) -> Option<&Commitment> {
        self.commitments.get(hash)
    }

    /// Number of stored commitments
    pub fn commitment_count(&self) -> usize {
        self.commitments.len()
    }

    /// Committers still inside their rate-limit interval
    pub fn tracked_committers(&self) -> usize {
        self.last_commit_block.len()
    }

    /// Active parameters
    pub fn params(&self) -> &MevParams {
        &self.params
    }
}

// ============ Tests ============
