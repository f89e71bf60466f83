//! Core Types
//!
//! Identifiers and the per-call execution context shared by every
//! component of the risk core.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Type alias for addresses (32-byte hash)
pub type Address = [u8; 32];

/// Type alias for asset identifiers
pub type AssetId = [u8; 32];

/// Type alias for vault identifiers
pub type VaultId = [u8; 32];

/// Type alias for price feed handles
pub type FeedId = [u8; 32];

/// Type alias for commit-reveal hashes
pub type CommitHash = [u8; 32];

/// Type alias for redemption request identifiers
pub type RequestId = u64;

/// The all-zero identifier, never a valid caller-supplied address
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Returns true for the all-zero identifier
pub fn is_zero_address(address: &Address) -> bool {
    *address == ZERO_ADDRESS
}

/// Who is calling and where in logical time the call executes
///
/// `block` is the ordering unit used by commit-reveal and role expiry,
/// `timestamp` is seconds and drives TWAP, cooldowns and redemption pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CallContext {
    /// Caller address
    pub caller: Address,
    /// Current block number
    pub block: u64,
    /// Current timestamp (seconds)
    pub timestamp: u64,
}

impl CallContext {
    /// Creates a context for `caller` at the given block and timestamp
    pub fn new(caller: Address, block: u64, timestamp: u64) -> Self {
        Self {
            caller,
            block,
            timestamp,
        }
    }

    /// Same caller and time, different caller
    pub fn with_caller(&self, caller: Address) -> Self {
        Self { caller, ..*self }
    }

    /// Same caller, advanced by `blocks` blocks and `secs` seconds
    pub fn advance(&self, blocks: u64, secs: u64) -> Self {
        Self {
            caller: self.caller,
            block: self.block.saturating_add(blocks),
            timestamp: self.timestamp.saturating_add(secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_address() {
        assert!(is_zero_address(&ZERO_ADDRESS));
        assert!(!is_zero_address(&[1u8; 32]));
    }

    #[test]
    fn test_context_advance() {
        let ctx = CallContext::new([1u8; 32], 100, 1_000);
        let later = ctx.advance(2, 30);
        assert_eq!(later.block, 102);
        assert_eq!(later.timestamp, 1_030);
        assert_eq!(later.caller, ctx.caller);

        let other = ctx.with_caller([2u8; 32]);
        assert_eq!(other.caller, [2u8; 32]);
        assert_eq!(other.block, 100);
    }
}
