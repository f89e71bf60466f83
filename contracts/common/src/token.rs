//! Token Custody Boundary
//!
//! How tokens physically move is outside the risk core. Components only see
//! this trait and roll back their own effects when a transfer fails.

use crate::types::{Address, AssetId};

/// Failure reported by a token custody implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// Source account cannot cover the amount
    #[error("insufficient balance: have {available}, need {requested}")]
    InsufficientBalance { available: u64, requested: u64 },

    /// Custody refused the transfer
    #[error("transfer rejected: {0}")]
    Rejected(String),

    /// Custody is busy with another operation
    #[error("custody unavailable")]
    Unavailable,
}

/// Token movement collaborator
pub trait TokenTransfer {
    /// Move `amount` of `asset` from `owner` to `to`
    fn transfer_from(&mut self, asset: &AssetId, owner: &Address, to: &Address, amount: u64) -> Result<(), TransferError>;

    /// Pay `amount` of `asset` out of custody to `to`
    fn transfer(&mut self, asset: &AssetId, to: &Address, amount: u64) -> Result<(), TransferError>;
}

impl<T: TokenTransfer + ?Sized> TokenTransfer for &mut T {
    fn transfer_from(&mut self, asset: &AssetId, owner: &Address, to: &Address, amount: u64) -> Result<(), TransferError> {
        (**self).transfer_from(asset, owner, to, amount)
    }

    fn transfer(&mut self, asset: &AssetId, to: &Address, amount: u64) -> Result<(), TransferError> {
        (**self).transfer(asset, to, amount)
    }
}
