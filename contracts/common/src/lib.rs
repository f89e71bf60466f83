//! VaultGuard Common Library
//!
//! Shared types, constants, and utilities for all VaultGuard risk components.
//!
//! ## Contents
//!
//! - **Shared State**: [`SystemState`] carries access control, the global
//!   pause flag and the event log into every mutator
//! - **Access Control**: Role-based permissions with optional expiry
//! - **Emergency Module**: Global pause and per-asset circuit breakers
//! - **Exposure Guards**: leverage, per-asset and slippage caps
//! - **Configuration**: TOML-loadable [`RiskConfig`]
//! - **Exposure Guards**: leverage, per-asset and slippage caps
//! - **Boundaries**: [`PriceFeeds`] and [`TokenTransfer`] collaborator traits
//!
//! Every public operation in the workspace follows the same order: pause
//! check, role check, input validation, state changes, external calls
//! (rolled back on failure), then events.

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;
pub mod access_control;
pub mod emergency;
pub mod system;
pub mod validation;
pub mod config;
pub mod exposure;
pub mod feeds;
pub mod token;

// Re-exports for convenience
pub use errors::*;
pub use types::*;
pub use events::*;
pub use access_control::{AccessControlState, Role, RoleAssignment};
pub use emergency::*;
pub use system::SystemState;
pub use config::*;
pub use feeds::{FeedError, PriceFeeds};
pub use token::{TokenTransfer, TransferError};
