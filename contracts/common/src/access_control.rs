//! Access Control Module
//!
//! Role-based access control for the risk core. Every mutator calls
//! [`require_role`] (or [`require_any_role`]) before touching state; there
//! is no implicit inherited guard.
//!
//! ## Roles
//!
//! - **Admin**: configures sources and breakers, manual pause, role grants
//! - **OracleManager**: pushes price updates
//! - **LiquidityManager**: pushes vault liquidity snapshots, drains the queue

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{RiskError, RiskResult};
use crate::types::{is_zero_address, Address};

// ============================================================================
// Types
// ============================================================================

/// Risk core roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum Role {
    /// Configuration and emergency override
    Admin,
    /// Oracle price writer
    OracleManager,
    /// Vault liquidity writer
    LiquidityManager,
}

/// Role assignment for an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Address with the role
    pub address: Address,
    /// Assigned role
    pub role: Role,
    /// Block when role was granted
    pub granted_at: u64,
    /// Block when role expires (0 = never)
    pub expires_at: u64,
    /// Address that granted the role
    pub granted_by: Address,
    /// Whether assignment is active
    pub is_active: bool,
}

impl RoleAssignment {
    /// Create new role assignment
    pub fn new(address: Address, role: Role, granted_by: Address, block: u64) -> Self {
        Self {
            address,
            role,
            granted_at: block,
            expires_at: 0,
            granted_by,
            is_active: true,
        }
    }

    /// Check if role is valid at given block
    pub fn is_valid(&self, current_block: u64) -> bool {
        self.is_active && (self.expires_at == 0 || current_block < self.expires_at)
    }
}

/// Access control state
#[derive(Debug, Clone)]
pub struct AccessControlState {
    /// Bootstrap admin, whose Admin role cannot be revoked
    pub root_admin: Address,
    /// Role assignments
    pub roles: Vec<RoleAssignment>,
    /// Last update block
    pub last_update_block: u64,
}

impl AccessControlState {
    /// Create new access control state with a root admin
    pub fn new(root_admin: Address, block: u64) -> Self {
        Self {
            root_admin,
            roles: vec![RoleAssignment::new(root_admin, Role::Admin, root_admin, block)],
            last_update_block: block,
        }
    }
}

// ============================================================================
// Core Access Control Functions
// ============================================================================

/// Check if address has a specific role
pub fn has_role(state: &AccessControlState, address: &Address, role: Role, current_block: u64) -> bool {
    state
        .roles
        .iter()
        .any(|r| r.address == *address && r.role == role && r.is_valid(current_block))
}

/// Fail with `AccessDenied` unless the address holds `role`
pub fn require_role(
    state: &AccessControlState,
    address: &Address,
    role: Role,
    current_block: u64,
) -> RiskResult<()> {
    if !has_role(state, address, role, current_block) {
        return Err(RiskError::AccessDenied { role });
    }
    Ok(())
}

/// Fail with `AccessDenied` unless the address holds one of `roles`
///
/// The error names the first role in the list.
pub fn require_any_role(
    state: &AccessControlState,
    address: &Address,
    roles: &[Role],
    current_block: u64,
) -> RiskResult<()> {
    if roles.iter().any(|role| has_role(state, address, *role, current_block)) {
        return Ok(());
    }
    Err(RiskError::AccessDenied {
        role: roles.first().copied().unwrap_or(Role::Admin),
    })
}

/// Grant a role to an address, optionally expiring after `duration` blocks
pub fn grant_role(
    state: &mut AccessControlState,
    granter: Address,
    grantee: Address,
    role: Role,
    duration: Option<u64>,
    current_block: u64,
) -> RiskResult<bool> {
    require_role(state, &granter, Role::Admin, current_block)?;

    if is_zero_address(&grantee) {
        return Err(RiskError::InvalidAddress {
            reason: "cannot grant a role to the zero address",
        });
    }

    // An expiry of zero reads as "never", so an empty window is refused
    if duration == Some(0) {
        return Err(RiskError::InvalidInput {
            param: "duration",
            reason: "must be at least one block",
        });
    }

    if has_role(state, &grantee, role, current_block) {
        return Ok(false);
    }

    let mut assignment = RoleAssignment::new(grantee, role, granter, current_block);
    if let Some(blocks) = duration {
        assignment.expires_at = current_block.saturating_add(blocks);
    }
    state.roles.push(assignment);
    state.last_update_block = current_block;

    info!(role = ?role, block = current_block, "role granted");
    Ok(true)
}

/// Revoke a role from an address
pub fn revoke_role(
    state: &mut AccessControlState,
    revoker: Address,
    target: Address,
    role: Role,
    current_block: u64,
) -> RiskResult<bool> {
    if target == state.root_admin && role == Role::Admin {
        return Err(RiskError::InvalidStateTransition);
    }

    require_role(state, &revoker, Role::Admin, current_block)?;

    let mut revoked = false;
    for r in &mut state.roles {
        if r.address == target && r.role == role && r.is_valid(current_block) {
            r.is_active = false;
            revoked = true;
        }
    }

    if revoked {
        state.last_update_block = current_block;
        info!(role = ?role, block = current_block, "role revoked");
    }
    Ok(revoked)
}

/// Get all roles for an address
pub fn get_roles(state: &AccessControlState, address: &Address, current_block: u64) -> Vec<Role> {
    state
        .roles
        .iter()
        .filter(|r| r.address == *address && r.is_valid(current_block))
        .map(|r| r.role)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
