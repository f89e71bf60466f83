//! Shared System State
//!
//! Access control, the global pause flag and the event log, owned by the
//! caller and lent mutably to every component operation.

use crate::access_control::{self, AccessControlState, Role};
use crate::emergency::PauseState;
use crate::errors::{RiskError, RiskResult};
use crate::events::{EventLog, RiskEvent};
use crate::types::{Address, CallContext};

/// State shared by the oracle, breakers, MEV guard and liquidity guardian
#[derive(Debug, Clone)]
pub struct SystemState {
    /// Role assignments
    pub access: AccessControlState,
    /// Global pause flag
    pub pause: PauseState,
    /// Append-only event log
    pub events: EventLog,
}

impl SystemState {
    /// Bootstrap with `admin` holding the root Admin role
    pub fn new(admin: Address, block: u64) -> Self {
        Self {
            access: AccessControlState::new(admin, block),
            pause: PauseState::default(),
            events: EventLog::new(),
        }
    }

    /// Whether the global pause flag is set
    pub fn is_paused(&self) -> bool {
        self.pause.paused
    }

    /// Fail with `Paused` while the global flag is set
    pub fn ensure_not_paused(&self) -> RiskResult<()> {
        if self.pause.paused {
            return Err(RiskError::Paused);
        }
        Ok(())
    }

    /// Whether the caller holds `role` at the context block
    pub fn has_role(&self, account: &Address, role: Role, block: u64) -> bool {
        access_control::has_role(&self.access, account, role, block)
    }

    /// Fail unless the caller holds `role`
    pub fn require_role(&self, ctx: &CallContext, role: Role) -> RiskResult<()> {
        access_control::require_role(&self.access, &ctx.caller, role, ctx.block)
    }

    /// Fail unless the caller holds one of `roles`
    pub fn require_any_role(&self, ctx: &CallContext, roles: &[Role]) -> RiskResult<()> {
        access_control::require_any_role(&self.access, &ctx.caller, roles, ctx.block)
    }

    /// Admin-only permanent grant
    pub fn grant_role(&mut self, ctx: &CallContext, account: Address, role: Role) -> RiskResult<bool> {
        self.grant_role_for(ctx, account, role, None)
    }

    /// Admin-only grant, expiring after `duration` blocks when given
    ///
    /// Not subject to the pause flag so roles can be repaired mid-incident.
    pub fn grant_role_for(
        &mut self,
        ctx: &CallContext,
        account: Address,
        role: Role,
        duration: Option<u64>,
    ) -> RiskResult<bool> {
        let granted = access_control::grant_role(&mut self.access, ctx.caller, account, role, duration, ctx.block)?;
        if granted {
            self.events.emit(RiskEvent::RoleGranted {
                account,
                role,
                by: ctx.caller,
                block_height: ctx.block,
            });
        }
        Ok(granted)
    }

    /// Admin-only revoke
    pub fn revoke_role(&mut self, ctx: &CallContext, account: Address, role: Role) -> RiskResult<bool> {
        let revoked = access_control::revoke_role(&mut self.access, ctx.caller, account, role, ctx.block)?;
        if revoked {
            self.events.emit(RiskEvent::RoleRevoked {
                account,
                role,
                by: ctx.caller,
                block_height: ctx.block,
            });
        }
        Ok(revoked)
    }

    /// Append an event to the shared log
    pub fn emit(&mut self, event: RiskEvent) {
        self.events.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;

    fn admin() -> [u8; 32] {
        [1u8; 32]
    }

    #[test]
    fn test_grant_emits_event() {
        let mut system = SystemState::new(admin(), 10);
        let ctx = CallContext::new(admin(), 10, 0);

        assert!(system.grant_role(&ctx, [2u8; 32], Role::OracleManager).unwrap());
        assert!(!system.grant_role(&ctx, [2u8; 32], Role::OracleManager).unwrap());
        assert_eq!(system.events.count(EventType::RoleGranted), 1);

        assert!(system.revoke_role(&ctx, [2u8; 32], Role::OracleManager).unwrap());
        assert_eq!(system.events.count(EventType::RoleRevoked), 1);
    }

    #[test]
    fn test_timed_grant() {
        let mut system = SystemState::new(admin(), 10);
        let ctx = CallContext::new(admin(), 10, 0);

        system.grant_role_for(&ctx, [2u8; 32], Role::LiquidityManager, Some(5)).unwrap();

        let manager = ctx.with_caller([2u8; 32]);
        assert!(system.require_role(&manager, Role::LiquidityManager).is_ok());
        assert!(matches!(
            system.require_role(&manager.advance(5, 0), Role::LiquidityManager),
            Err(RiskError::AccessDenied { .. })
        ));

        let empty = system.grant_role_for(&ctx, [3u8; 32], Role::LiquidityManager, Some(0));
        assert!(matches!(empty, Err(RiskError::InvalidInput { .. })));
        assert_eq!(system.events.count(EventType::RoleGranted), 1);
    }

    #[test]
    fn test_pause_check() {
        let mut system = SystemState::new(admin(), 10);
        assert!(system.ensure_not_paused().is_ok());

        system.pause.paused = true;
        assert!(matches!(system.ensure_not_paused(), Err(RiskError::Paused)));
    }
}
