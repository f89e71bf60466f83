//! Integration Tests
//!
//! End-to-end tests driving the assembled core: oracle rounds feeding the
//! circuit breakers, liquidity snapshots routing redemptions, and
//! commit-reveal guarding them.

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::stress::{StaticFeeds, TokenLedger};
    use crate::*;
    use vaultguard_common::{EventType, RiskError, TransferError};
    use vaultguard_mev_guard::commit_hash;

    fn admin() -> [u8; 32] {
        [1u8; 32]
    }

    fn oracle_manager() -> [u8; 32] {
        [2u8; 32]
    }

    fn liquidity_manager() -> [u8; 32] {
        [3u8; 32]
    }

    fn user() -> [u8; 32] {
        [4u8; 32]
    }

    fn asset() -> [u8; 32] {
        [0xAA; 32]
    }

    fn vault() -> [u8; 32] {
        [0xBB; 32]
    }

    fn feed_a() -> [u8; 32] {
        [0xF1; 32]
    }

    fn feed_b() -> [u8; 32] {
        [0xF2; 32]
    }

    fn ctx(caller: [u8; 32], block: u64, timestamp: u64) -> CallContext {
        CallContext::new(caller, block, timestamp)
    }

    fn setup_with(config: RiskConfig) -> RiskCore {
        let mut core = RiskCore::new(admin(), 1, config).unwrap();
        let admin_ctx = ctx(admin(), 1, 1_000);
        core.grant_role(&admin_ctx, oracle_manager(), Role::OracleManager).unwrap();
        core.grant_role(&admin_ctx, liquidity_manager(), Role::LiquidityManager).unwrap();
        core
    }

    fn setup() -> RiskCore {
        setup_with(RiskConfig::default())
    }

    /// Core with a single full-weight source and a 20% breaker
    fn setup_single_source(feeds: &mut StaticFeeds) -> RiskCore {
        let mut core = setup();
        let admin_ctx = ctx(admin(), 1, 1_000);
        core.add_source(&admin_ctx, asset(), feed_a(), 10_000, 3, "primary").unwrap();
        core.configure_circuit_breaker(&admin_ctx, asset(), 2_000, 3_600).unwrap();

        feeds.set_price(feed_a(), 100);
        core.update_price(&ctx(oracle_manager(), 2, 1_000), asset(), &*feeds).unwrap();
        core
    }

    fn set_vault(core: &mut RiskCore, total: u64, liquid: u64, timestamp: u64) {
        core.update_liquidity(&ctx(liquidity_manager(), 2, timestamp), vault(), total, liquid, total - liquid)
            .unwrap();
    }

    fn funded_ledger(core: &RiskCore, amount: u64) -> TokenLedger {
        let mut ledger = TokenLedger::new(vault());
        ledger.mint(core.config().liquidity.redemption_asset, vault(), amount);
        ledger
    }

    // ============================================================================
    // Oracle + Circuit Breaker Integration Tests
    // ============================================================================

    #[test]
    fn test_weighted_price_and_degradation() {
        let mut core = setup();
        let admin_ctx = ctx(admin(), 1, 1_000);
        core.add_source(&admin_ctx, asset(), feed_a(), 5_000, 3, "a").unwrap();
        core.add_source(&admin_ctx, asset(), feed_b(), 5_000, 3, "b").unwrap();

        let mut feeds = StaticFeeds::new();
        feeds.set_price(feed_a(), 100);
        feeds.set_price(feed_b(), 102);

        let full = core.update_price(&ctx(oracle_manager(), 2, 1_000), asset(), &feeds).unwrap();
        assert_eq!(full.price, 101);
        assert_eq!(full.confidence_bps, 10_000);
        assert_eq!(full.sources_used, 2);

        // One source down
        feeds.fail(feed_a());
        let degraded = core.update_price(&ctx(oracle_manager(), 3, 1_060), asset(), &feeds).unwrap();
        assert_eq!(degraded.price, 102);
        assert_eq!(degraded.confidence_bps, 5_000);
        assert_eq!(core.total_failures(), 1);

        // Both down: nothing is committed
        feeds.fail(feed_b());
        let result = core.update_price(&ctx(oracle_manager(), 4, 1_120), asset(), &feeds);
        assert!(matches!(result, Err(RiskError::NoValidSources { .. })));
        assert_eq!(core.get_price(&asset()).unwrap().price, 102);
        assert_eq!(core.total_failures(), 1);
    }

    #[test]
    fn test_price_drop_trips_breaker() {
        let mut feeds = StaticFeeds::new();
        let mut core = setup_single_source(&mut feeds);

        feeds.set_price(feed_a(), 75);
        let price = core.update_price(&ctx(oracle_manager(), 3, 1_060), asset(), &feeds).unwrap();
        assert_eq!(price.price, 75);

        assert!(core.is_paused());
        let breaker = core.circuit_breaker(&asset()).unwrap();
        assert!(breaker.is_tripped);
        assert_eq!(breaker.last_triggered_at, 1_060);
        assert_eq!(core.events().count(EventType::CircuitBreakerTriggered), 1);
        assert_eq!(core.events().count(EventType::SystemPaused), 1);

        // Further rounds are refused while paused
        let result = core.update_price(&ctx(oracle_manager(), 4, 1_120), asset(), &feeds);
        assert!(matches!(result, Err(RiskError::Paused)));
    }

    #[test]
    fn test_moderate_drop_does_not_trip() {
        let mut feeds = StaticFeeds::new();
        let mut core = setup_single_source(&mut feeds);

        feeds.set_price(feed_a(), 85);
        core.update_price(&ctx(oracle_manager(), 3, 1_060), asset(), &feeds).unwrap();

        assert!(!core.is_paused());
        assert!(!core.circuit_breaker(&asset()).unwrap().is_tripped);
    }

    #[test]
    fn test_breaker_reset_after_cooldown() {
        let mut feeds = StaticFeeds::new();
        let mut core = setup_single_source(&mut feeds);

        feeds.set_price(feed_a(), 75);
        core.update_price(&ctx(oracle_manager(), 3, 1_060), asset(), &feeds).unwrap();

        let early = core.reset_circuit_breaker(&ctx(admin(), 4, 4_659), asset());
        assert!(matches!(early, Err(RiskError::CooldownNotFinished { ready_at: 4_660 })));
        assert!(core.is_paused());

        let not_admin = core.reset_circuit_breaker(&ctx(oracle_manager(), 4, 4_660), asset());
        assert!(matches!(not_admin, Err(RiskError::AccessDenied { .. })));

        core.reset_circuit_breaker(&ctx(admin(), 4, 4_660), asset()).unwrap();
        assert!(!core.is_paused());
        assert!(!core.circuit_breaker(&asset()).unwrap().is_tripped);

        // Rounds resume
        core.update_price(&ctx(oracle_manager(), 5, 4_700), asset(), &feeds).unwrap();
    }

    #[test]
    fn test_manual_pause_survives_breaker_reset() {
        let mut feeds = StaticFeeds::new();
        let mut core = setup_single_source(&mut feeds);

        feeds.set_price(feed_a(), 75);
        core.update_price(&ctx(oracle_manager(), 3, 1_060), asset(), &feeds).unwrap();
        core.emergency_pause(&ctx(admin(), 3, 1_070)).unwrap();

        core.reset_circuit_breaker(&ctx(admin(), 4, 4_660), asset()).unwrap();
        assert!(core.is_paused());

        core.emergency_unpause(&ctx(admin(), 5, 4_700)).unwrap();
        assert!(!core.is_paused());
    }

    #[test]
    fn test_explicit_breaker_check() {
        let mut feeds = StaticFeeds::new();
        let mut core = setup_single_source(&mut feeds);

        let ok = core
            .check_circuit_breaker(&ctx(oracle_manager(), 3, 1_060), asset(), 85, 100)
            .unwrap();
        assert!(!ok);

        let denied = core.check_circuit_breaker(&ctx(user(), 3, 1_060), asset(), 75, 100);
        assert!(matches!(denied, Err(RiskError::AccessDenied { .. })));

        let tripped = core
            .check_circuit_breaker(&ctx(admin(), 3, 1_060), asset(), 75, 100)
            .unwrap();
        assert!(tripped);
        assert!(core.is_paused());
    }

    // ============================================================================
    // Liquidity Integration Tests
    // ============================================================================

    #[test]
    fn test_bank_run_detection() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 30, 1_000);
        assert_eq!(core.get_vault_status(&vault()).unwrap(), (300, false, true));
        assert_eq!(core.events().count(EventType::BankRunDetected), 1);
        assert_eq!(core.events().count(EventType::EmergencyActivated), 1);

        let other = [0xBC; 32];
        core.update_liquidity(&ctx(liquidity_manager(), 2, 1_000), other, 1_000, 800, 200)
            .unwrap();
        assert_eq!(core.get_vault_status(&other).unwrap(), (8_000, true, false));
        assert_eq!(core.events().count(EventType::BankRunDetected), 1);
    }

    #[test]
    fn test_immediate_redemption_eligibility() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 400, 1_000);

        assert!(core.can_redeem_immediately(&vault(), 100).allowed);
        // 150 / 750 sits exactly on the healthy ratio
        assert!(core.can_redeem_immediately(&vault(), 250).allowed);
        let eligibility = core.can_redeem_immediately(&vault(), 300);
        assert!(!eligibility.allowed);
        assert_eq!(eligibility.reason, Some(liquidity::DenialReason::WouldBreachHealthyRatio));

        let unknown = core.can_redeem_immediately(&[0xCC; 32], 1);
        assert_eq!(unknown.reason, Some(liquidity::DenialReason::UnknownVault));
    }

    #[test]
    fn test_queue_full() {
        let mut config = RiskConfig::default();
        config.liquidity.max_queue_size = 2;
        let mut core = setup_with(config);
        set_vault(&mut core, 1_000, 30, 1_000);

        let user_ctx = ctx(user(), 3, 1_100);
        assert_eq!(core.queue_gradual_redemption(&user_ctx, vault(), 100, 10, false).unwrap(), 1);
        assert_eq!(core.queue_gradual_redemption(&user_ctx, vault(), 100, 10, true).unwrap(), 2);

        let result = core.queue_gradual_redemption(&user_ctx, vault(), 100, 10, false);
        assert!(matches!(result, Err(RiskError::QueueFull { capacity: 2 })));
        assert_eq!(core.get_active_redemption_count(), 2);
    }

    #[test]
    fn test_queue_releases_bounded_by_day() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 300, 1_000);
        let mut ledger = funded_ledger(&core, 1_000);

        let request_id = core
            .queue_gradual_redemption(&ctx(user(), 3, 1_100), vault(), 250, 100, false)
            .unwrap();

        let summary = core
            .process_redemption_queue(&ctx(liquidity_manager(), 4, 1_200), 10, &mut ledger)
            .unwrap();
        assert_eq!(summary.amount_released, 100);
        assert_eq!(core.redemption_request(request_id).unwrap().remaining_amount, 150);

        // Same day: nothing due
        let again = core
            .process_redemption_queue(&ctx(liquidity_manager(), 5, 1_300), 10, &mut ledger)
            .unwrap();
        assert_eq!(again.visited, 1);
        assert_eq!(again.amount_released, 0);

        let next_day = core
            .process_redemption_queue(&ctx(liquidity_manager(), 6, 1_200 + 86_400), 10, &mut ledger)
            .unwrap();
        assert_eq!(next_day.amount_released, 100);

        let last_day = core
            .process_redemption_queue(&ctx(liquidity_manager(), 7, 1_200 + 2 * 86_400), 10, &mut ledger)
            .unwrap();
        assert_eq!(last_day.amount_released, 50);
        assert_eq!(last_day.completed, 1);
        assert!(core.redemption_request(request_id).is_none());

        let asset = core.config().liquidity.redemption_asset;
        assert_eq!(ledger.balance_of(&asset, &user()), 250);
        assert_eq!(core.vault(&vault()).unwrap().liquid_assets, 50);
    }

    #[test]
    fn test_queue_processing_budget_and_lanes() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 300, 1_000);
        let mut ledger = funded_ledger(&core, 1_000);

        let user_ctx = ctx(user(), 3, 1_100);
        let standard = core.queue_gradual_redemption(&user_ctx, vault(), 50, 10, false).unwrap();
        core.queue_gradual_redemption(&user_ctx, vault(), 50, 10, false).unwrap();
        let emergency = core.queue_gradual_redemption(&user_ctx, vault(), 50, 10, true).unwrap();

        let summary = core
            .process_redemption_queue(&ctx(liquidity_manager(), 4, 1_200), 2, &mut ledger)
            .unwrap();
        assert_eq!(summary.visited, 2);
        assert_eq!(summary.released, 2);

        // Emergency lane first, then the oldest standard request
        assert_eq!(core.redemption_request(emergency).unwrap().remaining_amount, 40);
        assert_eq!(core.redemption_request(standard).unwrap().remaining_amount, 40);
        assert_eq!(core.redemption_request(standard + 1).unwrap().remaining_amount, 50);

        let denied = core.process_redemption_queue(&ctx(user(), 4, 1_200), 2, &mut ledger);
        assert!(matches!(denied, Err(RiskError::AccessDenied { .. })));
    }

    #[test]
    fn test_emergency_liquidity_injection() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 30, 1_000);

        let stable = [0xDD; 32];
        let mut ledger = TokenLedger::new(vault());
        ledger.mint(stable, user(), 500);

        core.inject_emergency_liquidity(&ctx(user(), 3, 1_100), vault(), 200, stable, &mut ledger)
            .unwrap();

        let state = core.vault(&vault()).unwrap();
        assert_eq!(state.liquid_assets, 230);
        assert_eq!(state.total_assets, 1_200);
        assert!(state.emergency_active);
        assert_eq!(ledger.balance_of(&stable, &user()), 300);
        assert_eq!(ledger.balance_of(&stable, &vault()), 200);
        assert_eq!(core.events().count(EventType::EmergencyLiquidityInjected), 1);
    }

    #[test]
    fn test_emergency_deactivation_after_cooldown() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 30, 1_000);

        let stable = [0xDD; 32];
        let mut ledger = TokenLedger::new(vault());
        ledger.mint(stable, user(), 1_000);
        core.inject_emergency_liquidity(&ctx(user(), 3, 1_100), vault(), 970, stable, &mut ledger)
            .unwrap();

        let early = core.deactivate_emergency_protocol(&ctx(liquidity_manager(), 4, 2_000), vault());
        assert!(matches!(early, Err(RiskError::CooldownNotFinished { ready_at: 22_600 })));

        core.deactivate_emergency_protocol(&ctx(liquidity_manager(), 5, 22_600), vault())
            .unwrap();
        let (_, healthy, emergency) = core.get_vault_status(&vault()).unwrap();
        assert!(healthy);
        assert!(!emergency);
    }

    #[test]
    fn test_failed_payout_rolls_back() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 800, 1_000);
        let mut ledger = funded_ledger(&core, 1_000);
        ledger.set_frozen(true);

        let before = core.vault(&vault()).unwrap().clone();
        let result = core.redeem_immediately(&ctx(user(), 3, 1_100), vault(), 100, &mut ledger);
        assert!(matches!(result, Err(RiskError::TransferFailed { amount: 100, .. })));
        assert_eq!(core.vault(&vault()).unwrap(), &before);
        assert_eq!(core.events().count(EventType::ImmediateRedemption), 0);

        ledger.set_frozen(false);
        core.redeem_immediately(&ctx(user(), 4, 1_200), vault(), 100, &mut ledger)
            .unwrap();
        assert_eq!(core.vault(&vault()).unwrap().liquid_assets, 700);
    }

    /// Custody that tries to call back into the core mid-transfer
    struct ReentrantTokens {
        core: Rc<RefCell<RiskCore>>,
        reentry_blocked: bool,
    }

    impl TokenTransfer for ReentrantTokens {
        fn transfer_from(&mut self, _: &AssetId, _: &Address, _: &Address, _: u64) -> Result<(), TransferError> {
            Ok(())
        }

        fn transfer(&mut self, _: &AssetId, _: &Address, _: u64) -> Result<(), TransferError> {
            match self.core.try_borrow_mut() {
                Ok(_) => Ok(()),
                Err(_) => {
                    self.reentry_blocked = true;
                    Err(TransferError::Unavailable)
                }
            }
        }
    }

    #[test]
    fn test_reentrant_custody_is_blocked() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 800, 1_000);
        let core = Rc::new(RefCell::new(core));

        let mut tokens = ReentrantTokens {
            core: Rc::clone(&core),
            reentry_blocked: false,
        };
        let result = core
            .borrow_mut()
            .redeem_immediately(&ctx(user(), 3, 1_100), vault(), 100, &mut tokens);

        assert!(tokens.reentry_blocked);
        assert!(matches!(result, Err(RiskError::TransferFailed { .. })));
        assert_eq!(core.borrow().vault(&vault()).unwrap().liquid_assets, 800);
    }

    // ============================================================================
    // Commit-Reveal Integration Tests
    // ============================================================================

    #[test]
    fn test_commit_reveal_timing() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 800, 1_000);
        let mut ledger = funded_ledger(&core, 1_000);
        let nonce = [7u8; 32];

        core.commit_transaction(&ctx(user(), 10, 1_100), commit_hash(100, &nonce, &user()))
            .unwrap();

        let too_soon = core.commit_transaction(&ctx(user(), 10, 1_100), commit_hash(5, &nonce, &user()));
        assert!(matches!(too_soon, Err(RiskError::TooFrequent { last_block: 10, next_block: 11 })));

        let early = core.reveal_redemption(&ctx(user(), 10, 1_100), vault(), 100, nonce, 10, &mut ledger);
        assert!(matches!(early, Err(RiskError::RevealTooEarly { current_block: 10, earliest_block: 11 })));

        let mismatch = core.reveal_redemption(&ctx(user(), 11, 1_112), vault(), 99, nonce, 10, &mut ledger);
        assert!(matches!(mismatch, Err(RiskError::CommitmentNotFound)));

        let stranger = core.reveal_redemption(&ctx(admin(), 11, 1_112), vault(), 100, nonce, 10, &mut ledger);
        assert!(matches!(stranger, Err(RiskError::CommitmentNotFound)));

        let route = core
            .reveal_redemption(&ctx(user(), 11, 1_112), vault(), 100, nonce, 10, &mut ledger)
            .unwrap();
        assert_eq!(route, RedemptionRoute::Immediate { amount: 100 });

        let twice = core.reveal_redemption(&ctx(user(), 12, 1_124), vault(), 100, nonce, 10, &mut ledger);
        assert!(matches!(twice, Err(RiskError::AlreadyRevealed)));

        let asset = core.config().liquidity.redemption_asset;
        assert_eq!(ledger.balance_of(&asset, &user()), 100);
    }

    #[test]
    fn test_reveal_deadline() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 800, 1_000);
        let mut ledger = funded_ledger(&core, 1_000);
        let nonce = [7u8; 32];
        let hash = commit_hash(100, &nonce, &user());

        core.commit_transaction(&ctx(user(), 100, 1_100), hash).unwrap();
        assert_eq!(core.get_commitment(&hash).unwrap().reveal_deadline_block, 356);

        let late = core.reveal_redemption(&ctx(user(), 357, 5_000), vault(), 100, nonce, 10, &mut ledger);
        assert!(matches!(late, Err(RiskError::RevealDeadlinePassed { deadline_block: 356, .. })));

        let outcome = core.prune_commitments(&ctx(user(), 357, 5_000), None, 10).unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(core.get_commitment(&hash).is_none());
    }

    #[test]
    fn test_reveal_routes_to_queue_during_bank_run() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 30, 1_000);
        let mut ledger = funded_ledger(&core, 1_000);
        let nonce = [9u8; 32];

        core.commit_transaction(&ctx(user(), 10, 1_100), commit_hash(200, &nonce, &user()))
            .unwrap();
        let route = core
            .reveal_redemption(&ctx(user(), 11, 1_112), vault(), 200, nonce, 50, &mut ledger)
            .unwrap();
        assert_eq!(route, RedemptionRoute::Queued { request_id: 1 });

        let request = core.redemption_request(1).unwrap();
        assert_eq!(request.owner, user());
        assert_eq!(request.daily_amount, 50);
        assert!(!request.is_emergency);
        assert_eq!(core.events().count(EventType::TransactionRevealed), 1);
    }

    #[test]
    fn test_failed_reveal_can_be_retried() {
        let mut core = setup();
        set_vault(&mut core, 1_000, 800, 1_000);
        let mut ledger = funded_ledger(&core, 1_000);
        ledger.set_frozen(true);
        let nonce = [9u8; 32];

        core.commit_transaction(&ctx(user(), 10, 1_100), commit_hash(100, &nonce, &user()))
            .unwrap();
        let failed = core.reveal_redemption(&ctx(user(), 11, 1_112), vault(), 100, nonce, 10, &mut ledger);
        assert!(matches!(failed, Err(RiskError::TransferFailed { .. })));

        ledger.set_frozen(false);
        let route = core
            .reveal_redemption(&ctx(user(), 12, 1_124), vault(), 100, nonce, 10, &mut ledger)
            .unwrap();
        assert_eq!(route, RedemptionRoute::Immediate { amount: 100 });
    }

    // ============================================================================
    // Pause + Configuration Integration Tests
    // ============================================================================

    #[test]
    fn test_pause_blocks_every_mutator() {
        let mut feeds = StaticFeeds::new();
        let mut core = setup_single_source(&mut feeds);
        set_vault(&mut core, 1_000, 800, 1_000);
        let mut ledger = funded_ledger(&core, 1_000);
        let nonce = [3u8; 32];
        core.commit_transaction(&ctx(user(), 10, 1_100), commit_hash(100, &nonce, &user()))
            .unwrap();

        core.emergency_pause(&ctx(admin(), 11, 1_200)).unwrap();
        assert!(core.is_paused());

        let admin_ctx = ctx(admin(), 12, 1_300);
        let oracle_ctx = ctx(oracle_manager(), 12, 1_300);
        let liq_ctx = ctx(liquidity_manager(), 12, 1_300);
        let user_ctx = ctx(user(), 12, 1_300);

        let results = [
            core.add_source(&admin_ctx, asset(), feed_b(), 1_000, 3, "late").err(),
            core.set_source_weight(&admin_ctx, asset(), feed_a(), 5_000).err(),
            core.reset_source(&admin_ctx, asset(), feed_a()).err(),
            core.update_price(&oracle_ctx, asset(), &feeds).err(),
            core.configure_circuit_breaker(&admin_ctx, asset(), 1_000, 60).err(),
            core.check_circuit_breaker(&oracle_ctx, asset(), 10, 100).err(),
            core.update_liquidity(&liq_ctx, vault(), 1_000, 500, 500).err(),
            core.redeem_immediately(&user_ctx, vault(), 10, &mut ledger).err(),
            core.queue_gradual_redemption(&user_ctx, vault(), 10, 1, false).err(),
            core.process_redemption_queue(&liq_ctx, 10, &mut ledger).err(),
            core.inject_emergency_liquidity(&user_ctx, vault(), 10, asset(), &mut ledger).err(),
            core.deactivate_emergency_protocol(&liq_ctx, vault()).err(),
            core.commit_transaction(&user_ctx, [5u8; 32]).err(),
            core.reveal_redemption(&user_ctx, vault(), 100, nonce, 10, &mut ledger)
                .err(),
            core.prune_commitments(&user_ctx, None, 10).err(),
        ];
        for result in results {
            assert!(matches!(result, Some(RiskError::Paused)));
        }

        // Role administration and unpause still work
        core.grant_role(&admin_ctx, user(), Role::LiquidityManager).unwrap();
        core.emergency_unpause(&admin_ctx).unwrap();
        core.commit_transaction(&user_ctx, [5u8; 32]).unwrap();
    }

    #[test]
    fn test_temporary_role() {
        let mut feeds = StaticFeeds::new();
        let mut core = setup_single_source(&mut feeds);

        core.grant_role_for(&ctx(admin(), 10, 1_100), user(), Role::OracleManager, 5)
            .unwrap();
        assert!(core.has_role(&user(), Role::OracleManager, 14));
        assert!(!core.has_role(&user(), Role::OracleManager, 15));

        core.update_price(&ctx(user(), 14, 1_200), asset(), &feeds).unwrap();
        let expired = core.update_price(&ctx(user(), 15, 1_300), asset(), &feeds);
        assert!(matches!(expired, Err(RiskError::AccessDenied { .. })));
    }

    #[test]
    fn test_core_from_toml() {
        let config = RiskConfig::from_toml_str(
            r#"
            [liquidity]
            max_queue_size = 1
            critical_ratio_bps = 1000

            [mev]
            min_reveal_delay_blocks = 3
            "#,
        )
        .unwrap();
        let mut core = setup_with(config);

        // 8% is a bank run under the configured threshold
        set_vault(&mut core, 1_000, 80, 1_000);
        assert!(core.get_vault_status(&vault()).unwrap().2);

        let user_ctx = ctx(user(), 3, 1_100);
        core.queue_gradual_redemption(&user_ctx, vault(), 10, 1, false).unwrap();
        let full = core.queue_gradual_redemption(&user_ctx, vault(), 10, 1, false);
        assert!(matches!(full, Err(RiskError::QueueFull { capacity: 1 })));

        let mut ledger = funded_ledger(&core, 1_000);
        let nonce = [1u8; 32];
        core.commit_transaction(&ctx(user(), 10, 1_100), commit_hash(5, &nonce, &user()))
            .unwrap();
        let early = core.reveal_redemption(&ctx(user(), 12, 1_124), vault(), 5, nonce, 1, &mut ledger);
        assert!(matches!(early, Err(RiskError::RevealTooEarly { earliest_block: 13, .. })));
    }

    #[test]
    fn test_confidence_with_failed_middle_source() {
        let mut core = setup();
        let admin_ctx = ctx(admin(), 1, 1_000);
        core.add_source(&admin_ctx, asset(), feed_a(), 3_000, 3, "a").unwrap();
        core.add_source(&admin_ctx, asset(), feed_b(), 1_000, 3, "b").unwrap();
        core.add_source(&admin_ctx, asset(), [0xF3; 32], 2_000, 3, "c").unwrap();

        let mut feeds = StaticFeeds::new();
        feeds.set_price(feed_a(), 100);
        feeds.set_price(feed_b(), 100);
        feeds.fail([0xF3; 32]);

        let price = core.update_price(&ctx(oracle_manager(), 2, 1_000), asset(), &feeds).unwrap();
        assert_eq!(price.confidence_bps, 6_666);
        assert_eq!(core.total_failures(), 1);
        assert_eq!(core.failed_rounds(), 0);

        feeds.fail(feed_a());
        feeds.fail(feed_b());
        let none = core.update_price(&ctx(oracle_manager(), 3, 1_060), asset(), &feeds);
        assert!(matches!(none, Err(RiskError::NoValidSources { .. })));
        assert_eq!(core.failed_rounds(), 1);
        assert_eq!(core.total_failures(), 1);
        assert_eq!(core.get_price(&asset()).unwrap(), price);
    }

    #[test]
    fn test_zero_duration_grant_rejected() {
        let mut core = RiskCore::new(admin(), 0, RiskConfig::default()).unwrap();
        let result = core.grant_role_for(&ctx(admin(), 0, 0), user(), Role::OracleManager, 0);
        assert!(matches!(result, Err(RiskError::InvalidInput { param: "duration", .. })));
        assert!(!core.has_role(&user(), Role::OracleManager, 0));
        assert!(!core.has_role(&user(), Role::OracleManager, 1_000_000));
    }

    // ============================================================================
    // Exposure Tests
    // ============================================================================

    #[test]
    fn test_exposure_defaults() {
        let core = setup();
        assert_eq!(core.check_exposure(&[10_000, 5_000], 10_000).unwrap(), 15_000);

        let lopsided = core.check_exposure(&[20_000, 1_000], 10_000);
        assert!(matches!(lopsided, Err(RiskError::AssetCapExceeded { index: 0, .. })));

        let levered = core.check_exposure(&[15_000, 15_000, 1_000], 10_000);
        assert!(matches!(levered, Err(RiskError::LeverageExceeded { .. })));

        assert_eq!(core.check_slippage(50).unwrap(), 50);
        assert!(matches!(core.check_slippage(51), Err(RiskError::SlippageExceeded { .. })));
    }

    #[test]
    fn test_exposure_from_toml() {
        let config = RiskConfig::from_toml_str(
            r#"
            [exposure]
            max_leverage_bps = 20_000
            max_asset_share_bps = 10_000
            max_slippage_bps = 10
            "#,
        )
        .unwrap();
        let core = setup_with(config);

        assert!(core.check_exposure(&[10_000, 10_000], 10_000).is_ok());
        assert!(matches!(
            core.check_exposure(&[9_000, 10_001], 10_000),
            Err(RiskError::AssetCapExceeded { index: 1, .. })
        ));
        assert!(core.check_slippage(11).is_err());
        assert!(matches!(
            core.check_exposure(&[1], 0),
            Err(RiskError::InvalidInput { param: "nav", .. })
        ));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let bad = RiskConfig::from_toml_str("[liquidity]\nhealthy_ratio_bps = 100\ncritical_ratio_bps = 500");
        assert!(bad.is_err());

        let malformed = RiskConfig::from_toml_str("[mev");
        assert!(matches!(malformed, Err(RiskError::ConfigParse(_))));
    }
}
