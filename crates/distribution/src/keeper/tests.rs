use super::*;
use crate::testutil::{acc_addr, cons_addr, val_addr, TestEnv, TEST_DENOM};
use crate::types::{Params, PoolKind};
use crate::{handle_msg, Msg};
use chrono::Duration;
use meridian_types::{Coins, Dec, DecCoins};

fn coins(amount: u128) -> Coins {
    Coins::from_coin(TEST_DENOM, amount)
}

fn dec_coins(amount: &str) -> DecCoins {
    DecCoins::from_dec_coin(TEST_DENOM, amount.parse().unwrap())
}

/// Everything to validators, no proposer bonus.
fn flat_params() -> Params {
    Params {
        validators_pool_tax: Dec::one(),
        liquidity_providers_pool_tax: Dec::zero(),
        public_treasury_pool_tax: Dec::zero(),
        harp_pool_tax: Dec::zero(),
        base_proposer_reward: Dec::zero(),
        bonus_proposer_reward: Dec::zero(),
        ..Params::default()
    }
}

fn env_with(params: Params) -> TestEnv {
    let mut config = DistributionConfig::default();
    config.params = params;
    TestEnv::new(config)
}

/// Mint `amount` into custody and credit it straight to `val`.
fn allocate(env: &TestEnv, ctx: &Context<'_>, val: &ValAddress, amount: u128) {
    let info = env.keeper.require_validator(ctx, val).unwrap();
    env.supply
        .mint_coins(ctx, env.keeper.module_name(), &coins(amount))
        .unwrap();
    env.keeper
        .allocate_tokens_to_validator(
            ctx,
            &info,
            &dec_coins(&amount.to_string()),
            &DecCoins::zero(),
        )
        .unwrap();
}

fn vote(byte: u8, power: u64) -> VoteInfo {
    lp_vote(byte, power, 0)
}

fn lp_vote(byte: u8, power: u64, lp_power: u64) -> VoteInfo {
    VoteInfo {
        validator: cons_addr(byte),
        power,
        lp_power,
    }
}

fn begin_block(env: &TestEnv, ctx: &Context<'_>, proposer: u8, votes: Vec<VoteInfo>, tax: Dec) {
    env.keeper
        .begin_block(
            ctx,
            &BeginBlockRequest {
                proposer: cons_addr(proposer),
                votes,
                dynamic_foundation_tax: tax,
            },
        )
        .unwrap();
}

// -----------------------------------------------------------------------------
// Period ledger
// -----------------------------------------------------------------------------

#[test]
fn test_allocation_splits_commission() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::percent(50))
        .unwrap();
    env.staking.delegate(&ctx, acc_addr(1), val_addr(1), 100).unwrap();

    let ctx = env.ctx(2);
    allocate(&env, &ctx, &val_addr(1), 10);

    assert_eq!(
        env.keeper.get_validator_accumulated_commission(&ctx, &val_addr(1)).unwrap(),
        dec_coins("5")
    );
    let current = env
        .keeper
        .get_validator_current_rewards(&ctx, &val_addr(1))
        .unwrap()
        .unwrap();
    assert_eq!(current.rewards, dec_coins("5"));
    assert_eq!(
        env.keeper.get_validator_outstanding_rewards(&ctx, &val_addr(1)).unwrap(),
        dec_coins("10")
    );
}

#[test]
fn test_reference_counts_stay_bounded() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    env.staking.delegate(&ctx, acc_addr(1), val_addr(1), 100).unwrap();
    env.staking.delegate(&ctx, acc_addr(2), val_addr(1), 100).unwrap();

    let ctx = env.ctx(2);
    allocate(&env, &ctx, &val_addr(1), 100);
    env.staking
        .slash(&ctx, &cons_addr(1), 2, &Dec::percent(50))
        .unwrap();

    let ctx = env.ctx(3);
    env.keeper
        .withdraw_delegation_rewards(&ctx, &acc_addr(1), &val_addr(1))
        .unwrap();
    env.staking.delegate(&ctx, acc_addr(2), val_addr(1), 50).unwrap();

    for (_, _, historical) in env.keeper.iterate_historical_rewards(&ctx).unwrap() {
        assert!((1..=2).contains(&historical.reference_count));
    }
    let report = env.keeper.reference_count_invariant(&ctx).unwrap();
    assert!(!report.broken, "{}", report.message);
}

#[test]
fn test_validator_without_stake_sweeps_to_foundation() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    let info = env
        .staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    allocate(&env, &ctx, &val_addr(1), 7);

    env.keeper.increment_validator_period(&ctx, &info).unwrap();

    let pools = env.keeper.get_reward_pools(&ctx).unwrap();
    assert_eq!(pools.foundation, dec_coins("7"));
    assert!(env
        .keeper
        .get_validator_outstanding_rewards(&ctx, &val_addr(1))
        .unwrap()
        .is_zero());
}

#[test]
#[should_panic(expected = "slash fraction")]
fn test_slash_fraction_above_one_panics() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    let _ = env
        .keeper
        .update_validator_slash_fraction(&ctx, &val_addr(1), &Dec::percent(101));
}

#[test]
#[should_panic(expected = "would exceed")]
fn test_reference_count_overflow_panics() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();

    // The validator itself holds the first reference to period 0.
    env.keeper.increment_reference_count(&ctx, &val_addr(1), 0).unwrap();
    let historical = env
        .keeper
        .get_validator_historical_rewards(&ctx, &val_addr(1), 0)
        .unwrap()
        .unwrap();
    assert_eq!(historical.reference_count, 2);
    let _ = env.keeper.increment_reference_count(&ctx, &val_addr(1), 0);
}

/// Delegate 100 at height 1, credit 100 at height 2 and inflate the stored
/// starting stake by `excess`.
fn delegation_with_inflated_stake(excess: Dec) -> TestEnv {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    env.staking.delegate(&ctx, acc_addr(1), val_addr(1), 100).unwrap();

    let ctx = env.ctx(2);
    allocate(&env, &ctx, &val_addr(1), 100);
    let mut info = env
        .keeper
        .get_delegator_starting_info(&ctx, &val_addr(1), &acc_addr(1))
        .unwrap()
        .unwrap();
    assert_eq!(info.stake, Dec::from_u64(100));
    info.stake += &excess;
    env.keeper
        .set_delegator_starting_info(&ctx, &val_addr(1), &acc_addr(1), &info)
        .unwrap();
    env
}

#[test]
fn test_stake_rounding_within_tolerance_is_clamped() {
    let env = delegation_with_inflated_stake(Dec::smallest().mul_int(2));
    let ctx = env.ctx(3);
    let paid = env
        .keeper
        .withdraw_delegation_rewards(&ctx, &acc_addr(1), &val_addr(1))
        .unwrap();
    assert_eq!(paid, coins(100));
    assert!(env
        .keeper
        .get_validator_outstanding_rewards(&ctx, &val_addr(1))
        .unwrap()
        .is_zero());
}

#[test]
#[should_panic(expected = "greater than current stake")]
fn test_stake_above_tolerance_panics() {
    let env = delegation_with_inflated_stake(Dec::smallest().mul_int(4));
    let ctx = env.ctx(3);
    let _ = env
        .keeper
        .withdraw_delegation_rewards(&ctx, &acc_addr(1), &val_addr(1));
}

// -----------------------------------------------------------------------------
// Allocation
// -----------------------------------------------------------------------------

#[test]
fn test_allocate_tokens_applies_pool_taxes() {
    let env = TestEnv::default();
    let ctx = env.ctx(1);
    for byte in [1, 2] {
        env.staking
            .create_validator(&ctx, val_addr(byte), cons_addr(byte), Dec::zero())
            .unwrap();
    }
    begin_block(&env, &ctx, 1, Vec::new(), Dec::zero());

    let ctx = env.ctx(2);
    env.collect_fees(&ctx, 1000).unwrap();
    begin_block(&env, &ctx, 2, vec![vote(1, 60), vote(2, 40)], Dec::percent(10));

    let pools = env.keeper.get_reward_pools(&ctx).unwrap();
    assert_eq!(pools.foundation, dec_coins("100"));
    // No LP power: the LP share rolls over.
    assert_eq!(pools.liquidity_providers, dec_coins("180"));
    assert_eq!(pools.public_treasury, dec_coins("135"));
    assert_eq!(pools.harp, dec_coins("45"));

    // Proposer multiplier 0.01 + 0.04 * 0.6 = 0.034 of the 540 validators pool.
    assert_eq!(
        env.keeper.get_validator_outstanding_rewards(&ctx, &val_addr(1)).unwrap(),
        dec_coins("331.344")
    );
    assert_eq!(
        env.keeper.get_validator_outstanding_rewards(&ctx, &val_addr(2)).unwrap(),
        dec_coins("208.656")
    );
    assert_eq!(env.balance_of(&ctx, &env.keeper.module_address()).unwrap(), 1000);
    assert!(env.supply.balance(&ctx, &env.keeper.fee_collector_address()).unwrap().is_zero());
}

#[test]
fn test_unknown_previous_proposer_bonus_goes_to_foundation() {
    let mut params = flat_params();
    params.base_proposer_reward = Dec::percent(1);
    params.bonus_proposer_reward = Dec::percent(4);
    let env = env_with(params);

    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    // The proposer of block 1 never shows up in staking.
    begin_block(&env, &ctx, 99, Vec::new(), Dec::zero());

    let ctx = env.ctx(2);
    env.collect_fees(&ctx, 100).unwrap();
    begin_block(&env, &ctx, 1, vec![vote(1, 10)], Dec::zero());

    let pools = env.keeper.get_reward_pools(&ctx).unwrap();
    assert_eq!(pools.foundation, dec_coins("1"));
    assert_eq!(
        env.keeper.get_validator_outstanding_rewards(&ctx, &val_addr(1)).unwrap(),
        dec_coins("99")
    );
}

#[test]
fn test_unknown_voter_is_skipped() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    begin_block(&env, &ctx, 1, Vec::new(), Dec::zero());

    let ctx = env.ctx(2);
    env.collect_fees(&ctx, 100).unwrap();
    begin_block(&env, &ctx, 1, vec![vote(1, 10), vote(42, 30)], Dec::zero());

    assert_eq!(
        env.keeper.get_validator_outstanding_rewards(&ctx, &val_addr(1)).unwrap(),
        dec_coins("100")
    );
}

#[test]
fn test_no_voting_power_sends_fees_to_foundation() {
    let env = env_with(flat_params());
    let ctx = env.ctx(2);
    env.collect_fees(&ctx, 100).unwrap();
    begin_block(&env, &ctx, 1, Vec::new(), Dec::zero());

    let pools = env.keeper.get_reward_pools(&ctx).unwrap();
    assert_eq!(pools.foundation, dec_coins("100"));
}

#[test]
fn test_foundation_tax_out_of_range_rejected() {
    let env = env_with(flat_params());
    let ctx = env.ctx(2);
    let err = env
        .keeper
        .allocate_tokens(&ctx, &[], &cons_addr(1), &Dec::percent(120))
        .unwrap_err();
    assert!(matches!(err, DistributionError::InvalidParams(_)));
}

#[test]
fn test_lp_pool_follows_lp_power() {
    let env = TestEnv::default();
    let ctx = env.ctx(1);
    env.staking
        .create_validator_with_lp(&ctx, val_addr(1), cons_addr(1), Dec::zero(), 2)
        .unwrap();
    env.staking
        .create_validator(&ctx, val_addr(2), cons_addr(2), Dec::zero())
        .unwrap();
    env.staking.delegate(&ctx, acc_addr(1), val_addr(1), 100).unwrap();
    env.staking.delegate(&ctx, acc_addr(2), val_addr(2), 100).unwrap();
    begin_block(&env, &ctx, 2, Vec::new(), Dec::zero());

    let ctx = env.ctx(2);
    env.collect_fees(&ctx, 1000).unwrap();
    begin_block(&env, &ctx, 1, vec![lp_vote(1, 50, 200), vote(2, 50)], Dec::zero());

    let pools = env.keeper.get_reward_pools(&ctx).unwrap();
    assert!(pools.liquidity_providers.is_zero());
    assert!(pools.foundation.is_zero());
    let current = env
        .keeper
        .get_validator_current_rewards(&ctx, &val_addr(1))
        .unwrap()
        .unwrap();
    assert_eq!(current.lp_rewards, dec_coins("200"));
    assert_eq!(current.rewards, dec_coins("291"));

    // 2.91 per bonded token plus 1 per LP token.
    let ctx = env.ctx(3);
    let paid = env
        .keeper
        .withdraw_delegation_rewards(&ctx, &acc_addr(1), &val_addr(1))
        .unwrap();
    assert_eq!(paid, coins(491));
}

#[test]
fn test_lp_distribution_ratio_weights_voting_power() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    for i in 1..=2 {
        env.staking
            .create_validator(&ctx, val_addr(i), cons_addr(i), Dec::zero())
            .unwrap();
        env.staking.delegate(&ctx, acc_addr(i), val_addr(i), 100).unwrap();
    }
    begin_block(&env, &ctx, 1, Vec::new(), Dec::zero());

    // V1: 50 + 300 * 0.5 = 200, V2: 50.
    env.staking.set_lp_distribution_ratio(Dec::percent(50));
    let ctx = env.ctx(2);
    env.collect_fees(&ctx, 1000).unwrap();
    begin_block(&env, &ctx, 1, vec![lp_vote(1, 50, 300), vote(2, 50)], Dec::zero());

    let rewards = |byte| {
        env.keeper
            .get_validator_current_rewards(&ctx, &val_addr(byte))
            .unwrap()
            .unwrap()
            .rewards
    };
    assert_eq!(rewards(1), dec_coins("800"));
    assert_eq!(rewards(2), dec_coins("200"));
    assert!(env.keeper.get_reward_pools(&ctx).unwrap().foundation.is_zero());
}

#[test]
fn test_treasury_overflow_during_allocation() {
    let mut params = Params::default();
    params.public_treasury_pool_capacity = 10;
    let env = env_with(params);
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    begin_block(&env, &ctx, 1, Vec::new(), Dec::zero());

    let ctx = env.ctx(2);
    env.collect_fees(&ctx, 100).unwrap();
    begin_block(&env, &ctx, 1, vec![vote(1, 10)], Dec::zero());

    let pools = env.keeper.get_reward_pools(&ctx).unwrap();
    assert_eq!(pools.public_treasury, dec_coins("10"));
    assert_eq!(pools.foundation, dec_coins("5"));
}

// -----------------------------------------------------------------------------
// Pool transfers
// -----------------------------------------------------------------------------

fn seeded_pools(capacity: u128) -> TestEnv {
    let mut params = Params::default();
    params.public_treasury_pool_capacity = capacity;
    let env = env_with(params);
    let ctx = env.ctx(1);
    env.keeper.append_to(&ctx, PoolKind::Foundation, &dec_coins("100")).unwrap();
    env.keeper.append_to(&ctx, PoolKind::Harp, &dec_coins("20")).unwrap();
    env
}

#[test]
fn test_pool_to_pool_moves_balance() {
    let env = seeded_pools(1_000);
    let ctx = env.ctx(1);
    env.keeper
        .distribute_from_pool_to_pool(&ctx, PoolKind::Foundation, PoolKind::Harp, &dec_coins("30"))
        .unwrap();

    let pools = env.keeper.get_reward_pools(&ctx).unwrap();
    assert_eq!(pools.foundation, dec_coins("70"));
    assert_eq!(pools.harp, dec_coins("50"));
    assert_eq!(pools.total(), dec_coins("120"));
}

#[test]
fn test_pool_to_pool_rejects_overdraft() {
    let env = seeded_pools(1_000);
    let ctx = env.ctx(1);
    let err = env
        .keeper
        .distribute_from_pool_to_pool(&ctx, PoolKind::Harp, PoolKind::Foundation, &dec_coins("21"))
        .unwrap_err();
    assert!(matches!(
        err,
        DistributionError::InsufficientPoolFunds { pool: PoolKind::Harp, .. }
    ));

    let pools = env.keeper.get_reward_pools(&ctx).unwrap();
    assert_eq!(pools.harp, dec_coins("20"));
    assert_eq!(pools.foundation, dec_coins("100"));
}

#[test]
fn test_pool_to_pool_treasury_overflow_returns_to_foundation() {
    let env = seeded_pools(25);
    let ctx = env.ctx(1);
    env.keeper
        .distribute_from_pool_to_pool(
            &ctx,
            PoolKind::Harp,
            PoolKind::PublicTreasury,
            &dec_coins("20"),
        )
        .unwrap();
    env.keeper
        .distribute_from_pool_to_pool(
            &ctx,
            PoolKind::Foundation,
            PoolKind::PublicTreasury,
            &dec_coins("40"),
        )
        .unwrap();

    // Only 5 more fit under the capacity of 25; the other 35 come back.
    let pools = env.keeper.get_reward_pools(&ctx).unwrap();
    assert_eq!(pools.public_treasury, dec_coins("25"));
    assert_eq!(pools.foundation, dec_coins("95"));
    assert!(pools.harp.is_zero());
    assert_eq!(pools.total(), dec_coins("120"));
}

// -----------------------------------------------------------------------------
// Rewards bank and queries
// -----------------------------------------------------------------------------

#[test]
fn test_share_change_banks_pending_rewards() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    env.staking.delegate(&ctx, acc_addr(1), val_addr(1), 100).unwrap();

    let ctx = env.ctx(2);
    allocate(&env, &ctx, &val_addr(1), 10);

    let ctx = env.ctx(3);
    env.staking.delegate(&ctx, acc_addr(1), val_addr(1), 100).unwrap();
    assert_eq!(
        env.keeper.get_delegator_rewards_bank_coins(&ctx, &acc_addr(1)).unwrap(),
        coins(10)
    );
    assert_eq!(env.balance_of(&ctx, &env.keeper.rewards_bank_address()).unwrap(), 10);

    let rewards = env
        .keeper
        .query_delegation_rewards(&ctx, &acc_addr(1), &val_addr(1))
        .unwrap();
    assert!(rewards.current.is_zero());
    assert_eq!(rewards.total, dec_coins("10"));

    let ctx = env.ctx(4);
    let paid = env
        .keeper
        .withdraw_delegation_rewards(&ctx, &acc_addr(1), &val_addr(1))
        .unwrap();
    assert_eq!(paid, coins(10));
    assert_eq!(env.balance_of(&ctx, &acc_addr(1)).unwrap(), 10);
    assert!(env.keeper.iterate_rewards_bank(&ctx).unwrap().is_empty());
    assert!(!env.keeper.rewards_bank_invariant(&ctx).unwrap().broken);
}

#[test]
fn test_reward_queries_leave_no_trace() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    env.staking.delegate(&ctx, acc_addr(1), val_addr(1), 100).unwrap();

    let ctx = env.ctx(2);
    allocate(&env, &ctx, &val_addr(1), 10);
    let before = env.store.snapshot();

    let raw = env
        .keeper
        .query(
            &ctx,
            &QueryRequest::DelegatorTotalRewards {
                delegator: acc_addr(1),
            },
        )
        .unwrap();
    let response: DelegatorTotalRewardsResponse = serde_json::from_slice(&raw).unwrap();
    assert_eq!(response.total, dec_coins("10"));
    assert_eq!(response.rewards.len(), 1);
    assert_eq!(env.store.snapshot(), before);
}

#[test]
fn test_validator_slashes_query_filters_heights() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    env.staking.delegate(&ctx, acc_addr(1), val_addr(1), 1000).unwrap();
    for height in [3, 5, 8] {
        let ctx = env.ctx(height);
        env.staking
            .slash(&ctx, &cons_addr(1), height, &Dec::percent(10))
            .unwrap();
    }

    let ctx = env.ctx(9);
    let events = env
        .keeper
        .get_validator_slash_events_between(&ctx, &val_addr(1), 4, 8)
        .unwrap();
    let heights: Vec<u64> = events.iter().map(|(h, _)| *h).collect();
    assert_eq!(heights, vec![5, 8]);
    assert!(env
        .keeper
        .get_validator_slash_events_between(&ctx, &val_addr(1), 9, 4)
        .unwrap()
        .is_empty());
}

// -----------------------------------------------------------------------------
// Validator lifecycle
// -----------------------------------------------------------------------------

#[test]
fn test_remove_validator_clears_records() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::percent(50))
        .unwrap();
    let shares = env.staking.delegate(&ctx, acc_addr(1), val_addr(1), 100).unwrap();

    let ctx = env.ctx(2);
    allocate(&env, &ctx, &val_addr(1), 10);

    let ctx = env.ctx(3);
    env.staking
        .undelegate(&ctx, acc_addr(1), val_addr(1), shares)
        .unwrap();
    env.staking.remove_validator(&ctx, val_addr(1)).unwrap();

    assert!(env
        .keeper
        .get_validator_current_rewards(&ctx, &val_addr(1))
        .unwrap()
        .is_none());
    assert!(env.keeper.iterate_historical_rewards(&ctx).unwrap().is_empty());
    let operator = AccAddress::from(val_addr(1));
    assert_eq!(env.balance_of(&ctx, &operator).unwrap(), 5);
    assert_eq!(
        env.keeper.get_delegator_rewards_bank_coins(&ctx, &acc_addr(1)).unwrap(),
        coins(5)
    );
    assert!(!env.keeper.all_invariants(&ctx).unwrap().broken);
}

#[test]
fn test_withdraw_commission_requires_commission() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    let err = env
        .keeper
        .withdraw_validator_commission(&ctx, &val_addr(1))
        .unwrap_err();
    assert!(matches!(err, DistributionError::NoValidatorCommission(_)));
}

// -----------------------------------------------------------------------------
// Reward locks
// -----------------------------------------------------------------------------

#[test]
fn test_locked_validator_gets_power_boost() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    let no_lp = Dec::zero();
    assert_eq!(
        env.keeper.get_distribution_power(&ctx, &val_addr(1), 100, 40, &no_lp).unwrap(),
        100
    );

    env.keeper.lock_validator_rewards(&ctx, &val_addr(1)).unwrap();
    assert_eq!(
        env.keeper.get_distribution_power(&ctx, &val_addr(1), 100, 40, &no_lp).unwrap(),
        150
    );
    // LP power is weighted before the lock boost: (100 + 40 * 0.5) * 1.5.
    assert_eq!(
        env.keeper
            .get_distribution_power(&ctx, &val_addr(1), 100, 40, &Dec::percent(50))
            .unwrap(),
        180
    );
    assert!(matches!(
        env.keeper.lock_validator_rewards(&ctx, &val_addr(1)),
        Err(DistributionError::RewardsAlreadyLocked(_))
    ));
}

#[test]
fn test_disable_auto_renewal_requires_lock() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    assert!(matches!(
        env.keeper.disable_locked_rewards_auto_renewal(&ctx, &val_addr(1)),
        Err(DistributionError::RewardsNotLocked(_))
    ));
}

#[test]
fn test_mature_lock_with_auto_renewal_is_renewed() {
    let mut params = flat_params();
    params.locked_duration_secs = 3600;
    let env = env_with(params);
    let start = TestEnv::genesis_time();
    let ctx = env.ctx_at(1, start);
    env.staking
        .create_validator(&ctx, val_addr(1), cons_addr(1), Dec::zero())
        .unwrap();
    env.keeper.lock_validator_rewards(&ctx, &val_addr(1)).unwrap();

    // One second early: nothing happens.
    let ctx = env.ctx_at(2, start + Duration::seconds(3599));
    env.keeper.process_all_mature_rewards_unlock_queue_items(&ctx).unwrap();
    let state = env.keeper.get_validator_locked_state(&ctx, &val_addr(1)).unwrap().unwrap();
    assert_eq!(state.unlocks_at, Some(start + Duration::seconds(3600)));

    let now = start + Duration::seconds(3600);
    let ctx = env.ctx_at(3, now);
    env.keeper.process_all_mature_rewards_unlock_queue_items(&ctx).unwrap();
    let state = env.keeper.get_validator_locked_state(&ctx, &val_addr(1)).unwrap().unwrap();
    assert!(state.is_locked());
    assert_eq!(state.locked_at, Some(now));
    assert_eq!(state.unlocks_at, Some(now + Duration::seconds(3600)));
}

// -----------------------------------------------------------------------------
// Messages and invariants
// -----------------------------------------------------------------------------

#[test]
fn test_set_withdraw_address_rules() {
    let mut params = flat_params();
    params.withdraw_addr_enabled = false;
    let env = env_with(params);
    let ctx = env.ctx(1);

    let blacklisted = env.keeper.fee_collector_address();
    assert!(matches!(
        env.keeper.set_withdraw_addr(&ctx, &acc_addr(1), &blacklisted),
        Err(DistributionError::BlacklistedAddress(_))
    ));
    assert!(matches!(
        env.keeper.set_withdraw_addr(&ctx, &acc_addr(1), &acc_addr(2)),
        Err(DistributionError::SetWithdrawAddrDisabled)
    ));
    assert_eq!(
        env.keeper.get_delegator_withdraw_addr(&ctx, &acc_addr(1)).unwrap(),
        acc_addr(1)
    );
}

#[test]
fn test_foundation_withdrawal_requires_nominee() {
    let mut params = flat_params();
    params.foundation_nominees = vec![acc_addr(7)];
    let env = env_with(params);
    let ctx = env.ctx(1);
    env.supply
        .mint_coins(&ctx, env.keeper.module_name(), &coins(50))
        .unwrap();
    env.keeper
        .append_to(&ctx, PoolKind::Foundation, &dec_coins("50"))
        .unwrap();

    let stranger = Msg::WithdrawFoundationPool {
        nominee: acc_addr(8),
        recipient: acc_addr(8),
        amount: coins(10),
    };
    assert!(matches!(
        handle_msg(&env.keeper, &ctx, &stranger),
        Err(DistributionError::NotFoundationNominee(_))
    ));

    let too_much = Msg::WithdrawFoundationPool {
        nominee: acc_addr(7),
        recipient: acc_addr(9),
        amount: coins(60),
    };
    assert!(matches!(
        handle_msg(&env.keeper, &ctx, &too_much),
        Err(DistributionError::InsufficientPoolFunds { .. })
    ));

    let ok = Msg::WithdrawFoundationPool {
        nominee: acc_addr(7),
        recipient: acc_addr(9),
        amount: coins(20),
    };
    handle_msg(&env.keeper, &ctx, &ok).unwrap();
    assert_eq!(env.balance_of(&ctx, &acc_addr(9)).unwrap(), 20);
    assert_eq!(
        env.keeper.get_reward_pools(&ctx).unwrap().foundation,
        dec_coins("30")
    );
}

#[test]
fn test_module_account_invariant_detects_stray_coins() {
    let env = env_with(flat_params());
    let ctx = env.ctx(1);
    assert!(!env.keeper.all_invariants(&ctx).unwrap().broken);

    env.supply
        .mint_coins(&ctx, env.keeper.module_name(), &coins(3))
        .unwrap();
    let report = env.keeper.all_invariants(&ctx).unwrap();
    assert!(report.broken);
    assert_eq!(report.name, "module account");
}
