//! Export a populated chain, import it into a fresh store and compare.

use meridian_distribution::keys::LAST_PREFIX;
use meridian_distribution::testutil::{acc_addr, cons_addr, val_addr, TestEnv, TEST_DENOM};
use meridian_distribution::{
    handle_msg, BeginBlockRequest, DistributionConfig, DistributionError, GenesisState, Msg,
    StakingKeeper, VoteInfo,
};
use meridian_storage::KvPair;
use meridian_types::{Coins, Dec, DecCoins};

fn distribution_entries(env: &TestEnv) -> Vec<KvPair> {
    env.store
        .snapshot()
        .into_iter()
        .filter(|(key, _)| key.first().is_some_and(|prefix| *prefix <= LAST_PREFIX))
        .collect()
}

/// Two validators with delegations, rewards, a slash, a lock, a custom
/// withdraw address and a rewards bank balance.
fn populated_env() -> TestEnv {
    let env = TestEnv::new(DistributionConfig::default());
    let ctx = env.ctx(1);
    env.keeper
        .init_genesis(&ctx, &GenesisState {
            params: env.keeper.config().params.clone(),
            ..Default::default()
        })
        .unwrap();

    for i in 1..=2 {
        env.staking
            .create_validator(&ctx, val_addr(i), cons_addr(i), Dec::percent(10))
            .unwrap();
        env.staking
            .delegate(&ctx, acc_addr(10 + i), val_addr(i), 1_000)
            .unwrap();
    }
    env.staking.delegate(&ctx, acc_addr(13), val_addr(2), 500).unwrap();

    let ctx = env.ctx(2);
    handle_msg(
        &env.keeper,
        &ctx,
        &Msg::SetWithdrawAddress {
            delegator: acc_addr(12),
            withdraw_address: acc_addr(20),
        },
    )
    .unwrap();
    for height in 2..=4 {
        let ctx = env.ctx(height);
        env.collect_fees(&ctx, 777).unwrap();
        env.keeper
            .begin_block(
                &ctx,
                &BeginBlockRequest {
                    proposer: cons_addr(1),
                    votes: (1..=2)
                        .map(|i| VoteInfo {
                            validator: cons_addr(i),
                            power: 1_000,
                            lp_power: 0,
                        })
                        .collect(),
                    dynamic_foundation_tax: Dec::percent(3),
                },
            )
            .unwrap();
    }

    let ctx = env.ctx(5);
    env.staking
        .slash(&ctx, &cons_addr(2), 4, &Dec::percent(25))
        .unwrap();
    // A second bond banks the rewards accrued so far.
    env.staking.delegate(&ctx, acc_addr(11), val_addr(1), 250).unwrap();
    env.keeper.lock_validator_rewards(&ctx, &val_addr(1)).unwrap();

    let invariants = env.keeper.all_invariants(&ctx).unwrap();
    assert!(!invariants.broken, "{}", invariants.message);
    env
}

#[test]
fn test_export_import_round_trip() {
    let source = populated_env();
    let exported = source.keeper.export_genesis(&source.ctx(6)).unwrap();
    assert_eq!(exported.slash_events.len(), 1);
    let locked: Vec<_> = exported
        .locked_rewards
        .iter()
        .filter(|record| record.state.is_locked())
        .map(|record| record.validator)
        .collect();
    assert_eq!(locked, vec![val_addr(1)]);
    assert_eq!(exported.rewards_bank.len(), 1);
    assert_eq!(exported.delegator_withdraw_infos.len(), 1);
    assert_eq!(exported.previous_proposer, cons_addr(1));

    let json = serde_json::to_string_pretty(&exported).unwrap();
    let decoded: GenesisState = serde_json::from_str(&json).unwrap();

    // The bank carries the module balances across; distribution only checks them.
    let target = TestEnv::new(DistributionConfig::default());
    let ctx = target.ctx(6);
    let source_ctx = source.ctx(6);
    for addr in [
        source.keeper.module_address(),
        source.keeper.rewards_bank_address(),
    ] {
        let balance = source.balance_of(&source_ctx, &addr).unwrap();
        target
            .supply
            .fund_account(&ctx, &addr, &Coins::from_coin(TEST_DENOM, balance))
            .unwrap();
    }
    target.keeper.init_genesis(&ctx, &decoded).unwrap();

    let reexported = target.keeper.export_genesis(&ctx).unwrap();
    assert_eq!(reexported, exported);
    assert_eq!(distribution_entries(&target), distribution_entries(&source));

    for addr in [
        source.keeper.module_address(),
        source.keeper.rewards_bank_address(),
    ] {
        assert_eq!(
            target.balance_of(&ctx, &addr).unwrap(),
            source.balance_of(&source_ctx, &addr).unwrap()
        );
    }
}

#[test]
fn test_import_rejects_mismatched_module_balance() {
    let source = populated_env();
    let exported = source.keeper.export_genesis(&source.ctx(6)).unwrap();

    let target = TestEnv::new(DistributionConfig::default());
    let ctx = target.ctx(6);
    target
        .supply
        .fund_account(
            &ctx,
            &target.keeper.module_address(),
            &Coins::from_coin(TEST_DENOM, 1),
        )
        .unwrap();
    assert!(matches!(
        target.keeper.init_genesis(&ctx, &exported),
        Err(DistributionError::InvalidGenesis(_))
    ));
}

#[test]
fn test_import_never_mints_into_empty_module_account() {
    let mut state = GenesisState::default();
    state.pools.foundation = DecCoins::from_dec_coin(TEST_DENOM, Dec::from_u64(1_000_000));

    let env = TestEnv::default();
    let ctx = env.ctx(1);
    assert!(matches!(
        env.keeper.init_genesis(&ctx, &state),
        Err(DistributionError::InvalidGenesis(_))
    ));
    assert!(env.supply.total_supply(&ctx).unwrap().is_zero());
    assert_eq!(env.balance_of(&ctx, &env.keeper.module_address()).unwrap(), 0);
}

#[test]
fn test_import_rejects_negative_pool() {
    let mut state = GenesisState::default();
    state.pools.foundation = DecCoins::from_dec_coin(TEST_DENOM, Dec::from_i64(-1));

    let env = TestEnv::default();
    assert!(matches!(
        env.keeper.init_genesis(&env.ctx(1), &state),
        Err(DistributionError::InvalidGenesis(_))
    ));
    assert!(distribution_entries(&env).is_empty());
}

#[test]
fn test_imported_chain_keeps_paying_rewards() {
    let source = populated_env();
    let exported = source.keeper.export_genesis(&source.ctx(6)).unwrap();

    // Staking state is carried over by copying the mock's records.
    let target = TestEnv::default();
    for (key, value) in source.store.snapshot() {
        if key.first().is_some_and(|prefix| *prefix > LAST_PREFIX) {
            meridian_storage::KvStore::set(&target.store, &key, &value).unwrap();
        }
    }
    let ctx = target.ctx(6);
    target.keeper.init_genesis(&ctx, &exported).unwrap();

    let ctx = target.ctx(7);
    let paid = target
        .keeper
        .withdraw_delegation_rewards(&ctx, &acc_addr(12), &val_addr(2))
        .unwrap();
    assert!(!paid.is_zero());
    assert!(target.balance_of(&ctx, &acc_addr(20)).unwrap() > 0);
    assert!(!target.keeper.all_invariants(&ctx).unwrap().broken);
}
