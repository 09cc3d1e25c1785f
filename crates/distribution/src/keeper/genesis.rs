//! Genesis import and export.

use super::{Keeper, LOG_TARGET};
use crate::errors::{DistributionError, Result};
use crate::keys;
use crate::types::{
    validate_genesis, DelegatorRewardsBankRecord, DelegatorStartingInfoRecord,
    DelegatorWithdrawInfo, GenesisState, ValidatorAccumulatedCommissionRecord,
    ValidatorCurrentRewards, ValidatorCurrentRewardsRecord, ValidatorHistoricalRewardsRecord,
    ValidatorLockedRewardsRecord, ValidatorLockedRewardsState, ValidatorOutstandingRewardsRecord,
    ValidatorSlashEventRecord,
};
use meridian_storage::Context;
use meridian_types::{AccAddress, Coins, DecCoins, ValAddress};
use tracing::info;

impl Keeper {
    /// Load a genesis document into the store.
    ///
    /// The module accounts must already hold exactly what the ledger says
    /// they hold. Import never mints; any mismatch rejects the document.
    pub fn init_genesis(&self, ctx: &Context<'_>, state: &GenesisState) -> Result<()> {
        validate_genesis(state)?;

        self.set_params(ctx, &state.params)?;
        self.set_reward_pools(ctx, &state.pools)?;
        if !state.previous_proposer.is_empty() {
            self.set_previous_proposer(ctx, &state.previous_proposer)?;
        }

        for info in &state.delegator_withdraw_infos {
            self.store_delegator_withdraw_addr(ctx, &info.delegator, &info.withdraw_address)?;
        }

        let mut outstanding_total = DecCoins::zero();
        for record in &state.outstanding_rewards {
            self.set_validator_outstanding_rewards(
                ctx,
                &record.validator,
                &record.outstanding_rewards,
            )?;
            outstanding_total = outstanding_total.add(&record.outstanding_rewards);
        }
        for record in &state.accumulated_commissions {
            self.set_validator_accumulated_commission(ctx, &record.validator, &record.accumulated)?;
        }
        for record in &state.historical_rewards {
            self.set_validator_historical_rewards(
                ctx,
                &record.validator,
                record.period,
                &record.rewards,
            )?;
        }
        for record in &state.current_rewards {
            self.set_validator_current_rewards(ctx, &record.validator, &record.rewards)?;
        }
        for record in &state.delegator_starting_infos {
            self.set_delegator_starting_info(
                ctx,
                &record.validator,
                &record.delegator,
                &record.starting_info,
            )?;
        }
        for record in &state.slash_events {
            self.set_validator_slash_event(
                ctx,
                &record.validator,
                record.height,
                record.period,
                &record.event,
            )?;
        }
        for record in &state.locked_rewards {
            self.set_validator_locked_state(ctx, &record.validator, &record.state)?;
            self.enqueue_locked_state(ctx, &record.validator, &record.state)?;
        }

        let mut bank_total = Coins::empty();
        for record in &state.rewards_bank {
            self.set_delegator_rewards_bank_coins(ctx, &record.delegator, &record.coins)?;
            bank_total = bank_total.add(&record.coins);
        }

        let (custody, _) = state.pools.total().add(&outstanding_total).truncate_decimal();
        self.reconcile_module_balance(ctx, self.module_name(), &self.module_address(), &custody)?;
        self.reconcile_module_balance(
            ctx,
            self.rewards_bank_name(),
            &self.rewards_bank_address(),
            &bank_total,
        )?;

        info!(
            target: LOG_TARGET,
            "Distribution genesis loaded: {} validators, {} delegations, custody {}",
            state.current_rewards.len(),
            state.delegator_starting_infos.len(),
            custody
        );
        Ok(())
    }

    fn reconcile_module_balance(
        &self,
        ctx: &Context<'_>,
        module: &str,
        address: &AccAddress,
        expected: &Coins,
    ) -> Result<()> {
        let balance = self
            .supply()
            .balance(ctx, address)
            .map_err(DistributionError::Supply)?;
        if balance == *expected {
            return Ok(());
        }
        Err(DistributionError::InvalidGenesis(format!(
            "{module} module balance {balance} does not match ledger {expected}"
        )))
    }

    /// Dump the whole distribution state.
    pub fn export_genesis(&self, ctx: &Context<'_>) -> Result<GenesisState> {
        let delegator_withdraw_infos = self
            .iterate_by_address::<AccAddress>(ctx, keys::DELEGATOR_WITHDRAW_ADDR_PREFIX)?
            .into_iter()
            .map(|(addr, withdraw_address)| DelegatorWithdrawInfo {
                delegator: AccAddress::new(addr),
                withdraw_address,
            })
            .collect();

        let outstanding_rewards = self
            .iterate_by_address::<DecCoins>(ctx, keys::OUTSTANDING_REWARDS_PREFIX)?
            .into_iter()
            .map(|(addr, outstanding_rewards)| ValidatorOutstandingRewardsRecord {
                validator: ValAddress::new(addr),
                outstanding_rewards,
            })
            .collect();

        let accumulated_commissions = self
            .iterate_by_address::<DecCoins>(ctx, keys::VALIDATOR_ACCUMULATED_COMMISSION_PREFIX)?
            .into_iter()
            .map(|(addr, accumulated)| ValidatorAccumulatedCommissionRecord {
                validator: ValAddress::new(addr),
                accumulated,
            })
            .collect();

        let historical_rewards = self
            .iterate_historical_rewards(ctx)?
            .into_iter()
            .map(|(validator, period, rewards)| ValidatorHistoricalRewardsRecord {
                validator,
                period,
                rewards,
            })
            .collect();

        let current_rewards = self
            .iterate_by_address::<ValidatorCurrentRewards>(
                ctx,
                keys::VALIDATOR_CURRENT_REWARDS_PREFIX,
            )?
            .into_iter()
            .map(|(addr, rewards)| ValidatorCurrentRewardsRecord {
                validator: ValAddress::new(addr),
                rewards,
            })
            .collect();

        let mut delegator_starting_infos = Vec::new();
        for (key, starting_info) in ctx.prefix_scan_json::<crate::types::DelegatorStartingInfo>(&[
            keys::DELEGATOR_STARTING_INFO_PREFIX,
        ])? {
            if let Some((validator, delegator)) = keys::parse_delegator_starting_info_key(&key) {
                delegator_starting_infos.push(DelegatorStartingInfoRecord {
                    delegator,
                    validator,
                    starting_info,
                });
            }
        }

        let slash_events = self
            .iterate_slash_events(ctx)?
            .into_iter()
            .map(|(validator, height, period, event)| ValidatorSlashEventRecord {
                validator,
                height,
                period,
                event,
            })
            .collect();

        let locked_rewards = self
            .iterate_by_address::<ValidatorLockedRewardsState>(
                ctx,
                keys::VALIDATOR_LOCKED_REWARDS_PREFIX,
            )?
            .into_iter()
            .map(|(addr, state)| ValidatorLockedRewardsRecord {
                validator: ValAddress::new(addr),
                state,
            })
            .collect();

        let rewards_bank = self
            .iterate_rewards_bank(ctx)?
            .into_iter()
            .map(|(delegator, coins)| DelegatorRewardsBankRecord { delegator, coins })
            .collect();

        Ok(GenesisState {
            params: self.get_params(ctx)?,
            pools: self.get_reward_pools(ctx)?,
            previous_proposer: self.get_previous_proposer(ctx)?.unwrap_or_default(),
            delegator_withdraw_infos,
            outstanding_rewards,
            accumulated_commissions,
            historical_rewards,
            current_rewards,
            delegator_starting_infos,
            slash_events,
            locked_rewards,
            rewards_bank,
        })
    }
}
