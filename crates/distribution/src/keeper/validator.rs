//! Validator period ledger.
//!
//! Rewards allocated to a validator accumulate in its current-rewards record.
//! Ending a period folds them into a cumulative reward-per-token ratio stored
//! per period; delegations later diff two of those snapshots to find what
//! they are owed. Historical records are reference counted and deleted when
//! no delegation, slash event or successor period needs them anymore.

use super::{Keeper, LOG_TARGET};
use crate::errors::{DistributionError, Result};
use crate::expected_keepers::ValidatorInfo;
use crate::keys;
use crate::types::{
    ValidatorCurrentRewards, ValidatorHistoricalRewards, ValidatorLockedRewardsState,
    ValidatorSlashEvent,
};
use meridian_storage::Context;
use meridian_types::{AccAddress, Coins, ConsAddress, Dec, DecCoins, ValAddress};
use tracing::{debug, info};

/// Structural bound of a historical record's reference count.
pub(crate) const MAX_REFERENCE_COUNT: u32 = 2;

impl Keeper {
    /// Create the records of a freshly created validator.
    pub fn initialize_validator(&self, ctx: &Context<'_>, val: &ValAddress) -> Result<()> {
        self.set_validator_historical_rewards(
            ctx,
            val,
            0,
            &ValidatorHistoricalRewards::new(DecCoins::zero(), DecCoins::zero(), 1),
        )?;
        self.set_validator_current_rewards(ctx, val, &ValidatorCurrentRewards::empty(1))?;
        self.set_validator_accumulated_commission(ctx, val, &DecCoins::zero())?;
        self.set_validator_outstanding_rewards(ctx, val, &DecCoins::zero())?;
        self.set_validator_locked_state(ctx, val, &ValidatorLockedRewardsState::default())?;
        debug!(target: LOG_TARGET, "Initialized distribution records of {}", val);
        Ok(())
    }

    /// Credit a validator with bonding and LP rewards, splitting off its
    /// commission.
    pub fn allocate_tokens_to_validator(
        &self,
        ctx: &Context<'_>,
        val: &ValidatorInfo,
        tokens: &DecCoins,
        lp_tokens: &DecCoins,
    ) -> Result<()> {
        if tokens.is_zero() && lp_tokens.is_zero() {
            return Ok(());
        }

        let commission = tokens.mul_dec_truncate(&val.commission_rate);
        let shared = tokens.sub(&commission);
        let lp_commission = lp_tokens.mul_dec_truncate(&val.commission_rate);
        let lp_shared = lp_tokens.sub(&lp_commission);

        let accumulated = self.get_validator_accumulated_commission(ctx, &val.operator)?;
        self.set_validator_accumulated_commission(
            ctx,
            &val.operator,
            &accumulated.add(&commission).add(&lp_commission),
        )?;

        let mut current = self
            .get_validator_current_rewards(ctx, &val.operator)?
            .ok_or(DistributionError::NoValidatorExists(val.operator))?;
        current.rewards = current.rewards.add(&shared);
        current.lp_rewards = current.lp_rewards.add(&lp_shared);
        self.set_validator_current_rewards(ctx, &val.operator, &current)?;

        let outstanding = self.get_validator_outstanding_rewards(ctx, &val.operator)?;
        self.set_validator_outstanding_rewards(
            ctx,
            &val.operator,
            &outstanding.add(tokens).add(lp_tokens),
        )?;

        debug!(
            target: LOG_TARGET,
            "Allocated {} (+{} LP) to {}, commission {}",
            tokens,
            lp_tokens,
            val.operator,
            commission.add(&lp_commission)
        );
        Ok(())
    }

    /// End the current period of `val` and return its number.
    ///
    /// Current rewards become a per-token ratio added on top of the previous
    /// period's cumulative ratio. A validator without tokens cannot turn
    /// rewards into a ratio; they are swept into the foundation pool instead.
    pub fn increment_validator_period(&self, ctx: &Context<'_>, val: &ValidatorInfo) -> Result<u64> {
        let rewards = self
            .get_validator_current_rewards(ctx, &val.operator)?
            .ok_or(DistributionError::NoValidatorExists(val.operator))?;

        let mut swept = DecCoins::zero();
        let current_ratio = if val.tokens == 0 {
            swept = swept.add(&rewards.rewards);
            DecCoins::zero()
        } else {
            rewards.rewards.quo_dec_truncate(&Dec::from_u128(val.tokens))
        };
        let current_lp_ratio = if val.lp_tokens == 0 {
            swept = swept.add(&rewards.lp_rewards);
            DecCoins::zero()
        } else {
            rewards.lp_rewards.quo_dec_truncate(&Dec::from_u128(val.lp_tokens))
        };

        if !swept.is_zero() {
            let mut pools = self.get_reward_pools(ctx)?;
            pools.foundation = pools.foundation.add(&swept);
            self.set_reward_pools(ctx, &pools)?;

            let outstanding = self.get_validator_outstanding_rewards(ctx, &val.operator)?;
            self.set_validator_outstanding_rewards(ctx, &val.operator, &outstanding.sub(&swept))?;
            debug!(
                target: LOG_TARGET,
                "Validator {} has no stake, swept {} to foundation pool", val.operator, swept
            );
        }

        let previous = rewards.period - 1;
        let historical = self
            .get_validator_historical_rewards(ctx, &val.operator, previous)?
            .unwrap_or_else(|| {
                panic!(
                    "historical rewards of {} for period {} missing",
                    val.operator, previous
                )
            });
        self.decrement_reference_count(ctx, &val.operator, previous)?;

        self.set_validator_historical_rewards(
            ctx,
            &val.operator,
            rewards.period,
            &ValidatorHistoricalRewards::new(
                historical.cumulative_reward_ratio.add(&current_ratio),
                historical.cumulative_lp_reward_ratio.add(&current_lp_ratio),
                1,
            ),
        )?;
        self.set_validator_current_rewards(
            ctx,
            &val.operator,
            &ValidatorCurrentRewards::empty(rewards.period + 1),
        )?;

        Ok(rewards.period)
    }

    /// # Panics
    /// If the record is missing or the count would exceed 2.
    pub(crate) fn increment_reference_count(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        period: u64,
    ) -> Result<()> {
        let mut historical = self
            .get_validator_historical_rewards(ctx, val, period)?
            .unwrap_or_else(|| panic!("historical rewards of {val} for period {period} missing"));
        if historical.reference_count >= MAX_REFERENCE_COUNT {
            panic!("reference count of {val} period {period} would exceed {MAX_REFERENCE_COUNT}");
        }
        historical.reference_count += 1;
        self.set_validator_historical_rewards(ctx, val, period, &historical)
    }

    /// Drop one reference; the record is deleted when none remain.
    ///
    /// # Panics
    /// If the record is missing or already unreferenced.
    pub(crate) fn decrement_reference_count(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        period: u64,
    ) -> Result<()> {
        let mut historical = self
            .get_validator_historical_rewards(ctx, val, period)?
            .unwrap_or_else(|| panic!("historical rewards of {val} for period {period} missing"));
        if historical.reference_count == 0 {
            panic!("cannot decrement reference count of {val} period {period} below zero");
        }
        historical.reference_count -= 1;
        if historical.reference_count == 0 {
            self.delete_validator_historical_rewards(ctx, val, period)
        } else {
            self.set_validator_historical_rewards(ctx, val, period, &historical)
        }
    }

    /// Record a slash of `val` by `fraction` at the current height.
    ///
    /// # Panics
    /// If `fraction` is outside `[0, 1]`.
    pub fn update_validator_slash_fraction(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        fraction: &Dec,
    ) -> Result<()> {
        if fraction.is_negative() || fraction > &Dec::one() {
            panic!("slash fraction must be within [0, 1], got {fraction}");
        }

        let validator = self.require_validator(ctx, val)?;
        let new_period = self.increment_validator_period(ctx, &validator)?;
        // The slash event reads this period's ratio later on.
        self.increment_reference_count(ctx, val, new_period)?;

        let height = ctx.block_height();
        self.set_validator_slash_event(
            ctx,
            val,
            height,
            new_period,
            &ValidatorSlashEvent {
                validator_period: new_period,
                fraction: fraction.clone(),
            },
        )?;

        info!(
            target: LOG_TARGET,
            "Validator {} slashed by {} at height {} (period {})",
            val,
            fraction,
            height,
            new_period
        );
        Ok(())
    }

    /// Pay out the whole-coin part of a validator's accumulated commission
    /// to the operator's withdraw address; the fraction stays accumulated.
    pub fn withdraw_validator_commission(&self, ctx: &Context<'_>, val: &ValAddress) -> Result<Coins> {
        let accumulated = self.get_validator_accumulated_commission(ctx, val)?;
        if accumulated.is_zero() {
            return Err(DistributionError::NoValidatorCommission(*val));
        }

        let (commission, remainder) = accumulated.truncate_decimal();
        self.set_validator_accumulated_commission(ctx, val, &remainder)?;

        let outstanding = self.get_validator_outstanding_rewards(ctx, val)?;
        self.set_validator_outstanding_rewards(
            ctx,
            val,
            &outstanding.sub(&commission.to_dec_coins()),
        )?;

        if !commission.is_zero() {
            let operator = AccAddress::from(*val);
            let withdraw = self.get_delegator_withdraw_addr(ctx, &operator)?;
            self.supply()
                .send_coins_from_module_to_account(ctx, self.module_name(), &withdraw, &commission)
                .map_err(DistributionError::Supply)?;
        }

        info!(
            target: LOG_TARGET,
            "Validator {} withdrew commission {}", val, commission
        );
        Ok(commission)
    }

    /// Tear down every record of a removed validator. Commission is paid
    /// out, anything else still outstanding goes to the foundation pool.
    pub fn remove_validator(
        &self,
        ctx: &Context<'_>,
        _consensus: &ConsAddress,
        val: &ValAddress,
    ) -> Result<()> {
        let mut outstanding = self.get_validator_outstanding_rewards(ctx, val)?;
        let commission = self.get_validator_accumulated_commission(ctx, val)?;
        let mut pools = self.get_reward_pools(ctx)?;

        if !commission.is_zero() {
            outstanding = outstanding.sub(&commission);
            let (coins, remainder) = commission.truncate_decimal();
            pools.foundation = pools.foundation.add(&remainder);

            if !coins.is_zero() {
                let operator = AccAddress::from(*val);
                let withdraw = self.get_delegator_withdraw_addr(ctx, &operator)?;
                self.supply()
                    .send_coins_from_module_to_account(ctx, self.module_name(), &withdraw, &coins)
                    .map_err(DistributionError::Supply)?;
            }
        }

        pools.foundation = pools.foundation.add(&outstanding);
        self.set_reward_pools(ctx, &pools)?;

        ctx.delete(&keys::outstanding_rewards_key(val))?;
        ctx.delete(&keys::validator_accumulated_commission_key(val))?;
        ctx.delete(&keys::validator_current_rewards_key(val))?;
        for (key, _) in ctx.prefix_scan(&keys::validator_historical_rewards_prefix(val))? {
            ctx.delete(&key)?;
        }
        for (key, _) in ctx.prefix_scan(&keys::validator_slash_event_prefix(val))? {
            ctx.delete(&key)?;
        }
        self.delete_locked_state(ctx, val)?;

        info!(
            target: LOG_TARGET,
            "Removed validator {}, {} moved to foundation pool", val, outstanding
        );
        Ok(())
    }
}
