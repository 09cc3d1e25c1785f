//! Delegation rewards
//!
//! A delegation is owed `(ratio[end] - ratio[start]) * stake` for every
//! stretch of periods it was bonded, where the stake shrinks by each slash
//! that ended a period in between. Only the starting period, stake and
//! height are stored per delegation.

use super::{Keeper, LOG_TARGET};
use crate::errors::{DistributionError, Result};
use crate::expected_keepers::{DelegationInfo, ValidatorInfo};
use crate::types::{DelegatorStartingInfo, ValidatorHistoricalRewards};
use meridian_storage::Context;
use meridian_types::{AccAddress, Coins, Dec, DecCoins, ValAddress};
use tracing::{debug, info, warn};

/// Rounding slack tolerated between the reconstructed stake and the stake
/// derived from shares: three units in the last place.
fn stake_tolerance() -> Dec {
    Dec::smallest().mul_int(3)
}

impl Keeper {
    /// Create the starting info of a delegation that was just created or
    /// modified, pinning it to the validator's last ended period.
    pub fn initialize_delegation(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        del: &AccAddress,
    ) -> Result<()> {
        let validator = self.require_validator(ctx, val)?;
        let delegation = self.require_delegation(ctx, del, val)?;

        let current = self
            .get_validator_current_rewards(ctx, val)?
            .ok_or(DistributionError::NoValidatorExists(*val))?;
        let previous_period = current.period - 1;
        self.increment_reference_count(ctx, val, previous_period)?;

        let info = DelegatorStartingInfo {
            previous_period,
            stake: validator.tokens_from_shares_truncated(&delegation.shares),
            lp_stake: validator.lp_tokens_from_shares_truncated(&delegation.shares),
            height: ctx.block_height(),
        };
        self.set_delegator_starting_info(ctx, val, del, &info)?;
        debug!(
            target: LOG_TARGET,
            "Delegation {} -> {} starts after period {} with stake {}",
            del,
            val,
            previous_period,
            info.stake
        );
        Ok(())
    }

    /// Rewards between two ended periods for a fixed stake.
    ///
    /// # Panics
    /// On a reversed period range, a negative stake, a missing snapshot or a
    /// ratio that went backwards.
    fn calculate_delegation_rewards_between(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        starting_period: u64,
        ending_period: u64,
        stake: &Dec,
        lp_stake: &Dec,
    ) -> Result<DecCoins> {
        if starting_period > ending_period {
            panic!("starting period {starting_period} after ending period {ending_period}");
        }
        if stake.is_negative() || lp_stake.is_negative() {
            panic!("stake should not be negative");
        }

        let snapshot = |period: u64| -> Result<ValidatorHistoricalRewards> {
            Ok(self
                .get_validator_historical_rewards(ctx, val, period)?
                .unwrap_or_else(|| panic!("historical rewards of {val} for period {period} missing")))
        };
        let starting = snapshot(starting_period)?;
        let ending = snapshot(ending_period)?;

        let difference = ending
            .cumulative_reward_ratio
            .checked_sub(&starting.cumulative_reward_ratio)
            .unwrap_or_else(|| panic!("negative reward ratio difference for {val}"));
        let lp_difference = ending
            .cumulative_lp_reward_ratio
            .checked_sub(&starting.cumulative_lp_reward_ratio)
            .unwrap_or_else(|| panic!("negative LP reward ratio difference for {val}"));

        Ok(difference
            .mul_dec_truncate(stake)
            .add(&lp_difference.mul_dec_truncate(lp_stake)))
    }

    /// Rewards the delegation earned in the current reward pool up to
    /// `ending_period`. The rewards bank balance is not included.
    ///
    /// # Panics
    /// If the slash-adjusted stake exceeds the live stake by more than the
    /// rounding tolerance.
    pub fn calculate_delegation_rewards(
        &self,
        ctx: &Context<'_>,
        val: &ValidatorInfo,
        del: &DelegationInfo,
        ending_period: u64,
    ) -> Result<DecCoins> {
        let starting_info = self
            .get_delegator_starting_info(ctx, &del.validator, &del.delegator)?
            .ok_or(DistributionError::EmptyDelegationDistInfo)?;

        // Nothing accrues within the block the delegation started.
        if starting_info.height == ctx.block_height() {
            return Ok(DecCoins::zero());
        }

        let mut rewards = DecCoins::zero();
        let mut starting_period = starting_info.previous_period;
        let mut stake = starting_info.stake.clone();
        let mut lp_stake = starting_info.lp_stake.clone();

        if ctx.block_height() > starting_info.height {
            let events = self.get_validator_slash_events_between(
                ctx,
                &val.operator,
                starting_info.height,
                ctx.block_height(),
            )?;
            for (_, event) in events {
                let ending = event.validator_period;
                if ending > starting_period {
                    rewards = rewards.add(&self.calculate_delegation_rewards_between(
                        ctx,
                        &val.operator,
                        starting_period,
                        ending,
                        &stake,
                        &lp_stake,
                    )?);
                    let remaining = Dec::one() - event.fraction.clone();
                    stake = stake.mul_truncate(&remaining);
                    lp_stake = lp_stake.mul_truncate(&remaining);
                    starting_period = ending;
                }
            }
        }

        let current_stake = val.tokens_from_shares(&del.shares);
        let current_lp_stake = val.lp_tokens_from_shares(&del.shares);
        stake = clamp_to_live_stake(stake, &current_stake, "stake", del);
        lp_stake = clamp_to_live_stake(lp_stake, &current_lp_stake, "LP stake", del);

        rewards = rewards.add(&self.calculate_delegation_rewards_between(
            ctx,
            &val.operator,
            starting_period,
            ending_period,
            &stake,
            &lp_stake,
        )?);
        Ok(rewards)
    }

    /// Settle a delegation: end the validator's period, compute the rewards,
    /// release them from outstanding and drop the starting info. Returns the
    /// whole coins owed; the caller moves them. Fractional change goes to the
    /// foundation pool.
    pub fn withdraw_delegation_rewards_raw(
        &self,
        ctx: &Context<'_>,
        val: &ValidatorInfo,
        del: &DelegationInfo,
    ) -> Result<Coins> {
        let starting_info = self
            .get_delegator_starting_info(ctx, &del.validator, &del.delegator)?
            .ok_or(DistributionError::EmptyDelegationDistInfo)?;

        let ending_period = self.increment_validator_period(ctx, val)?;
        let raw = self.calculate_delegation_rewards(ctx, val, del, ending_period)?;
        let outstanding = self.get_validator_outstanding_rewards(ctx, &val.operator)?;

        let rewards = raw.intersect(&outstanding);
        if rewards != raw {
            warn!(
                target: LOG_TARGET,
                "Rounding error withdrawing rewards from {}: wanted {}, outstanding {}",
                val.operator,
                raw,
                outstanding
            );
        }

        let (coins, remainder) = rewards.truncate_decimal();
        self.set_validator_outstanding_rewards(ctx, &val.operator, &outstanding.sub(&rewards))?;
        if !remainder.is_zero() {
            let mut pools = self.get_reward_pools(ctx)?;
            pools.foundation = pools.foundation.add(&remainder);
            self.set_reward_pools(ctx, &pools)?;
        }

        self.decrement_reference_count(ctx, &val.operator, starting_info.previous_period)?;
        self.delete_delegator_starting_info(ctx, &del.validator, &del.delegator)?;

        debug!(
            target: LOG_TARGET,
            "Settled {} for delegation {} -> {}", coins, del.delegator, del.validator
        );
        Ok(coins)
    }

    /// Pay the delegation's current rewards plus the delegator's rewards
    /// bank balance to the withdraw address. Returns the total paid.
    pub fn transfer_delegation_total_rewards_to_account(
        &self,
        ctx: &Context<'_>,
        val: &ValidatorInfo,
        del: &DelegationInfo,
    ) -> Result<Coins> {
        let rewards = self.withdraw_delegation_rewards_raw(ctx, val, del)?;
        let withdraw = self.get_delegator_withdraw_addr(ctx, &del.delegator)?;

        if !rewards.is_zero() {
            self.supply()
                .send_coins_from_module_to_account(ctx, self.module_name(), &withdraw, &rewards)
                .map_err(DistributionError::Supply)?;
        }
        let banked = self.drain_rewards_bank(ctx, &del.delegator, &withdraw)?;

        Ok(rewards.add(&banked))
    }

    /// Message-level withdrawal. Fails while the validator's rewards are
    /// locked; otherwise pays everything owed and restarts the delegation.
    pub fn withdraw_delegation_rewards(
        &self,
        ctx: &Context<'_>,
        del: &AccAddress,
        val: &ValAddress,
    ) -> Result<Coins> {
        let validator = self.require_validator(ctx, val)?;
        let delegation = self.require_delegation(ctx, del, val)?;

        if self.is_rewards_locked(ctx, val)? {
            return Err(DistributionError::RewardsLocked(*val));
        }

        let paid = self.transfer_delegation_total_rewards_to_account(ctx, &validator, &delegation)?;
        self.initialize_delegation(ctx, val, del)?;

        info!(
            target: LOG_TARGET,
            "Delegator {} withdrew {} from {}", del, paid, val
        );
        Ok(paid)
    }

    /// Change where `delegator`'s rewards are paid.
    pub fn set_withdraw_addr(
        &self,
        ctx: &Context<'_>,
        delegator: &AccAddress,
        withdraw: &AccAddress,
    ) -> Result<()> {
        if self.is_blacklisted(withdraw) {
            return Err(DistributionError::BlacklistedAddress(*withdraw));
        }
        if !self.get_params(ctx)?.withdraw_addr_enabled {
            return Err(DistributionError::SetWithdrawAddrDisabled);
        }
        self.store_delegator_withdraw_addr(ctx, delegator, withdraw)?;
        info!(
            target: LOG_TARGET,
            "Delegator {} set withdraw address {}", delegator, withdraw
        );
        Ok(())
    }
}

/// Snap a reconstructed stake down to the live stake when they differ only
/// by rounding.
///
/// # Panics
/// When the reconstructed stake is larger beyond the tolerance.
fn clamp_to_live_stake(stake: Dec, live: &Dec, what: &str, del: &DelegationInfo) -> Dec {
    if stake <= *live {
        return stake;
    }
    let margin = stake_tolerance();
    if stake <= live + &margin {
        return live.clone();
    }
    panic!(
        "calculated final {what} for delegator {} to {} greater than current {what}\n\
         \tfinal {what}:\t{stake}\n\tcurrent {what}:\t{live}",
        del.delegator, del.validator
    );
}
