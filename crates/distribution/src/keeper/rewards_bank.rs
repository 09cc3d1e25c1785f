//! Rewards bank
//!
//! When a delegation's shares change, its pending rewards must be settled
//! against the old stake. Instead of paying them out mid-transaction they are
//! parked in the rewards bank module account and recorded per delegator
//! until the next withdrawal.

use super::{Keeper, LOG_TARGET};
use crate::errors::{DistributionError, Result};
use crate::expected_keepers::{DelegationInfo, ValidatorInfo};
use meridian_storage::Context;
use meridian_types::{AccAddress, Coins};
use tracing::debug;

impl Keeper {
    /// Settle a delegation into the rewards bank. Returns the banked coins.
    pub fn transfer_delegation_rewards_to_rewards_bank(
        &self,
        ctx: &Context<'_>,
        val: &ValidatorInfo,
        del: &DelegationInfo,
    ) -> Result<Coins> {
        let rewards = self.withdraw_delegation_rewards_raw(ctx, val, del)?;
        if rewards.is_zero() {
            return Ok(rewards);
        }

        self.supply()
            .send_coins_from_module_to_module(
                ctx,
                self.module_name(),
                self.rewards_bank_name(),
                &rewards,
            )
            .map_err(DistributionError::Supply)?;

        let banked = self.get_delegator_rewards_bank_coins(ctx, &del.delegator)?;
        self.set_delegator_rewards_bank_coins(ctx, &del.delegator, &banked.add(&rewards))?;

        debug!(
            target: LOG_TARGET,
            "Banked {} for delegator {} from {}", rewards, del.delegator, val.operator
        );
        Ok(rewards)
    }

    /// Pay the delegator's whole rewards bank balance to `recipient` and
    /// clear the entry. Returns the amount paid.
    pub(crate) fn drain_rewards_bank(
        &self,
        ctx: &Context<'_>,
        delegator: &AccAddress,
        recipient: &AccAddress,
    ) -> Result<Coins> {
        let banked = self.get_delegator_rewards_bank_coins(ctx, delegator)?;
        if banked.is_zero() {
            return Ok(banked);
        }

        self.supply()
            .send_coins_from_module_to_account(ctx, self.rewards_bank_name(), recipient, &banked)
            .map_err(DistributionError::Supply)?;
        self.set_delegator_rewards_bank_coins(ctx, delegator, &Coins::empty())?;

        debug!(
            target: LOG_TARGET,
            "Paid rewards bank balance {} of {} to {}", banked, delegator, recipient
        );
        Ok(banked)
    }

    /// Every non-empty rewards bank entry.
    pub fn iterate_rewards_bank(&self, ctx: &Context<'_>) -> Result<Vec<(AccAddress, Coins)>> {
        Ok(self
            .iterate_by_address::<Coins>(ctx, crate::keys::DELEGATOR_REWARDS_BANK_PREFIX)?
            .into_iter()
            .map(|(addr, coins)| (AccAddress::new(addr), coins))
            .collect())
    }
}
