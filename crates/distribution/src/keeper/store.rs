//! Typed accessors over the raw distribution records.

use super::Keeper;
use crate::errors::Result;
use crate::keys;
use crate::types::{
    DelegatorStartingInfo, Params, RewardPools, ValidatorCurrentRewards,
    ValidatorHistoricalRewards, ValidatorLockedRewardsState, ValidatorSlashEvent,
};
use meridian_storage::{prefix_end, Context};
use meridian_types::{AccAddress, Coins, ConsAddress, DecCoins, ValAddress};

impl Keeper {
    // -------------------------------------------------------------------------
    // Params, pools and proposer
    // -------------------------------------------------------------------------

    /// Stored params, or the configured genesis params before genesis ran.
    pub fn get_params(&self, ctx: &Context<'_>) -> Result<Params> {
        Ok(ctx
            .get_json(keys::PARAMS_KEY)?
            .unwrap_or_else(|| self.config.params.clone()))
    }

    pub fn set_params(&self, ctx: &Context<'_>, params: &Params) -> Result<()> {
        params.validate()?;
        ctx.set_json(keys::PARAMS_KEY, params)?;
        Ok(())
    }

    pub fn get_reward_pools(&self, ctx: &Context<'_>) -> Result<RewardPools> {
        Ok(ctx.get_json(keys::POOLS_KEY)?.unwrap_or_default())
    }

    pub(crate) fn set_reward_pools(&self, ctx: &Context<'_>, pools: &RewardPools) -> Result<()> {
        ctx.set_json(keys::POOLS_KEY, pools)?;
        Ok(())
    }

    pub fn get_previous_proposer(&self, ctx: &Context<'_>) -> Result<Option<ConsAddress>> {
        Ok(ctx.get_json(keys::PREVIOUS_PROPOSER_KEY)?)
    }

    pub(crate) fn set_previous_proposer(&self, ctx: &Context<'_>, cons: &ConsAddress) -> Result<()> {
        ctx.set_json(keys::PREVIOUS_PROPOSER_KEY, cons)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Withdraw addresses
    // -------------------------------------------------------------------------

    /// Withdraw address of `delegator`; the delegator itself when unset.
    pub fn get_delegator_withdraw_addr(
        &self,
        ctx: &Context<'_>,
        delegator: &AccAddress,
    ) -> Result<AccAddress> {
        Ok(ctx
            .get_json(&keys::delegator_withdraw_addr_key(delegator))?
            .unwrap_or(*delegator))
    }

    pub(crate) fn store_delegator_withdraw_addr(
        &self,
        ctx: &Context<'_>,
        delegator: &AccAddress,
        withdraw: &AccAddress,
    ) -> Result<()> {
        ctx.set_json(&keys::delegator_withdraw_addr_key(delegator), withdraw)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Outstanding rewards and commission
    // -------------------------------------------------------------------------

    pub fn get_validator_outstanding_rewards(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
    ) -> Result<DecCoins> {
        Ok(ctx
            .get_json(&keys::outstanding_rewards_key(val))?
            .unwrap_or_default())
    }

    pub(crate) fn set_validator_outstanding_rewards(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        rewards: &DecCoins,
    ) -> Result<()> {
        ctx.set_json(&keys::outstanding_rewards_key(val), rewards)?;
        Ok(())
    }

    pub fn get_validator_accumulated_commission(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
    ) -> Result<DecCoins> {
        Ok(ctx
            .get_json(&keys::validator_accumulated_commission_key(val))?
            .unwrap_or_default())
    }

    pub(crate) fn set_validator_accumulated_commission(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        commission: &DecCoins,
    ) -> Result<()> {
        ctx.set_json(&keys::validator_accumulated_commission_key(val), commission)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Current and historical rewards
    // -------------------------------------------------------------------------

    pub fn get_validator_current_rewards(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
    ) -> Result<Option<ValidatorCurrentRewards>> {
        Ok(ctx.get_json(&keys::validator_current_rewards_key(val))?)
    }

    pub(crate) fn set_validator_current_rewards(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        rewards: &ValidatorCurrentRewards,
    ) -> Result<()> {
        ctx.set_json(&keys::validator_current_rewards_key(val), rewards)?;
        Ok(())
    }

    pub fn get_validator_historical_rewards(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        period: u64,
    ) -> Result<Option<ValidatorHistoricalRewards>> {
        Ok(ctx.get_json(&keys::validator_historical_rewards_key(val, period))?)
    }

    pub(crate) fn set_validator_historical_rewards(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        period: u64,
        rewards: &ValidatorHistoricalRewards,
    ) -> Result<()> {
        ctx.set_json(&keys::validator_historical_rewards_key(val, period), rewards)?;
        Ok(())
    }

    pub(crate) fn delete_validator_historical_rewards(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        period: u64,
    ) -> Result<()> {
        ctx.delete(&keys::validator_historical_rewards_key(val, period))?;
        Ok(())
    }

    /// Every historical record, ordered by validator then storage key.
    pub fn iterate_historical_rewards(
        &self,
        ctx: &Context<'_>,
    ) -> Result<Vec<(ValAddress, u64, ValidatorHistoricalRewards)>> {
        let entries = ctx.prefix_scan_json::<ValidatorHistoricalRewards>(&[
            keys::VALIDATOR_HISTORICAL_REWARDS_PREFIX,
        ])?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, rewards)| {
                keys::parse_validator_historical_rewards_key(&key)
                    .map(|(val, period)| (val, period, rewards))
            })
            .collect())
    }

    // -------------------------------------------------------------------------
    // Delegator starting info
    // -------------------------------------------------------------------------

    pub fn get_delegator_starting_info(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        del: &AccAddress,
    ) -> Result<Option<DelegatorStartingInfo>> {
        Ok(ctx.get_json(&keys::delegator_starting_info_key(val, del))?)
    }

    pub(crate) fn set_delegator_starting_info(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        del: &AccAddress,
        info: &DelegatorStartingInfo,
    ) -> Result<()> {
        ctx.set_json(&keys::delegator_starting_info_key(val, del), info)?;
        Ok(())
    }

    pub(crate) fn delete_delegator_starting_info(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        del: &AccAddress,
    ) -> Result<()> {
        ctx.delete(&keys::delegator_starting_info_key(val, del))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Slash events
    // -------------------------------------------------------------------------

    pub(crate) fn set_validator_slash_event(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        height: u64,
        period: u64,
        event: &ValidatorSlashEvent,
    ) -> Result<()> {
        ctx.set_json(&keys::validator_slash_event_key(val, height, period), event)?;
        Ok(())
    }

    /// Slash events of `val` with `starting_height <= height <= ending_height`,
    /// in height order.
    pub fn get_validator_slash_events_between(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        starting_height: u64,
        ending_height: u64,
    ) -> Result<Vec<(u64, ValidatorSlashEvent)>> {
        if starting_height > ending_height {
            return Ok(Vec::new());
        }
        let start = keys::validator_slash_event_height_prefix(val, starting_height);
        let end = match ending_height.checked_add(1) {
            Some(next) => keys::validator_slash_event_height_prefix(val, next),
            None => prefix_end(&keys::validator_slash_event_prefix(val)).unwrap_or_default(),
        };
        let entries = ctx.range(&start, Some(end.as_slice()))?;
        let mut events = Vec::with_capacity(entries.len());
        for (key, raw) in entries {
            let Some((_, height, _)) = keys::parse_validator_slash_event_key(&key) else {
                continue;
            };
            let event: ValidatorSlashEvent = serde_json::from_slice(&raw)
                .map_err(meridian_storage::StorageError::from)?;
            events.push((height, event));
        }
        Ok(events)
    }

    /// Every slash event in the store as `(validator, height, period, event)`.
    pub fn iterate_slash_events(
        &self,
        ctx: &Context<'_>,
    ) -> Result<Vec<(ValAddress, u64, u64, ValidatorSlashEvent)>> {
        let entries =
            ctx.prefix_scan_json::<ValidatorSlashEvent>(&[keys::VALIDATOR_SLASH_EVENT_PREFIX])?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, event)| {
                keys::parse_validator_slash_event_key(&key)
                    .map(|(val, height, period)| (val, height, period, event))
            })
            .collect())
    }

    // -------------------------------------------------------------------------
    // Locked rewards
    // -------------------------------------------------------------------------

    pub fn get_validator_locked_state(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
    ) -> Result<Option<ValidatorLockedRewardsState>> {
        Ok(ctx.get_json(&keys::validator_locked_rewards_key(val))?)
    }

    pub(crate) fn set_validator_locked_state(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        state: &ValidatorLockedRewardsState,
    ) -> Result<()> {
        ctx.set_json(&keys::validator_locked_rewards_key(val), state)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Rewards bank ledger
    // -------------------------------------------------------------------------

    pub fn get_delegator_rewards_bank_coins(
        &self,
        ctx: &Context<'_>,
        del: &AccAddress,
    ) -> Result<Coins> {
        Ok(ctx
            .get_json(&keys::delegator_rewards_bank_key(del))?
            .unwrap_or_default())
    }

    pub(crate) fn set_delegator_rewards_bank_coins(
        &self,
        ctx: &Context<'_>,
        del: &AccAddress,
        coins: &Coins,
    ) -> Result<()> {
        let key = keys::delegator_rewards_bank_key(del);
        if coins.is_zero() {
            ctx.delete(&key)?;
        } else {
            ctx.set_json(&key, coins)?;
        }
        Ok(())
    }

    /// Decode every record of a single-address keyed table.
    pub(crate) fn iterate_by_address<T: serde::de::DeserializeOwned>(
        &self,
        ctx: &Context<'_>,
        prefix: u8,
    ) -> Result<Vec<([u8; meridian_types::ADDRESS_BYTES], T)>> {
        let entries = ctx.prefix_scan_json::<T>(&[prefix])?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| keys::parse_address_key(&key).map(|addr| (addr, value)))
            .collect())
    }
}
