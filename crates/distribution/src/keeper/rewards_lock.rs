//! Rewards lock scheduler
//!
//! A validator may lock its delegators' rewards for a fixed duration in
//! exchange for a boost of its distribution power. Locks are tracked in a
//! queue keyed by unlock time and processed at the start of every block.

use super::{Keeper, LOG_TARGET};
use crate::errors::{DistributionError, Result};
use crate::keys;
use crate::types::{Params, ValidatorLockedRewardsState};
use chrono::{DateTime, Duration, Utc};
use meridian_storage::Context;
use meridian_types::{Dec, ValAddress};
use tracing::{debug, info};

fn unlock_time(params: &Params, from: &DateTime<Utc>) -> Result<DateTime<Utc>> {
    let secs = i64::try_from(params.locked_duration_secs).map_err(|_| {
        DistributionError::InvalidParams("locked duration does not fit in i64".into())
    })?;
    Duration::try_seconds(secs)
        .and_then(|duration| from.checked_add_signed(duration))
        .ok_or_else(|| DistributionError::InvalidParams("unlock time out of range".into()))
}

impl Keeper {
    /// Lock the validator's rewards for the configured duration, with
    /// auto-renewal enabled.
    pub fn lock_validator_rewards(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
    ) -> Result<ValidatorLockedRewardsState> {
        self.require_validator(ctx, val)?;
        let current = self.get_validator_locked_state(ctx, val)?.unwrap_or_default();
        if current.is_locked() {
            return Err(DistributionError::RewardsAlreadyLocked(*val));
        }

        let params = self.get_params(ctx)?;
        let now = ctx.block_time();
        let unlocks_at = unlock_time(&params, &now)?;
        let state = ValidatorLockedRewardsState {
            locked_ratio: params.locked_ratio.clone(),
            locked_height: ctx.block_height(),
            locked_at: Some(now),
            unlocks_at: Some(unlocks_at),
            auto_renewal: true,
        };
        self.set_validator_locked_state(ctx, val, &state)?;
        self.insert_unlock_queue(ctx, &unlocks_at, val)?;

        info!(
            target: LOG_TARGET,
            "Locked rewards of {} until {} (ratio {})", val, unlocks_at, state.locked_ratio
        );
        Ok(state)
    }

    /// Keep the current lock but let it expire at its unlock time.
    pub fn disable_locked_rewards_auto_renewal(&self, ctx: &Context<'_>, val: &ValAddress) -> Result<()> {
        let mut state = self.get_validator_locked_state(ctx, val)?.unwrap_or_default();
        if !state.is_locked() {
            return Err(DistributionError::RewardsNotLocked(*val));
        }
        state.auto_renewal = false;
        self.set_validator_locked_state(ctx, val, &state)?;
        info!(target: LOG_TARGET, "Disabled reward lock auto-renewal of {}", val);
        Ok(())
    }

    pub fn is_rewards_locked(&self, ctx: &Context<'_>, val: &ValAddress) -> Result<bool> {
        Ok(self
            .get_validator_locked_state(ctx, val)?
            .is_some_and(|state| state.is_locked()))
    }

    /// Staking power plus `lp_power` weighted by `lp_distribution_ratio`,
    /// boosted by the locked ratio while the validator's rewards are locked.
    pub fn get_distribution_power(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        staking_power: u64,
        lp_power: u64,
        lp_distribution_ratio: &Dec,
    ) -> Result<u64> {
        let lp_part = Dec::from_u64(lp_power)
            .mul_truncate(lp_distribution_ratio)
            .truncate_u64()
            .unwrap_or(0);
        let power = staking_power.saturating_add(lp_part);

        let Some(state) = self.get_validator_locked_state(ctx, val)? else {
            return Ok(power);
        };
        if !state.is_locked() {
            return Ok(power);
        }
        let bonus = Dec::from_u64(power)
            .mul_truncate(&state.locked_ratio)
            .truncate_u64()
            .unwrap_or(0);
        Ok(power.saturating_add(bonus))
    }

    /// Handle every queue entry due at or before the current block time:
    /// renew locks that still auto-renew, release the others.
    pub fn process_all_mature_rewards_unlock_queue_items(&self, ctx: &Context<'_>) -> Result<()> {
        let now = ctx.block_time();
        let start = [keys::REWARDS_UNLOCK_QUEUE_PREFIX];
        // Keys equal to `now` are due too, so end just past it.
        let mut end = keys::rewards_unlock_queue_key(&now);
        end.push(0x00);

        let due = ctx.range(&start, Some(end.as_slice()))?;
        if due.is_empty() {
            return Ok(());
        }

        let params = self.get_params(ctx)?;
        for (key, raw) in due {
            ctx.delete(&key)?;
            let validators: Vec<ValAddress> =
                serde_json::from_slice(&raw).map_err(meridian_storage::StorageError::from)?;

            for val in validators {
                let Some(mut state) = self.get_validator_locked_state(ctx, &val)? else {
                    continue;
                };
                if !state.is_mature(&now) {
                    continue;
                }

                if state.auto_renewal {
                    let unlocks_at = unlock_time(&params, &now)?;
                    state.locked_ratio = params.locked_ratio.clone();
                    state.locked_height = ctx.block_height();
                    state.locked_at = Some(now);
                    state.unlocks_at = Some(unlocks_at);
                    self.set_validator_locked_state(ctx, &val, &state)?;
                    self.insert_unlock_queue(ctx, &unlocks_at, &val)?;
                    info!(
                        target: LOG_TARGET,
                        "Renewed reward lock of {} until {}", val, unlocks_at
                    );
                } else {
                    self.set_validator_locked_state(ctx, &val, &ValidatorLockedRewardsState::default())?;
                    info!(target: LOG_TARGET, "Unlocked rewards of {}", val);
                }
            }
        }
        Ok(())
    }

    fn insert_unlock_queue(
        &self,
        ctx: &Context<'_>,
        unlocks_at: &DateTime<Utc>,
        val: &ValAddress,
    ) -> Result<()> {
        let key = keys::rewards_unlock_queue_key(unlocks_at);
        let mut validators: Vec<ValAddress> = ctx.get_json(&key)?.unwrap_or_default();
        if !validators.contains(val) {
            validators.push(*val);
        }
        ctx.set_json(&key, &validators)?;
        debug!(target: LOG_TARGET, "Queued unlock of {} at {}", val, unlocks_at);
        Ok(())
    }

    fn remove_from_unlock_queue(
        &self,
        ctx: &Context<'_>,
        unlocks_at: &DateTime<Utc>,
        val: &ValAddress,
    ) -> Result<()> {
        let key = keys::rewards_unlock_queue_key(unlocks_at);
        let mut validators: Vec<ValAddress> = ctx.get_json(&key)?.unwrap_or_default();
        validators.retain(|queued| queued != val);
        if validators.is_empty() {
            ctx.delete(&key)?;
        } else {
            ctx.set_json(&key, &validators)?;
        }
        Ok(())
    }

    /// Drop a validator's lock state and its queue entry.
    pub(crate) fn delete_locked_state(&self, ctx: &Context<'_>, val: &ValAddress) -> Result<()> {
        if let Some(state) = self.get_validator_locked_state(ctx, val)? {
            if let Some(unlocks_at) = state.unlocks_at {
                self.remove_from_unlock_queue(ctx, &unlocks_at, val)?;
            }
            ctx.delete(&keys::validator_locked_rewards_key(val))?;
        }
        Ok(())
    }

    /// Rebuild the queue entry of an imported lock state.
    pub(crate) fn enqueue_locked_state(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        state: &ValidatorLockedRewardsState,
    ) -> Result<()> {
        if let Some(unlocks_at) = state.unlocks_at {
            self.insert_unlock_queue(ctx, &unlocks_at, val)?;
        }
        Ok(())
    }
}
