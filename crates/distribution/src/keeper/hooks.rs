//! Staking lifecycle hooks.
//!
//! The staking module calls these around every validator and delegation
//! change so the period ledger stays in step with the stake it divides.

use super::{Keeper, LOG_TARGET};
use crate::errors::{DistributionError, Result};
use meridian_storage::Context;
use meridian_types::{AccAddress, ConsAddress, Dec, ValAddress};
use tracing::trace;

/// Callbacks the staking module fires on lifecycle events. Every hook
/// defaults to a no-op so listeners only implement what they need.
pub trait StakingHooks: Send + Sync {
    fn after_validator_created(&self, _ctx: &Context<'_>, _val: &ValAddress) -> Result<()> {
        Ok(())
    }

    fn after_validator_removed(
        &self,
        _ctx: &Context<'_>,
        _consensus: &ConsAddress,
        _val: &ValAddress,
    ) -> Result<()> {
        Ok(())
    }

    fn before_delegation_created(
        &self,
        _ctx: &Context<'_>,
        _del: &AccAddress,
        _val: &ValAddress,
    ) -> Result<()> {
        Ok(())
    }

    fn before_delegation_shares_modified(
        &self,
        _ctx: &Context<'_>,
        _del: &AccAddress,
        _val: &ValAddress,
    ) -> Result<()> {
        Ok(())
    }

    fn after_delegation_modified(
        &self,
        _ctx: &Context<'_>,
        _del: &AccAddress,
        _val: &ValAddress,
    ) -> Result<()> {
        Ok(())
    }

    fn before_validator_slashed(
        &self,
        _ctx: &Context<'_>,
        _val: &ValAddress,
        _fraction: &Dec,
    ) -> Result<()> {
        Ok(())
    }
}

impl StakingHooks for Keeper {
    fn after_validator_created(&self, ctx: &Context<'_>, val: &ValAddress) -> Result<()> {
        trace!(target: LOG_TARGET, "hook: validator {} created", val);
        self.initialize_validator(ctx, val)
    }

    fn after_validator_removed(
        &self,
        ctx: &Context<'_>,
        consensus: &ConsAddress,
        val: &ValAddress,
    ) -> Result<()> {
        trace!(target: LOG_TARGET, "hook: validator {} removed", val);
        self.remove_validator(ctx, consensus, val)
    }

    fn before_delegation_created(
        &self,
        ctx: &Context<'_>,
        del: &AccAddress,
        val: &ValAddress,
    ) -> Result<()> {
        trace!(target: LOG_TARGET, "hook: delegation {} -> {} created", del, val);
        let validator = self.require_validator(ctx, val)?;
        self.increment_validator_period(ctx, &validator)?;
        Ok(())
    }

    fn before_delegation_shares_modified(
        &self,
        ctx: &Context<'_>,
        del: &AccAddress,
        val: &ValAddress,
    ) -> Result<()> {
        trace!(target: LOG_TARGET, "hook: delegation {} -> {} modified", del, val);
        let validator = self.require_validator(ctx, val)?;
        let delegation = self.require_delegation(ctx, del, val)?;
        self.transfer_delegation_rewards_to_rewards_bank(ctx, &validator, &delegation)?;
        Ok(())
    }

    fn after_delegation_modified(
        &self,
        ctx: &Context<'_>,
        del: &AccAddress,
        val: &ValAddress,
    ) -> Result<()> {
        // A full undelegation leaves nothing to track.
        match self.initialize_delegation(ctx, val, del) {
            Err(DistributionError::NoDelegationExists { .. }) => Ok(()),
            other => other,
        }
    }

    fn before_validator_slashed(
        &self,
        ctx: &Context<'_>,
        val: &ValAddress,
        fraction: &Dec,
    ) -> Result<()> {
        trace!(target: LOG_TARGET, "hook: validator {} slashed by {}", val, fraction);
        self.update_validator_slash_fraction(ctx, val, fraction)
    }
}
