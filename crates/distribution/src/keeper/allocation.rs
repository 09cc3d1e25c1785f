//! Per-block reward allocation.
//!
//! Fees collected during the previous block are taxed into the named pools
//! and the rest is apportioned among the validators that voted on it. All
//! per-validator shares truncate, so the sum handed out never exceeds what is
//! being split; whatever is left over ends up in the foundation pool.

use super::{Keeper, LOG_TARGET};
use crate::errors::{DistributionError, Result};
use crate::expected_keepers::ValidatorInfo;
use crate::types::PoolKind;
use meridian_storage::Context;
use meridian_types::{ConsAddress, Dec, DecCoins};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// One validator's vote on the previous block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub validator: ConsAddress,
    /// Consensus power of the validator.
    pub power: u64,
    /// Liquidity-provider power backing the validator.
    #[serde(default)]
    pub lp_power: u64,
}

/// Inputs of the begin-block step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginBlockRequest {
    /// Proposer of the block being started.
    pub proposer: ConsAddress,
    /// Votes of the previous block.
    pub votes: Vec<VoteInfo>,
    /// Foundation share of the collected fees, decided by the mint module.
    pub dynamic_foundation_tax: Dec,
}

struct Voter {
    validator: ValidatorInfo,
    power: u64,
    lp_power: u64,
}

impl Keeper {
    /// Begin-block entry point: allocate the previous block's fees, remember
    /// the new proposer and release matured reward locks.
    pub fn begin_block(&self, ctx: &Context<'_>, request: &BeginBlockRequest) -> Result<()> {
        // No fees have been collected before the first block.
        if ctx.block_height() > 1 {
            let previous = self.get_previous_proposer(ctx)?.unwrap_or_default();
            self.allocate_tokens(
                ctx,
                &request.votes,
                &previous,
                &request.dynamic_foundation_tax,
            )?;
        }
        self.set_previous_proposer(ctx, &request.proposer)?;
        self.process_all_mature_rewards_unlock_queue_items(ctx)
    }

    /// Move the fee collector's balance into the module account and split it
    /// across pools, the previous proposer and every voter.
    pub fn allocate_tokens(
        &self,
        ctx: &Context<'_>,
        votes: &[VoteInfo],
        previous_proposer: &ConsAddress,
        dynamic_foundation_tax: &Dec,
    ) -> Result<()> {
        if dynamic_foundation_tax.is_negative() || dynamic_foundation_tax > &Dec::one() {
            return Err(DistributionError::InvalidParams(format!(
                "foundation tax must be within [0, 1], got {dynamic_foundation_tax}"
            )));
        }

        let collected = self
            .supply()
            .balance(ctx, &self.fee_collector_address())
            .map_err(DistributionError::Supply)?;
        if !collected.is_zero() {
            self.supply()
                .send_coins_from_module_to_module(
                    ctx,
                    self.fee_collector_name(),
                    self.module_name(),
                    &collected,
                )
                .map_err(DistributionError::Supply)?;
        }
        let fees = collected.to_dec_coins();

        let lp_distribution_ratio = self
            .staking()
            .lp_distribution_ratio(ctx)
            .map_err(DistributionError::Staking)?;

        let mut voters = Vec::with_capacity(votes.len());
        let mut total_power: u128 = 0;
        let mut total_lp_power: u128 = 0;
        for vote in votes {
            let Some(validator) = self
                .staking()
                .validator_by_cons_addr(ctx, &vote.validator)
                .map_err(DistributionError::Staking)?
            else {
                error!(
                    target: LOG_TARGET,
                    "Vote from unknown validator {} skipped", vote.validator
                );
                continue;
            };
            let power = self.get_distribution_power(
                ctx,
                &validator.operator,
                vote.power,
                vote.lp_power,
                &lp_distribution_ratio,
            )?;
            total_power += u128::from(power);
            total_lp_power += u128::from(vote.lp_power);
            voters.push(Voter {
                validator,
                power,
                lp_power: vote.lp_power,
            });
        }

        let params = self.get_params(ctx)?;
        let mut pools = self.get_reward_pools(ctx)?;

        if total_power == 0 {
            pools.foundation = pools.foundation.add(&fees);
            self.set_reward_pools(ctx, &pools)?;
            info!(
                target: LOG_TARGET,
                "No voting power, {} sent to foundation pool", fees
            );
            return Ok(());
        }

        // Pool taxes.
        let foundation_tax = fees.mul_dec_truncate(dynamic_foundation_tax);
        let taxable = fees.sub(&foundation_tax);
        let lp_share = taxable.mul_dec_truncate(&params.liquidity_providers_pool_tax);
        let treasury_share = taxable.mul_dec_truncate(&params.public_treasury_pool_tax);
        let harp_share = taxable.mul_dec_truncate(&params.harp_pool_tax);
        let validators_pool = taxable.sub(&lp_share).sub(&treasury_share).sub(&harp_share);

        pools.foundation = pools.foundation.add(&foundation_tax);
        pools.harp = pools.harp.add(&harp_share);
        pools.liquidity_providers = pools.liquidity_providers.add(&lp_share);
        let overflow = pools.append(
            PoolKind::PublicTreasury,
            &treasury_share,
            params.public_treasury_pool_capacity,
        );
        if !overflow.is_zero() {
            info!(
                target: LOG_TARGET,
                "Public treasury at capacity, {} rerouted to foundation pool", overflow
            );
        }

        // Liquidity providers: the whole pool, rollover included, by LP power.
        if total_lp_power > 0 {
            let lp_pool = std::mem::take(&mut pools.liquidity_providers);
            let mut lp_remaining = lp_pool.clone();
            let total_lp = Dec::from_u128(total_lp_power);
            for voter in voters.iter().filter(|v| v.lp_power > 0) {
                let fraction = Dec::from_u64(voter.lp_power).quo_truncate(&total_lp);
                let reward = lp_pool.mul_dec_truncate(&fraction);
                self.allocate_tokens_to_validator(ctx, &voter.validator, &DecCoins::zero(), &reward)?;
                lp_remaining = lp_remaining.sub(&reward);
            }
            pools.foundation = pools.foundation.add(&lp_remaining);
        } else {
            debug!(
                target: LOG_TARGET,
                "No LP power, liquidity providers pool rolls over: {}", pools.liquidity_providers
            );
        }

        // Validators pool: proposer bonus first, then every voter by power.
        let total = Dec::from_u128(total_power);
        let mut remaining = validators_pool.clone();
        let proposer_power = voters
            .iter()
            .find(|v| v.validator.consensus == *previous_proposer)
            .map(|v| v.power)
            .unwrap_or(0);
        let proposer_multiplier = &params.base_proposer_reward
            + &params
                .bonus_proposer_reward
                .mul_truncate(&Dec::from_u64(proposer_power).quo_truncate(&total));

        match self
            .staking()
            .validator_by_cons_addr(ctx, previous_proposer)
            .map_err(DistributionError::Staking)?
        {
            Some(proposer) => {
                let reward = validators_pool.mul_dec_truncate(&proposer_multiplier);
                self.allocate_tokens_to_validator(ctx, &proposer, &reward, &DecCoins::zero())?;
                remaining = remaining.sub(&reward);
            }
            None => {
                // The proposer can be gone already, e.g. unbonded within the
                // block it proposed. Its bonus stays in the remainder.
                warn!(
                    target: LOG_TARGET,
                    "Previous proposer {} not found, proposer reward goes to foundation pool",
                    previous_proposer
                );
            }
        }

        let vote_multiplier = Dec::one() - proposer_multiplier;
        let voters_pool = validators_pool.mul_dec_truncate(&vote_multiplier);
        for voter in &voters {
            let fraction = Dec::from_u64(voter.power).quo_truncate(&total);
            let reward = voters_pool.mul_dec_truncate(&fraction);
            self.allocate_tokens_to_validator(ctx, &voter.validator, &reward, &DecCoins::zero())?;
            remaining = remaining.sub(&reward);
        }

        pools.foundation = pools.foundation.add(&remaining);
        self.set_reward_pools(ctx, &pools)?;

        info!(
            target: LOG_TARGET,
            "Allocated {} at height {}: validators {}, foundation dust {}",
            fees,
            ctx.block_height(),
            validators_pool,
            remaining
        );
        Ok(())
    }
}
