//! Read-only queries, answered as JSON.
//!
//! Reward queries end the validator's period to see rewards accrued in the
//! current one. They run against an isolated view of the store so nothing
//! they touch is persisted.

use super::{Keeper, LOG_TARGET};
use crate::errors::{DistributionError, Result};
use crate::expected_keepers::{DelegationInfo, ValidatorInfo};
use crate::types::{ValidatorLockedRewardsState, ValidatorSlashEvent};
use meridian_storage::{Context, StorageError};
use meridian_types::{AccAddress, DecCoins, ValAddress};
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum QueryRequest {
    Params,
    Pools,
    ValidatorOutstandingRewards {
        validator: ValAddress,
    },
    ValidatorCommission {
        validator: ValAddress,
    },
    /// Slash events with `starting_height <= height <= ending_height`.
    ValidatorSlashes {
        validator: ValAddress,
        starting_height: u64,
        ending_height: u64,
    },
    DelegationRewards {
        delegator: AccAddress,
        validator: ValAddress,
    },
    DelegatorTotalRewards {
        delegator: AccAddress,
    },
    DelegatorValidators {
        delegator: AccAddress,
    },
    WithdrawAddress {
        delegator: AccAddress,
    },
    LockedRewardsState {
        validator: ValAddress,
    },
    RewardsBankBalance {
        delegator: AccAddress,
    },
}

/// Pending rewards of one delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRewardsResponse {
    /// Accrued in the validator's reward pool.
    pub current: DecCoins,
    /// Already settled into the delegator's rewards bank.
    pub bank: DecCoins,
    pub total: DecCoins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationDelegatorReward {
    pub validator: ValAddress,
    pub reward: DecCoins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorTotalRewardsResponse {
    pub rewards: Vec<DelegationDelegatorReward>,
    /// Sum over all delegations plus the rewards bank balance.
    pub total: DecCoins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SlashEventEntry {
    height: u64,
    event: ValidatorSlashEvent,
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value).map_err(StorageError::from)?)
}

impl Keeper {
    /// Answer a query with its JSON-encoded response.
    pub fn query(&self, ctx: &Context<'_>, request: &QueryRequest) -> Result<Vec<u8>> {
        trace!(target: LOG_TARGET, "query: {:?}", request);
        match request {
            QueryRequest::Params => to_json(&self.get_params(ctx)?),
            QueryRequest::Pools => to_json(&self.get_reward_pools(ctx)?),
            QueryRequest::ValidatorOutstandingRewards { validator } => {
                to_json(&self.get_validator_outstanding_rewards(ctx, validator)?)
            }
            QueryRequest::ValidatorCommission { validator } => {
                to_json(&self.get_validator_accumulated_commission(ctx, validator)?)
            }
            QueryRequest::ValidatorSlashes {
                validator,
                starting_height,
                ending_height,
            } => {
                let events: Vec<SlashEventEntry> = self
                    .get_validator_slash_events_between(
                        ctx,
                        validator,
                        *starting_height,
                        *ending_height,
                    )?
                    .into_iter()
                    .map(|(height, event)| SlashEventEntry { height, event })
                    .collect();
                to_json(&events)
            }
            QueryRequest::DelegationRewards {
                delegator,
                validator,
            } => to_json(&self.query_delegation_rewards(ctx, delegator, validator)?),
            QueryRequest::DelegatorTotalRewards { delegator } => {
                to_json(&self.query_delegator_total_rewards(ctx, delegator)?)
            }
            QueryRequest::DelegatorValidators { delegator } => {
                let validators: Vec<ValAddress> = self
                    .staking()
                    .delegator_delegations(ctx, delegator)
                    .map_err(DistributionError::Staking)?
                    .into_iter()
                    .map(|d| d.validator)
                    .collect();
                to_json(&validators)
            }
            QueryRequest::WithdrawAddress { delegator } => {
                to_json(&self.get_delegator_withdraw_addr(ctx, delegator)?)
            }
            QueryRequest::LockedRewardsState { validator } => {
                let state: ValidatorLockedRewardsState = self
                    .get_validator_locked_state(ctx, validator)?
                    .unwrap_or_default();
                to_json(&state)
            }
            QueryRequest::RewardsBankBalance { delegator } => {
                to_json(&self.get_delegator_rewards_bank_coins(ctx, delegator)?)
            }
        }
    }

    /// Current and banked rewards of a single delegation.
    pub fn query_delegation_rewards(
        &self,
        ctx: &Context<'_>,
        delegator: &AccAddress,
        validator: &ValAddress,
    ) -> Result<DelegationRewardsResponse> {
        let val = self.require_validator(ctx, validator)?;
        let del = self.require_delegation(ctx, delegator, validator)?;
        let current = self.pending_rewards(ctx, &val, &del)?;
        let bank = self.get_delegator_rewards_bank_coins(ctx, delegator)?.to_dec_coins();
        let total = current.add(&bank);
        Ok(DelegationRewardsResponse {
            current,
            bank,
            total,
        })
    }

    /// Pending rewards across every delegation of `delegator`.
    pub fn query_delegator_total_rewards(
        &self,
        ctx: &Context<'_>,
        delegator: &AccAddress,
    ) -> Result<DelegatorTotalRewardsResponse> {
        let delegations = self
            .staking()
            .delegator_delegations(ctx, delegator)
            .map_err(DistributionError::Staking)?;

        let mut rewards = Vec::with_capacity(delegations.len());
        let mut total = DecCoins::zero();
        for del in delegations {
            let val = self.require_validator(ctx, &del.validator)?;
            let reward = self.pending_rewards(ctx, &val, &del)?;
            total = total.add(&reward);
            rewards.push(DelegationDelegatorReward {
                validator: del.validator,
                reward,
            });
        }
        let bank = self.get_delegator_rewards_bank_coins(ctx, delegator)?;
        total = total.add(&bank.to_dec_coins());

        Ok(DelegatorTotalRewardsResponse { rewards, total })
    }

    fn pending_rewards(
        &self,
        ctx: &Context<'_>,
        val: &ValidatorInfo,
        del: &DelegationInfo,
    ) -> Result<DecCoins> {
        ctx.isolated(|scratch| {
            let ending_period = self.increment_validator_period(scratch, val)?;
            self.calculate_delegation_rewards(scratch, val, del, ending_period)
        })
    }
}
