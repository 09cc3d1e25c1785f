//! Genesis import/export representation of the distribution state.

use crate::errors::{DistributionError, Result};
use crate::types::params::Params;
use crate::types::pools::RewardPools;
use crate::types::records::{
    DelegatorStartingInfo, ValidatorCurrentRewards, ValidatorHistoricalRewards,
    ValidatorLockedRewardsState, ValidatorSlashEvent,
};
use meridian_types::{AccAddress, Coins, ConsAddress, Dec, DecCoins, ValAddress};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorWithdrawInfo {
    pub delegator: AccAddress,
    pub withdraw_address: AccAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorOutstandingRewardsRecord {
    pub validator: ValAddress,
    pub outstanding_rewards: DecCoins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorAccumulatedCommissionRecord {
    pub validator: ValAddress,
    pub accumulated: DecCoins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorHistoricalRewardsRecord {
    pub validator: ValAddress,
    pub period: u64,
    pub rewards: ValidatorHistoricalRewards,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorCurrentRewardsRecord {
    pub validator: ValAddress,
    pub rewards: ValidatorCurrentRewards,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorStartingInfoRecord {
    pub delegator: AccAddress,
    pub validator: ValAddress,
    pub starting_info: DelegatorStartingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSlashEventRecord {
    pub validator: ValAddress,
    pub height: u64,
    pub period: u64,
    pub event: ValidatorSlashEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorLockedRewardsRecord {
    pub validator: ValAddress,
    pub state: ValidatorLockedRewardsState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorRewardsBankRecord {
    pub delegator: AccAddress,
    pub coins: Coins,
}

/// Full distribution state. The unlock queue is not exported: it is rebuilt
/// from the locked states on import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisState {
    pub params: Params,
    pub pools: RewardPools,
    pub previous_proposer: ConsAddress,
    pub delegator_withdraw_infos: Vec<DelegatorWithdrawInfo>,
    pub outstanding_rewards: Vec<ValidatorOutstandingRewardsRecord>,
    pub accumulated_commissions: Vec<ValidatorAccumulatedCommissionRecord>,
    pub historical_rewards: Vec<ValidatorHistoricalRewardsRecord>,
    pub current_rewards: Vec<ValidatorCurrentRewardsRecord>,
    pub delegator_starting_infos: Vec<DelegatorStartingInfoRecord>,
    pub slash_events: Vec<ValidatorSlashEventRecord>,
    pub locked_rewards: Vec<ValidatorLockedRewardsRecord>,
    pub rewards_bank: Vec<DelegatorRewardsBankRecord>,
}

fn invalid(msg: impl Into<String>) -> DistributionError {
    DistributionError::InvalidGenesis(msg.into())
}

/// Stateless sanity checks of a genesis document.
pub fn validate_genesis(state: &GenesisState) -> Result<()> {
    state.params.validate()?;

    if state.pools.is_any_negative() {
        return Err(invalid("negative reward pool"));
    }

    let mut seen = BTreeSet::new();
    for record in &state.outstanding_rewards {
        if record.outstanding_rewards.is_any_negative() {
            return Err(invalid(format!(
                "negative outstanding rewards for {}",
                record.validator
            )));
        }
        if !seen.insert(record.validator) {
            return Err(invalid(format!(
                "duplicate outstanding rewards for {}",
                record.validator
            )));
        }
    }

    for record in &state.accumulated_commissions {
        if record.accumulated.is_any_negative() {
            return Err(invalid(format!(
                "negative commission for {}",
                record.validator
            )));
        }
    }

    for record in &state.historical_rewards {
        if !(1..=2).contains(&record.rewards.reference_count) {
            return Err(invalid(format!(
                "historical rewards of {} period {} has reference count {}",
                record.validator, record.period, record.rewards.reference_count
            )));
        }
    }

    for record in &state.current_rewards {
        if record.rewards.period == 0 {
            return Err(invalid(format!(
                "current rewards of {} at period 0",
                record.validator
            )));
        }
    }

    for record in &state.slash_events {
        let fraction = &record.event.fraction;
        if fraction.is_negative() || fraction > &Dec::one() {
            return Err(invalid(format!(
                "slash fraction {} of {} out of range",
                fraction, record.validator
            )));
        }
    }

    for record in &state.rewards_bank {
        record
            .coins
            .validate()
            .map_err(|e| invalid(format!("rewards bank of {}: {e}", record.delegator)))?;
    }

    Ok(())
}
