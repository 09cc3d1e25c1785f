//! Persisted ledger records.

use chrono::{DateTime, Utc};
use meridian_types::{Dec, DecCoins};
use serde::{Deserialize, Serialize};

/// Rewards accumulated by a validator in the still-open period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorCurrentRewards {
    pub rewards: DecCoins,
    pub lp_rewards: DecCoins,
    pub period: u64,
}

impl ValidatorCurrentRewards {
    pub fn empty(period: u64) -> Self {
        Self {
            rewards: DecCoins::zero(),
            lp_rewards: DecCoins::zero(),
            period,
        }
    }
}

/// Cumulative reward-per-token ratios at the end of a period.
///
/// `reference_count` counts the readers that still need this snapshot: the
/// next period of the validator, delegations that started here and slash
/// events that ended here. It never exceeds 2; the record is deleted when
/// it reaches 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorHistoricalRewards {
    pub cumulative_reward_ratio: DecCoins,
    pub cumulative_lp_reward_ratio: DecCoins,
    pub reference_count: u32,
}

impl ValidatorHistoricalRewards {
    pub fn new(
        cumulative_reward_ratio: DecCoins,
        cumulative_lp_reward_ratio: DecCoins,
        reference_count: u32,
    ) -> Self {
        Self {
            cumulative_reward_ratio,
            cumulative_lp_reward_ratio,
            reference_count,
        }
    }
}

/// Where a delegation started accruing rewards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorStartingInfo {
    pub previous_period: u64,
    pub stake: Dec,
    pub lp_stake: Dec,
    pub height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSlashEvent {
    pub validator_period: u64,
    pub fraction: Dec,
}

/// Reward lock of a validator. Locked validators get a distribution power
/// boost; their delegators cannot withdraw until the lock ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorLockedRewardsState {
    pub locked_ratio: Dec,
    pub locked_height: u64,
    pub locked_at: Option<DateTime<Utc>>,
    pub unlocks_at: Option<DateTime<Utc>>,
    pub auto_renewal: bool,
}

impl ValidatorLockedRewardsState {
    pub fn is_locked(&self) -> bool {
        self.unlocks_at.is_some()
    }

    pub fn is_mature(&self, now: &DateTime<Utc>) -> bool {
        self.unlocks_at.is_some_and(|at| at <= *now)
    }
}
