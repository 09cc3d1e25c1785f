//! Distribution keeper
//!
//! The keeper owns every distribution record in the store and talks to the
//! staking and supply modules through the capability traits in
//! [`crate::expected_keepers`]. Its operations are split by concern:
//!
//! - `pools`: pool balances and transfers out of them
//! - `allocation`: per-block fee intake and apportionment
//! - `validator`: period ledger, commission and validator lifecycle
//! - `delegation`: delegation reward calculation and withdrawal
//! - `rewards_bank` / `rewards_lock`: escrow and the lock scheduler
//! - `hooks`, `querier`, `genesis`, `invariants`

mod allocation;
mod delegation;
mod genesis;
mod hooks;
mod invariants;
mod pools;
mod querier;
mod rewards_bank;
mod rewards_lock;
mod store;
mod validator;

#[cfg(test)]
mod tests;

pub use allocation::{BeginBlockRequest, VoteInfo};
pub use hooks::StakingHooks;
pub use invariants::InvariantReport;
pub use querier::{
    DelegationDelegatorReward, DelegationRewardsResponse, DelegatorTotalRewardsResponse,
    QueryRequest,
};

use crate::config::DistributionConfig;
use crate::errors::{DistributionError, Result};
use crate::expected_keepers::{DelegationInfo, StakingKeeper, SupplyKeeper, ValidatorInfo};
use meridian_storage::Context;
use meridian_types::{AccAddress, ValAddress};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Log target shared by every distribution event.
pub(crate) const LOG_TARGET: &str = "distribution";

pub struct Keeper {
    config: DistributionConfig,
    staking: Arc<dyn StakingKeeper>,
    supply: Arc<dyn SupplyKeeper>,
    /// Module accounts that may not receive withdrawals or spends.
    blacklist: BTreeSet<AccAddress>,
}

impl Keeper {
    pub fn new(
        config: DistributionConfig,
        staking: Arc<dyn StakingKeeper>,
        supply: Arc<dyn SupplyKeeper>,
    ) -> Self {
        let blacklist = config
            .blacklisted_modules
            .iter()
            .map(|name| supply.module_address(name))
            .collect();
        Self {
            config,
            staking,
            supply,
            blacklist,
        }
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Custody account holding every pool and all outstanding rewards.
    pub fn module_address(&self) -> AccAddress {
        self.supply.module_address(&self.config.module_name)
    }

    pub fn rewards_bank_address(&self) -> AccAddress {
        self.supply.module_address(&self.config.rewards_bank_name)
    }

    pub fn fee_collector_address(&self) -> AccAddress {
        self.supply.module_address(&self.config.fee_collector_name)
    }

    pub fn is_blacklisted(&self, addr: &AccAddress) -> bool {
        self.blacklist.contains(addr)
    }

    pub(crate) fn staking(&self) -> &dyn StakingKeeper {
        self.staking.as_ref()
    }

    pub(crate) fn supply(&self) -> &dyn SupplyKeeper {
        self.supply.as_ref()
    }

    pub(crate) fn module_name(&self) -> &str {
        &self.config.module_name
    }

    pub(crate) fn rewards_bank_name(&self) -> &str {
        &self.config.rewards_bank_name
    }

    pub(crate) fn fee_collector_name(&self) -> &str {
        &self.config.fee_collector_name
    }

    /// Look up a validator, failing with `NoValidatorExists` if unknown.
    pub(crate) fn require_validator(
        &self,
        ctx: &Context<'_>,
        operator: &ValAddress,
    ) -> Result<ValidatorInfo> {
        self.staking
            .validator(ctx, operator)
            .map_err(DistributionError::Staking)?
            .ok_or(DistributionError::NoValidatorExists(*operator))
    }

    pub(crate) fn require_delegation(
        &self,
        ctx: &Context<'_>,
        delegator: &AccAddress,
        validator: &ValAddress,
    ) -> Result<DelegationInfo> {
        self.staking
            .delegation(ctx, delegator, validator)
            .map_err(DistributionError::Staking)?
            .ok_or(DistributionError::NoDelegationExists {
                delegator: *delegator,
                validator: *validator,
            })
    }
}
