//! Capabilities the distribution keeper needs from other modules.
//!
//! The staking and supply modules are consumed only through these traits,
//! injected when the [`crate::Keeper`] is built. Implementations report
//! failures as `anyhow::Error`; the keeper wraps them in
//! [`crate::DistributionError::Staking`] / [`crate::DistributionError::Supply`].

use anyhow::Result;
use meridian_storage::Context;
use meridian_types::{AccAddress, Coins, ConsAddress, Dec, ValAddress};
use serde::{Deserialize, Serialize};

/// Read-only view of a staking validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub operator: ValAddress,
    pub consensus: ConsAddress,
    /// Bonded tokens, including slashed-away amounts already removed.
    pub tokens: u128,
    /// Liquidity-provider tokens backing the validator.
    pub lp_tokens: u128,
    pub delegator_shares: Dec,
    pub commission_rate: Dec,
    pub jailed: bool,
}

impl ValidatorInfo {
    /// Tokens represented by `shares`, rounding half to even.
    pub fn tokens_from_shares(&self, shares: &Dec) -> Dec {
        self.share_value(shares, self.tokens, false)
    }

    /// Tokens represented by `shares`, rounding toward zero.
    pub fn tokens_from_shares_truncated(&self, shares: &Dec) -> Dec {
        self.share_value(shares, self.tokens, true)
    }

    pub fn lp_tokens_from_shares(&self, shares: &Dec) -> Dec {
        self.share_value(shares, self.lp_tokens, false)
    }

    pub fn lp_tokens_from_shares_truncated(&self, shares: &Dec) -> Dec {
        self.share_value(shares, self.lp_tokens, true)
    }

    fn share_value(&self, shares: &Dec, amount: u128, truncate: bool) -> Dec {
        if self.delegator_shares.is_zero() {
            return Dec::zero();
        }
        let scaled = shares.mul_int(amount);
        if truncate {
            scaled.quo_truncate(&self.delegator_shares)
        } else {
            scaled.quo(&self.delegator_shares)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationInfo {
    pub delegator: AccAddress,
    pub validator: ValAddress,
    pub shares: Dec,
}

/// Interface to the staking module.
pub trait StakingKeeper: Send + Sync {
    fn validator(&self, ctx: &Context<'_>, operator: &ValAddress) -> Result<Option<ValidatorInfo>>;

    fn validator_by_cons_addr(
        &self,
        ctx: &Context<'_>,
        consensus: &ConsAddress,
    ) -> Result<Option<ValidatorInfo>>;

    fn delegation(
        &self,
        ctx: &Context<'_>,
        delegator: &AccAddress,
        validator: &ValAddress,
    ) -> Result<Option<DelegationInfo>>;

    fn delegator_delegations(
        &self,
        ctx: &Context<'_>,
        delegator: &AccAddress,
    ) -> Result<Vec<DelegationInfo>>;

    fn validator_delegations(
        &self,
        ctx: &Context<'_>,
        validator: &ValAddress,
    ) -> Result<Vec<DelegationInfo>>;

    /// Every validator, ordered by operator address.
    fn validators(&self, ctx: &Context<'_>) -> Result<Vec<ValidatorInfo>>;

    /// Every delegation, ordered by (delegator, validator).
    fn delegations(&self, ctx: &Context<'_>) -> Result<Vec<DelegationInfo>>;

    fn jail(&self, ctx: &Context<'_>, consensus: &ConsAddress) -> Result<()>;

    /// Slash `fraction` of the validator's stake for an infraction at
    /// `infraction_height`. Returns the amount of bonded tokens burned.
    fn slash(
        &self,
        ctx: &Context<'_>,
        consensus: &ConsAddress,
        infraction_height: u64,
        fraction: &Dec,
    ) -> Result<u128>;

    /// Fraction of rewards routed by LP power rather than bonded power.
    fn lp_distribution_ratio(&self, ctx: &Context<'_>) -> Result<Dec>;

    /// Largest share of total bonded stake a single validator may hold.
    fn max_delegations_ratio(&self, ctx: &Context<'_>) -> Result<Dec>;

    fn total_bonded_tokens(&self, ctx: &Context<'_>) -> Result<u128>;
}

/// Interface to the supply (bank) module.
pub trait SupplyKeeper: Send + Sync {
    /// Address of the module account `name`.
    fn module_address(&self, name: &str) -> AccAddress {
        meridian_types::module_address(name)
    }

    fn balance(&self, ctx: &Context<'_>, addr: &AccAddress) -> Result<Coins>;

    fn send_coins_from_module_to_module(
        &self,
        ctx: &Context<'_>,
        sender_module: &str,
        recipient_module: &str,
        amount: &Coins,
    ) -> Result<()>;

    fn send_coins_from_module_to_account(
        &self,
        ctx: &Context<'_>,
        sender_module: &str,
        recipient: &AccAddress,
        amount: &Coins,
    ) -> Result<()>;

    fn send_coins_from_account_to_module(
        &self,
        ctx: &Context<'_>,
        sender: &AccAddress,
        recipient_module: &str,
        amount: &Coins,
    ) -> Result<()>;

    fn mint_coins(&self, ctx: &Context<'_>, module: &str, amount: &Coins) -> Result<()>;

    fn burn_coins(&self, ctx: &Context<'_>, module: &str, amount: &Coins) -> Result<()>;
}
