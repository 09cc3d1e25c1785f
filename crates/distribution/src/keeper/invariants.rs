//! Ledger invariants.
//!
//! Each check returns a report instead of failing; callers decide whether a
//! broken invariant halts the chain.

use super::validator::MAX_REFERENCE_COUNT;
use super::{Keeper, LOG_TARGET};
use crate::errors::{DistributionError, Result};
use meridian_storage::Context;
use meridian_types::{Coins, DecCoins};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantReport {
    pub name: String,
    pub broken: bool,
    pub message: String,
}

impl InvariantReport {
    fn new(name: &str, broken: bool, message: String) -> Self {
        if broken {
            error!(target: LOG_TARGET, "Invariant {} broken: {}", name, message);
        }
        Self {
            name: name.to_string(),
            broken,
            message,
        }
    }
}

impl Keeper {
    /// Run every invariant and return the first broken one, or the last
    /// passing report when all hold.
    pub fn all_invariants(&self, ctx: &Context<'_>) -> Result<InvariantReport> {
        let checks: [fn(&Keeper, &Context<'_>) -> Result<InvariantReport>; 5] = [
            Keeper::nonnegative_outstanding_invariant,
            Keeper::can_withdraw_invariant,
            Keeper::reference_count_invariant,
            Keeper::module_account_invariant,
            Keeper::rewards_bank_invariant,
        ];
        let mut last = InvariantReport::new("all", false, String::new());
        for check in checks {
            let report = check(self, ctx)?;
            if report.broken {
                return Ok(report);
            }
            last = report;
        }
        Ok(last)
    }

    /// No validator's outstanding rewards are negative.
    pub fn nonnegative_outstanding_invariant(&self, ctx: &Context<'_>) -> Result<InvariantReport> {
        let mut message = String::new();
        let mut count = 0;
        for (addr, outstanding) in
            self.iterate_by_address::<DecCoins>(ctx, crate::keys::OUTSTANDING_REWARDS_PREFIX)?
        {
            if outstanding.is_any_negative() {
                count += 1;
                message.push_str(&format!(
                    "\t{} has negative outstanding coins: {}\n",
                    meridian_types::ValAddress::new(addr),
                    outstanding
                ));
            }
        }
        Ok(InvariantReport::new(
            "nonnegative outstanding",
            count != 0,
            format!("found {count} validators with negative outstanding rewards\n{message}"),
        ))
    }

    /// Paying out every commission and every delegation leaves no validator
    /// with negative outstanding rewards. Runs on a scratch view of the store.
    pub fn can_withdraw_invariant(&self, ctx: &Context<'_>) -> Result<InvariantReport> {
        let remaining = ctx.isolated(|scratch| -> Result<Vec<(String, DecCoins)>> {
            let validators = self
                .staking()
                .validators(scratch)
                .map_err(DistributionError::Staking)?;

            for val in &validators {
                match self.withdraw_validator_commission(scratch, &val.operator) {
                    Ok(_) | Err(DistributionError::NoValidatorCommission(_)) => {}
                    Err(err) => return Err(err),
                }
                let delegations = self
                    .staking()
                    .validator_delegations(scratch, &val.operator)
                    .map_err(DistributionError::Staking)?;
                for del in &delegations {
                    self.withdraw_delegation_rewards_raw(scratch, val, del)?;
                }
            }

            let mut negative = Vec::new();
            for val in &validators {
                let outstanding = self.get_validator_outstanding_rewards(scratch, &val.operator)?;
                if outstanding.is_any_negative() {
                    negative.push((val.operator.to_string(), outstanding));
                }
            }
            Ok(negative)
        })?;

        let message = remaining
            .iter()
            .map(|(val, coins)| format!("\t{val} left with {coins}\n"))
            .collect::<String>();
        Ok(InvariantReport::new(
            "can withdraw",
            !remaining.is_empty(),
            format!(
                "{} validators with negative outstanding after withdrawing everything\n{message}",
                remaining.len()
            ),
        ))
    }

    /// Historical reference counts add up to one per validator, delegation
    /// and slash event, and every count lies in `1..=2`.
    pub fn reference_count_invariant(&self, ctx: &Context<'_>) -> Result<InvariantReport> {
        let validators = self
            .staking()
            .validators(ctx)
            .map_err(DistributionError::Staking)?
            .len() as u64;
        let delegations = self
            .staking()
            .delegations(ctx)
            .map_err(DistributionError::Staking)?
            .len() as u64;
        let slashes = self.iterate_slash_events(ctx)?.len() as u64;
        let expected = validators + delegations + slashes;

        let mut actual: u64 = 0;
        let mut out_of_range = Vec::new();
        for (val, period, historical) in self.iterate_historical_rewards(ctx)? {
            actual += u64::from(historical.reference_count);
            if !(1..=MAX_REFERENCE_COUNT).contains(&historical.reference_count) {
                out_of_range.push(format!(
                    "\t{val} period {period} count {}\n",
                    historical.reference_count
                ));
            }
        }

        let broken = actual != expected || !out_of_range.is_empty();
        Ok(InvariantReport::new(
            "reference count",
            broken,
            format!(
                "expected {expected} references ({validators} validators, {delegations} \
                 delegations, {slashes} slashes), found {actual}\n{}",
                out_of_range.concat()
            ),
        ))
    }

    /// The custody account holds the pools plus every validator's
    /// outstanding rewards, truncated to whole coins.
    pub fn module_account_invariant(&self, ctx: &Context<'_>) -> Result<InvariantReport> {
        let mut expected = self.get_reward_pools(ctx)?.total();
        for (_, outstanding) in
            self.iterate_by_address::<DecCoins>(ctx, crate::keys::OUTSTANDING_REWARDS_PREFIX)?
        {
            expected = expected.add(&outstanding);
        }
        let (expected_coins, _) = expected.truncate_decimal();
        let balance = self
            .supply()
            .balance(ctx, &self.module_address())
            .map_err(DistributionError::Supply)?;

        Ok(InvariantReport::new(
            "module account",
            balance != expected_coins,
            format!("module balance {balance}, pools plus outstanding {expected}"),
        ))
    }

    /// The rewards bank account holds exactly the per-delegator ledger.
    pub fn rewards_bank_invariant(&self, ctx: &Context<'_>) -> Result<InvariantReport> {
        let expected = self
            .iterate_rewards_bank(ctx)?
            .into_iter()
            .fold(Coins::empty(), |acc, (_, coins)| acc.add(&coins));
        let balance = self
            .supply()
            .balance(ctx, &self.rewards_bank_address())
            .map_err(DistributionError::Supply)?;

        Ok(InvariantReport::new(
            "rewards bank",
            balance != expected,
            format!("rewards bank balance {balance}, ledger {expected}"),
        ))
    }
}
