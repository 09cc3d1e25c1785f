//! Reward pool bookkeeping.
//!
//! Pool balances are ledger entries backed by the distribution module
//! account: crediting a pool never moves coins, paying out of one always does.

use super::{Keeper, LOG_TARGET};
use crate::errors::{DistributionError, Result};
use crate::types::PoolKind;
use meridian_storage::Context;
use meridian_types::{AccAddress, Coins, DecCoins};
use tracing::{debug, info};

impl Keeper {
    /// Credit `coins` to `pool`. Public treasury overflow above capacity is
    /// rerouted to the foundation pool.
    pub fn append_to(&self, ctx: &Context<'_>, pool: PoolKind, coins: &DecCoins) -> Result<()> {
        if coins.is_zero() {
            return Ok(());
        }
        let params = self.get_params(ctx)?;
        let mut pools = self.get_reward_pools(ctx)?;
        let overflow = pools.append(pool, coins, params.public_treasury_pool_capacity);
        self.set_reward_pools(ctx, &pools)?;

        debug!(target: LOG_TARGET, "Appended {} to {} pool", coins, pool);
        if !overflow.is_zero() {
            info!(
                target: LOG_TARGET,
                "Public treasury at capacity, {} rerouted to foundation pool",
                overflow
            );
        }
        Ok(())
    }

    /// Pay integral `amount` out of `pool` to `recipient`.
    pub fn distribute_from_pool_to_wallet(
        &self,
        ctx: &Context<'_>,
        pool: PoolKind,
        recipient: &AccAddress,
        amount: &Coins,
    ) -> Result<()> {
        let requested = amount.to_dec_coins();
        let mut pools = self.get_reward_pools(ctx)?;
        let available = pools.get(pool).clone();
        if pools.checked_debit(pool, &requested).is_none() {
            return Err(DistributionError::InsufficientPoolFunds {
                pool,
                available,
                requested,
            });
        }

        self.supply()
            .send_coins_from_module_to_account(ctx, self.module_name(), recipient, amount)
            .map_err(DistributionError::Supply)?;
        self.set_reward_pools(ctx, &pools)?;

        info!(
            target: LOG_TARGET,
            "Paid {} from {} pool to {}", amount, pool, recipient
        );
        Ok(())
    }

    /// Move `amount` between two pools. No coins leave the module account.
    ///
    /// # Panics
    /// If the combined pool balance changes, which can only be a ledger bug.
    pub fn distribute_from_pool_to_pool(
        &self,
        ctx: &Context<'_>,
        from: PoolKind,
        to: PoolKind,
        amount: &DecCoins,
    ) -> Result<()> {
        let params = self.get_params(ctx)?;
        let mut pools = self.get_reward_pools(ctx)?;
        let before = pools.total();

        let available = pools.get(from).clone();
        if pools.checked_debit(from, amount).is_none() {
            return Err(DistributionError::InsufficientPoolFunds {
                pool: from,
                available,
                requested: amount.clone(),
            });
        }
        pools.append(to, amount, params.public_treasury_pool_capacity);

        let after = pools.total();
        if before != after {
            panic!("pool transfer changed total pool balance: {before} before, {after} after");
        }

        self.set_reward_pools(ctx, &pools)?;
        info!(target: LOG_TARGET, "Moved {} from {} pool to {} pool", amount, from, to);
        Ok(())
    }

    /// Deposit `amount` from `depositor` into the public treasury pool.
    pub fn fund_public_treasury_pool(
        &self,
        ctx: &Context<'_>,
        depositor: &AccAddress,
        amount: &Coins,
    ) -> Result<()> {
        self.supply()
            .send_coins_from_account_to_module(ctx, depositor, self.module_name(), amount)
            .map_err(DistributionError::Supply)?;
        self.append_to(ctx, PoolKind::PublicTreasury, &amount.to_dec_coins())?;
        info!(
            target: LOG_TARGET,
            "{} funded public treasury pool with {}", depositor, amount
        );
        Ok(())
    }
}
