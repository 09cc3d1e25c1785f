use meridian_types::{Dec, DecCoins};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named pools fed by the per-block tax split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    LiquidityProviders,
    Foundation,
    PublicTreasury,
    Harp,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolKind::LiquidityProviders => "liquidity providers",
            PoolKind::Foundation => "foundation",
            PoolKind::PublicTreasury => "public treasury",
            PoolKind::Harp => "HARP",
        };
        f.write_str(name)
    }
}

/// Balances of the four pools. Together with every validator's outstanding
/// rewards they account for the whole distribution module balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPools {
    pub liquidity_providers: DecCoins,
    pub foundation: DecCoins,
    pub public_treasury: DecCoins,
    pub harp: DecCoins,
}

impl RewardPools {
    pub fn get(&self, kind: PoolKind) -> &DecCoins {
        match kind {
            PoolKind::LiquidityProviders => &self.liquidity_providers,
            PoolKind::Foundation => &self.foundation,
            PoolKind::PublicTreasury => &self.public_treasury,
            PoolKind::Harp => &self.harp,
        }
    }

    pub fn get_mut(&mut self, kind: PoolKind) -> &mut DecCoins {
        match kind {
            PoolKind::LiquidityProviders => &mut self.liquidity_providers,
            PoolKind::Foundation => &mut self.foundation,
            PoolKind::PublicTreasury => &mut self.public_treasury,
            PoolKind::Harp => &mut self.harp,
        }
    }

    /// Sum of all four pools.
    pub fn total(&self) -> DecCoins {
        self.liquidity_providers
            .add(&self.foundation)
            .add(&self.public_treasury)
            .add(&self.harp)
    }

    pub fn is_any_negative(&self) -> bool {
        [
            &self.liquidity_providers,
            &self.foundation,
            &self.public_treasury,
            &self.harp,
        ]
        .iter()
        .any(|pool| pool.is_any_negative())
    }

    /// Credit `coins` to `kind`. The public treasury never holds more than
    /// `treasury_capacity` of any denomination; the overflow lands in the
    /// foundation pool. Returns the overflow.
    pub fn append(&mut self, kind: PoolKind, coins: &DecCoins, treasury_capacity: u128) -> DecCoins {
        if kind != PoolKind::PublicTreasury {
            let pool = self.get_mut(kind);
            *pool = pool.add(coins);
            return DecCoins::zero();
        }

        let filled = self.public_treasury.add(coins);
        let capacity = Dec::from_u128(treasury_capacity);
        let overflow = filled
            .iter()
            .filter(|coin| coin.amount > capacity)
            .fold(DecCoins::zero(), |acc, coin| {
                acc.add(&DecCoins::from_dec_coin(
                    coin.denom.clone(),
                    &coin.amount - &capacity,
                ))
            });

        self.public_treasury = filled.sub(&overflow);
        self.foundation = self.foundation.add(&overflow);
        overflow
    }

    /// Debit `coins` from `kind`, or `None` if the pool cannot cover them.
    pub fn checked_debit(&mut self, kind: PoolKind, coins: &DecCoins) -> Option<()> {
        let pool = self.get_mut(kind);
        *pool = pool.checked_sub(coins)?;
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stake(amount: u128) -> DecCoins {
        DecCoins::from_dec_coin("stake", Dec::from_u128(amount))
    }

    #[test]
    fn test_treasury_overflow_goes_to_foundation() {
        let mut pools = RewardPools::default();
        let overflow = pools.append(PoolKind::PublicTreasury, &stake(100), 60);
        assert_eq!(overflow, stake(40));
        assert_eq!(pools.public_treasury, stake(60));
        assert_eq!(pools.foundation, stake(40));
        assert_eq!(pools.total(), stake(100));
    }

    #[test]
    fn test_append_below_capacity_keeps_everything() {
        let mut pools = RewardPools::default();
        pools.append(PoolKind::PublicTreasury, &stake(10), 60);
        pools.append(PoolKind::Harp, &stake(3), 60);
        assert_eq!(pools.public_treasury, stake(10));
        assert_eq!(pools.harp, stake(3));
        assert!(pools.foundation.is_zero());
    }

    #[test]
    fn test_checked_debit_refuses_overdraft() {
        let mut pools = RewardPools::default();
        pools.append(PoolKind::Foundation, &stake(5), 0);
        assert!(pools.checked_debit(PoolKind::Foundation, &stake(6)).is_none());
        assert_eq!(pools.foundation, stake(5));
        assert!(pools.checked_debit(PoolKind::Foundation, &stake(5)).is_some());
        assert!(pools.foundation.is_zero());
    }
}
