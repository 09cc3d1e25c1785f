use crate::errors::{DistributionError, Result};
use meridian_types::{AccAddress, Dec};
use serde::{Deserialize, Serialize};

/// Upper bound on the reward lock duration (100 years).
pub const MAX_LOCKED_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

mod amount_str {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Module parameters, persisted under [`crate::keys::PARAMS_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Share of the post-foundation remainder left to validators. Only used
    /// to check that the four rates sum to one: the validators pool is
    /// whatever the other taxes leave behind.
    pub validators_pool_tax: Dec,
    pub liquidity_providers_pool_tax: Dec,
    pub public_treasury_pool_tax: Dec,
    pub harp_pool_tax: Dec,
    pub base_proposer_reward: Dec,
    pub bonus_proposer_reward: Dec,
    /// Per-denomination ceiling of the public treasury pool.
    #[serde(with = "amount_str")]
    pub public_treasury_pool_capacity: u128,
    pub withdraw_addr_enabled: bool,
    /// Accounts allowed to withdraw from the foundation pool.
    pub foundation_nominees: Vec<AccAddress>,
    /// Distribution power boost granted while a validator's rewards are locked.
    pub locked_ratio: Dec,
    pub locked_duration_secs: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            validators_pool_tax: Dec::percent(60),
            liquidity_providers_pool_tax: Dec::percent(20),
            public_treasury_pool_tax: Dec::percent(15),
            harp_pool_tax: Dec::percent(5),
            base_proposer_reward: Dec::percent(1),
            bonus_proposer_reward: Dec::percent(4),
            public_treasury_pool_capacity: 250_000,
            withdraw_addr_enabled: true,
            foundation_nominees: Vec::new(),
            locked_ratio: Dec::percent(50),
            locked_duration_secs: 365 * 24 * 60 * 60,
        }
    }
}

fn check_unit_interval(name: &str, value: &Dec) -> Result<()> {
    if value.is_negative() {
        return Err(DistributionError::InvalidParams(format!(
            "{name} must not be negative: {value}"
        )));
    }
    if value > &Dec::one() {
        return Err(DistributionError::InvalidParams(format!(
            "{name} too large: {value}"
        )));
    }
    Ok(())
}

/// The four pool tax rates must add up to exactly one.
pub fn validate_tax_rates(
    validators_pool_tax: &Dec,
    liquidity_providers_pool_tax: &Dec,
    public_treasury_pool_tax: &Dec,
    harp_pool_tax: &Dec,
) -> Result<()> {
    check_unit_interval("validators pool tax", validators_pool_tax)?;
    check_unit_interval("liquidity providers pool tax", liquidity_providers_pool_tax)?;
    check_unit_interval("public treasury pool tax", public_treasury_pool_tax)?;
    check_unit_interval("HARP pool tax", harp_pool_tax)?;

    let sum = validators_pool_tax.clone()
        + liquidity_providers_pool_tax.clone()
        + public_treasury_pool_tax.clone()
        + harp_pool_tax.clone();
    if sum != Dec::one() {
        return Err(DistributionError::TaxRatesNotNormalized(sum));
    }
    Ok(())
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        validate_tax_rates(
            &self.validators_pool_tax,
            &self.liquidity_providers_pool_tax,
            &self.public_treasury_pool_tax,
            &self.harp_pool_tax,
        )?;

        check_unit_interval("base proposer reward", &self.base_proposer_reward)?;
        check_unit_interval("bonus proposer reward", &self.bonus_proposer_reward)?;
        let proposer_total = &self.base_proposer_reward + &self.bonus_proposer_reward;
        if proposer_total > Dec::one() {
            return Err(DistributionError::InvalidParams(format!(
                "base and bonus proposer reward exceed one: {proposer_total}"
            )));
        }

        check_unit_interval("locked ratio", &self.locked_ratio)?;
        if self.locked_duration_secs == 0 || self.locked_duration_secs > MAX_LOCKED_DURATION_SECS {
            return Err(DistributionError::InvalidParams(format!(
                "locked duration out of range: {}s",
                self.locked_duration_secs
            )));
        }

        for nominee in &self.foundation_nominees {
            if nominee.is_empty() {
                return Err(DistributionError::InvalidParams(
                    "empty foundation nominee address".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn is_foundation_nominee(&self, addr: &AccAddress) -> bool {
        self.foundation_nominees.contains(addr)
    }
}
