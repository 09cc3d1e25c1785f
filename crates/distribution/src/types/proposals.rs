use crate::errors::{DistributionError, Result};
use crate::types::params::validate_tax_rates;
use meridian_types::{AccAddress, Coins, Dec};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_LENGTH: usize = 140;
pub const MAX_DESCRIPTION_LENGTH: usize = 10_000;

/// Governance proposals executed by the distribution module once passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Proposal {
    /// Pay `amount` out of the public treasury pool.
    PublicTreasuryPoolSpend {
        title: String,
        description: String,
        recipient: AccAddress,
        amount: Coins,
    },
    /// Replace all four pool tax rates at once.
    TaxParamsUpdate {
        title: String,
        description: String,
        validators_pool_tax: Dec,
        liquidity_providers_pool_tax: Dec,
        public_treasury_pool_tax: Dec,
        harp_pool_tax: Dec,
    },
}

fn validate_content(title: &str, description: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(DistributionError::InvalidProposal("title cannot be blank".into()));
    }
    if title.len() > MAX_TITLE_LENGTH {
        return Err(DistributionError::InvalidProposal(format!(
            "title longer than {MAX_TITLE_LENGTH} bytes"
        )));
    }
    if description.trim().is_empty() {
        return Err(DistributionError::InvalidProposal(
            "description cannot be blank".into(),
        ));
    }
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(DistributionError::InvalidProposal(format!(
            "description longer than {MAX_DESCRIPTION_LENGTH} bytes"
        )));
    }
    Ok(())
}

impl Proposal {
    pub fn title(&self) -> &str {
        match self {
            Proposal::PublicTreasuryPoolSpend { title, .. }
            | Proposal::TaxParamsUpdate { title, .. } => title,
        }
    }

    pub fn validate_basic(&self) -> Result<()> {
        match self {
            Proposal::PublicTreasuryPoolSpend {
                title,
                description,
                recipient,
                amount,
            } => {
                validate_content(title, description)?;
                if recipient.is_empty() {
                    return Err(DistributionError::InvalidProposal(
                        "empty recipient address".into(),
                    ));
                }
                amount
                    .validate()
                    .map_err(|e| DistributionError::InvalidProposal(e.to_string()))?;
                if amount.is_zero() {
                    return Err(DistributionError::InvalidProposal(
                        "spend amount must be positive".into(),
                    ));
                }
                Ok(())
            }
            Proposal::TaxParamsUpdate {
                title,
                description,
                validators_pool_tax,
                liquidity_providers_pool_tax,
                public_treasury_pool_tax,
                harp_pool_tax,
            } => {
                validate_content(title, description)?;
                validate_tax_rates(
                    validators_pool_tax,
                    liquidity_providers_pool_tax,
                    public_treasury_pool_tax,
                    harp_pool_tax,
                )
            }
        }
    }
}
