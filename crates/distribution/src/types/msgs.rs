use crate::errors::{DistributionError, Result};
use meridian_types::{AccAddress, Coins, ValAddress};
use serde::{Deserialize, Serialize};

/// Operations accepted by the distribution message handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Msg {
    SetWithdrawAddress {
        delegator: AccAddress,
        withdraw_address: AccAddress,
    },
    WithdrawDelegatorReward {
        delegator: AccAddress,
        validator: ValAddress,
    },
    WithdrawValidatorCommission {
        validator: ValAddress,
    },
    FundPublicTreasuryPool {
        depositor: AccAddress,
        amount: Coins,
    },
    WithdrawFoundationPool {
        nominee: AccAddress,
        recipient: AccAddress,
        amount: Coins,
    },
    LockValidatorRewards {
        validator: ValAddress,
    },
    DisableLockedRewardsAutoRenewal {
        validator: ValAddress,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MsgResponse {
    Empty,
    /// Coins paid out by a withdrawal.
    Withdrawn { amount: Coins },
}

fn require_account(field: &str, addr: &AccAddress) -> Result<()> {
    if addr.is_empty() {
        return Err(DistributionError::InvalidMsg(format!("empty {field} address")));
    }
    Ok(())
}

fn require_validator(addr: &ValAddress) -> Result<()> {
    if addr.is_empty() {
        return Err(DistributionError::InvalidMsg(
            "empty validator address".into(),
        ));
    }
    Ok(())
}

fn require_amount(amount: &Coins) -> Result<()> {
    amount
        .validate()
        .map_err(|e| DistributionError::InvalidMsg(e.to_string()))?;
    if amount.is_zero() {
        return Err(DistributionError::InvalidMsg("amount must be positive".into()));
    }
    Ok(())
}

impl Msg {
    /// Stateless checks run before the message touches the store.
    pub fn validate_basic(&self) -> Result<()> {
        match self {
            Msg::SetWithdrawAddress {
                delegator,
                withdraw_address,
            } => {
                require_account("delegator", delegator)?;
                require_account("withdraw", withdraw_address)
            }
            Msg::WithdrawDelegatorReward {
                delegator,
                validator,
            } => {
                require_account("delegator", delegator)?;
                require_validator(validator)
            }
            Msg::WithdrawValidatorCommission { validator }
            | Msg::LockValidatorRewards { validator }
            | Msg::DisableLockedRewardsAutoRenewal { validator } => require_validator(validator),
            Msg::FundPublicTreasuryPool { depositor, amount } => {
                require_account("depositor", depositor)?;
                require_amount(amount)
            }
            Msg::WithdrawFoundationPool {
                nominee,
                recipient,
                amount,
            } => {
                require_account("nominee", nominee)?;
                require_account("recipient", recipient)?;
                require_amount(amount)
            }
        }
    }

    /// Short name used in logs.
    pub fn route(&self) -> &'static str {
        match self {
            Msg::SetWithdrawAddress { .. } => "set_withdraw_address",
            Msg::WithdrawDelegatorReward { .. } => "withdraw_delegator_reward",
            Msg::WithdrawValidatorCommission { .. } => "withdraw_validator_commission",
            Msg::FundPublicTreasuryPool { .. } => "fund_public_treasury_pool",
            Msg::WithdrawFoundationPool { .. } => "withdraw_foundation_pool",
            Msg::LockValidatorRewards { .. } => "lock_validator_rewards",
            Msg::DisableLockedRewardsAutoRenewal { .. } => "disable_locked_rewards_auto_renewal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_basic_rejects_empty_addresses() {
        let msg = Msg::WithdrawDelegatorReward {
            delegator: AccAddress::default(),
            validator: ValAddress::new([1; 20]),
        };
        assert!(matches!(
            msg.validate_basic(),
            Err(DistributionError::InvalidMsg(_))
        ));
    }

    #[test]
    fn test_validate_basic_rejects_zero_funding() {
        let msg = Msg::FundPublicTreasuryPool {
            depositor: AccAddress::new([1; 20]),
            amount: Coins::empty(),
        };
        assert!(msg.validate_basic().is_err());

        let msg = Msg::FundPublicTreasuryPool {
            depositor: AccAddress::new([1; 20]),
            amount: Coins::from_coin("stake", 5),
        };
        msg.validate_basic().unwrap();
    }

    #[test]
    fn test_msg_json_is_tagged() {
        let msg = Msg::LockValidatorRewards {
            validator: ValAddress::new([9; 20]),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "lock_validator_rewards");
        assert_eq!(serde_json::from_value::<Msg>(json).unwrap(), msg);
    }
}
