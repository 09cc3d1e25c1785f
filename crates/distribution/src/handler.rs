//! Message and proposal entry points.
//!
//! Every message runs inside an atomic context: a failure leaves the store
//! exactly as it was, coin movements included.

use crate::errors::{DistributionError, Result};
use crate::keeper::{Keeper, LOG_TARGET};
use crate::types::{Msg, MsgResponse, PoolKind, Proposal};
use meridian_storage::Context;
use tracing::{debug, info, warn};

/// Validate and execute a distribution message.
pub fn handle_msg(keeper: &Keeper, ctx: &Context<'_>, msg: &Msg) -> Result<MsgResponse> {
    msg.validate_basic()?;
    debug!(target: LOG_TARGET, "Handling {} at height {}", msg.route(), ctx.block_height());

    let result = ctx.atomic(|ctx| -> Result<MsgResponse> { execute_msg(keeper, ctx, msg) });
    if let Err(err) = &result {
        warn!(target: LOG_TARGET, "{} rejected: {}", msg.route(), err);
    }
    result
}

fn execute_msg(keeper: &Keeper, ctx: &Context<'_>, msg: &Msg) -> Result<MsgResponse> {
    match msg {
        Msg::SetWithdrawAddress {
            delegator,
            withdraw_address,
        } => {
            keeper.set_withdraw_addr(ctx, delegator, withdraw_address)?;
            Ok(MsgResponse::Empty)
        }
        Msg::WithdrawDelegatorReward {
            delegator,
            validator,
        } => {
            let amount = keeper.withdraw_delegation_rewards(ctx, delegator, validator)?;
            Ok(MsgResponse::Withdrawn { amount })
        }
        Msg::WithdrawValidatorCommission { validator } => {
            let amount = keeper.withdraw_validator_commission(ctx, validator)?;
            Ok(MsgResponse::Withdrawn { amount })
        }
        Msg::FundPublicTreasuryPool { depositor, amount } => {
            keeper.fund_public_treasury_pool(ctx, depositor, amount)?;
            Ok(MsgResponse::Empty)
        }
        Msg::WithdrawFoundationPool {
            nominee,
            recipient,
            amount,
        } => {
            if !keeper.get_params(ctx)?.is_foundation_nominee(nominee) {
                return Err(DistributionError::NotFoundationNominee(*nominee));
            }
            if keeper.is_blacklisted(recipient) {
                return Err(DistributionError::BlacklistedAddress(*recipient));
            }
            keeper.distribute_from_pool_to_wallet(ctx, PoolKind::Foundation, recipient, amount)?;
            Ok(MsgResponse::Empty)
        }
        Msg::LockValidatorRewards { validator } => {
            keeper.lock_validator_rewards(ctx, validator)?;
            Ok(MsgResponse::Empty)
        }
        Msg::DisableLockedRewardsAutoRenewal { validator } => {
            keeper.disable_locked_rewards_auto_renewal(ctx, validator)?;
            Ok(MsgResponse::Empty)
        }
    }
}

/// Execute a governance proposal that passed.
pub fn handle_proposal(keeper: &Keeper, ctx: &Context<'_>, proposal: &Proposal) -> Result<()> {
    proposal.validate_basic()?;
    ctx.atomic(|ctx| -> Result<()> { execute_proposal(keeper, ctx, proposal) })
}

fn execute_proposal(keeper: &Keeper, ctx: &Context<'_>, proposal: &Proposal) -> Result<()> {
    match proposal {
        Proposal::PublicTreasuryPoolSpend {
            recipient, amount, ..
        } => {
            if keeper.is_blacklisted(recipient) {
                return Err(DistributionError::BlacklistedAddress(*recipient));
            }
            keeper.distribute_from_pool_to_wallet(ctx, PoolKind::PublicTreasury, recipient, amount)?;
            info!(
                target: LOG_TARGET,
                "Proposal '{}' spent {} from public treasury to {}",
                proposal.title(),
                amount,
                recipient
            );
        }
        Proposal::TaxParamsUpdate {
            validators_pool_tax,
            liquidity_providers_pool_tax,
            public_treasury_pool_tax,
            harp_pool_tax,
            ..
        } => {
            let mut params = keeper.get_params(ctx)?;
            params.validators_pool_tax = validators_pool_tax.clone();
            params.liquidity_providers_pool_tax = liquidity_providers_pool_tax.clone();
            params.public_treasury_pool_tax = public_treasury_pool_tax.clone();
            params.harp_pool_tax = harp_pool_tax.clone();
            keeper.set_params(ctx, &params)?;
            info!(
                target: LOG_TARGET,
                "Proposal '{}' updated pool taxes", proposal.title()
            );
        }
    }
    Ok(())
}
