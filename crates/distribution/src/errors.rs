use crate::types::PoolKind;
use meridian_storage::StorageError;
use meridian_types::{AccAddress, Dec, DecCoins, ValAddress};

/// Recoverable distribution failures.
///
/// Ledger corruption (an out-of-range slash fraction, a reference count
/// outside `1..=2`, a reconstructed stake above the live stake) is not
/// represented here: those paths panic.
#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("no delegation distribution info")]
    EmptyDelegationDistInfo,

    #[error("validator {0} does not exist")]
    NoValidatorExists(ValAddress),

    #[error("delegation of {delegator} to {validator} does not exist")]
    NoDelegationExists {
        delegator: AccAddress,
        validator: ValAddress,
    },

    #[error("{0} is not a foundation nominee")]
    NotFoundationNominee(AccAddress),

    #[error("insufficient funds in {pool} pool: available {available}, requested {requested}")]
    InsufficientPoolFunds {
        pool: PoolKind,
        available: DecCoins,
        requested: DecCoins,
    },

    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("pool tax rates must sum to exactly 1, got {0}")]
    TaxRatesNotNormalized(Dec),

    #[error("rewards of validator {0} are already locked")]
    RewardsAlreadyLocked(ValAddress),

    #[error("rewards of validator {0} are not locked")]
    RewardsNotLocked(ValAddress),

    #[error("rewards of validator {0} are locked")]
    RewardsLocked(ValAddress),

    #[error("validator {0} has no commission to withdraw")]
    NoValidatorCommission(ValAddress),

    #[error("set withdraw address is disabled")]
    SetWithdrawAddrDisabled,

    #[error("{0} is a blacklisted address")]
    BlacklistedAddress(AccAddress),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid message: {0}")]
    InvalidMsg(String),

    #[error("invalid genesis state: {0}")]
    InvalidGenesis(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("supply keeper: {0}")]
    Supply(anyhow::Error),

    #[error("staking keeper: {0}")]
    Staking(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DistributionError>;
