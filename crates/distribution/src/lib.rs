//! Meridian Distribution Module
//!
//! Collects per-block fees, splits them across the reward pools and
//! apportions the validator share among validators and their delegators.
//! Delegator rewards accrue lazily: only a per-validator cumulative
//! reward-per-token ratio advances, and each delegation computes what it is
//! owed on demand by diffing two ratio snapshots.

pub mod config;
pub mod errors;
pub mod expected_keepers;
pub mod handler;
pub mod keeper;
pub mod keys;
pub mod testutil;
pub mod types;

pub use config::DistributionConfig;
pub use errors::{DistributionError, Result};
pub use expected_keepers::{DelegationInfo, StakingKeeper, SupplyKeeper, ValidatorInfo};
pub use handler::{handle_msg, handle_proposal};
pub use keeper::{
    BeginBlockRequest, InvariantReport, Keeper, QueryRequest, StakingHooks, VoteInfo,
};
pub use types::*;
