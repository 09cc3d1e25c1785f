//! Records, messages and proposals of the distribution module.

pub mod genesis;
pub mod msgs;
pub mod params;
pub mod pools;
pub mod proposals;
pub mod records;

pub use genesis::*;
pub use msgs::{Msg, MsgResponse};
pub use params::Params;
pub use pools::{PoolKind, RewardPools};
pub use proposals::Proposal;
pub use records::*;
