//! Meridian core types
//!
//! Addresses, the fixed-point `Dec` used for every reward computation, and the
//! multi-denomination coin vectors moved between pools and accounts.

pub mod address;
pub mod coins;
pub mod decimal;

pub use address::*;
pub use coins::*;
pub use decimal::*;
