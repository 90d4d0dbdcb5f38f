//! Primitive types shared by every portal crate.

#[macro_use]
mod macros;

pub mod collaterals;
pub mod ids;
pub mod math;

pub use collaterals::Collaterals;
pub use ids::{BeaconHeight, IncAddress, PortingId, RedeemId, ShardId, TokenId, NATIVE_TOKEN_ID};
pub use math::{MathError, MathResult};
