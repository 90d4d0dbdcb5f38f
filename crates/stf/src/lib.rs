//! Portal state transition function.
//!
//! Turns the actions gathered for a beacon height into a decided instruction
//! list, and replays such a list against the previous height's snapshot.
//!
//! ## Architecture
//!
//! - `producer`: canonical ordering, per-action decisions and the periodic scans
//! - `processor`: sequential replay of decided instructions and height finalization
//! - `apply`: the single mutation routine shared by producer and processor
//! - `custodian`, `porting`, `redeem`, `topup`, `exchange_rates`, `reward`: per-flow
//!   decide/apply handlers
//! - `liquidation`: run-away custodians, collateral ratio scan, liquidation pool redemption
//! - `tracking`: status records derived from applied instructions

mod apply;
mod collateral;
pub mod context;
mod custodian;
pub mod errors;
mod exchange_rates;
mod liquidation;
mod porting;
mod processor;
mod producer;
mod redeem;
mod reward;
mod topup;
mod tracking;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

pub use apply::apply_instruction;
pub use errors::{StfError, StfResult};
pub use processor::{ProcessedBlock, finalize_height, process_instructions};
pub use producer::produce_instructions;
pub use tracking::status_records;
