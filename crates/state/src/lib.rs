//! Portal state records and the per-height snapshot.

mod custodian;
mod errors;
mod liquidation;
mod porting;
mod rates;
mod redeem;
mod snapshot;
mod status;

pub use custodian::CustodianState;
pub use errors::{RateError, RateResult, StateError, StateResult};
pub use liquidation::{LiquidationPool, LiquidationPoolEntry, LockedCollateralState};
pub use porting::{MatchingPortingCustodianDetail, WaitingPortingRequest};
pub use rates::{
    ExchangeRateSubmission, FinalExchangeRates, RateConverter, aggregate_exchange_rates,
    median_floor,
};
pub use redeem::{MatchingRedeemCustodianDetail, RedeemPool, RedeemRequest};
pub use snapshot::PortalSnapshot;
pub use status::{
    StatusKind, StatusLookup, StatusLookupError, StatusRecord, TrackedStatus, compound_id,
};
