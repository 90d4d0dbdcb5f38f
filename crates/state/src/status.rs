//! Status records tracked per request id, outside the height-scoped
//! snapshot.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use portal_primitives::BeaconHeight;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What kind of request a status record belongs to.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    BorshDeserialize,
    BorshSerialize,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    CustodianDeposit,
    CustodianWithdraw,
    Porting,
    RequestPTokens,
    ExchangeRates,
    Redeem,
    RedeemMatching,
    UnlockCollateral,
    CustodianLiquidation,
    RedeemLiquidation,
    DuplicateRequest,
    TopUp,
    LiquidationPoolRedeem,
    RewardDistribution,
    RewardWithdraw,
}

impl StatusKind {
    /// Short stable tag used in storage keys.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CustodianDeposit => "custodian-deposit",
            Self::CustodianWithdraw => "custodian-withdraw",
            Self::Porting => "porting",
            Self::RequestPTokens => "request-ptokens",
            Self::ExchangeRates => "exchange-rates",
            Self::Redeem => "redeem",
            Self::RedeemMatching => "redeem-matching",
            Self::UnlockCollateral => "unlock-collateral",
            Self::CustodianLiquidation => "custodian-liquidation",
            Self::RedeemLiquidation => "redeem-liquidation",
            Self::DuplicateRequest => "duplicate-request",
            Self::TopUp => "top-up",
            Self::LiquidationPoolRedeem => "liquidation-pool-redeem",
            Self::RewardDistribution => "reward-distribution",
            Self::RewardWithdraw => "reward-withdraw",
        }
    }
}

/// Status id built from two ids, e.g. a custodian and a token.
///
/// The length prefix keeps the split unambiguous whatever the parts contain.
pub fn compound_id(first: &str, second: &str) -> String {
    format!("{}:{first}:{second}", first.len())
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TrackedStatus {
    Waiting,
    Matched,
    Success,
    Rejected,
    Refunded,
    Expired,
    Liquidated,
    Warning,
    Cleared,
}

/// Latest known status of one request.
#[derive(
    Clone, Debug, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct StatusRecord {
    pub kind: StatusKind,
    pub id: String,
    pub status: TrackedStatus,
    pub beacon_height: BeaconHeight,
}

#[derive(Debug, Error)]
#[error("status lookup failed: {0}")]
pub struct StatusLookupError(pub String);

/// Read access to persisted status records.
pub trait StatusLookup {
    fn request_status(
        &self,
        kind: StatusKind,
        id: &str,
    ) -> Result<Option<StatusRecord>, StatusLookupError>;
}

impl StatusLookup for BTreeMap<(StatusKind, String), StatusRecord> {
    fn request_status(
        &self,
        kind: StatusKind,
        id: &str,
    ) -> Result<Option<StatusRecord>, StatusLookupError> {
        Ok(self.get(&(kind, id.to_owned())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_ids_do_not_collide() {
        assert_eq!(compound_id("c1", "pBNB"), "2:c1:pBNB");
        assert_ne!(compound_id("a-b", "c"), compound_id("a", "b-c"));
        assert_ne!(compound_id("a:", "b"), compound_id("a", ":b"));
    }
}
