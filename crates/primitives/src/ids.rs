//! Identifiers used across the portal.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Beacon chain height. Every portal state record is versioned by one.
pub type BeaconHeight = u64;

/// Shard index an action was submitted from.
pub type ShardId = u8;

/// Token identifier of the native asset used as the default collateral.
pub const NATIVE_TOKEN_ID: &str =
    "0000000000000000000000000000000000000000000000000000000000000004";

/// Identifier of an asset: the native token, a collateral token or a pToken.
#[derive(
    Clone,
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
#[serde(transparent)]
pub struct TokenId(String);

impl_str_wrapper!(TokenId);

impl TokenId {
    /// The native asset.
    pub fn native() -> Self {
        Self(NATIVE_TOKEN_ID.to_owned())
    }

    pub fn is_native(&self) -> bool {
        self.0 == NATIVE_TOKEN_ID
    }
}

/// Address of an account on this chain (custodians, porters, redeemers,
/// feeders).
#[derive(
    Clone,
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
#[serde(transparent)]
pub struct IncAddress(String);

impl_str_wrapper!(IncAddress);

/// User-chosen identifier of a porting request. Globally unique.
#[derive(
    Clone,
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
#[serde(transparent)]
pub struct PortingId(String);

impl_str_wrapper!(PortingId);

/// User-chosen identifier of a redeem request. Globally unique.
#[derive(
    Clone,
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
#[serde(transparent)]
pub struct RedeemId(String);

impl_str_wrapper!(RedeemId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_token_id() {
        assert!(TokenId::native().is_native());
        assert!(!TokenId::from("pBTC").is_native());
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let addr = IncAddress::from("custodian-1");
        let json = serde_json::to_string(&addr).expect("serialize address");
        assert_eq!(json, "\"custodian-1\"");

        let back: IncAddress = serde_json::from_str(&json).expect("deserialize address");
        assert_eq!(back, addr);
    }
}
