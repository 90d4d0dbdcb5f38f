//! Per-epoch portal parameters.

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};
use portal_primitives::{IncAddress, TokenId};
use serde::{Deserialize, Serialize};

use crate::errors::{ParamsError, ParamsResult};

/// Immutable configuration for one epoch of portal operation.
///
/// Percent fields are plain integer percents (`150` is 150%). The two fee
/// minimums are basis points (`1` is 0.01%).
#[derive(
    Clone, Debug, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct PortalParams {
    /// Beacon blocks a waiting porting request may wait for its proof.
    pub time_out_porting_request: u64,

    /// Beacon blocks an under-matched redeem request may stay waiting.
    pub time_out_redeem_request: u64,

    /// Beacon blocks a matched custodian has to pay out a redeem.
    pub time_out_custodian_return_pub_token: u64,

    /// Collateral ratio below which a custodian is liquidated.
    pub tp120: u64,

    /// Upper bound of the top-up warning band.
    pub tp130: u64,

    /// Over-collateralization required when matching.
    pub min_percent_locked_collateral: u64,

    /// Share of the matched value a run-away custodian forfeits.
    pub max_percent_liquidated_collateral_amount: u64,

    /// Minimum porting fee, basis points of the porting value.
    pub min_percent_porting_fee: u64,

    /// Minimum redeem fee, basis points of the redeem value.
    pub min_percent_redeem_fee: u64,

    pub min_percent_custodian_rewards: u64,
    pub max_percent_custodian_rewards: u64,

    /// Beacon blocks per reward epoch.
    pub epoch_length: u64,

    /// Decimal precision of the native asset.
    pub native_decimals: u8,

    /// Non-native collateral assets and their decimal precision.
    #[serde(default)]
    pub supported_collaterals: BTreeMap<TokenId, u8>,

    /// pTokens the portal mints, with their decimal precision.
    pub supported_ptokens: BTreeMap<TokenId, u8>,

    /// Accounts allowed to submit exchange rates.
    #[serde(default)]
    pub feeders: BTreeSet<IncAddress>,
}

impl PortalParams {
    /// Decimal precision of any asset the portal knows about.
    pub fn decimals_of(&self, token: &TokenId) -> ParamsResult<u8> {
        if token.is_native() {
            return Ok(self.native_decimals);
        }
        self.supported_collaterals
            .get(token)
            .or_else(|| self.supported_ptokens.get(token))
            .copied()
            .ok_or_else(|| ParamsError::MissingDecimals(token.clone()))
    }

    pub fn is_supported_ptoken(&self, token: &TokenId) -> bool {
        self.supported_ptokens.contains_key(token)
    }

    /// The native asset is always accepted as collateral.
    pub fn is_supported_collateral(&self, asset: &TokenId) -> bool {
        asset.is_native() || self.supported_collaterals.contains_key(asset)
    }

    pub fn is_feeder(&self, addr: &IncAddress) -> bool {
        self.feeders.contains(addr)
    }

    /// Returns if the height closes a reward epoch.
    pub fn is_epoch_boundary(&self, height: u64) -> bool {
        self.epoch_length != 0 && height % self.epoch_length == 0
    }

    /// Checks the relations between the thresholds.
    pub fn validate(&self) -> ParamsResult<()> {
        if self.time_out_porting_request == 0
            || self.time_out_redeem_request == 0
            || self.time_out_custodian_return_pub_token == 0
        {
            return Err(ParamsError::Invalid("timeouts must be non-zero"));
        }
        if self.epoch_length == 0 {
            return Err(ParamsError::Invalid("epoch length must be non-zero"));
        }
        if self.tp120 == 0 || self.tp120 >= self.tp130 {
            return Err(ParamsError::Invalid("need 0 < tp120 < tp130"));
        }
        if self.tp130 > self.min_percent_locked_collateral {
            return Err(ParamsError::Invalid(
                "tp130 must not exceed min percent locked collateral",
            ));
        }
        if self.max_percent_liquidated_collateral_amount == 0 {
            return Err(ParamsError::Invalid(
                "max percent liquidated collateral must be non-zero",
            ));
        }
        if self.min_percent_custodian_rewards > self.max_percent_custodian_rewards
            || self.max_percent_custodian_rewards > 100
        {
            return Err(ParamsError::Invalid(
                "need min <= max <= 100 for custodian reward percents",
            ));
        }
        if self.supported_ptokens.is_empty() {
            return Err(ParamsError::Invalid("no supported ptokens"));
        }
        if self.supported_collaterals.keys().any(TokenId::is_native) {
            return Err(ParamsError::Invalid(
                "native asset must not be listed as a token collateral",
            ));
        }
        Ok(())
    }
}
