//! Instruction payloads.
//!
//! Each payload carries every number the processor needs, so applying an
//! instruction never recomputes a value the producer decided.

use std::collections::BTreeMap;

use portal_primitives::{
    BeaconHeight, Collaterals, IncAddress, PortingId, RedeemId, ShardId, TokenId,
};
use portal_state::{MatchingPortingCustodianDetail, MatchingRedeemCustodianDetail, RedeemPool};
use serde::{Deserialize, Serialize};

use crate::{reject::RejectReason, types::MetaType};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CustodianAmount {
    pub custodian: IncAddress,
    pub amount: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CustodianCollaterals {
    pub custodian: IncAddress,
    pub collaterals: Collaterals,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CustodianDepositContent {
    pub tx_id: String,
    pub custodian: IncAddress,
    pub asset: TokenId,
    pub amount: u64,
    /// Remote addresses that get registered, existing ones excluded.
    pub remote_addresses: BTreeMap<TokenId, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CustodianWithdrawContent {
    pub tx_id: String,
    pub custodian: IncAddress,
    pub asset: TokenId,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PortingRequestContent {
    pub tx_id: String,
    pub porting_id: PortingId,
    pub token: TokenId,
    pub porter: IncAddress,
    pub amount: u64,
    pub fee: u64,
    pub shard_id: ShardId,
    pub shard_height: u64,
    pub beacon_height: BeaconHeight,
    pub custodians: Vec<MatchingPortingCustodianDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RequestPTokensContent {
    pub tx_id: String,
    pub porting_id: PortingId,
    pub token: TokenId,
    pub porter: IncAddress,
    pub amount: u64,
    /// Holding increase per matched custodian.
    pub custodians: Vec<CustodianAmount>,
    /// Porting fee credited per matched custodian, in the native asset.
    pub fee_rewards: Vec<CustodianAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRatesContent {
    pub tx_id: String,
    pub sender: IncAddress,
    pub rates: BTreeMap<TokenId, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RedeemRequestContent {
    pub tx_id: String,
    pub redeem_id: RedeemId,
    pub token: TokenId,
    pub redeemer: IncAddress,
    pub remote_address: String,
    pub amount: u64,
    pub fee: u64,
    pub shard_id: ShardId,
    pub beacon_height: BeaconHeight,
    pub custodians: Vec<MatchingRedeemCustodianDetail>,
    pub fully_matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RedeemMatchingContent {
    pub tx_id: String,
    pub redeem_id: RedeemId,
    pub custodian: IncAddress,
    pub token: TokenId,
    pub remote_address: String,
    pub amount: u64,
    pub fully_matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UnlockCollateralContent {
    pub tx_id: String,
    pub redeem_id: RedeemId,
    pub token: TokenId,
    pub custodian: IncAddress,
    pub pool: RedeemPool,
    pub redeem_amount: u64,
    pub unlocked: Collaterals,
    /// Redeem fee credited to the custodian, in the native asset.
    pub fee_reward: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

/// A run-away custodian's share of a redeem request, settled from its
/// collateral.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RedeemLiquidationContent {
    pub redeem_id: RedeemId,
    pub token: TokenId,
    pub custodian: IncAddress,
    pub redeemer: IncAddress,
    pub pool: RedeemPool,
    pub matched_amount: u64,
    /// Collateral paid to the redeemer.
    pub payout: Collaterals,
    /// Collateral returned to the custodian's free balance.
    pub returned: Collaterals,
    /// Fee share returned to the redeemer.
    pub fee_refund: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExpiredPortingContent {
    pub porting_id: PortingId,
    pub token: TokenId,
    pub porter: IncAddress,
    pub shard_id: ShardId,
    pub fee_refund: u64,
    pub by_liquidation: bool,
    pub unlocked: Vec<CustodianCollaterals>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RedeemTimeoutOutcome {
    /// Extra custodians cover the remainder, the request becomes matched.
    Rematched {
        picked: Vec<MatchingRedeemCustodianDetail>,
    },
    /// The request is dropped.
    Cancelled {
        /// Holdings given back to custodians that were partially matched.
        returned_holdings: Vec<CustodianAmount>,
        /// Collateral paid from the liquidation pool, if it covered the claim.
        pool_payout: Option<Collaterals>,
        /// pTokens given back to the redeemer when the pool could not cover.
        refund_amount: u64,
        fee_refund: u64,
    },
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RedeemTimeoutContent {
    pub redeem_id: RedeemId,
    pub token: TokenId,
    pub redeemer: IncAddress,
    pub outstanding_amount: u64,
    pub outcome: RedeemTimeoutOutcome,
}

/// A redeem share taken away from a liquidated custodian.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReleasedRedeemEntry {
    pub redeem_id: RedeemId,
    /// Pool the request sat in before the release.
    pub pool: RedeemPool,
    pub amount: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TpLiquidationContent {
    pub custodian: IncAddress,
    pub token: TokenId,
    pub ratio: u64,
    /// Locked collateral moved into the liquidation pool.
    pub pool_collateral: Collaterals,
    /// Held pTokens taken off the custodian.
    pub holding_amount: u64,
    /// Redeem shares released back to their requests.
    pub released_redeems: Vec<ReleasedRedeemEntry>,
    /// pToken liability added to the liquidation pool.
    pub pub_token_liability: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TpWarningContent {
    pub custodian: IncAddress,
    pub token: TokenId,
    pub ratio: u64,
    pub raised: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LiquidationPoolRedeemContent {
    pub tx_id: String,
    pub token: TokenId,
    pub redeemer: IncAddress,
    pub amount: u64,
    pub fee: u64,
    pub payout: Collaterals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

/// Top-up of a custodian's locked collateral, either for its whole pToken
/// exposure or for one waiting porting request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TopUpContent {
    pub tx_id: String,
    pub custodian: IncAddress,
    pub token: TokenId,
    pub asset: TokenId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub porting_id: Option<PortingId>,
    pub deposit: u64,
    pub locked_added: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CustodianReward {
    pub custodian: IncAddress,
    pub rewards: BTreeMap<TokenId, u64>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RewardDistributionContent {
    pub tx_id: String,
    pub beacon_height: BeaconHeight,
    pub funds: BTreeMap<TokenId, u64>,
    pub custodian_percent: u64,
    pub rewards: Vec<CustodianReward>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RewardWithdrawContent {
    pub tx_id: String,
    pub custodian: IncAddress,
    pub token: TokenId,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

/// Every instruction payload kind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstructionContent {
    CustodianDeposit(CustodianDepositContent),
    CustodianWithdraw(CustodianWithdrawContent),
    PortingRequest(PortingRequestContent),
    RequestPTokens(RequestPTokensContent),
    ExchangeRates(ExchangeRatesContent),
    RedeemRequest(RedeemRequestContent),
    RedeemMatching(RedeemMatchingContent),
    UnlockCollateral(UnlockCollateralContent),
    RedeemLiquidation(RedeemLiquidationContent),
    ExpiredWaitingPorting(ExpiredPortingContent),
    RedeemTimeout(RedeemTimeoutContent),
    TpLiquidation(TpLiquidationContent),
    TpWarning(TpWarningContent),
    LiquidationPoolRedeem(LiquidationPoolRedeemContent),
    CustodianTopUp(TopUpContent),
    WaitingPortingTopUp(TopUpContent),
    RewardDistribution(RewardDistributionContent),
    RewardWithdraw(RewardWithdrawContent),
}

impl InstructionContent {
    pub fn meta_type(&self) -> MetaType {
        match self {
            Self::CustodianDeposit(_) => MetaType::CustodianDeposit,
            Self::CustodianWithdraw(_) => MetaType::CustodianWithdraw,
            Self::PortingRequest(_) => MetaType::PortingRequest,
            Self::RequestPTokens(_) => MetaType::RequestPTokens,
            Self::ExchangeRates(_) => MetaType::ExchangeRates,
            Self::RedeemRequest(_) => MetaType::RedeemRequest,
            Self::RedeemMatching(_) => MetaType::RedeemMatching,
            Self::UnlockCollateral(_) => MetaType::UnlockCollateral,
            Self::RedeemLiquidation(_) => MetaType::RedeemLiquidation,
            Self::ExpiredWaitingPorting(_) => MetaType::ExpiredWaitingPorting,
            Self::RedeemTimeout(_) => MetaType::RedeemTimeout,
            Self::TpLiquidation(_) => MetaType::TpLiquidation,
            Self::TpWarning(_) => MetaType::TpWarning,
            Self::LiquidationPoolRedeem(_) => MetaType::LiquidationPoolRedeem,
            Self::CustodianTopUp(_) => MetaType::CustodianTopUp,
            Self::WaitingPortingTopUp(_) => MetaType::WaitingPortingTopUp,
            Self::RewardDistribution(_) => MetaType::RewardDistribution,
            Self::RewardWithdraw(_) => MetaType::RewardWithdraw,
        }
    }

    /// Rejection reason carried by the payload, if any.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::CustodianDeposit(c) => c.reject_reason.as_ref(),
            Self::CustodianWithdraw(c) => c.reject_reason.as_ref(),
            Self::PortingRequest(c) => c.reject_reason.as_ref(),
            Self::RequestPTokens(c) => c.reject_reason.as_ref(),
            Self::ExchangeRates(c) => c.reject_reason.as_ref(),
            Self::RedeemRequest(c) => c.reject_reason.as_ref(),
            Self::RedeemMatching(c) => c.reject_reason.as_ref(),
            Self::UnlockCollateral(c) => c.reject_reason.as_ref(),
            Self::LiquidationPoolRedeem(c) => c.reject_reason.as_ref(),
            Self::CustodianTopUp(c) | Self::WaitingPortingTopUp(c) => c.reject_reason.as_ref(),
            Self::RewardDistribution(c) => c.reject_reason.as_ref(),
            Self::RewardWithdraw(c) => c.reject_reason.as_ref(),
            Self::RedeemLiquidation(_)
            | Self::ExpiredWaitingPorting(_)
            | Self::RedeemTimeout(_)
            | Self::TpLiquidation(_)
            | Self::TpWarning(_) => None,
        }
    }

    pub(crate) fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Self::CustodianDeposit(c) => serde_json::to_string(c),
            Self::CustodianWithdraw(c) => serde_json::to_string(c),
            Self::PortingRequest(c) => serde_json::to_string(c),
            Self::RequestPTokens(c) => serde_json::to_string(c),
            Self::ExchangeRates(c) => serde_json::to_string(c),
            Self::RedeemRequest(c) => serde_json::to_string(c),
            Self::RedeemMatching(c) => serde_json::to_string(c),
            Self::UnlockCollateral(c) => serde_json::to_string(c),
            Self::RedeemLiquidation(c) => serde_json::to_string(c),
            Self::ExpiredWaitingPorting(c) => serde_json::to_string(c),
            Self::RedeemTimeout(c) => serde_json::to_string(c),
            Self::TpLiquidation(c) => serde_json::to_string(c),
            Self::TpWarning(c) => serde_json::to_string(c),
            Self::LiquidationPoolRedeem(c) => serde_json::to_string(c),
            Self::CustodianTopUp(c) | Self::WaitingPortingTopUp(c) => serde_json::to_string(c),
            Self::RewardDistribution(c) => serde_json::to_string(c),
            Self::RewardWithdraw(c) => serde_json::to_string(c),
        }
    }

    pub(crate) fn from_json(meta: MetaType, json: &str) -> serde_json::Result<Self> {
        Ok(match meta {
            MetaType::CustodianDeposit => Self::CustodianDeposit(serde_json::from_str(json)?),
            MetaType::CustodianWithdraw => Self::CustodianWithdraw(serde_json::from_str(json)?),
            MetaType::PortingRequest => Self::PortingRequest(serde_json::from_str(json)?),
            MetaType::RequestPTokens => Self::RequestPTokens(serde_json::from_str(json)?),
            MetaType::ExchangeRates => Self::ExchangeRates(serde_json::from_str(json)?),
            MetaType::RedeemRequest => Self::RedeemRequest(serde_json::from_str(json)?),
            MetaType::RedeemMatching => Self::RedeemMatching(serde_json::from_str(json)?),
            MetaType::UnlockCollateral => Self::UnlockCollateral(serde_json::from_str(json)?),
            MetaType::RedeemLiquidation => Self::RedeemLiquidation(serde_json::from_str(json)?),
            MetaType::ExpiredWaitingPorting => {
                Self::ExpiredWaitingPorting(serde_json::from_str(json)?)
            }
            MetaType::RedeemTimeout => Self::RedeemTimeout(serde_json::from_str(json)?),
            MetaType::TpLiquidation => Self::TpLiquidation(serde_json::from_str(json)?),
            MetaType::TpWarning => Self::TpWarning(serde_json::from_str(json)?),
            MetaType::LiquidationPoolRedeem => {
                Self::LiquidationPoolRedeem(serde_json::from_str(json)?)
            }
            MetaType::CustodianTopUp => Self::CustodianTopUp(serde_json::from_str(json)?),
            MetaType::WaitingPortingTopUp => {
                Self::WaitingPortingTopUp(serde_json::from_str(json)?)
            }
            MetaType::RewardDistribution => Self::RewardDistribution(serde_json::from_str(json)?),
            MetaType::RewardWithdraw => Self::RewardWithdraw(serde_json::from_str(json)?),
        })
    }
}
