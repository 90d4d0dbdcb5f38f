use portal_primitives::{IncAddress, TokenId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the producer rejected an action.
///
/// Rejections are ordinary outcomes recorded inside an instruction; they
/// never abort block processing.
#[derive(Clone, Debug, Eq, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("request id {0} already used")]
    DuplicateRequestId(String),

    #[error("unsupported ptoken {0}")]
    UnsupportedToken(TokenId),

    #[error("unsupported collateral asset {0}")]
    UnsupportedCollateral(TokenId),

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("fee {fee} below minimum {min}")]
    FeeTooLow { fee: u64, min: u64 },

    #[error("missing exchange rate for {0}")]
    MissingExchangeRate(TokenId),

    #[error("insufficient custodian collateral")]
    InsufficientCustodianCollateral,

    #[error("unknown custodian {0}")]
    UnknownCustodian(IncAddress),

    #[error("insufficient free collateral")]
    InsufficientFreeCollateral,

    #[error("custodian has no remote address for {0}")]
    MissingRemoteAddress(TokenId),

    #[error("unknown request {0}")]
    UnknownRequest(String),

    #[error("request mismatch: {0}")]
    RequestMismatch(String),

    #[error("invalid relay proof")]
    InvalidProof,

    #[error("request already fully matched")]
    AlreadyFullyMatched,

    #[error("custodian holds no matching public tokens")]
    InsufficientHolding,

    #[error("custodian {0} is not matched to the request")]
    CustodianNotMatched(IncAddress),

    #[error("sender {0} is not an exchange rate feeder")]
    NotFeeder(IncAddress),

    #[error("invalid exchange rates")]
    InvalidRates,

    #[error("collateral ratio {ratio} is outside the top-up band")]
    NotInWarningBand { ratio: u64 },

    #[error("deposit {deposit} below required {required}")]
    DepositTooSmall { required: u64, deposit: u64 },

    #[error("liquidation pool cannot cover the amount")]
    PoolCannotCover,

    #[error("height {0} is not an epoch boundary")]
    NotEpochBoundary(u64),

    #[error("no reward to withdraw")]
    NoReward,

    #[error("no collateral was locked during the epoch")]
    NoLockedCollateral,

    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}
