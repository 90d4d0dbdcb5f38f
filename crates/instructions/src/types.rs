//! Metadata type codes and the instruction status vocabulary.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Metadata type code, the first element of a raw instruction.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum MetaType {
    CustodianDeposit = 200,
    PortingRequest = 201,
    RequestPTokens = 202,
    ExchangeRates = 203,
    RedeemRequest = 204,
    RedeemMatching = 205,
    UnlockCollateral = 206,
    CustodianWithdraw = 207,
    RedeemLiquidation = 208,
    ExpiredWaitingPorting = 209,
    RedeemTimeout = 210,
    TpLiquidation = 211,
    TpWarning = 212,
    LiquidationPoolRedeem = 213,
    CustodianTopUp = 214,
    WaitingPortingTopUp = 215,
    RewardDistribution = 216,
    RewardWithdraw = 217,
}

impl MetaType {
    pub const ALL: [MetaType; 18] = [
        Self::CustodianDeposit,
        Self::PortingRequest,
        Self::RequestPTokens,
        Self::ExchangeRates,
        Self::RedeemRequest,
        Self::RedeemMatching,
        Self::UnlockCollateral,
        Self::CustodianWithdraw,
        Self::RedeemLiquidation,
        Self::ExpiredWaitingPorting,
        Self::RedeemTimeout,
        Self::TpLiquidation,
        Self::TpWarning,
        Self::LiquidationPoolRedeem,
        Self::CustodianTopUp,
        Self::WaitingPortingTopUp,
        Self::RewardDistribution,
        Self::RewardWithdraw,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }
}

/// Outcome vocabulary of an instruction.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstStatus {
    Accepted,
    Rejected,
    Refund,
    Matched,
    Liquidated,
    Expired,
    Warning,
    Cleared,
}

impl InstStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Refund => "refund",
            Self::Matched => "matched",
            Self::Liquidated => "liquidated",
            Self::Expired => "expired",
            Self::Warning => "warning",
            Self::Cleared => "cleared",
        }
    }

    /// Rejected outcomes leave portal state untouched.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected | Self::Refund)
    }
}

impl fmt::Display for InstStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "accepted" => Self::Accepted,
            "rejected" => Self::Rejected,
            "refund" => Self::Refund,
            "matched" => Self::Matched,
            "liquidated" => Self::Liquidated,
            "expired" => Self::Expired,
            "warning" => Self::Warning,
            "cleared" => Self::Cleared,
            other => return Err(other.to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_type_codes_are_unique() {
        for (i, a) in MetaType::ALL.iter().enumerate() {
            assert_eq!(MetaType::from_code(a.code()), Some(*a));
            for b in &MetaType::ALL[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
        assert_eq!(MetaType::from_code(1), None);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!("refund".parse::<InstStatus>(), Ok(InstStatus::Refund));
        assert_eq!(InstStatus::Warning.to_string(), "warning");
        assert!("bogus".parse::<InstStatus>().is_err());
    }
}
