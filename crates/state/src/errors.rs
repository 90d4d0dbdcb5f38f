use std::io;

use portal_params::ParamsError;
use portal_primitives::{IncAddress, MathError, TokenId};
use thiserror::Error;

/// Errors from mutating state records.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("custodian {0} has insufficient free collateral")]
    InsufficientFreeCollateral(IncAddress),

    #[error("custodian {0} has insufficient locked collateral for {1}")]
    InsufficientLockedCollateral(IncAddress, TokenId),

    #[error("custodian {0} holds less {1} than required")]
    InsufficientHolding(IncAddress, TokenId),

    #[error("custodian {0} is not matched to request {1}")]
    CustodianNotMatched(IncAddress, String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("encode snapshot: {0}")]
    Encode(#[from] io::Error),

    #[error("math: {0}")]
    Math(#[from] MathError),
}

pub type StateResult<T> = Result<T, StateError>;

/// Errors from price conversion.
#[derive(Debug, Error)]
pub enum RateError {
    #[error("missing exchange rate for {0}")]
    MissingExchangeRate(TokenId),

    #[error("params: {0}")]
    Params(#[from] ParamsError),

    #[error("math: {0}")]
    Math(#[from] MathError),
}

pub type RateResult<T> = Result<T, RateError>;
