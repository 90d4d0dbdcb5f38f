use portal_instructions::RejectReason;
use portal_params::ParamsError;
use portal_primitives::{IncAddress, MathError, PortingId, RedeemId};
use portal_state::{RateError, StateError, StatusLookupError};
use thiserror::Error;

/// Errors that halt the evaluation of a beacon height.
///
/// Anything here means the snapshot and the instruction list disagree, or the
/// configuration is incomplete. Policy violations by users are never an
/// `StfError`, they become rejected instructions.
#[derive(Debug, Error)]
pub enum StfError {
    #[error("missing custodian {0}")]
    MissingCustodian(IncAddress),

    #[error("missing waiting porting request {0}")]
    MissingPortingRequest(PortingId),

    #[error("missing redeem request {0}")]
    MissingRedeemRequest(RedeemId),

    #[error("instruction diverges from state: {0}")]
    Divergence(String),

    #[error("params: {0}")]
    Params(#[from] ParamsError),

    #[error("rates: {0}")]
    Rate(#[from] RateError),

    #[error("state: {0}")]
    State(#[from] StateError),

    #[error("math: {0}")]
    Math(#[from] MathError),

    #[error(transparent)]
    StatusLookup(#[from] StatusLookupError),
}

pub type StfResult<T> = Result<T, StfError>;

/// Outcome of checking an action before it becomes an instruction.
#[derive(Debug)]
pub(crate) enum Check {
    Reject(RejectReason),
    Fatal(StfError),
}

pub(crate) type CheckResult<T> = Result<T, Check>;

impl From<RejectReason> for Check {
    fn from(value: RejectReason) -> Self {
        Check::Reject(value)
    }
}

impl From<StfError> for Check {
    fn from(value: StfError) -> Self {
        Check::Fatal(value)
    }
}

impl From<MathError> for Check {
    fn from(_: MathError) -> Self {
        Check::Reject(RejectReason::ArithmeticOverflow)
    }
}

impl From<RateError> for Check {
    fn from(value: RateError) -> Self {
        match value {
            RateError::MissingExchangeRate(token) => {
                Check::Reject(RejectReason::MissingExchangeRate(token))
            }
            RateError::Math(_) => Check::Reject(RejectReason::ArithmeticOverflow),
            other => Check::Fatal(other.into()),
        }
    }
}

impl From<StateError> for Check {
    fn from(value: StateError) -> Self {
        match value {
            StateError::Math(_) => Check::Reject(RejectReason::ArithmeticOverflow),
            other => Check::Fatal(other.into()),
        }
    }
}

impl From<StatusLookupError> for Check {
    fn from(value: StatusLookupError) -> Self {
        Check::Fatal(value.into())
    }
}

/// Separates rejections from fatal errors.
pub(crate) fn outcome<T>(res: CheckResult<T>) -> StfResult<Result<T, RejectReason>> {
    match res {
        Ok(v) => Ok(Ok(v)),
        Err(Check::Reject(reason)) => Ok(Err(reason)),
        Err(Check::Fatal(e)) => Err(e),
    }
}
