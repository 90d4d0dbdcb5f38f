use std::io;

use portal_primitives::{BeaconHeight, TokenId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("no portal params cover beacon height {0}")]
    MissingEpochParams(BeaconHeight),

    #[error("params schedule is empty")]
    EmptySchedule,

    #[error("params schedule entries not strictly ascending at start height {0}")]
    UnorderedSchedule(BeaconHeight),

    #[error("invalid params: {0}")]
    Invalid(&'static str),

    #[error("no decimals declared for token {0}")]
    MissingDecimals(TokenId),

    #[error("unsupported params file extension: {0}")]
    UnknownFormat(String),

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ParamsResult<T> = Result<T, ParamsError>;
