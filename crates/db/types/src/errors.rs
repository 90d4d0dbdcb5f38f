use std::io;

use portal_primitives::BeaconHeight;
use portal_state::StateError;
use thiserror::Error;

use crate::keys::RecordCategory;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("snapshot at height {0} already stored")]
    SnapshotExists(BeaconHeight),

    #[error("snapshot at height {0} does not match its stored digest")]
    DigestMismatch(BeaconHeight),

    #[error("missing {0} record at height {1}")]
    MissingRecord(RecordCategory, BeaconHeight),

    #[error("malformed store key {0:02x?}")]
    MalformedKey(Vec<u8>),

    #[error("codec: {0}")]
    Codec(#[from] io::Error),

    #[error("state: {0}")]
    State(#[from] StateError),

    #[error("backend: {0}")]
    Backend(String),
}

pub type DbResult<T> = Result<T, DbError>;
