//! Store keys.
//!
//! A snapshot record key is `[category][height: u64 BE][id]`, so all records
//! of one category at one height are contiguous and ordered by id, and the
//! last key of a category carries its highest height. Status keys live in a
//! separate prefix and are addressed by request id alone.

use std::fmt;

use portal_primitives::BeaconHeight;
use portal_state::StatusKind;

use crate::errors::{DbError, DbResult};

const STATUS_PREFIX: u8 = 0xff;
const HEIGHT_LEN: usize = 8;

/// The record categories a snapshot is split into.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordCategory {
    /// Height and digest of the whole snapshot. Present for every stored height.
    Header,
    Custodian,
    WaitingPorting,
    WaitingRedeem,
    MatchedRedeem,
    RateSubmission,
    FinalRates,
    LiquidationPool,
    LockedCollateral,
}

impl RecordCategory {
    pub const ALL: [Self; 9] = [
        Self::Header,
        Self::Custodian,
        Self::WaitingPorting,
        Self::WaitingRedeem,
        Self::MatchedRedeem,
        Self::RateSubmission,
        Self::FinalRates,
        Self::LiquidationPool,
        Self::LockedCollateral,
    ];

    pub fn tag(self) -> u8 {
        match self {
            Self::Header => 1,
            Self::Custodian => 2,
            Self::WaitingPorting => 3,
            Self::WaitingRedeem => 4,
            Self::MatchedRedeem => 5,
            Self::RateSubmission => 6,
            Self::FinalRates => 7,
            Self::LiquidationPool => 8,
            Self::LockedCollateral => 9,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Custodian => "custodian",
            Self::WaitingPorting => "waiting-porting",
            Self::WaitingRedeem => "waiting-redeem",
            Self::MatchedRedeem => "matched-redeem",
            Self::RateSubmission => "rate-submission",
            Self::FinalRates => "final-rates",
            Self::LiquidationPool => "liquidation-pool",
            Self::LockedCollateral => "locked-collateral",
        }
    }

    /// Prefix shared by every key of this category.
    pub fn prefix(self) -> Vec<u8> {
        vec![self.tag()]
    }

    /// Prefix shared by every key of this category at `height`.
    pub fn height_prefix(self, height: BeaconHeight) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + HEIGHT_LEN);
        buf.push(self.tag());
        buf.extend_from_slice(&height.to_be_bytes());
        buf
    }
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A key in the state store.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum StoreKey {
    /// One record of the snapshot at `height`. Singleton records use an
    /// empty id.
    Record {
        category: RecordCategory,
        height: BeaconHeight,
        id: String,
    },

    /// Latest status of a request.
    Status { kind: StatusKind, id: String },
}

impl StoreKey {
    pub fn record(category: RecordCategory, height: BeaconHeight, id: impl Into<String>) -> Self {
        Self::Record {
            category,
            height,
            id: id.into(),
        }
    }

    pub fn status(kind: StatusKind, id: impl Into<String>) -> Self {
        Self::Status {
            kind,
            id: id.into(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Record {
                category,
                height,
                id,
            } => {
                let mut buf = category.height_prefix(*height);
                buf.extend_from_slice(id.as_bytes());
                buf
            }
            Self::Status { kind, id } => {
                let tag = kind.tag();
                let mut buf = Vec::with_capacity(2 + tag.len() + id.len());
                buf.push(STATUS_PREFIX);
                buf.extend_from_slice(tag.as_bytes());
                buf.push(b'/');
                buf.extend_from_slice(id.as_bytes());
                buf
            }
        }
    }
}

/// Splits an encoded record key into its parts.
pub fn decode_record_key(raw: &[u8]) -> DbResult<(RecordCategory, BeaconHeight, String)> {
    let malformed = || DbError::MalformedKey(raw.to_vec());

    let (&tag, rest) = raw.split_first().ok_or_else(malformed)?;
    let category = RecordCategory::from_tag(tag).ok_or_else(malformed)?;
    if rest.len() < HEIGHT_LEN {
        return Err(malformed());
    }
    let (height, id) = rest.split_at(HEIGHT_LEN);
    let height = BeaconHeight::from_be_bytes(height.try_into().map_err(|_| malformed())?);
    let id = String::from_utf8(id.to_vec()).map_err(|_| malformed())?;
    Ok((category, height, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_round_trip() {
        let key = StoreKey::record(RecordCategory::Custodian, 42, "c1");
        let raw = key.encode();
        let (category, height, id) = decode_record_key(&raw).expect("decode");
        assert_eq!(category, RecordCategory::Custodian);
        assert_eq!(height, 42);
        assert_eq!(id, "c1");
    }

    #[test]
    fn test_record_keys_order_by_height_then_id() {
        let a = StoreKey::record(RecordCategory::Custodian, 9, "zz").encode();
        let b = StoreKey::record(RecordCategory::Custodian, 10, "aa").encode();
        let c = StoreKey::record(RecordCategory::Custodian, 10, "ab").encode();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_status_keys_sort_after_records() {
        let status = StoreKey::status(StatusKind::Porting, "p1").encode();
        for category in RecordCategory::ALL {
            let rec = StoreKey::record(category, u64::MAX, "p1").encode();
            assert!(rec < status, "{category}");
        }
    }

    #[test]
    fn test_decode_rejects_bad_keys() {
        assert!(decode_record_key(&[]).is_err());
        assert!(decode_record_key(&[0x7f, 0, 0, 0, 0, 0, 0, 0, 1]).is_err());
        assert!(decode_record_key(&[1, 0, 0]).is_err());
        let status = StoreKey::status(StatusKind::Redeem, "r1").encode();
        assert!(decode_record_key(&status).is_err());
    }
}
