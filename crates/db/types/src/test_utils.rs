//! Backend-independent store tests, instantiated per backend with
//! [`state_store_tests!`](crate::state_store_tests).

use std::sync::Arc;

use portal_primitives::{BeaconHeight, Collaterals, TokenId};
use portal_state::{
    ExchangeRateSubmission, FinalExchangeRates, MatchingPortingCustodianDetail,
    MatchingRedeemCustodianDetail, PortalSnapshot, RedeemPool, RedeemRequest, StatusKind,
    StatusLookup, StatusRecord, TrackedStatus, WaitingPortingRequest,
};

use crate::{DbError, PersistenceAdapter, StateStore};

/// A snapshot with at least one record in every category.
pub fn sample_snapshot(height: BeaconHeight) -> PortalSnapshot {
    let bnb = TokenId::from("pBNB");
    let mut snap = PortalSnapshot::genesis(height);
    snap.custodian_or_insert(&"c1".into())
        .deposit(&TokenId::native(), 5_000)
        .expect("deposit c1");
    snap.custodian_or_insert(&"c2".into())
        .deposit(&TokenId::native(), 2_000)
        .expect("deposit c2");

    snap.insert_waiting_porting(WaitingPortingRequest::new(
        "p1".into(),
        bnb.clone(),
        "porter".into(),
        10,
        vec![MatchingPortingCustodianDetail {
            custodian: "c1".into(),
            remote_address: "b1".into(),
            amount: 10,
            locked: Collaterals::native_only(1_500),
        }],
        1,
        height,
        0,
        1,
    ));
    snap.insert_redeem(
        RedeemPool::Waiting,
        RedeemRequest::new(
            "r1".into(),
            bnb.clone(),
            "redeemer".into(),
            "bnb-redeemer".to_owned(),
            4,
            1,
            Vec::new(),
            height,
            0,
        ),
    );
    snap.insert_redeem(
        RedeemPool::Matched,
        RedeemRequest::new(
            "r2".into(),
            bnb.clone(),
            "redeemer".into(),
            "bnb-redeemer".to_owned(),
            3,
            1,
            vec![MatchingRedeemCustodianDetail {
                custodian: "c2".into(),
                remote_address: "b2".into(),
                amount: 3,
            }],
            height,
            1,
        ),
    );

    snap.record_rate_submission(ExchangeRateSubmission {
        sender: "feeder-1".into(),
        rates: [(bnb.clone(), 110)].into_iter().collect(),
    });
    snap.set_final_exchange_rates(FinalExchangeRates::new(
        [(TokenId::native(), 100), (bnb.clone(), 100)]
            .into_iter()
            .collect(),
    ));
    snap.liquidation_pool_mut()
        .deposit(&bnb, &Collaterals::native_only(300), 2)
        .expect("pool deposit");
    snap.locked_collateral_mut()
        .accumulate(&"c1".into(), 1_500)
        .expect("accumulate");
    snap
}

fn status(kind: StatusKind, id: &str, status: TrackedStatus, height: BeaconHeight) -> StatusRecord {
    StatusRecord {
        kind,
        id: id.to_owned(),
        status,
        beacon_height: height,
    }
}

pub fn test_snapshot_round_trip<S: StateStore>(store: S) {
    let db = PersistenceAdapter::new(Arc::new(store));
    let snap = sample_snapshot(7);
    db.put_snapshot(&snap).expect("put snapshot");

    let loaded = db.get_snapshot(7).expect("get snapshot").expect("snapshot present");
    assert_eq!(loaded, snap);
    assert_eq!(
        loaded.digest().expect("digest"),
        snap.digest().expect("digest")
    );
}

pub fn test_empty_snapshot_round_trip<S: StateStore>(store: S) {
    let db = PersistenceAdapter::new(Arc::new(store));
    let snap = PortalSnapshot::genesis(0);
    db.put_snapshot(&snap).expect("put genesis");
    assert_eq!(db.get_snapshot(0).expect("get genesis"), Some(snap));
}

pub fn test_missing_height<S: StateStore>(store: S) {
    let db = PersistenceAdapter::new(Arc::new(store));
    assert_eq!(db.latest_height().expect("latest"), None);
    assert!(db.get_snapshot(5).expect("get").is_none());
    assert!(db.get_latest_snapshot().expect("get latest").is_none());

    db.put_snapshot(&sample_snapshot(4)).expect("put");
    assert!(db.get_snapshot(5).expect("get").is_none());
}

pub fn test_latest_height<S: StateStore>(store: S) {
    let db = PersistenceAdapter::new(Arc::new(store));
    // written out of order
    for height in [3, 10, 9] {
        db.put_snapshot(&sample_snapshot(height)).expect("put");
    }
    assert_eq!(db.latest_height().expect("latest"), Some(10));
    let latest = db.get_latest_snapshot().expect("get latest").expect("present");
    assert_eq!(latest.beacon_height(), 10);
}

pub fn test_height_written_once<S: StateStore>(store: S) {
    let db = PersistenceAdapter::new(Arc::new(store));
    db.put_snapshot(&sample_snapshot(2)).expect("first put");
    let err = db
        .put_snapshot(&PortalSnapshot::genesis(2))
        .expect_err("second put");
    assert!(matches!(err, DbError::SnapshotExists(2)));
    assert_eq!(
        db.get_snapshot(2).expect("get").expect("present"),
        sample_snapshot(2)
    );
}

pub fn test_heights_are_independent<S: StateStore>(store: S) {
    let db = PersistenceAdapter::new(Arc::new(store));
    let first = sample_snapshot(1);
    db.put_snapshot(&first).expect("put 1");

    let mut second = first.advanced();
    second
        .custodian_or_insert(&"c3".into())
        .deposit(&TokenId::native(), 900)
        .expect("deposit c3");
    second.remove_waiting_porting(&"p1".into());
    db.put_snapshot(&second).expect("put 2");

    assert_eq!(db.get_snapshot(1).expect("get 1"), Some(first));
    let loaded = db.get_snapshot(2).expect("get 2").expect("present");
    assert!(loaded.custodian(&"c3".into()).is_some());
    assert!(loaded.waiting_porting(&"p1".into()).is_none());
    assert!(loaded.exchange_rate_submissions().is_empty());
    assert_eq!(loaded, second);
}

pub fn test_status_records_keep_latest<S: StateStore>(store: S) {
    let db = PersistenceAdapter::new(Arc::new(store));
    let waiting = status(StatusKind::Porting, "p1", TrackedStatus::Waiting, 1);
    let success = status(StatusKind::Porting, "p1", TrackedStatus::Success, 2);
    let redeem = status(StatusKind::Redeem, "p1", TrackedStatus::Waiting, 2);

    db.put_block(&PortalSnapshot::genesis(1), &[waiting.clone()])
        .expect("put 1");
    assert_eq!(
        db.get_status(StatusKind::Porting, "p1").expect("status"),
        Some(waiting)
    );

    db.put_block(&PortalSnapshot::genesis(2), &[success.clone(), redeem.clone()])
        .expect("put 2");
    assert_eq!(
        db.request_status(StatusKind::Porting, "p1").expect("lookup"),
        Some(success)
    );
    assert_eq!(
        db.request_status(StatusKind::Redeem, "p1").expect("lookup"),
        Some(redeem)
    );
    assert_eq!(
        db.request_status(StatusKind::Porting, "p2").expect("lookup"),
        None
    );
}

/// Expands to one `#[test]` per backend-independent store test, each run
/// against a fresh store built by `$setup`.
#[macro_export]
macro_rules! state_store_tests {
    ($setup:expr) => {
        #[test]
        fn test_snapshot_round_trip() {
            $crate::test_utils::test_snapshot_round_trip($setup);
        }

        #[test]
        fn test_empty_snapshot_round_trip() {
            $crate::test_utils::test_empty_snapshot_round_trip($setup);
        }

        #[test]
        fn test_missing_height() {
            $crate::test_utils::test_missing_height($setup);
        }

        #[test]
        fn test_latest_height() {
            $crate::test_utils::test_latest_height($setup);
        }

        #[test]
        fn test_height_written_once() {
            $crate::test_utils::test_height_written_once($setup);
        }

        #[test]
        fn test_heights_are_independent() {
            $crate::test_utils::test_heights_are_independent($setup);
        }

        #[test]
        fn test_status_records_keep_latest() {
            $crate::test_utils::test_status_records_keep_latest($setup);
        }
    };
}
