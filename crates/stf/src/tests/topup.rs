//! Collateral top-ups inside the warning band.

use portal_instructions::{Action, InstStatus, InstructionContent, RejectReason};
use portal_primitives::{PortingId, TokenId};
use portal_state::{StatusKind, TrackedStatus};

use crate::test_utils::*;

fn top_up(deposit: u64, free_collateral_selected: bool) -> Action {
    Action::CustodianTopUp {
        custodian: "c1".into(),
        token: bnb(),
        asset: TokenId::native(),
        deposit,
        free_collateral_selected,
    }
}

/// `c1` holds one pBNB against 1.5 native and sits at 120% after the pBNB
/// rate moved to 125, at height 4.
fn warned() -> Harness {
    let mut h = Harness::bootstrapped();
    h.step(vec![porting("p1", UNIT, 100_000)]);
    h.step(vec![request_ptokens("p1", UNIT, proof("p1", &[("b1", UNIT)]))]);
    h.step(vec![feed(FEEDERS[0], 125)]);
    assert_eq!(h.custodian("c1").tp_warning(&bnb()), Some(120));
    h
}

#[test]
fn test_custodian_top_up_with_deposit() {
    let mut h = warned();

    // 150% of 1.25 is 1.875, 0.375 is missing
    let insts = h.step(vec![top_up(375_000_000, false)]);
    assert_eq!(insts.len(), 1);
    assert_eq!(insts[0].status(), InstStatus::Accepted);
    let InstructionContent::CustodianTopUp(content) = insts[0].content() else {
        panic!("expected a top-up, got {:?}", insts[0]);
    };
    assert_eq!(content.locked_added, 375_000_000);

    let c1 = h.custodian("c1");
    assert_eq!(c1.total().native(), 5_375_000_000);
    assert_eq!(c1.locked_for(&bnb()).native(), 1_875_000_000);
    assert_eq!(c1.free().native(), 3_500_000_000);
    assert_eq!(c1.tp_warning(&bnb()), None);
    assert_eq!(h.status(StatusKind::TopUp, &tx_id(5, 0)), Some(TrackedStatus::Success));
}

#[test]
fn test_custodian_top_up_from_free_collateral() {
    let mut h = warned();

    let insts = h.step(vec![top_up(100_000_000, false), top_up(0, true)]);
    assert_eq!(
        insts[0].content().reject_reason(),
        Some(&RejectReason::DepositTooSmall {
            required: 375_000_000,
            deposit: 100_000_000
        })
    );
    assert_eq!(insts[1].status(), InstStatus::Accepted);

    let c1 = h.custodian("c1");
    assert_eq!(c1.total().native(), 5 * UNIT);
    assert_eq!(c1.locked_for(&bnb()).native(), 1_875_000_000);
    assert_eq!(c1.free().native(), 3_125_000_000);
}

#[test]
fn test_top_up_outside_warning_band() {
    let mut h = Harness::bootstrapped();
    h.step(vec![porting("p1", UNIT, 100_000)]);
    h.step(vec![request_ptokens("p1", UNIT, proof("p1", &[("b1", UNIT)]))]);

    let insts = h.step(vec![
        top_up(UNIT, false),
        Action::CustodianTopUp {
            custodian: "c9".into(),
            token: bnb(),
            asset: TokenId::native(),
            deposit: UNIT,
            free_collateral_selected: false,
        },
    ]);
    assert_eq!(
        insts[0].content().reject_reason(),
        Some(&RejectReason::NotInWarningBand { ratio: 150 })
    );
    assert_eq!(
        insts[1].content().reject_reason(),
        Some(&RejectReason::UnknownCustodian("c9".into()))
    );
    assert_eq!(h.custodian("c1").total().native(), 5 * UNIT);
}

#[test]
fn test_waiting_porting_top_up() {
    let mut h = Harness::bootstrapped();
    h.step(vec![porting("p1", UNIT, 100_000)]);

    // 1.5 native against 1.2 worth of pBNB is 125%, inside the band
    h.step(vec![feed(FEEDERS[0], 120)]);
    assert!(h.snapshot.waiting_porting(&"p1".into()).is_some());

    let insts = h.step(vec![Action::WaitingPortingTopUp {
        porting_id: "p1".into(),
        custodian: "c1".into(),
        token: bnb(),
        asset: TokenId::native(),
        deposit: 0,
        free_collateral_selected: true,
    }]);
    assert_eq!(insts[0].status(), InstStatus::Accepted);
    let InstructionContent::WaitingPortingTopUp(content) = insts[0].content() else {
        panic!("expected a porting top-up, got {:?}", insts[0]);
    };
    assert_eq!(content.porting_id, Some(PortingId::from("p1")));
    assert_eq!(content.locked_added, 300_000_000);

    let req = h.snapshot.waiting_porting(&"p1".into()).expect("p1 waiting");
    assert_eq!(req.custodians()[0].locked.native(), 1_800_000_000);
    assert_eq!(h.custodian("c1").locked_for(&bnb()).native(), 1_800_000_000);
    assert_eq!(h.custodian("c1").free().native(), 3_200_000_000);
}
