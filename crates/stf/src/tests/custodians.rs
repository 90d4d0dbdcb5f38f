//! Custodian deposits and withdrawals.

use std::collections::BTreeMap;

use portal_instructions::{Action, InstStatus, InstructionContent, RejectReason};
use portal_primitives::TokenId;
use portal_state::{StatusKind, TrackedStatus};

use crate::test_utils::*;

#[test]
fn test_deposit_registers_remote_address_once() {
    let mut h = Harness::bootstrapped();
    let c1 = h.custodian("c1");
    assert_eq!(c1.total().native(), 5 * UNIT);
    assert_eq!(c1.free().native(), 5 * UNIT);
    assert_eq!(c1.remote_address(&bnb()), Some("b1"));

    let insts = h.step(vec![deposit("c1", UNIT, Some("b1-new"))]);
    assert_eq!(insts.len(), 1);
    assert_eq!(insts[0].status(), InstStatus::Accepted);
    let InstructionContent::CustodianDeposit(content) = insts[0].content() else {
        panic!("expected a deposit, got {:?}", insts[0]);
    };
    assert!(content.remote_addresses.is_empty());

    let c1 = h.custodian("c1");
    assert_eq!(c1.total().native(), 6 * UNIT);
    assert_eq!(c1.remote_address(&bnb()), Some("b1"));
    assert_eq!(
        h.status(StatusKind::CustodianDeposit, &tx_id(2, 0)),
        Some(TrackedStatus::Success)
    );
}

#[test]
fn test_deposit_rejections() {
    let mut h = Harness::bootstrapped();
    let insts = h.step(vec![
        deposit("c3", 0, None),
        Action::CustodianDeposit {
            custodian: "c3".into(),
            asset: TokenId::from("doge"),
            amount: UNIT,
            remote_addresses: BTreeMap::new(),
        },
        Action::CustodianDeposit {
            custodian: "c3".into(),
            asset: TokenId::native(),
            amount: UNIT,
            remote_addresses: [(TokenId::from("pDOGE"), "d1".to_owned())].into_iter().collect(),
        },
    ]);

    let reasons: Vec<_> = insts.iter().map(|i| i.content().reject_reason()).collect();
    assert_eq!(
        reasons,
        [
            Some(&RejectReason::ZeroAmount),
            Some(&RejectReason::UnsupportedCollateral(TokenId::from("doge"))),
            Some(&RejectReason::UnsupportedToken(TokenId::from("pDOGE"))),
        ]
    );
    assert!(h.snapshot.custodian(&"c3".into()).is_none());
    assert_eq!(
        h.status(StatusKind::CustodianDeposit, &tx_id(2, 1)),
        Some(TrackedStatus::Rejected)
    );
}

#[test]
fn test_unpriced_collateral_deposit_is_rejected() {
    let mut h = Harness::new();
    let rates = [(TokenId::native(), 100), (bnb(), 100)].into_iter().collect();
    h.step(vec![
        Action::ExchangeRates {
            sender: FEEDERS[0].into(),
            rates,
        },
        deposit("c1", 5 * UNIT, Some("b1")),
    ]);

    let insts = h.step(vec![deposit_usdt("c2", 1), deposit_usdt("c1", UNIT)]);
    for inst in &insts {
        assert_eq!(
            inst.content().reject_reason(),
            Some(&RejectReason::MissingExchangeRate(usdt()))
        );
    }
    assert!(h.snapshot.custodian(&"c2".into()).is_none());
    assert_eq!(h.custodian("c1").total().get(&usdt()), 0);

    // priced collateral keeps serving portings and the scans keep running
    let insts = h.step(vec![porting("p1", UNIT, 100_000)]);
    assert_eq!(insts[0].status(), InstStatus::Accepted);
    h.step(vec![request_ptokens("p1", UNIT, proof("p1", &[("b1", UNIT)]))]);
    h.step(vec![redeem("r1", 2 * UNIT, 200_000)]);
    h.advance_to(12);
    assert_eq!(h.status(StatusKind::Redeem, "r1"), Some(TrackedStatus::Refunded));

    // the next height after a feeder prices the asset accepts it
    h.step(vec![feed(FEEDERS[0], 100)]);
    let insts = h.step(vec![deposit_usdt("c2", UNIT)]);
    assert_eq!(insts[0].status(), InstStatus::Accepted);
    assert_eq!(h.custodian("c2").total().get(&usdt()), UNIT);
}

#[test]
fn test_withdraw_only_from_free_collateral() {
    let mut h = Harness::bootstrapped();
    h.step(vec![porting("p1", UNIT, 100_000)]);
    assert_eq!(h.custodian("c1").free().native(), 3_500_000_000);

    let insts = h.step(vec![
        Action::CustodianWithdraw {
            custodian: "c1".into(),
            asset: TokenId::native(),
            amount: 4 * UNIT,
        },
        Action::CustodianWithdraw {
            custodian: "c1".into(),
            asset: TokenId::native(),
            amount: 3_500_000_000,
        },
        Action::CustodianWithdraw {
            custodian: "nobody".into(),
            asset: TokenId::native(),
            amount: 1,
        },
    ]);

    assert_eq!(
        insts[0].content().reject_reason(),
        Some(&RejectReason::InsufficientFreeCollateral)
    );
    assert_eq!(insts[1].status(), InstStatus::Accepted);
    assert_eq!(
        insts[2].content().reject_reason(),
        Some(&RejectReason::UnknownCustodian("nobody".into()))
    );

    let c1 = h.custodian("c1");
    assert_eq!(c1.free().native(), 0);
    assert_eq!(c1.total().native(), 1_500_000_000);
    assert_eq!(c1.locked_for(&bnb()).native(), 1_500_000_000);
}
