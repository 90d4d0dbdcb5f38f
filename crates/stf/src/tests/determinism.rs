//! Replay determinism, rate aggregation and processor consistency checks.

use portal_instructions::{Action, InstStatus, Instruction, RejectReason, ShardAction};
use portal_state::PortalSnapshot;

use crate::{StfError, process_instructions, produce_instructions, test_utils::*};

fn shard_action(shard_id: u8, index: u32, action: Action) -> ShardAction {
    ShardAction {
        shard_id,
        index,
        tx_id: format!("s{shard_id}-{index}"),
        action,
    }
}

#[test]
fn test_replay_is_deterministic() {
    let mut h = Harness::bootstrapped();
    h.step(vec![porting("p1", UNIT, 100_000)]);

    let actions = vec![
        shard_action(0, 0, request_ptokens("p1", UNIT, proof("p1", &[("b1", UNIT)]))),
        shard_action(0, 1, deposit("c3", 3 * UNIT, Some("b3"))),
        shard_action(1, 0, porting("p2", UNIT, 100_000)),
        shard_action(2, 0, feed(FEEDERS[1], 110)),
    ];
    let mut reversed = actions.clone();
    reversed.reverse();

    let first = produce_instructions(&h.snapshot, &h.schedule, &h.statuses, actions)
        .expect("produce");
    let second = produce_instructions(&h.snapshot, &h.schedule, &h.statuses, reversed)
        .expect("produce");
    assert_eq!(first, second);

    let a = process_instructions(&h.snapshot, &h.schedule, &first).expect("process");
    let b = process_instructions(&h.snapshot, &h.schedule, &second).expect("process");
    assert_eq!(
        a.snapshot.digest().expect("digest"),
        b.snapshot.digest().expect("digest")
    );
    assert_eq!(a.statuses, b.statuses);
    a.snapshot.check_invariants().expect("invariants");
}

#[test]
fn test_raw_instructions_replay_identically() {
    let mut h = Harness::bootstrapped();
    let insts = h.step(vec![porting("p1", UNIT, 100_000), redeem("r1", UNIT, 100_000)]);

    let decoded: Vec<_> = insts
        .iter()
        .map(|i| {
            let raw = i.to_raw().expect("encode");
            Instruction::from_raw(&raw).expect("decode")
        })
        .collect();
    assert_eq!(decoded, insts);
}

#[test]
fn test_median_of_feeder_submissions() {
    let mut h = Harness::bootstrapped();

    let insts = h.step(vec![
        feed(FEEDERS[0], 100),
        feed(FEEDERS[1], 120),
        feed(FEEDERS[2], 110),
        feed("stranger", 1),
    ]);
    assert_eq!(
        insts[3].content().reject_reason(),
        Some(&RejectReason::NotFeeder("stranger".into()))
    );
    let rates = h.snapshot.final_exchange_rates().expect("rates");
    assert_eq!(rates.get(&bnb()), Some(110));

    // even count averages the middle pair, rounding down
    h.step(vec![feed(FEEDERS[0], 100), feed(FEEDERS[1], 121)]);
    let rates = h.snapshot.final_exchange_rates().expect("rates");
    assert_eq!(rates.get(&bnb()), Some(110));

    // no submissions keep the previous table
    h.step(Vec::new());
    let rates = h.snapshot.final_exchange_rates().expect("rates");
    assert_eq!(rates.get(&bnb()), Some(110));
}

#[test]
fn test_later_submission_replaces_earlier_from_same_feeder() {
    let mut h = Harness::bootstrapped();

    let insts = h.step(vec![
        feed(FEEDERS[0], 100),
        feed(FEEDERS[0], 200),
        feed(FEEDERS[1], 300),
    ]);
    assert!(insts.iter().all(|i| i.status() == InstStatus::Accepted));
    assert_eq!(h.snapshot.exchange_rate_submissions().len(), 2);
    // median of 200 and 300, the first 100 is gone
    let rates = h.snapshot.final_exchange_rates().expect("rates");
    assert_eq!(rates.get(&bnb()), Some(250));
}

#[test]
fn test_processor_rejects_divergent_instructions() {
    let mut h = Harness::bootstrapped();
    let prev = h.snapshot.clone();
    let insts = h.step(vec![porting("p1", UNIT, 100_000)]);
    assert_eq!(insts[0].status(), InstStatus::Accepted);

    // same height, but the matched custodian does not exist
    let empty = PortalSnapshot::genesis(prev.beacon_height());
    let err = process_instructions(&empty, &h.schedule, &insts).expect_err("must fail");
    assert!(matches!(err, StfError::MissingCustodian(_)), "{err}");
}
