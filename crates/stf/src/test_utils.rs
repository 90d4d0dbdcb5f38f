//! Helpers for driving whole heights through the producer and the processor.

use std::collections::BTreeMap;

use portal_instructions::{Action, Instruction, RelayProof, RelayTransfer, ShardAction};
use portal_params::{ParamsSchedule, PortalParams};
use portal_primitives::{IncAddress, TokenId};
use portal_state::{CustodianState, PortalSnapshot, StatusKind, StatusRecord, TrackedStatus};

use crate::{process_instructions, produce_instructions};

pub(crate) const BNB: &str = "pBNB";
pub(crate) const USDT: &str = "usdt";
pub(crate) const FEEDERS: [&str; 3] = ["feeder-1", "feeder-2", "feeder-3"];
pub(crate) const PORTER: &str = "porter";
pub(crate) const REDEEMER: &str = "redeemer";
pub(crate) const REDEEMER_REMOTE: &str = "bnb-redeemer";

/// One whole pBNB, and one whole unit of every other asset.
pub(crate) const UNIT: u64 = 1_000_000_000;

pub(crate) fn test_params() -> PortalParams {
    PortalParams {
        time_out_porting_request: 5,
        time_out_redeem_request: 5,
        time_out_custodian_return_pub_token: 10,
        tp120: 120,
        tp130: 130,
        min_percent_locked_collateral: 150,
        max_percent_liquidated_collateral_amount: 120,
        min_percent_porting_fee: 1,
        min_percent_redeem_fee: 1,
        min_percent_custodian_rewards: 10,
        max_percent_custodian_rewards: 30,
        epoch_length: 10,
        native_decimals: 9,
        supported_collaterals: [(TokenId::from(USDT), 9)].into_iter().collect(),
        supported_ptokens: [(TokenId::from(BNB), 9)].into_iter().collect(),
        feeders: FEEDERS.iter().map(|f| IncAddress::from(*f)).collect(),
    }
}

pub(crate) fn bnb() -> TokenId {
    TokenId::from(BNB)
}

pub(crate) fn usdt() -> TokenId {
    TokenId::from(USDT)
}

pub(crate) fn tx_id(height: u64, index: u32) -> String {
    format!("tx-{height}-{index}")
}

pub(crate) fn deposit(custodian: &str, amount: u64, remote: Option<&str>) -> Action {
    Action::CustodianDeposit {
        custodian: custodian.into(),
        asset: TokenId::native(),
        amount,
        remote_addresses: remote
            .map(|r| (bnb(), r.to_owned()))
            .into_iter()
            .collect(),
    }
}

pub(crate) fn deposit_usdt(custodian: &str, amount: u64) -> Action {
    Action::CustodianDeposit {
        custodian: custodian.into(),
        asset: usdt(),
        amount,
        remote_addresses: BTreeMap::new(),
    }
}

/// Rate submission pricing the native asset at 100 and pBNB at `bnb_rate`.
pub(crate) fn feed(feeder: &str, bnb_rate: u64) -> Action {
    let mut rates = BTreeMap::new();
    rates.insert(TokenId::native(), 100);
    rates.insert(bnb(), bnb_rate);
    rates.insert(TokenId::from(USDT), 100);
    Action::ExchangeRates {
        sender: feeder.into(),
        rates,
    }
}

pub(crate) fn porting(id: &str, amount: u64, fee: u64) -> Action {
    Action::PortingRequest {
        porting_id: id.into(),
        token: bnb(),
        porter: PORTER.into(),
        amount,
        fee,
        shard_height: 1,
    }
}

pub(crate) fn proof(memo: &str, transfers: &[(&str, u64)]) -> RelayProof {
    RelayProof {
        verified: true,
        memo: memo.to_owned(),
        transfers: transfers
            .iter()
            .map(|(receiver, amount)| RelayTransfer {
                receiver: (*receiver).to_owned(),
                amount: *amount,
            })
            .collect(),
    }
}

pub(crate) fn request_ptokens(id: &str, amount: u64, proof: RelayProof) -> Action {
    Action::RequestPTokens {
        porting_id: id.into(),
        token: bnb(),
        porter: PORTER.into(),
        amount,
        proof,
    }
}

pub(crate) fn redeem(id: &str, amount: u64, fee: u64) -> Action {
    Action::RedeemRequest {
        redeem_id: id.into(),
        token: bnb(),
        redeemer: REDEEMER.into(),
        remote_address: REDEEMER_REMOTE.to_owned(),
        amount,
        fee,
    }
}

pub(crate) fn unlock(id: &str, custodian: &str, amount: u64) -> Action {
    Action::UnlockCollateral {
        redeem_id: id.into(),
        token: bnb(),
        custodian: custodian.into(),
        redeem_amount: amount,
        proof: proof(id, &[(REDEEMER_REMOTE, amount)]),
    }
}

/// Drives the producer and the processor one height at a time, keeping the
/// status records between heights the way a node would.
#[derive(Debug)]
pub(crate) struct Harness {
    pub(crate) snapshot: PortalSnapshot,
    pub(crate) schedule: ParamsSchedule,
    pub(crate) statuses: BTreeMap<(StatusKind, String), StatusRecord>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self {
            snapshot: PortalSnapshot::genesis(0),
            schedule: ParamsSchedule::single(test_params()).expect("valid test params"),
            statuses: BTreeMap::new(),
        }
    }

    /// Height 1: rates 100 for every asset, custodian `c1` with 5 native
    /// units and `c2` with 2, both serving pBNB.
    pub(crate) fn bootstrapped() -> Self {
        let mut h = Self::new();
        h.step(vec![
            feed(FEEDERS[0], 100),
            deposit("c1", 5 * UNIT, Some("b1")),
            deposit("c2", 2 * UNIT, Some("b2")),
        ]);
        h
    }

    pub(crate) fn height(&self) -> u64 {
        self.snapshot.beacon_height()
    }

    /// Produces and processes the next height with `actions`, in order.
    pub(crate) fn step(&mut self, actions: Vec<Action>) -> Vec<Instruction> {
        let height = self.height() + 1;
        let actions = actions
            .into_iter()
            .enumerate()
            .map(|(i, action)| {
                let index = u32::try_from(i).expect("action index");
                ShardAction {
                    shard_id: 0,
                    index,
                    tx_id: tx_id(height, index),
                    action,
                }
            })
            .collect();

        let insts = produce_instructions(&self.snapshot, &self.schedule, &self.statuses, actions)
            .expect("produce instructions");
        let block = process_instructions(&self.snapshot, &self.schedule, &insts)
            .expect("process instructions");
        for rec in block.statuses {
            self.statuses.insert((rec.kind, rec.id.clone()), rec);
        }
        self.snapshot = block.snapshot;
        insts
    }

    /// Runs empty heights until `height` has been processed, returning every
    /// instruction the scans emitted on the way.
    pub(crate) fn advance_to(&mut self, height: u64) -> Vec<Instruction> {
        let mut out = Vec::new();
        while self.height() < height {
            out.extend(self.step(Vec::new()));
        }
        out
    }

    pub(crate) fn custodian(&self, addr: &str) -> &CustodianState {
        self.snapshot
            .custodian(&addr.into())
            .unwrap_or_else(|| panic!("custodian {addr} missing"))
    }

    pub(crate) fn status(&self, kind: StatusKind, id: &str) -> Option<TrackedStatus> {
        self.statuses
            .get(&(kind, id.to_owned()))
            .map(|r| r.status)
    }
}
