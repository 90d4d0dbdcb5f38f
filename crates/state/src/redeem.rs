//! Redeem (burn) requests.

use borsh::{BorshDeserialize, BorshSerialize};
use portal_primitives::{
    BeaconHeight, IncAddress, MathResult, RedeemId, ShardId, TokenId,
    math::{checked_add, mul_div_floor},
};
use serde::{Deserialize, Serialize};

use crate::errors::{StateError, StateResult};

/// Which pool a redeem request sits in.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    BorshDeserialize,
    BorshSerialize,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RedeemPool {
    /// Not fully covered by custodians yet.
    Waiting,
    /// Fully covered, custodians owe the external payment.
    Matched,
}

/// One custodian's share of a redeem request.
#[derive(
    Clone, Debug, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct MatchingRedeemCustodianDetail {
    pub custodian: IncAddress,
    pub remote_address: String,
    pub amount: u64,
}

/// A redeem request.
///
/// Shares settle one at a time (paid out, or liquidated). `settled_amount`
/// and `settled_fee` track what is already settled so the outstanding values
/// always match the remaining shares of a fully matched request.
#[derive(
    Clone, Debug, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct RedeemRequest {
    redeem_id: RedeemId,
    token: TokenId,
    redeemer: IncAddress,
    remote_address: String,
    redeem_amount: u64,
    redeem_fee: u64,
    custodians: Vec<MatchingRedeemCustodianDetail>,
    beacon_height: BeaconHeight,
    shard_id: ShardId,
    settled_amount: u64,
    settled_fee: u64,
}

impl RedeemRequest {
    #[expect(clippy::too_many_arguments, reason = "plain record constructor")]
    pub fn new(
        redeem_id: RedeemId,
        token: TokenId,
        redeemer: IncAddress,
        remote_address: String,
        redeem_amount: u64,
        redeem_fee: u64,
        custodians: Vec<MatchingRedeemCustodianDetail>,
        beacon_height: BeaconHeight,
        shard_id: ShardId,
    ) -> Self {
        Self {
            redeem_id,
            token,
            redeemer,
            remote_address,
            redeem_amount,
            redeem_fee,
            custodians,
            beacon_height,
            shard_id,
            settled_amount: 0,
            settled_fee: 0,
        }
    }

    pub fn redeem_id(&self) -> &RedeemId {
        &self.redeem_id
    }

    pub fn token(&self) -> &TokenId {
        &self.token
    }

    pub fn redeemer(&self) -> &IncAddress {
        &self.redeemer
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn redeem_amount(&self) -> u64 {
        self.redeem_amount
    }

    pub fn redeem_fee(&self) -> u64 {
        self.redeem_fee
    }

    pub fn custodians(&self) -> &[MatchingRedeemCustodianDetail] {
        &self.custodians
    }

    pub fn beacon_height(&self) -> BeaconHeight {
        self.beacon_height
    }

    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    pub fn outstanding_amount(&self) -> u64 {
        self.redeem_amount - self.settled_amount
    }

    pub fn outstanding_fee(&self) -> u64 {
        self.redeem_fee - self.settled_fee
    }

    pub fn matched_amount(&self) -> u64 {
        self.custodians.iter().map(|c| c.amount).sum()
    }

    /// Part of the outstanding amount no custodian has claimed.
    pub fn unmatched_amount(&self) -> u64 {
        self.outstanding_amount().saturating_sub(self.matched_amount())
    }

    pub fn is_fully_matched(&self) -> bool {
        self.unmatched_amount() == 0
    }

    pub fn custodian(&self, addr: &IncAddress) -> Option<&MatchingRedeemCustodianDetail> {
        self.custodians.iter().find(|c| &c.custodian == addr)
    }

    /// Amount matched to `addr`, zero if not matched.
    pub fn matched_to(&self, addr: &IncAddress) -> u64 {
        self.custodian(addr).map(|c| c.amount).unwrap_or(0)
    }

    pub fn is_timed_out(&self, block_height: BeaconHeight, timeout: u64) -> bool {
        block_height.saturating_sub(self.beacon_height) >= timeout
    }

    /// Fee portion that goes with a share of `amount`.
    ///
    /// The last share to settle receives exactly the remaining fee.
    pub fn fee_share(&self, amount: u64) -> MathResult<u64> {
        mul_div_floor(amount, self.outstanding_fee(), self.outstanding_amount())
    }

    /// Adds a custodian share, merging with an existing share of the same
    /// custodian.
    pub fn add_custodian(&mut self, detail: MatchingRedeemCustodianDetail) -> StateResult<()> {
        let new_matched = checked_add(self.matched_amount(), detail.amount)?;
        if new_matched > self.outstanding_amount() {
            return Err(StateError::Invariant(format!(
                "redeem {} would be matched {new_matched} of {}",
                self.redeem_id,
                self.outstanding_amount()
            )));
        }
        match self
            .custodians
            .iter_mut()
            .find(|c| c.custodian == detail.custodian)
        {
            Some(existing) => existing.amount += detail.amount,
            None => self.custodians.push(detail),
        }
        Ok(())
    }

    /// Removes a custodian share without settling it.
    pub fn remove_custodian(
        &mut self,
        addr: &IncAddress,
    ) -> StateResult<MatchingRedeemCustodianDetail> {
        let pos = self
            .custodians
            .iter()
            .position(|c| &c.custodian == addr)
            .ok_or_else(|| {
                StateError::CustodianNotMatched(addr.clone(), self.redeem_id.to_string())
            })?;
        Ok(self.custodians.remove(pos))
    }

    /// Removes a custodian share and marks it, with its fee portion, as
    /// settled.
    pub fn settle_custodian(
        &mut self,
        addr: &IncAddress,
        fee_share: u64,
    ) -> StateResult<MatchingRedeemCustodianDetail> {
        if fee_share > self.outstanding_fee() {
            return Err(StateError::Invariant(format!(
                "redeem {} fee share {fee_share} exceeds outstanding fee",
                self.redeem_id
            )));
        }
        let detail = self.remove_custodian(addr)?;
        self.settled_amount += detail.amount;
        self.settled_fee += fee_share;
        Ok(detail)
    }

    pub fn check_matched(&self, pool: RedeemPool) -> StateResult<()> {
        let matched = self.matched_amount();
        let outstanding = self.outstanding_amount();
        let ok = match pool {
            RedeemPool::Waiting => matched <= outstanding,
            RedeemPool::Matched => matched == outstanding,
        };
        if !ok {
            return Err(StateError::Invariant(format!(
                "redeem {} in {pool:?} pool matched {matched} of {outstanding}",
                self.redeem_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(addr: &str, amount: u64) -> MatchingRedeemCustodianDetail {
        MatchingRedeemCustodianDetail {
            custodian: addr.into(),
            remote_address: format!("remote-{addr}"),
            amount,
        }
    }

    fn request(amount: u64, fee: u64) -> RedeemRequest {
        RedeemRequest::new(
            "r1".into(),
            "pBTC".into(),
            "user".into(),
            "btc-user".to_owned(),
            amount,
            fee,
            Vec::new(),
            10,
            0,
        )
    }

    #[test]
    fn test_matching_cannot_exceed_requested() {
        let mut req = request(100, 10);
        req.add_custodian(detail("a", 60)).expect("add a");
        assert_eq!(req.unmatched_amount(), 40);
        assert!(req.add_custodian(detail("b", 41)).is_err());
        req.add_custodian(detail("a", 40)).expect("merge a");
        assert!(req.is_fully_matched());
        assert_eq!(req.custodians().len(), 1);
        req.check_matched(RedeemPool::Matched).expect("fully matched");
    }

    #[test]
    fn test_fee_shares_sum_to_fee() {
        let mut req = request(100, 10);
        req.add_custodian(detail("a", 33)).expect("add");
        req.add_custodian(detail("b", 33)).expect("add");
        req.add_custodian(detail("c", 34)).expect("add");

        let mut paid = 0;
        for addr in ["a", "b", "c"] {
            let amount = req.matched_to(&addr.into());
            let share = req.fee_share(amount).expect("share");
            req.settle_custodian(&addr.into(), share).expect("settle");
            paid += share;
            req.check_matched(RedeemPool::Matched).expect("still balanced");
        }
        assert_eq!(paid, 10);
        assert_eq!(req.outstanding_amount(), 0);
        assert_eq!(req.outstanding_fee(), 0);
    }

    #[test]
    fn test_timeout_boundary() {
        let req = request(1, 0);
        assert!(!req.is_timed_out(14, 5));
        assert!(req.is_timed_out(15, 5));
    }
}
