//! The portal state for one beacon height.

use std::{collections::BTreeMap, sync::Arc};

use borsh::{BorshDeserialize, BorshSerialize};
use portal_primitives::{
    BeaconHeight, Collaterals, IncAddress, PortingId, RedeemId, TokenId, math::checked_add,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    custodian::CustodianState,
    errors::{StateError, StateResult},
    liquidation::{LiquidationPool, LockedCollateralState},
    porting::WaitingPortingRequest,
    rates::{ExchangeRateSubmission, FinalExchangeRates},
    redeem::{RedeemPool, RedeemRequest},
};

/// Working set of portal state at one beacon height.
///
/// Records sit behind [`Arc`] so that advancing to the next height shares
/// them with the previous snapshot; a record is copied only when it is
/// mutated through one of the `*_mut` accessors.
#[derive(
    Clone, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct PortalSnapshot {
    beacon_height: BeaconHeight,
    custodians: BTreeMap<IncAddress, Arc<CustodianState>>,
    waiting_portings: BTreeMap<PortingId, Arc<WaitingPortingRequest>>,
    waiting_redeems: BTreeMap<RedeemId, Arc<RedeemRequest>>,
    matched_redeems: BTreeMap<RedeemId, Arc<RedeemRequest>>,
    /// Submissions received at this height, by feeder.
    exchange_rate_submissions: BTreeMap<IncAddress, ExchangeRateSubmission>,
    final_exchange_rates: Option<Arc<FinalExchangeRates>>,
    liquidation_pool: LiquidationPool,
    locked_collateral: LockedCollateralState,
}

impl PortalSnapshot {
    /// Empty state at `height`.
    pub fn genesis(height: BeaconHeight) -> Self {
        Self {
            beacon_height: height,
            ..Default::default()
        }
    }

    pub fn beacon_height(&self) -> BeaconHeight {
        self.beacon_height
    }

    /// Returns the starting state for the next height.
    ///
    /// Only the height and the per-height rate submissions change, every
    /// record is shared with `self`.
    pub fn advanced(&self) -> Self {
        let mut next = self.clone();
        next.beacon_height += 1;
        next.exchange_rate_submissions.clear();
        next
    }

    // custodians

    pub fn custodians(&self) -> impl Iterator<Item = &CustodianState> {
        self.custodians.values().map(Arc::as_ref)
    }

    pub fn custodian(&self, addr: &IncAddress) -> Option<&CustodianState> {
        self.custodians.get(addr).map(Arc::as_ref)
    }

    pub fn custodian_mut(&mut self, addr: &IncAddress) -> Option<&mut CustodianState> {
        self.custodians.get_mut(addr).map(Arc::make_mut)
    }

    /// Returns the custodian, creating an empty one on first use.
    pub fn custodian_or_insert(&mut self, addr: &IncAddress) -> &mut CustodianState {
        let slot = self
            .custodians
            .entry(addr.clone())
            .or_insert_with(|| Arc::new(CustodianState::new(addr.clone())));
        Arc::make_mut(slot)
    }

    pub fn insert_custodian(&mut self, state: CustodianState) {
        self.custodians
            .insert(state.address().clone(), Arc::new(state));
    }

    // porting

    pub fn waiting_portings(&self) -> impl Iterator<Item = &WaitingPortingRequest> {
        self.waiting_portings.values().map(Arc::as_ref)
    }

    pub fn waiting_porting(&self, id: &PortingId) -> Option<&WaitingPortingRequest> {
        self.waiting_portings.get(id).map(Arc::as_ref)
    }

    pub fn waiting_porting_mut(&mut self, id: &PortingId) -> Option<&mut WaitingPortingRequest> {
        self.waiting_portings.get_mut(id).map(Arc::make_mut)
    }

    pub fn insert_waiting_porting(&mut self, req: WaitingPortingRequest) {
        self.waiting_portings
            .insert(req.porting_id().clone(), Arc::new(req));
    }

    pub fn remove_waiting_porting(&mut self, id: &PortingId) -> Option<Arc<WaitingPortingRequest>> {
        self.waiting_portings.remove(id)
    }

    // redeem

    fn redeem_map(&self, pool: RedeemPool) -> &BTreeMap<RedeemId, Arc<RedeemRequest>> {
        match pool {
            RedeemPool::Waiting => &self.waiting_redeems,
            RedeemPool::Matched => &self.matched_redeems,
        }
    }

    fn redeem_map_mut(&mut self, pool: RedeemPool) -> &mut BTreeMap<RedeemId, Arc<RedeemRequest>> {
        match pool {
            RedeemPool::Waiting => &mut self.waiting_redeems,
            RedeemPool::Matched => &mut self.matched_redeems,
        }
    }

    pub fn redeems(&self, pool: RedeemPool) -> impl Iterator<Item = &RedeemRequest> {
        self.redeem_map(pool).values().map(Arc::as_ref)
    }

    pub fn redeem(&self, pool: RedeemPool, id: &RedeemId) -> Option<&RedeemRequest> {
        self.redeem_map(pool).get(id).map(Arc::as_ref)
    }

    /// Finds a redeem request in either pool, matched pool first.
    pub fn find_redeem(&self, id: &RedeemId) -> Option<(RedeemPool, &RedeemRequest)> {
        self.redeem(RedeemPool::Matched, id)
            .map(|r| (RedeemPool::Matched, r))
            .or_else(|| self.redeem(RedeemPool::Waiting, id).map(|r| (RedeemPool::Waiting, r)))
    }

    pub fn redeem_mut(&mut self, pool: RedeemPool, id: &RedeemId) -> Option<&mut RedeemRequest> {
        self.redeem_map_mut(pool).get_mut(id).map(Arc::make_mut)
    }

    pub fn insert_redeem(&mut self, pool: RedeemPool, req: RedeemRequest) {
        self.redeem_map_mut(pool)
            .insert(req.redeem_id().clone(), Arc::new(req));
    }

    pub fn remove_redeem(&mut self, pool: RedeemPool, id: &RedeemId) -> Option<Arc<RedeemRequest>> {
        self.redeem_map_mut(pool).remove(id)
    }

    /// Moves a waiting request into the matched pool.
    pub fn promote_redeem(&mut self, id: &RedeemId) -> bool {
        match self.waiting_redeems.remove(id) {
            Some(req) => {
                self.matched_redeems.insert(id.clone(), req);
                true
            }
            None => false,
        }
    }

    /// Moves a matched request back into the waiting pool.
    pub fn demote_redeem(&mut self, id: &RedeemId) -> bool {
        match self.matched_redeems.remove(id) {
            Some(req) => {
                self.waiting_redeems.insert(id.clone(), req);
                true
            }
            None => false,
        }
    }

    // exchange rates

    pub fn exchange_rate_submissions(&self) -> &BTreeMap<IncAddress, ExchangeRateSubmission> {
        &self.exchange_rate_submissions
    }

    /// Records a feeder's submission, replacing an earlier one from the same
    /// feeder at this height.
    pub fn record_rate_submission(&mut self, submission: ExchangeRateSubmission) {
        self.exchange_rate_submissions
            .insert(submission.sender.clone(), submission);
    }

    pub fn final_exchange_rates(&self) -> Option<&FinalExchangeRates> {
        self.final_exchange_rates.as_deref()
    }

    pub fn set_final_exchange_rates(&mut self, rates: FinalExchangeRates) {
        self.final_exchange_rates = Some(Arc::new(rates));
    }

    // liquidation / rewards

    pub fn liquidation_pool(&self) -> &LiquidationPool {
        &self.liquidation_pool
    }

    pub fn liquidation_pool_mut(&mut self) -> &mut LiquidationPool {
        &mut self.liquidation_pool
    }

    pub fn locked_collateral(&self) -> &LockedCollateralState {
        &self.locked_collateral
    }

    pub fn locked_collateral_mut(&mut self) -> &mut LockedCollateralState {
        &mut self.locked_collateral
    }

    // derived views

    /// Collateral a custodian has locked for `ptoken` inside waiting porting
    /// requests. It does not back any held pTokens yet.
    pub fn locked_in_waiting_portings(
        &self,
        custodian: &IncAddress,
        ptoken: &TokenId,
    ) -> StateResult<Collaterals> {
        let mut sum = Collaterals::new();
        for req in self.waiting_portings().filter(|r| r.token() == ptoken) {
            if let Some(detail) = req.custodian(custodian) {
                sum.checked_add_assign(&detail.locked)?;
            }
        }
        Ok(sum)
    }

    /// Locked collateral backing a custodian's pToken obligations.
    pub fn effective_locked(
        &self,
        custodian: &CustodianState,
        ptoken: &TokenId,
    ) -> StateResult<Collaterals> {
        let mut locked = custodian.locked_for(ptoken);
        let in_porting = self.locked_in_waiting_portings(custodian.address(), ptoken)?;
        locked.checked_sub_assign(&in_porting).map_err(|_| {
            StateError::Invariant(format!(
                "custodian {} locks less for {ptoken} than its waiting portings",
                custodian.address()
            ))
        })?;
        Ok(locked)
    }

    /// pTokens a custodian is liable for: what it holds plus what it is
    /// matched to pay out in open redeem requests.
    pub fn total_held(&self, custodian: &CustodianState, ptoken: &TokenId) -> StateResult<u64> {
        let mut total = custodian.holding(ptoken);
        for pool in [RedeemPool::Waiting, RedeemPool::Matched] {
            for req in self.redeems(pool).filter(|r| r.token() == ptoken) {
                total = checked_add(total, req.matched_to(custodian.address()))?;
            }
        }
        Ok(total)
    }

    /// Checks the record-level invariants across the whole snapshot.
    pub fn check_invariants(&self) -> StateResult<()> {
        for cust in self.custodians() {
            cust.check_balance()?;
        }
        for req in self.waiting_portings() {
            req.check_matched()?;
        }
        for pool in [RedeemPool::Waiting, RedeemPool::Matched] {
            for req in self.redeems(pool) {
                req.check_matched(pool)?;
            }
        }
        Ok(())
    }

    /// SHA-256 of the canonical borsh encoding.
    pub fn digest(&self) -> StateResult<[u8; 32]> {
        let bytes = borsh::to_vec(self)?;
        Ok(Sha256::digest(&bytes).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_shares_records() {
        let mut snap = PortalSnapshot::genesis(10);
        snap.custodian_or_insert(&"c1".into())
            .deposit(&TokenId::native(), 100)
            .expect("deposit");
        snap.record_rate_submission(ExchangeRateSubmission {
            sender: "feeder".into(),
            rates: BTreeMap::new(),
        });

        let next = snap.advanced();
        assert_eq!(next.beacon_height(), 11);
        assert!(next.exchange_rate_submissions().is_empty());
        let a = snap.custodians.get(&IncAddress::from("c1")).expect("c1");
        let b = next.custodians.get(&IncAddress::from("c1")).expect("c1");
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_mutation_after_advance_copies_on_write() {
        let mut snap = PortalSnapshot::genesis(0);
        snap.custodian_or_insert(&"c1".into())
            .deposit(&TokenId::native(), 100)
            .expect("deposit");
        let mut next = snap.advanced();
        next.custodian_mut(&"c1".into())
            .expect("c1")
            .deposit(&TokenId::native(), 1)
            .expect("deposit");

        let old = snap.custodian(&"c1".into()).expect("c1");
        let new = next.custodian(&"c1".into()).expect("c1");
        assert_eq!(old.total_collateral(), 100);
        assert_eq!(new.total_collateral(), 101);
    }

    #[test]
    fn test_digest_is_stable_and_sensitive() {
        let mut a = PortalSnapshot::genesis(5);
        let b = a.clone();
        assert_eq!(a.digest().expect("digest"), b.digest().expect("digest"));
        a.custodian_or_insert(&"c1".into());
        assert_ne!(a.digest().expect("digest"), b.digest().expect("digest"));
    }

    #[test]
    fn test_promote_redeem() {
        let mut snap = PortalSnapshot::genesis(0);
        let req = RedeemRequest::new(
            "r1".into(),
            "pBTC".into(),
            "user".into(),
            "addr".to_owned(),
            10,
            1,
            Vec::new(),
            0,
            0,
        );
        snap.insert_redeem(RedeemPool::Waiting, req);
        assert!(snap.promote_redeem(&"r1".into()));
        assert!(matches!(
            snap.find_redeem(&"r1".into()),
            Some((RedeemPool::Matched, _))
        ));
        assert!(!snap.promote_redeem(&"r1".into()));
    }
}
