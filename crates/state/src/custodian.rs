//! Custodian collateral accounting.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use portal_primitives::{
    Collaterals, IncAddress, MathError, TokenId,
    math::{checked_add, checked_sub},
};
use serde::{Deserialize, Serialize};

use crate::errors::{StateError, StateResult};

/// Collateral and obligations of a single custodian.
///
/// For every collateral asset, `free + sum(locked over pTokens) == total`.
/// Every mutator here keeps that relation or fails without effect.
#[derive(
    Clone, Debug, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct CustodianState {
    address: IncAddress,
    total: Collaterals,
    free: Collaterals,
    /// Locked collateral per pToken.
    locked: BTreeMap<TokenId, Collaterals>,
    holding_public_tokens: BTreeMap<TokenId, u64>,
    remote_addresses: BTreeMap<TokenId, String>,
    reward_amount: BTreeMap<TokenId, u64>,
    /// Last ratio observed in the warning band, per pToken.
    tp_warnings: BTreeMap<TokenId, u64>,
}

impl CustodianState {
    pub fn new(address: IncAddress) -> Self {
        Self {
            address,
            total: Collaterals::new(),
            free: Collaterals::new(),
            locked: BTreeMap::new(),
            holding_public_tokens: BTreeMap::new(),
            remote_addresses: BTreeMap::new(),
            reward_amount: BTreeMap::new(),
            tp_warnings: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> &IncAddress {
        &self.address
    }

    pub fn total(&self) -> &Collaterals {
        &self.total
    }

    pub fn free(&self) -> &Collaterals {
        &self.free
    }

    pub fn total_collateral(&self) -> u64 {
        self.total.native()
    }

    pub fn free_collateral(&self) -> u64 {
        self.free.native()
    }

    pub fn total_token_collaterals(&self) -> &BTreeMap<TokenId, u64> {
        self.total.tokens()
    }

    pub fn free_token_collaterals(&self) -> &BTreeMap<TokenId, u64> {
        self.free.tokens()
    }

    /// Locked collateral bags keyed by pToken.
    pub fn locked(&self) -> &BTreeMap<TokenId, Collaterals> {
        &self.locked
    }

    pub fn locked_for(&self, ptoken: &TokenId) -> Collaterals {
        self.locked.get(ptoken).cloned().unwrap_or_default()
    }

    /// Native collateral locked for `ptoken`.
    pub fn locked_amount_collateral(&self, ptoken: &TokenId) -> u64 {
        self.locked.get(ptoken).map(Collaterals::native).unwrap_or(0)
    }

    pub fn holding(&self, ptoken: &TokenId) -> u64 {
        self.holding_public_tokens.get(ptoken).copied().unwrap_or(0)
    }

    pub fn holding_public_tokens(&self) -> &BTreeMap<TokenId, u64> {
        &self.holding_public_tokens
    }

    pub fn remote_address(&self, ptoken: &TokenId) -> Option<&str> {
        self.remote_addresses.get(ptoken).map(String::as_str)
    }

    pub fn remote_addresses(&self) -> &BTreeMap<TokenId, String> {
        &self.remote_addresses
    }

    pub fn reward(&self, asset: &TokenId) -> u64 {
        self.reward_amount.get(asset).copied().unwrap_or(0)
    }

    pub fn reward_amount(&self) -> &BTreeMap<TokenId, u64> {
        &self.reward_amount
    }

    pub fn tp_warning(&self, ptoken: &TokenId) -> Option<u64> {
        self.tp_warnings.get(ptoken).copied()
    }

    pub fn tp_warnings(&self) -> &BTreeMap<TokenId, u64> {
        &self.tp_warnings
    }

    /// Returns the subset of `addrs` that is not registered yet. Existing
    /// mappings never change.
    pub fn new_remote_addresses(
        &self,
        addrs: &BTreeMap<TokenId, String>,
    ) -> BTreeMap<TokenId, String> {
        addrs
            .iter()
            .filter(|(k, _)| !self.remote_addresses.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn register_remote_addresses(&mut self, addrs: &BTreeMap<TokenId, String>) {
        for (ptoken, addr) in addrs {
            self.remote_addresses
                .entry(ptoken.clone())
                .or_insert_with(|| addr.clone());
        }
    }

    pub fn deposit(&mut self, asset: &TokenId, amount: u64) -> StateResult<()> {
        let mut total = self.total.clone();
        let mut free = self.free.clone();
        total.add_asset(asset, amount)?;
        free.add_asset(asset, amount)?;
        self.total = total;
        self.free = free;
        Ok(())
    }

    pub fn withdraw(&mut self, asset: &TokenId, amount: u64) -> StateResult<()> {
        if self.free.get(asset) < amount {
            return Err(StateError::InsufficientFreeCollateral(self.address.clone()));
        }
        self.free.sub_asset(asset, amount)?;
        self.total.sub_asset(asset, amount)?;
        Ok(())
    }

    /// Moves `amount` from free to locked for `ptoken`.
    pub fn lock(&mut self, ptoken: &TokenId, amount: &Collaterals) -> StateResult<()> {
        if !self.free.covers(amount) {
            return Err(StateError::InsufficientFreeCollateral(self.address.clone()));
        }
        let mut locked = self.locked_for(ptoken);
        locked.checked_add_assign(amount)?;
        self.free.checked_sub_assign(amount)?;
        self.set_locked(ptoken, locked);
        Ok(())
    }

    /// Moves `amount` from locked for `ptoken` back to free.
    pub fn unlock(&mut self, ptoken: &TokenId, amount: &Collaterals) -> StateResult<()> {
        let locked = self.locked_after_removing(ptoken, amount)?;
        self.free.checked_add_assign(amount)?;
        self.set_locked(ptoken, locked);
        Ok(())
    }

    /// Removes `amount` from locked for `ptoken` and from the total. The
    /// collateral leaves the custodian.
    pub fn forfeit(&mut self, ptoken: &TokenId, amount: &Collaterals) -> StateResult<()> {
        let locked = self.locked_after_removing(ptoken, amount)?;
        self.total.checked_sub_assign(amount)?;
        self.set_locked(ptoken, locked);
        Ok(())
    }

    /// Adds `deposit` of `asset` and locks `lock_amount` of it for `ptoken`,
    /// drawing on free balance when the deposit alone is short.
    pub fn top_up(
        &mut self,
        ptoken: &TokenId,
        asset: &TokenId,
        deposit: u64,
        lock_amount: u64,
    ) -> StateResult<()> {
        let available = checked_add(self.free.get(asset), deposit)?;
        if available < lock_amount {
            return Err(StateError::InsufficientFreeCollateral(self.address.clone()));
        }
        self.deposit(asset, deposit)?;
        self.lock(ptoken, &Collaterals::single(asset, lock_amount))
    }

    pub fn add_holding(&mut self, ptoken: &TokenId, amount: u64) -> StateResult<()> {
        let slot = self.holding_public_tokens.entry(ptoken.clone()).or_insert(0);
        *slot = checked_add(*slot, amount)?;
        Ok(())
    }

    pub fn sub_holding(&mut self, ptoken: &TokenId, amount: u64) -> StateResult<()> {
        let current = self.holding(ptoken);
        let left = checked_sub(current, amount).map_err(|_| {
            StateError::InsufficientHolding(self.address.clone(), ptoken.clone())
        })?;
        if left == 0 {
            self.holding_public_tokens.remove(ptoken);
        } else {
            self.holding_public_tokens.insert(ptoken.clone(), left);
        }
        Ok(())
    }

    pub fn credit_reward(&mut self, asset: &TokenId, amount: u64) -> StateResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let slot = self.reward_amount.entry(asset.clone()).or_insert(0);
        *slot = checked_add(*slot, amount)?;
        Ok(())
    }

    /// Zeroes the accrued reward for `asset` and returns it.
    pub fn take_reward(&mut self, asset: &TokenId) -> u64 {
        self.reward_amount.remove(asset).unwrap_or(0)
    }

    pub fn set_tp_warning(&mut self, ptoken: &TokenId, ratio: u64) {
        self.tp_warnings.insert(ptoken.clone(), ratio);
    }

    pub fn clear_tp_warning(&mut self, ptoken: &TokenId) {
        self.tp_warnings.remove(ptoken);
    }

    /// Checks `free + sum(locked) == total` for every asset.
    pub fn check_balance(&self) -> StateResult<()> {
        let mut sum = self.free.clone();
        for locked in self.locked.values() {
            sum.checked_add_assign(locked)?;
        }
        if sum != self.total {
            return Err(StateError::Invariant(format!(
                "custodian {} free+locked {:?} != total {:?}",
                self.address, sum, self.total
            )));
        }
        Ok(())
    }

    fn locked_after_removing(
        &self,
        ptoken: &TokenId,
        amount: &Collaterals,
    ) -> StateResult<Collaterals> {
        let mut locked = self.locked_for(ptoken);
        locked.checked_sub_assign(amount).map_err(|e| match e {
            MathError::Underflow => {
                StateError::InsufficientLockedCollateral(self.address.clone(), ptoken.clone())
            }
            other => StateError::Math(other),
        })?;
        Ok(locked)
    }

    fn set_locked(&mut self, ptoken: &TokenId, locked: Collaterals) {
        if locked.is_zero() {
            self.locked.remove(ptoken);
        } else {
            self.locked.insert(ptoken.clone(), locked);
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn bnb() -> TokenId {
        TokenId::from("pBNB")
    }

    fn custodian() -> CustodianState {
        CustodianState::new(IncAddress::from("custodian-1"))
    }

    #[test]
    fn test_deposit_and_remote_addresses_are_immutable() {
        let mut cust = custodian();
        let mut first = BTreeMap::new();
        first.insert(bnb(), "b1".to_owned());
        cust.deposit(&TokenId::native(), 5000).expect("deposit");
        cust.register_remote_addresses(&first);
        assert_eq!(cust.total_collateral(), 5000);
        assert_eq!(cust.free_collateral(), 5000);

        let mut second = BTreeMap::new();
        second.insert(bnb(), "b2".to_owned());
        assert!(cust.new_remote_addresses(&second).is_empty());
        cust.deposit(&TokenId::native(), 2000).expect("deposit");
        cust.register_remote_addresses(&second);
        assert_eq!(cust.remote_address(&bnb()), Some("b1"));
        assert_eq!(cust.total_collateral(), 7000);
    }

    #[test]
    fn test_withdraw_rejects_more_than_free() {
        let mut cust = custodian();
        cust.deposit(&TokenId::native(), 100).expect("deposit");
        cust.lock(&bnb(), &Collaterals::native_only(60)).expect("lock");
        assert!(matches!(
            cust.withdraw(&TokenId::native(), 41),
            Err(StateError::InsufficientFreeCollateral(_))
        ));
        cust.withdraw(&TokenId::native(), 40).expect("withdraw");
        assert_eq!(cust.total_collateral(), 60);
        cust.check_balance().expect("balanced");
    }

    #[test]
    fn test_lock_unlock_forfeit_keep_balance() {
        let mut cust = custodian();
        cust.deposit(&TokenId::native(), 1000).expect("deposit");
        cust.deposit(&"usdt".into(), 300).expect("deposit");

        let mut bag = Collaterals::native_only(400);
        bag.add_asset(&"usdt".into(), 100).expect("add");
        cust.lock(&bnb(), &bag).expect("lock");
        cust.check_balance().expect("balanced after lock");

        cust.forfeit(&bnb(), &Collaterals::native_only(150)).expect("forfeit");
        assert_eq!(cust.total_collateral(), 850);
        cust.check_balance().expect("balanced after forfeit");

        cust.unlock(&bnb(), &cust.locked_for(&bnb())).expect("unlock");
        assert!(cust.locked().is_empty());
        assert_eq!(cust.free_collateral(), 850);
        cust.check_balance().expect("balanced after unlock");
    }

    #[test]
    fn test_top_up_uses_free_when_deposit_short() {
        let mut cust = custodian();
        cust.deposit(&TokenId::native(), 100).expect("deposit");
        cust.top_up(&bnb(), &TokenId::native(), 30, 80).expect("top up");
        assert_eq!(cust.total_collateral(), 130);
        assert_eq!(cust.free_collateral(), 50);
        assert_eq!(cust.locked_amount_collateral(&bnb()), 80);
        cust.check_balance().expect("balanced");

        assert!(cust.top_up(&bnb(), &TokenId::native(), 0, 51).is_err());
    }

    #[test]
    fn test_holding_underflow_is_rejected() {
        let mut cust = custodian();
        cust.add_holding(&bnb(), 10).expect("add");
        assert!(matches!(
            cust.sub_holding(&bnb(), 11),
            Err(StateError::InsufficientHolding(_, _))
        ));
        cust.sub_holding(&bnb(), 10).expect("sub");
        assert!(cust.holding_public_tokens().is_empty());
    }

    proptest! {
        #[test]
        fn proptest_balance_holds_for_any_deposit_lock_withdraw(
            deposits in proptest::collection::vec(1u64..1_000_000, 1..8),
            lock_pct in 0u64..=100,
        ) {
            let mut cust = custodian();
            for d in &deposits {
                cust.deposit(&TokenId::native(), *d).expect("deposit");
            }
            let total = cust.total_collateral();
            let lock = total * lock_pct / 100;
            cust.lock(&bnb(), &Collaterals::native_only(lock)).expect("lock");
            cust.withdraw(&TokenId::native(), total - lock).expect("withdraw");
            prop_assert!(cust.check_balance().is_ok());
            prop_assert_eq!(cust.free_collateral(), 0);
        }

        #[test]
        fn proptest_deposit_withdraw_roundtrip(amount in 1u64..u64::MAX / 2) {
            let mut cust = custodian();
            cust.deposit(&TokenId::native(), 10).expect("deposit");
            let before = cust.clone();
            cust.deposit(&TokenId::native(), amount).expect("deposit");
            cust.withdraw(&TokenId::native(), amount).expect("withdraw");
            prop_assert_eq!(cust, before);
        }
    }
}
