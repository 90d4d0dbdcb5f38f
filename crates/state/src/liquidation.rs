//! Liquidation pool and the per-epoch locked collateral accumulator.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use portal_primitives::{
    Collaterals, IncAddress, TokenId,
    math::{checked_add, checked_sub},
};
use serde::{Deserialize, Serialize};

use crate::errors::{StateError, StateResult};

/// Collateral released by forced liquidations for one pToken, together with
/// the pToken liability it backs.
#[derive(
    Clone, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct LiquidationPoolEntry {
    pub collateral: Collaterals,
    pub pub_token_amount: u64,
}

impl LiquidationPoolEntry {
    /// Pro-rata collateral for burning `amount` pTokens, or `None` if the pool
    /// cannot cover it.
    pub fn payout_for(&self, amount: u64) -> StateResult<Option<Collaterals>> {
        if amount == 0 || self.pub_token_amount == 0 || amount > self.pub_token_amount {
            return Ok(None);
        }
        Ok(Some(self.collateral.scaled_floor(amount, self.pub_token_amount)?))
    }
}

#[derive(
    Clone, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct LiquidationPool {
    entries: BTreeMap<TokenId, LiquidationPoolEntry>,
}

impl LiquidationPool {
    pub fn entry(&self, ptoken: &TokenId) -> Option<&LiquidationPoolEntry> {
        self.entries.get(ptoken)
    }

    pub fn entries(&self) -> &BTreeMap<TokenId, LiquidationPoolEntry> {
        &self.entries
    }

    pub fn deposit(
        &mut self,
        ptoken: &TokenId,
        collateral: &Collaterals,
        pub_token_amount: u64,
    ) -> StateResult<()> {
        let entry = self.entries.entry(ptoken.clone()).or_default();
        entry.collateral.checked_add_assign(collateral)?;
        entry.pub_token_amount = checked_add(entry.pub_token_amount, pub_token_amount)?;
        Ok(())
    }

    pub fn withdraw(
        &mut self,
        ptoken: &TokenId,
        collateral: &Collaterals,
        pub_token_amount: u64,
    ) -> StateResult<()> {
        let entry = self.entries.get_mut(ptoken).ok_or_else(|| {
            StateError::Invariant(format!("no liquidation pool for {ptoken}"))
        })?;
        let mut left = entry.collateral.clone();
        left.checked_sub_assign(collateral)?;
        let pub_left = checked_sub(entry.pub_token_amount, pub_token_amount)?;
        entry.collateral = left;
        entry.pub_token_amount = pub_left;
        if entry.collateral.is_zero() && entry.pub_token_amount == 0 {
            self.entries.remove(ptoken);
        }
        Ok(())
    }
}

/// Locked collateral value accumulated per custodian over a reward epoch,
/// in native units summed across heights.
#[derive(
    Clone, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct LockedCollateralState {
    total: u128,
    per_custodian: BTreeMap<IncAddress, u128>,
}

impl LockedCollateralState {
    pub fn total(&self) -> u128 {
        self.total
    }

    pub fn per_custodian(&self) -> &BTreeMap<IncAddress, u128> {
        &self.per_custodian
    }

    pub fn accumulate(&mut self, custodian: &IncAddress, value: u64) -> StateResult<()> {
        if value == 0 {
            return Ok(());
        }
        let value = u128::from(value);
        let slot = self.per_custodian.entry(custodian.clone()).or_insert(0);
        *slot = slot
            .checked_add(value)
            .ok_or_else(|| StateError::Invariant("locked collateral overflow".to_owned()))?;
        self.total = self
            .total
            .checked_add(value)
            .ok_or_else(|| StateError::Invariant("locked collateral overflow".to_owned()))?;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.total = 0;
        self.per_custodian.clear();
    }
}
