//! Multi-asset collateral amounts.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{
    ids::TokenId,
    math::{checked_add, checked_sub, mul_div_floor, MathError, MathResult},
};

/// A bag of collateral amounts, one per asset.
///
/// The native asset lives in its own field, every other collateral asset is
/// kept in `tokens`. Zero entries are never stored in `tokens`, so two bags
/// holding the same amounts always compare (and encode) equal.
#[derive(
    Clone, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct Collaterals {
    native: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    tokens: BTreeMap<TokenId, u64>,
}

impl Collaterals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn native_only(amount: u64) -> Self {
        Self {
            native: amount,
            tokens: BTreeMap::new(),
        }
    }

    pub fn from_parts(native: u64, tokens: BTreeMap<TokenId, u64>) -> Self {
        let tokens = tokens.into_iter().filter(|(_, v)| *v > 0).collect();
        Self { native, tokens }
    }

    /// Builds a bag holding a single asset.
    pub fn single(asset: &TokenId, amount: u64) -> Self {
        let mut bag = Self::new();
        if asset.is_native() {
            bag.native = amount;
        } else if amount > 0 {
            bag.tokens.insert(asset.clone(), amount);
        }
        bag
    }

    pub fn native(&self) -> u64 {
        self.native
    }

    pub fn tokens(&self) -> &BTreeMap<TokenId, u64> {
        &self.tokens
    }

    /// Amount held for `asset`, zero if absent.
    pub fn get(&self, asset: &TokenId) -> u64 {
        if asset.is_native() {
            self.native
        } else {
            self.tokens.get(asset).copied().unwrap_or(0)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.native == 0 && self.tokens.is_empty()
    }

    /// Non-zero entries, native first, then token assets in ascending id
    /// order.
    pub fn entries(&self) -> Vec<(TokenId, u64)> {
        let mut out = Vec::with_capacity(self.tokens.len() + 1);
        if self.native > 0 {
            out.push((TokenId::native(), self.native));
        }
        out.extend(self.tokens.iter().map(|(k, v)| (k.clone(), *v)));
        out
    }

    pub fn add_asset(&mut self, asset: &TokenId, amount: u64) -> MathResult<()> {
        if asset.is_native() {
            self.native = checked_add(self.native, amount)?;
        } else if amount > 0 {
            let slot = self.tokens.entry(asset.clone()).or_insert(0);
            *slot = checked_add(*slot, amount)?;
        }
        Ok(())
    }

    pub fn sub_asset(&mut self, asset: &TokenId, amount: u64) -> MathResult<()> {
        if asset.is_native() {
            self.native = checked_sub(self.native, amount)?;
            return Ok(());
        }
        if amount == 0 {
            return Ok(());
        }
        let current = self.tokens.get(asset).copied().ok_or(MathError::Underflow)?;
        let left = checked_sub(current, amount)?;
        if left == 0 {
            self.tokens.remove(asset);
        } else {
            self.tokens.insert(asset.clone(), left);
        }
        Ok(())
    }

    pub fn checked_add_assign(&mut self, other: &Collaterals) -> MathResult<()> {
        self.native = checked_add(self.native, other.native)?;
        for (asset, amount) in &other.tokens {
            self.add_asset(asset, *amount)?;
        }
        Ok(())
    }

    /// Subtracts `other`, failing without partial effects if any asset would
    /// go negative.
    pub fn checked_sub_assign(&mut self, other: &Collaterals) -> MathResult<()> {
        if !self.covers(other) {
            return Err(MathError::Underflow);
        }
        self.native -= other.native;
        for (asset, amount) in &other.tokens {
            self.sub_asset(asset, *amount)?;
        }
        Ok(())
    }

    pub fn checked_sum(&self, other: &Collaterals) -> MathResult<Collaterals> {
        let mut out = self.clone();
        out.checked_add_assign(other)?;
        Ok(out)
    }

    /// True if every asset amount in `other` is available here.
    pub fn covers(&self, other: &Collaterals) -> bool {
        self.native >= other.native && other.tokens.iter().all(|(k, v)| self.get(k) >= *v)
    }

    /// Scales every asset by `num / den`, rounding each one down.
    pub fn scaled_floor(&self, num: u64, den: u64) -> MathResult<Collaterals> {
        let native = mul_div_floor(self.native, num, den)?;
        let mut tokens = BTreeMap::new();
        for (asset, amount) in &self.tokens {
            tokens.insert(asset.clone(), mul_div_floor(*amount, num, den)?);
        }
        Ok(Self::from_parts(native, tokens))
    }
}
