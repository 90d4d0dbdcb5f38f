//! Exchange rate aggregation and price conversion.
//!
//! A rate is the price of one whole unit of an asset (`10^decimals` atomic
//! units) in a common unit shared by all assets.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use itertools::Itertools;
use portal_params::PortalParams;
use portal_primitives::{
    Collaterals, IncAddress, TokenId,
    math::{checked_add, pow10, scale_floor},
};
use serde::{Deserialize, Serialize};

use crate::errors::{RateError, RateResult};

/// The canonical price table for one beacon height.
#[derive(
    Clone, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct FinalExchangeRates {
    rates: BTreeMap<TokenId, u64>,
}

impl FinalExchangeRates {
    pub fn new(rates: BTreeMap<TokenId, u64>) -> Self {
        Self { rates }
    }

    pub fn get(&self, token: &TokenId) -> Option<u64> {
        self.rates.get(token).copied()
    }

    pub fn rates(&self) -> &BTreeMap<TokenId, u64> {
        &self.rates
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Rates one feeder submitted at one height.
#[derive(
    Clone, Debug, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct ExchangeRateSubmission {
    pub sender: IncAddress,
    pub rates: BTreeMap<TokenId, u64>,
}

/// Median of `values`, averaging the two middle values for an even count.
pub fn median_floor(values: &[u64]) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    let sorted: Vec<u64> = values.iter().copied().sorted_unstable().collect();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        let (a, b) = (sorted[mid - 1], sorted[mid]);
        // (a + b) / 2 without overflowing
        Some(a / 2 + b / 2 + (a % 2 + b % 2) / 2)
    }
}

/// Builds the final table for a height from its submissions.
///
/// Assets without submissions keep the previous height's price. Returns
/// `None` if no asset has a price at all.
pub fn aggregate_exchange_rates<'a>(
    submissions: impl IntoIterator<Item = &'a ExchangeRateSubmission>,
    previous: Option<&FinalExchangeRates>,
) -> Option<FinalExchangeRates> {
    let grouped: BTreeMap<TokenId, Vec<u64>> = submissions
        .into_iter()
        .flat_map(|s| s.rates.iter().map(|(k, v)| (k.clone(), *v)))
        .into_group_map()
        .into_iter()
        .collect();

    let mut rates = previous.map(|p| p.rates.clone()).unwrap_or_default();
    for (token, values) in grouped {
        if let Some(median) = median_floor(&values) {
            rates.insert(token, median);
        }
    }

    if rates.is_empty() {
        None
    } else {
        Some(FinalExchangeRates::new(rates))
    }
}

/// Converts amounts between assets through a price table.
#[derive(Debug, Clone, Copy)]
pub struct RateConverter<'a> {
    rates: &'a FinalExchangeRates,
    params: &'a PortalParams,
}

impl<'a> RateConverter<'a> {
    pub fn new(rates: &'a FinalExchangeRates, params: &'a PortalParams) -> Self {
        Self { rates, params }
    }

    pub fn rate(&self, token: &TokenId) -> RateResult<u64> {
        self.rates
            .get(token)
            .ok_or_else(|| RateError::MissingExchangeRate(token.clone()))
    }

    /// `floor(amount * rate_from * 10^dec_to / (rate_to * 10^dec_from))`.
    pub fn convert(&self, from: &TokenId, to: &TokenId, amount: u64) -> RateResult<u64> {
        if from == to || amount == 0 {
            return Ok(amount);
        }
        let rate_from = self.rate(from)?;
        let rate_to = self.rate(to)?;
        let dec_from = pow10(self.params.decimals_of(from)?)?;
        let dec_to = pow10(self.params.decimals_of(to)?)?;
        Ok(scale_floor(
            amount,
            [u128::from(rate_from), dec_to],
            [u128::from(rate_to), dec_from],
        )?)
    }

    pub fn to_native(&self, token: &TokenId, amount: u64) -> RateResult<u64> {
        self.convert(token, &TokenId::native(), amount)
    }

    pub fn from_native(&self, token: &TokenId, amount: u64) -> RateResult<u64> {
        self.convert(&TokenId::native(), token, amount)
    }

    /// Value of a collateral bag in native units, each asset rounded down.
    pub fn collaterals_to_native(&self, bag: &Collaterals) -> RateResult<u64> {
        let mut sum = bag.native();
        for (asset, amount) in bag.tokens() {
            sum = checked_add(sum, self.to_native(asset, *amount)?)?;
        }
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;

    fn submission(sender: &str, rates: &[(&str, u64)]) -> ExchangeRateSubmission {
        ExchangeRateSubmission {
            sender: sender.into(),
            rates: rates.iter().map(|(k, v)| (TokenId::from(*k), *v)).collect(),
        }
    }

    fn params() -> PortalParams {
        PortalParams {
            time_out_porting_request: 10,
            time_out_redeem_request: 10,
            time_out_custodian_return_pub_token: 10,
            tp120: 120,
            tp130: 130,
            min_percent_locked_collateral: 150,
            max_percent_liquidated_collateral_amount: 120,
            min_percent_porting_fee: 1,
            min_percent_redeem_fee: 1,
            min_percent_custodian_rewards: 10,
            max_percent_custodian_rewards: 30,
            epoch_length: 100,
            native_decimals: 9,
            supported_collaterals: [(TokenId::from("usdt"), 6)].into_iter().collect(),
            supported_ptokens: [(TokenId::from("pBTC"), 9)].into_iter().collect(),
            feeders: BTreeSet::new(),
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median_floor(&[30, 10, 20]), Some(20));
        assert_eq!(median_floor(&[40, 10, 30, 20]), Some(25));
        assert_eq!(median_floor(&[1, 2]), Some(1));
        assert_eq!(median_floor(&[u64::MAX, u64::MAX]), Some(u64::MAX));
        assert_eq!(median_floor(&[]), None);
    }

    #[test]
    fn test_aggregate_carries_forward() {
        let first = aggregate_exchange_rates(
            &[
                submission("f1", &[("pBTC", 10), ("bnb", 5)]),
                submission("f2", &[("pBTC", 20)]),
                submission("f3", &[("pBTC", 30)]),
            ],
            None,
        )
        .expect("rates");
        assert_eq!(first.get(&"pBTC".into()), Some(20));
        assert_eq!(first.get(&"bnb".into()), Some(5));

        let second = aggregate_exchange_rates(&[submission("f1", &[("bnb", 7)])], Some(&first))
            .expect("rates");
        assert_eq!(second.get(&"pBTC".into()), Some(20));
        assert_eq!(second.get(&"bnb".into()), Some(7));

        let none: [ExchangeRateSubmission; 0] = [];
        let third = aggregate_exchange_rates(&none, Some(&second)).expect("rates");
        assert_eq!(third, second);
        assert!(aggregate_exchange_rates(&none, None).is_none());
    }

    #[test]
    fn test_convert_with_decimals() {
        let params = params();
        let rates = FinalExchangeRates::new(
            [
                (TokenId::native(), 2_000_000),
                (TokenId::from("usdt"), 1_000_000),
                (TokenId::from("pBTC"), 40_000_000_000),
            ]
            .into_iter()
            .collect(),
        );
        let conv = RateConverter::new(&rates, &params);

        // 1 usdt (6 decimals) is half a native unit (9 decimals)
        assert_eq!(conv.to_native(&"usdt".into(), 1_000_000).expect("conv"), 500_000_000);
        // 0.001 pBTC is worth 20 native units
        assert_eq!(conv.to_native(&"pBTC".into(), 1_000_000).expect("conv"), 20_000_000_000);
        assert_eq!(conv.from_native(&"usdt".into(), 500_000_000).expect("conv"), 1_000_000);

        let mut bag = Collaterals::native_only(1);
        bag.add_asset(&"usdt".into(), 2_000_000).expect("add");
        assert_eq!(conv.collaterals_to_native(&bag).expect("value"), 1_000_000_001);
    }

    #[test]
    fn test_missing_rate_is_explicit() {
        let params = params();
        let rates = FinalExchangeRates::new([(TokenId::native(), 1)].into_iter().collect());
        let conv = RateConverter::new(&rates, &params);
        assert!(matches!(
            conv.to_native(&"pBTC".into(), 5),
            Err(RateError::MissingExchangeRate(t)) if t == TokenId::from("pBTC")
        ));
        // same-asset conversion needs no rate
        assert_eq!(conv.convert(&"pBTC".into(), &"pBTC".into(), 5).expect("identity"), 5);
    }

    proptest! {
        #[test]
        fn proptest_median_within_bounds(values in proptest::collection::vec(any::<u64>(), 1..20)) {
            let m = median_floor(&values).expect("non-empty");
            let min = values.iter().copied().min().expect("non-empty");
            let max = values.iter().copied().max().expect("non-empty");
            prop_assert!(m >= min && m <= max);
        }
    }
}
