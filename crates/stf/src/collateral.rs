//! Collateral valuation helpers shared by matching, top-ups and the ratio
//! scan.

use portal_params::PortalParams;
use portal_primitives::{
    Collaterals, TokenId,
    math::{checked_add, ratio_percent},
};
use portal_state::{
    CustodianState, PortalSnapshot, RateConverter, RateError, RateResult, StateError,
};

/// Where a collateral ratio sits relative to the TP thresholds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum RatioTier {
    /// Below `tp120`.
    Liquidate,
    /// From `tp120` up to and including `tp130`.
    Warning,
    /// Above `tp130`, or nothing held.
    Healthy,
}

impl RatioTier {
    pub(crate) fn classify(params: &PortalParams, ratio: Option<u64>) -> Self {
        match ratio {
            Some(r) if r < params.tp120 => Self::Liquidate,
            Some(r) if r <= params.tp130 => Self::Warning,
            _ => Self::Healthy,
        }
    }
}

/// Locked collateral measured against the pTokens it backs.
#[derive(Clone, Debug)]
pub(crate) struct Exposure {
    locked_value: u64,
    held: u64,
    ratio: Option<u64>,
}

impl Exposure {
    /// The ratio is `floor(locked_value * 100 / held_value)`, `None` when
    /// nothing of value is held.
    pub(crate) fn measure(
        conv: &RateConverter<'_>,
        ptoken: &TokenId,
        locked: &Collaterals,
        held: u64,
    ) -> RateResult<Self> {
        if held == 0 {
            return Ok(Self {
                locked_value: 0,
                held,
                ratio: None,
            });
        }
        let locked_value = conv.collaterals_to_native(locked)?;
        let held_value = conv.to_native(ptoken, held)?;
        let ratio = if held_value == 0 {
            None
        } else {
            Some(ratio_percent(locked_value, held_value)?)
        };
        Ok(Self {
            locked_value,
            held,
            ratio,
        })
    }

    pub(crate) fn locked_value(&self) -> u64 {
        self.locked_value
    }

    pub(crate) fn held(&self) -> u64 {
        self.held
    }

    pub(crate) fn ratio(&self) -> Option<u64> {
        self.ratio
    }

    pub(crate) fn tier(&self, params: &PortalParams) -> RatioTier {
        RatioTier::classify(params, self.ratio)
    }
}

/// Exposure of a custodian for one pToken: collateral backing held pTokens
/// against its holdings plus its open redeem shares.
pub(crate) fn custodian_exposure<E>(
    state: &PortalSnapshot,
    conv: &RateConverter<'_>,
    custodian: &CustodianState,
    ptoken: &TokenId,
) -> Result<Exposure, E>
where
    E: From<StateError> + From<RateError>,
{
    let locked = state.effective_locked(custodian, ptoken)?;
    let held = state.total_held(custodian, ptoken)?;
    Ok(Exposure::measure(conv, ptoken, &locked, held)?)
}

/// Smallest amount of `asset` whose floor-converted native value reaches
/// `value`.
pub(crate) fn covering_amount(
    conv: &RateConverter<'_>,
    asset: &TokenId,
    value: u64,
) -> RateResult<u64> {
    let amount = conv.from_native(asset, value)?;
    if conv.to_native(asset, amount)? < value {
        return Ok(checked_add(amount, 1)?);
    }
    Ok(amount)
}

/// Picks collateral worth at least `value` native units out of `free`.
///
/// Native collateral goes first, then token collaterals in ascending asset
/// order. Returns `None` if `free` is worth less than `value`.
pub(crate) fn allocate_collateral(
    conv: &RateConverter<'_>,
    free: &Collaterals,
    value: u64,
) -> RateResult<Option<Collaterals>> {
    let mut out = Collaterals::new();
    let native = free.native().min(value);
    out.add_asset(&TokenId::native(), native)?;
    let mut remaining = value - native;

    for (asset, available) in free.tokens() {
        if remaining == 0 {
            break;
        }
        let take = covering_amount(conv, asset, remaining)?.min(*available);
        remaining = remaining.saturating_sub(conv.to_native(asset, take)?);
        out.add_asset(asset, take)?;
    }

    Ok((remaining == 0).then_some(out))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use portal_state::FinalExchangeRates;
    use proptest::prelude::*;

    use super::*;
    use crate::test_utils::{USDT, test_params};

    fn rates() -> FinalExchangeRates {
        let mut rates = BTreeMap::new();
        rates.insert(TokenId::native(), 2);
        rates.insert(TokenId::from(USDT), 3);
        FinalExchangeRates::new(rates)
    }

    #[test]
    fn test_tier_boundaries() {
        let params = test_params();
        let tier = |r| RatioTier::classify(&params, Some(r));
        assert_eq!(tier(params.tp120 - 1), RatioTier::Liquidate);
        assert_eq!(tier(params.tp120), RatioTier::Warning);
        assert_eq!(tier(params.tp130), RatioTier::Warning);
        assert_eq!(tier(params.tp130 + 1), RatioTier::Healthy);
        assert_eq!(RatioTier::classify(&params, None), RatioTier::Healthy);
    }

    #[test]
    fn test_covering_amount_rounds_up() {
        let params = test_params();
        let rates = rates();
        let conv = RateConverter::new(&rates, &params);
        // one usdt unit is worth 1.5 native units
        let amount = covering_amount(&conv, &TokenId::from(USDT), 10).expect("cover");
        assert_eq!(amount, 7);
        assert!(conv.to_native(&TokenId::from(USDT), amount).expect("convert") >= 10);
        assert!(conv.to_native(&TokenId::from(USDT), amount - 1).expect("convert") < 10);
    }

    #[test]
    fn test_allocate_prefers_native() {
        let params = test_params();
        let rates = rates();
        let conv = RateConverter::new(&rates, &params);
        let mut free = Collaterals::native_only(100);
        free.add_asset(&TokenId::from(USDT), 100).expect("add");

        let only_native = allocate_collateral(&conv, &free, 80).expect("alloc").expect("some");
        assert_eq!(only_native, Collaterals::native_only(80));

        let mixed = allocate_collateral(&conv, &free, 130).expect("alloc").expect("some");
        assert_eq!(mixed.native(), 100);
        assert_eq!(mixed.get(&TokenId::from(USDT)), 20);

        assert!(allocate_collateral(&conv, &free, 251).expect("alloc").is_none());
    }

    proptest! {
        #[test]
        fn covering_amount_is_smallest_cover(value in 1u64..1_000_000_000_000) {
            let params = test_params();
            let rates = rates();
            let conv = RateConverter::new(&rates, &params);
            let usdt = TokenId::from(USDT);

            let amount = covering_amount(&conv, &usdt, value).expect("cover");
            prop_assert!(conv.to_native(&usdt, amount).expect("convert") >= value);
            prop_assert!(conv.to_native(&usdt, amount - 1).expect("convert") < value);
        }
    }
}
