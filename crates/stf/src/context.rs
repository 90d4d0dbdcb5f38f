//! Inputs shared by every decision made for one beacon height.

use portal_params::PortalParams;
use portal_primitives::{BeaconHeight, ShardId};
use portal_state::{FinalExchangeRates, RateConverter};

/// Block context for the producer.
#[derive(Clone, Debug)]
pub struct BlockContext<'a> {
    params: &'a PortalParams,
    block_height: BeaconHeight,
    rates: FinalExchangeRates,
}

impl<'a> BlockContext<'a> {
    /// `rates` is the price table decisions convert with. An empty table is
    /// valid, every conversion that needs a price then fails.
    pub fn new(
        params: &'a PortalParams,
        block_height: BeaconHeight,
        rates: FinalExchangeRates,
    ) -> Self {
        Self {
            params,
            block_height,
            rates,
        }
    }

    pub fn params(&self) -> &'a PortalParams {
        self.params
    }

    pub fn block_height(&self) -> BeaconHeight {
        self.block_height
    }

    pub fn rates(&self) -> &FinalExchangeRates {
        &self.rates
    }

    pub fn set_rates(&mut self, rates: FinalExchangeRates) {
        self.rates = rates;
    }

    pub fn converter(&self) -> RateConverter<'_> {
        RateConverter::new(&self.rates, self.params)
    }
}

/// Where an action came from.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ActionOrigin<'a> {
    pub(crate) shard_id: ShardId,
    pub(crate) tx_id: &'a str,
}
