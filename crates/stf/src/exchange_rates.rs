//! Feeder rate submissions and the per-height aggregation.

use std::collections::BTreeMap;

use portal_instructions::{
    ExchangeRatesContent, InstStatus, Instruction, InstructionContent, RejectReason,
};
use portal_primitives::{IncAddress, TokenId};
use portal_state::{
    ExchangeRateSubmission, FinalExchangeRates, PortalSnapshot, aggregate_exchange_rates,
};

use crate::{
    context::{ActionOrigin, BlockContext},
    errors::StfResult,
};

pub(crate) fn decide_exchange_rates(
    ctx: &BlockContext<'_>,
    origin: ActionOrigin<'_>,
    sender: &IncAddress,
    rates: &BTreeMap<TokenId, u64>,
) -> StfResult<Instruction> {
    let reject_reason = check_exchange_rates(ctx, sender, rates).err();
    let status = if reject_reason.is_some() {
        InstStatus::Rejected
    } else {
        InstStatus::Accepted
    };
    Ok(Instruction::new(
        Some(origin.shard_id),
        status,
        InstructionContent::ExchangeRates(ExchangeRatesContent {
            tx_id: origin.tx_id.to_owned(),
            sender: sender.clone(),
            rates: rates.clone(),
            reject_reason,
        }),
    ))
}

fn check_exchange_rates(
    ctx: &BlockContext<'_>,
    sender: &IncAddress,
    rates: &BTreeMap<TokenId, u64>,
) -> Result<(), RejectReason> {
    let params = ctx.params();
    if !params.is_feeder(sender) {
        return Err(RejectReason::NotFeeder(sender.clone()));
    }
    if rates.is_empty() || rates.values().any(|r| *r == 0) {
        return Err(RejectReason::InvalidRates);
    }
    if let Some(asset) = rates
        .keys()
        .find(|a| !params.is_supported_collateral(a) && !params.is_supported_ptoken(a))
    {
        return Err(RejectReason::UnsupportedToken(asset.clone()));
    }
    Ok(())
}

pub(crate) fn apply_exchange_rates(
    state: &mut PortalSnapshot,
    content: &ExchangeRatesContent,
) -> StfResult<()> {
    state.record_rate_submission(ExchangeRateSubmission {
        sender: content.sender.clone(),
        rates: content.rates.clone(),
    });
    Ok(())
}

/// The table this height finalizes to, given the submissions seen so far.
pub(crate) fn pending_rates(state: &PortalSnapshot) -> Option<FinalExchangeRates> {
    aggregate_exchange_rates(
        state.exchange_rate_submissions().values(),
        state.final_exchange_rates(),
    )
}

/// Writes the height's final rate table.
pub(crate) fn finalize_exchange_rates(state: &mut PortalSnapshot) {
    if let Some(rates) = pending_rates(state) {
        state.set_final_exchange_rates(rates);
    }
}
