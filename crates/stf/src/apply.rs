//! The mutation routine shared by the producer and the processor.

use portal_instructions::{Instruction, InstructionContent};
use portal_state::PortalSnapshot;
use tracing::debug;

use crate::{
    custodian, errors::StfResult, exchange_rates, liquidation, porting, redeem, reward, topup,
};

/// Applies one decided instruction to `state`.
///
/// Rejected instructions carry no state change. Every other instruction
/// must find the records it names, otherwise the snapshot has diverged from
/// the producer's and the error is fatal.
pub fn apply_instruction(state: &mut PortalSnapshot, inst: &Instruction) -> StfResult<()> {
    let content = inst.content();
    if content.reject_reason().is_some() {
        return Ok(());
    }

    match content {
        InstructionContent::CustodianDeposit(c) => custodian::apply_deposit(state, c),
        InstructionContent::CustodianWithdraw(c) => custodian::apply_withdraw(state, c),
        InstructionContent::PortingRequest(c) => porting::apply_porting_request(state, c),
        InstructionContent::RequestPTokens(c) => porting::apply_request_ptokens(state, c),
        InstructionContent::ExchangeRates(c) => exchange_rates::apply_exchange_rates(state, c),
        InstructionContent::RedeemRequest(c) => redeem::apply_redeem_request(state, c),
        InstructionContent::RedeemMatching(c) => redeem::apply_redeem_matching(state, c),
        InstructionContent::UnlockCollateral(c) => redeem::apply_unlock_collateral(state, c),
        InstructionContent::RedeemLiquidation(c) => {
            liquidation::apply_redeem_liquidation(state, c)
        }
        InstructionContent::ExpiredWaitingPorting(c) => porting::apply_expired_porting(state, c),
        InstructionContent::RedeemTimeout(c) => redeem::apply_redeem_timeout(state, c),
        InstructionContent::TpLiquidation(c) => liquidation::apply_tp_liquidation(state, c),
        InstructionContent::TpWarning(c) => liquidation::apply_tp_warning(state, c),
        InstructionContent::LiquidationPoolRedeem(c) => liquidation::apply_pool_redeem(state, c),
        InstructionContent::CustodianTopUp(c) => topup::apply_custodian_top_up(state, c),
        InstructionContent::WaitingPortingTopUp(c) => topup::apply_porting_top_up(state, c),
        InstructionContent::RewardDistribution(c) => reward::apply_reward_distribution(state, c),
        InstructionContent::RewardWithdraw(c) => reward::apply_reward_withdraw(state, c),
    }
}

/// Applies `inst` to the producer's working state and appends it to the
/// output.
pub(crate) fn emit(
    state: &mut PortalSnapshot,
    out: &mut Vec<Instruction>,
    inst: Instruction,
) -> StfResult<()> {
    apply_instruction(state, &inst)?;
    debug!(meta = ?inst.meta_type(), status = %inst.status(), "emitted portal instruction");
    out.push(inst);
    Ok(())
}
