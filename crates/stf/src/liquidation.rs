//! Forced liquidations and redemption against the liquidation pool.

use std::collections::BTreeSet;

use portal_instructions::{
    InstStatus, Instruction, InstructionContent, LiquidationPoolRedeemContent,
    RedeemLiquidationContent, RejectReason, ReleasedRedeemEntry, TpLiquidationContent,
    TpWarningContent,
};
use portal_primitives::{
    Collaterals, IncAddress, RedeemId, TokenId,
    math::{basis_points_of, checked_add, percent_of},
};
use portal_state::{PortalSnapshot, RateConverter, RedeemPool};
use tracing::warn;

use crate::{
    apply::emit,
    collateral::{Exposure, RatioTier, custodian_exposure},
    context::{ActionOrigin, BlockContext},
    errors::{CheckResult, StfError, StfResult, outcome},
    porting::expire_porting,
    redeem::{settle_redeem_share, share_of_locked},
};

/// Liquidates matched custodians that did not pay out a matched redeem
/// request within the custodian return timeout.
///
/// The share of locked collateral backing the unpaid amount is split: the
/// redeemer receives up to `max_percent_liquidated_collateral_amount` of the
/// unpaid value, the rest goes back to the custodian's free balance.
pub(crate) fn liquidate_run_away_custodians(
    state: &mut PortalSnapshot,
    ctx: &BlockContext<'_>,
    out: &mut Vec<Instruction>,
) -> StfResult<()> {
    let timeout = ctx.params().time_out_custodian_return_pub_token;
    let overdue: Vec<(RedeemId, Vec<IncAddress>)> = state
        .redeems(RedeemPool::Matched)
        .filter(|r| r.is_timed_out(ctx.block_height(), timeout))
        .map(|r| {
            let custodians = r.custodians().iter().map(|c| c.custodian.clone()).collect();
            (r.redeem_id().clone(), custodians)
        })
        .collect();

    let conv = ctx.converter();
    let max_percent = ctx.params().max_percent_liquidated_collateral_amount;
    for (redeem_id, custodians) in overdue {
        for custodian in custodians {
            let inst = decide_run_away(state, &conv, max_percent, &redeem_id, &custodian)?;
            warn!(%redeem_id, %custodian, "custodian missed redeem payout, liquidating share");
            emit(state, out, inst)?;
        }
    }
    Ok(())
}

fn decide_run_away(
    state: &PortalSnapshot,
    conv: &RateConverter<'_>,
    max_percent: u64,
    redeem_id: &RedeemId,
    custodian: &IncAddress,
) -> StfResult<Instruction> {
    let req = state
        .redeem(RedeemPool::Matched, redeem_id)
        .ok_or_else(|| StfError::MissingRedeemRequest(redeem_id.clone()))?;
    let cust = state
        .custodian(custodian)
        .ok_or_else(|| StfError::MissingCustodian(custodian.clone()))?;
    let token = req.token();
    let matched = req.matched_to(custodian);

    let share = share_of_locked(state, cust, token, matched)?;
    let share_value = conv.collaterals_to_native(&share)?;
    let cap = conv.to_native(token, percent_of(matched, max_percent)?)?;
    let payout = if share_value <= cap {
        share.clone()
    } else {
        share.scaled_floor(cap, share_value)?
    };
    let mut returned = share;
    returned.checked_sub_assign(&payout)?;

    Ok(Instruction::new(
        None,
        InstStatus::Liquidated,
        InstructionContent::RedeemLiquidation(RedeemLiquidationContent {
            redeem_id: redeem_id.clone(),
            token: token.clone(),
            custodian: custodian.clone(),
            redeemer: req.redeemer().clone(),
            pool: RedeemPool::Matched,
            matched_amount: matched,
            payout,
            returned,
            fee_refund: req.fee_share(matched)?,
        }),
    ))
}

pub(crate) fn apply_redeem_liquidation(
    state: &mut PortalSnapshot,
    content: &RedeemLiquidationContent,
) -> StfResult<()> {
    let cust = state
        .custodian_mut(&content.custodian)
        .ok_or_else(|| StfError::MissingCustodian(content.custodian.clone()))?;
    cust.forfeit(&content.token, &content.payout)?;
    cust.unlock(&content.token, &content.returned)?;
    settle_redeem_share(
        state,
        content.pool,
        &content.redeem_id,
        &content.custodian,
        content.fee_refund,
    )
}

/// Evaluates every custodian's collateral ratio per pToken.
///
/// Below `tp120` the custodian is liquidated: its waiting porting requests
/// for the pToken expire, its redeem shares go back to their requests and
/// its whole locked collateral moves to the liquidation pool together with
/// the pToken liability it backed. Inside the warning band a warning flag is
/// raised, above it a raised flag is cleared.
pub(crate) fn scan_collateral_ratios(
    state: &mut PortalSnapshot,
    ctx: &BlockContext<'_>,
    out: &mut Vec<Instruction>,
) -> StfResult<()> {
    let params = ctx.params();
    let conv = ctx.converter();
    let addresses: Vec<IncAddress> = state.custodians().map(|c| c.address().clone()).collect();

    for addr in addresses {
        let tokens: BTreeSet<TokenId> = {
            let cust = state
                .custodian(&addr)
                .ok_or_else(|| StfError::MissingCustodian(addr.clone()))?;
            cust.locked()
                .keys()
                .chain(cust.holding_public_tokens().keys())
                .chain(cust.tp_warnings().keys())
                .cloned()
                .collect()
        };

        for token in tokens {
            let cust = state
                .custodian(&addr)
                .ok_or_else(|| StfError::MissingCustodian(addr.clone()))?;
            let exposure = custodian_exposure::<StfError>(state, &conv, cust, &token)?;
            let flagged = cust.tp_warning(&token);

            match exposure.tier(params) {
                RatioTier::Liquidate => {
                    warn!(
                        custodian = %addr,
                        %token,
                        ratio = ?exposure.ratio(),
                        "liquidating under-collateralized custodian"
                    );
                    liquidate_custodian(state, out, &addr, &token, &exposure)?;
                }
                RatioTier::Warning => {
                    let ratio = exposure.ratio().unwrap_or_default();
                    if flagged != Some(ratio) {
                        warn!(custodian = %addr, %token, ratio, "custodian in top-up band");
                        emit(state, out, tp_warning(&addr, &token, ratio, true))?;
                    }
                }
                RatioTier::Healthy => {
                    if flagged.is_some() {
                        let ratio = exposure.ratio().unwrap_or_default();
                        emit(state, out, tp_warning(&addr, &token, ratio, false))?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn tp_warning(custodian: &IncAddress, token: &TokenId, ratio: u64, raised: bool) -> Instruction {
    let status = if raised {
        InstStatus::Warning
    } else {
        InstStatus::Cleared
    };
    Instruction::new(
        None,
        status,
        InstructionContent::TpWarning(TpWarningContent {
            custodian: custodian.clone(),
            token: token.clone(),
            ratio,
            raised,
        }),
    )
}

fn liquidate_custodian(
    state: &mut PortalSnapshot,
    out: &mut Vec<Instruction>,
    addr: &IncAddress,
    token: &TokenId,
    exposure: &Exposure,
) -> StfResult<()> {
    let portings: Vec<Instruction> = state
        .waiting_portings()
        .filter(|r| r.token() == token && r.custodian(addr).is_some())
        .map(|r| expire_porting(r, true))
        .collect();
    for inst in portings {
        emit(state, out, inst)?;
    }

    let mut released_redeems = Vec::new();
    for pool in [RedeemPool::Waiting, RedeemPool::Matched] {
        for req in state.redeems(pool).filter(|r| r.token() == token) {
            let amount = req.matched_to(addr);
            if amount > 0 {
                released_redeems.push(ReleasedRedeemEntry {
                    redeem_id: req.redeem_id().clone(),
                    pool,
                    amount,
                });
            }
        }
    }

    let cust = state
        .custodian(addr)
        .ok_or_else(|| StfError::MissingCustodian(addr.clone()))?;
    let holding_amount = cust.holding(token);
    let pub_token_liability = released_redeems
        .iter()
        .try_fold(holding_amount, |acc, r| checked_add(acc, r.amount))?;

    let inst = Instruction::new(
        None,
        InstStatus::Liquidated,
        InstructionContent::TpLiquidation(TpLiquidationContent {
            custodian: addr.clone(),
            token: token.clone(),
            ratio: exposure.ratio().unwrap_or_default(),
            pool_collateral: cust.locked_for(token),
            holding_amount,
            released_redeems,
            pub_token_liability,
        }),
    );
    emit(state, out, inst)
}

pub(crate) fn apply_tp_liquidation(
    state: &mut PortalSnapshot,
    content: &TpLiquidationContent,
) -> StfResult<()> {
    let cust = state
        .custodian_mut(&content.custodian)
        .ok_or_else(|| StfError::MissingCustodian(content.custodian.clone()))?;
    cust.forfeit(&content.token, &content.pool_collateral)?;
    cust.sub_holding(&content.token, content.holding_amount)?;
    cust.clear_tp_warning(&content.token);

    for released in &content.released_redeems {
        let req = state
            .redeem_mut(released.pool, &released.redeem_id)
            .ok_or_else(|| StfError::MissingRedeemRequest(released.redeem_id.clone()))?;
        let detail = req.remove_custodian(&content.custodian)?;
        if detail.amount != released.amount {
            return Err(StfError::Divergence(format!(
                "redeem {} share of {} is {}, instruction released {}",
                released.redeem_id, content.custodian, detail.amount, released.amount
            )));
        }
        if released.pool == RedeemPool::Matched {
            state.demote_redeem(&released.redeem_id);
        }
    }

    state.liquidation_pool_mut().deposit(
        &content.token,
        &content.pool_collateral,
        content.pub_token_liability,
    )?;
    Ok(())
}

pub(crate) fn apply_tp_warning(
    state: &mut PortalSnapshot,
    content: &TpWarningContent,
) -> StfResult<()> {
    let cust = state
        .custodian_mut(&content.custodian)
        .ok_or_else(|| StfError::MissingCustodian(content.custodian.clone()))?;
    if content.raised {
        cust.set_tp_warning(&content.token, content.ratio);
    } else {
        cust.clear_tp_warning(&content.token);
    }
    Ok(())
}

pub(crate) fn decide_pool_redeem(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    origin: ActionOrigin<'_>,
    token: &TokenId,
    redeemer: &IncAddress,
    amount: u64,
    fee: u64,
) -> StfResult<Instruction> {
    let mut content = LiquidationPoolRedeemContent {
        tx_id: origin.tx_id.to_owned(),
        token: token.clone(),
        redeemer: redeemer.clone(),
        amount,
        fee,
        payout: Collaterals::new(),
        reject_reason: None,
    };

    let status = match outcome(check_pool_redeem(state, ctx, token, amount, fee))? {
        Ok(payout) => {
            content.payout = payout;
            InstStatus::Accepted
        }
        Err(reason) => {
            content.reject_reason = Some(reason);
            InstStatus::Refund
        }
    };

    Ok(Instruction::new(
        Some(origin.shard_id),
        status,
        InstructionContent::LiquidationPoolRedeem(content),
    ))
}

fn check_pool_redeem(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    token: &TokenId,
    amount: u64,
    fee: u64,
) -> CheckResult<Collaterals> {
    let params = ctx.params();
    if !params.is_supported_ptoken(token) {
        return Err(RejectReason::UnsupportedToken(token.clone()).into());
    }
    if amount == 0 {
        return Err(RejectReason::ZeroAmount.into());
    }

    let value = ctx.converter().to_native(token, amount)?;
    let min_fee = basis_points_of(value, params.min_percent_redeem_fee)?;
    if fee < min_fee {
        return Err(RejectReason::FeeTooLow { fee, min: min_fee }.into());
    }

    let entry = state
        .liquidation_pool()
        .entry(token)
        .ok_or(RejectReason::PoolCannotCover)?;
    Ok(entry.payout_for(amount)?.ok_or(RejectReason::PoolCannotCover)?)
}

pub(crate) fn apply_pool_redeem(
    state: &mut PortalSnapshot,
    content: &LiquidationPoolRedeemContent,
) -> StfResult<()> {
    state
        .liquidation_pool_mut()
        .withdraw(&content.token, &content.payout, content.amount)?;
    Ok(())
}
