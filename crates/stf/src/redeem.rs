//! Redeem (burn) flow: matching, payment proofs and timeouts.

use std::slice;

use portal_instructions::{
    CustodianAmount, InstStatus, Instruction, InstructionContent, RedeemMatchingContent,
    RedeemRequestContent, RedeemTimeoutContent, RedeemTimeoutOutcome, RejectReason, RelayProof,
    UnlockCollateralContent,
};
use portal_primitives::{
    Collaterals, IncAddress, RedeemId, TokenId,
    math::{basis_points_of, checked_sub},
};
use portal_state::{
    CustodianState, MatchingRedeemCustodianDetail, PortalSnapshot, RateConverter, RedeemPool,
    RedeemRequest,
};

use crate::{
    apply::emit,
    context::{ActionOrigin, BlockContext},
    errors::{CheckResult, StfError, StfResult, outcome},
};

#[expect(clippy::too_many_arguments, reason = "mirrors the redeem action fields")]
pub(crate) fn decide_redeem_request(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    origin: ActionOrigin<'_>,
    duplicate: bool,
    redeem_id: &RedeemId,
    token: &TokenId,
    redeemer: &IncAddress,
    remote_address: &str,
    amount: u64,
    fee: u64,
) -> StfResult<Instruction> {
    let mut content = RedeemRequestContent {
        tx_id: origin.tx_id.to_owned(),
        redeem_id: redeem_id.clone(),
        token: token.clone(),
        redeemer: redeemer.clone(),
        remote_address: remote_address.to_owned(),
        amount,
        fee,
        shard_id: origin.shard_id,
        beacon_height: ctx.block_height(),
        custodians: Vec::new(),
        fully_matched: false,
        reject_reason: None,
    };

    let checked = if duplicate {
        Err(RejectReason::DuplicateRequestId(redeem_id.to_string()).into())
    } else {
        check_redeem_request(state, ctx, token, amount, fee)
    };
    let status = match outcome(checked)? {
        Ok(custodians) => {
            let matched: u64 = custodians.iter().map(|c| c.amount).sum();
            content.fully_matched = matched == amount;
            content.custodians = custodians;
            if content.fully_matched {
                InstStatus::Matched
            } else {
                InstStatus::Accepted
            }
        }
        Err(reason) => {
            content.reject_reason = Some(reason);
            InstStatus::Refund
        }
    };

    Ok(Instruction::new(
        Some(origin.shard_id),
        status,
        InstructionContent::RedeemRequest(content),
    ))
}

fn check_redeem_request(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    token: &TokenId,
    amount: u64,
    fee: u64,
) -> CheckResult<Vec<MatchingRedeemCustodianDetail>> {
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

    Ok(match_redeem_custodians(state, token, amount))
}

/// Claims holdings for up to `amount`, largest holding first. The result may
/// cover only part of the amount.
fn match_redeem_custodians(
    state: &PortalSnapshot,
    token: &TokenId,
    amount: u64,
) -> Vec<MatchingRedeemCustodianDetail> {
    let mut candidates: Vec<&CustodianState> = state
        .custodians()
        .filter(|c| c.holding(token) > 0 && c.remote_address(token).is_some())
        .collect();
    candidates.sort_by(|a, b| {
        (a.holding(token), a.address()).cmp(&(b.holding(token), b.address()))
    });

    let mut remaining = amount;
    let mut picked = Vec::new();
    for cust in candidates.into_iter().rev() {
        if remaining == 0 {
            break;
        }
        let take = cust.holding(token).min(remaining);
        picked.push(redeem_detail(cust, token, take));
        remaining -= take;
    }
    picked
}

fn redeem_detail(
    cust: &CustodianState,
    token: &TokenId,
    amount: u64,
) -> MatchingRedeemCustodianDetail {
    MatchingRedeemCustodianDetail {
        custodian: cust.address().clone(),
        remote_address: cust.remote_address(token).unwrap_or_default().to_owned(),
        amount,
    }
}

fn take_holdings(
    state: &mut PortalSnapshot,
    token: &TokenId,
    details: &[MatchingRedeemCustodianDetail],
) -> StfResult<()> {
    for detail in details {
        state
            .custodian_mut(&detail.custodian)
            .ok_or_else(|| StfError::MissingCustodian(detail.custodian.clone()))?
            .sub_holding(token, detail.amount)?;
    }
    Ok(())
}

pub(crate) fn apply_redeem_request(
    state: &mut PortalSnapshot,
    content: &RedeemRequestContent,
) -> StfResult<()> {
    take_holdings(state, &content.token, &content.custodians)?;
    let pool = if content.fully_matched {
        RedeemPool::Matched
    } else {
        RedeemPool::Waiting
    };
    state.insert_redeem(
        pool,
        RedeemRequest::new(
            content.redeem_id.clone(),
            content.token.clone(),
            content.redeemer.clone(),
            content.remote_address.clone(),
            content.amount,
            content.fee,
            content.custodians.clone(),
            content.beacon_height,
            content.shard_id,
        ),
    );
    Ok(())
}

pub(crate) fn decide_redeem_matching(
    state: &PortalSnapshot,
    origin: ActionOrigin<'_>,
    redeem_id: &RedeemId,
    custodian: &IncAddress,
) -> StfResult<Instruction> {
    let (token, checked) = match state.find_redeem(redeem_id) {
        Some((RedeemPool::Waiting, req)) => {
            (req.token().clone(), check_redeem_matching(state, req, custodian))
        }
        Some((RedeemPool::Matched, req)) => (
            req.token().clone(),
            Err(RejectReason::AlreadyFullyMatched.into()),
        ),
        None => (
            TokenId::new(""),
            Err(RejectReason::UnknownRequest(redeem_id.to_string()).into()),
        ),
    };

    let mut content = RedeemMatchingContent {
        tx_id: origin.tx_id.to_owned(),
        redeem_id: redeem_id.clone(),
        custodian: custodian.clone(),
        token,
        remote_address: String::new(),
        amount: 0,
        fully_matched: false,
        reject_reason: None,
    };
    let status = match outcome(checked)? {
        Ok((detail, fully_matched)) => {
            content.remote_address = detail.remote_address;
            content.amount = detail.amount;
            content.fully_matched = fully_matched;
            if fully_matched {
                InstStatus::Matched
            } else {
                InstStatus::Accepted
            }
        }
        Err(reason) => {
            content.reject_reason = Some(reason);
            InstStatus::Rejected
        }
    };

    Ok(Instruction::new(
        Some(origin.shard_id),
        status,
        InstructionContent::RedeemMatching(content),
    ))
}

fn check_redeem_matching(
    state: &PortalSnapshot,
    req: &RedeemRequest,
    custodian: &IncAddress,
) -> CheckResult<(MatchingRedeemCustodianDetail, bool)> {
    let unmatched = req.unmatched_amount();
    if unmatched == 0 {
        return Err(RejectReason::AlreadyFullyMatched.into());
    }
    let cust = state
        .custodian(custodian)
        .ok_or_else(|| RejectReason::UnknownCustodian(custodian.clone()))?;
    if cust.remote_address(req.token()).is_none() {
        return Err(RejectReason::MissingRemoteAddress(req.token().clone()).into());
    }
    let holding = cust.holding(req.token());
    if holding == 0 {
        return Err(RejectReason::InsufficientHolding.into());
    }

    let amount = holding.min(unmatched);
    Ok((redeem_detail(cust, req.token(), amount), amount == unmatched))
}

pub(crate) fn apply_redeem_matching(
    state: &mut PortalSnapshot,
    content: &RedeemMatchingContent,
) -> StfResult<()> {
    let detail = MatchingRedeemCustodianDetail {
        custodian: content.custodian.clone(),
        remote_address: content.remote_address.clone(),
        amount: content.amount,
    };
    take_holdings(state, &content.token, slice::from_ref(&detail))?;
    state
        .redeem_mut(RedeemPool::Waiting, &content.redeem_id)
        .ok_or_else(|| StfError::MissingRedeemRequest(content.redeem_id.clone()))?
        .add_custodian(detail)?;
    if content.fully_matched {
        state.promote_redeem(&content.redeem_id);
    }
    Ok(())
}

pub(crate) fn decide_unlock_collateral(
    state: &PortalSnapshot,
    origin: ActionOrigin<'_>,
    redeem_id: &RedeemId,
    token: &TokenId,
    custodian: &IncAddress,
    redeem_amount: u64,
    proof: &RelayProof,
) -> StfResult<Instruction> {
    let mut content = UnlockCollateralContent {
        tx_id: origin.tx_id.to_owned(),
        redeem_id: redeem_id.clone(),
        token: token.clone(),
        custodian: custodian.clone(),
        pool: RedeemPool::Waiting,
        redeem_amount,
        unlocked: Collaterals::new(),
        fee_reward: 0,
        reject_reason: None,
    };

    let checked = check_unlock_collateral(state, redeem_id, token, custodian, redeem_amount, proof);
    let status = match outcome(checked)? {
        Ok((pool, unlocked, fee_reward)) => {
            content.pool = pool;
            content.unlocked = unlocked;
            content.fee_reward = fee_reward;
            InstStatus::Accepted
        }
        Err(reason) => {
            content.reject_reason = Some(reason);
            InstStatus::Rejected
        }
    };

    Ok(Instruction::new(
        Some(origin.shard_id),
        status,
        InstructionContent::UnlockCollateral(content),
    ))
}

fn check_unlock_collateral(
    state: &PortalSnapshot,
    redeem_id: &RedeemId,
    token: &TokenId,
    custodian: &IncAddress,
    redeem_amount: u64,
    proof: &RelayProof,
) -> CheckResult<(RedeemPool, Collaterals, u64)> {
    let (pool, req) = state
        .find_redeem(redeem_id)
        .ok_or_else(|| RejectReason::UnknownRequest(redeem_id.to_string()))?;
    if req.token() != token {
        return Err(RejectReason::RequestMismatch("token".to_owned()).into());
    }
    let matched = req.matched_to(custodian);
    if matched == 0 {
        return Err(RejectReason::CustodianNotMatched(custodian.clone()).into());
    }
    if matched != redeem_amount {
        return Err(RejectReason::RequestMismatch("amount".to_owned()).into());
    }
    if !proof.verified
        || proof.memo != redeem_id.as_str()
        || proof.paid_to(req.remote_address()) < matched
    {
        return Err(RejectReason::InvalidProof.into());
    }

    let cust = state
        .custodian(custodian)
        .ok_or_else(|| StfError::MissingCustodian(custodian.clone()))?;
    let unlocked = share_of_locked(state, cust, token, matched)?;
    let fee_reward = req.fee_share(matched)?;
    Ok((pool, unlocked, fee_reward))
}

/// Locked collateral backing `amount` of a custodian's pToken liability:
/// `locked * amount / total_held`, per asset, rounded down.
pub(crate) fn share_of_locked(
    state: &PortalSnapshot,
    cust: &CustodianState,
    token: &TokenId,
    amount: u64,
) -> StfResult<Collaterals> {
    let locked = state.effective_locked(cust, token)?;
    let total_held = state.total_held(cust, token)?;
    Ok(locked.scaled_floor(amount, total_held)?)
}

/// Settles a custodian's share of a redeem request and drops the request once
/// nothing is outstanding.
pub(crate) fn settle_redeem_share(
    state: &mut PortalSnapshot,
    pool: RedeemPool,
    redeem_id: &RedeemId,
    custodian: &IncAddress,
    fee_share: u64,
) -> StfResult<()> {
    let req = state
        .redeem_mut(pool, redeem_id)
        .ok_or_else(|| StfError::MissingRedeemRequest(redeem_id.clone()))?;
    req.settle_custodian(custodian, fee_share)?;
    if req.outstanding_amount() == 0 {
        state.remove_redeem(pool, redeem_id);
    }
    Ok(())
}

pub(crate) fn apply_unlock_collateral(
    state: &mut PortalSnapshot,
    content: &UnlockCollateralContent,
) -> StfResult<()> {
    let cust = state
        .custodian_mut(&content.custodian)
        .ok_or_else(|| StfError::MissingCustodian(content.custodian.clone()))?;
    cust.unlock(&content.token, &content.unlocked)?;
    cust.credit_reward(&TokenId::native(), content.fee_reward)?;
    settle_redeem_share(
        state,
        content.pool,
        &content.redeem_id,
        &content.custodian,
        content.fee_reward,
    )
}

/// Handles waiting redeem requests older than the redeem timeout.
///
/// Custodians holding the pToken are picked for the unmatched remainder,
/// largest free collateral value first. If they cannot cover it the request
/// is cancelled: matched custodians get their holdings back and the redeemer
/// is paid from the liquidation pool, or refunded in pTokens when the pool
/// cannot cover the claim.
pub(crate) fn time_out_waiting_redeems(
    state: &mut PortalSnapshot,
    ctx: &BlockContext<'_>,
    out: &mut Vec<Instruction>,
) -> StfResult<()> {
    let timeout = ctx.params().time_out_redeem_request;
    let expired: Vec<RedeemId> = state
        .redeems(RedeemPool::Waiting)
        .filter(|r| r.is_timed_out(ctx.block_height(), timeout))
        .map(|r| r.redeem_id().clone())
        .collect();

    let conv = ctx.converter();
    for id in expired {
        let req = state
            .redeem(RedeemPool::Waiting, &id)
            .ok_or_else(|| StfError::MissingRedeemRequest(id.clone()))?;
        let inst = decide_redeem_timeout(state, &conv, req)?;
        emit(state, out, inst)?;
    }
    Ok(())
}

fn decide_redeem_timeout(
    state: &PortalSnapshot,
    conv: &RateConverter<'_>,
    req: &RedeemRequest,
) -> StfResult<Instruction> {
    let token = req.token();
    let mut candidates = Vec::new();
    for cust in state.custodians() {
        if cust.holding(token) == 0 || cust.remote_address(token).is_none() {
            continue;
        }
        candidates.push((conv.collaterals_to_native(cust.free())?, cust));
    }
    // largest free value first, ascending address on ties
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.address().cmp(b.1.address())));

    let mut remaining = req.unmatched_amount();
    let mut picked = Vec::new();
    for (_, cust) in candidates {
        if remaining == 0 {
            break;
        }
        let take = cust.holding(token).min(remaining);
        picked.push(redeem_detail(cust, token, take));
        remaining -= take;
    }

    let (status, resolution) = if remaining == 0 {
        (InstStatus::Matched, RedeemTimeoutOutcome::Rematched { picked })
    } else {
        let outstanding = req.outstanding_amount();
        let pool_payout = match state.liquidation_pool().entry(token) {
            Some(entry) => entry.payout_for(outstanding)?,
            None => None,
        };
        let refund_amount = if pool_payout.is_some() { 0 } else { outstanding };
        let status = if pool_payout.is_some() {
            InstStatus::Liquidated
        } else {
            InstStatus::Refund
        };
        let returned_holdings = req
            .custodians()
            .iter()
            .map(|c| CustodianAmount {
                custodian: c.custodian.clone(),
                amount: c.amount,
            })
            .collect();
        (
            status,
            RedeemTimeoutOutcome::Cancelled {
                returned_holdings,
                pool_payout,
                refund_amount,
                fee_refund: req.outstanding_fee(),
            },
        )
    };

    Ok(Instruction::new(
        None,
        status,
        InstructionContent::RedeemTimeout(RedeemTimeoutContent {
            redeem_id: req.redeem_id().clone(),
            token: token.clone(),
            redeemer: req.redeemer().clone(),
            outstanding_amount: req.outstanding_amount(),
            outcome: resolution,
        }),
    ))
}

pub(crate) fn apply_redeem_timeout(
    state: &mut PortalSnapshot,
    content: &RedeemTimeoutContent,
) -> StfResult<()> {
    match &content.outcome {
        RedeemTimeoutOutcome::Rematched { picked } => {
            take_holdings(state, &content.token, picked)?;
            let req = state
                .redeem_mut(RedeemPool::Waiting, &content.redeem_id)
                .ok_or_else(|| StfError::MissingRedeemRequest(content.redeem_id.clone()))?;
            for detail in picked {
                req.add_custodian(detail.clone())?;
            }
            if !req.is_fully_matched() {
                return Err(StfError::Divergence(format!(
                    "redeem {} still under-matched after timeout pick",
                    content.redeem_id
                )));
            }
            state.promote_redeem(&content.redeem_id);
        }
        RedeemTimeoutOutcome::Cancelled {
            returned_holdings,
            pool_payout,
            refund_amount,
            ..
        } => {
            for share in returned_holdings {
                state
                    .custodian_mut(&share.custodian)
                    .ok_or_else(|| StfError::MissingCustodian(share.custodian.clone()))?
                    .add_holding(&content.token, share.amount)?;
            }
            if let Some(payout) = pool_payout {
                let burned = checked_sub(content.outstanding_amount, *refund_amount)?;
                state
                    .liquidation_pool_mut()
                    .withdraw(&content.token, payout, burned)?;
            }
            state
                .remove_redeem(RedeemPool::Waiting, &content.redeem_id)
                .ok_or_else(|| StfError::MissingRedeemRequest(content.redeem_id.clone()))?;
        }
    }
    Ok(())
}
