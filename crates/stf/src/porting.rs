//! Porting (mint) flow: matching, proof acceptance and expiry.

use portal_instructions::{
    CustodianAmount, CustodianCollaterals, ExpiredPortingContent, InstStatus, Instruction,
    InstructionContent, PortingRequestContent, RejectReason, RelayProof, RequestPTokensContent,
};
use portal_primitives::{
    IncAddress, PortingId, TokenId,
    math::{basis_points_of, inverse_percent, mul_div_floor, percent_of},
};
use portal_state::{
    MatchingPortingCustodianDetail, PortalSnapshot, RateConverter, WaitingPortingRequest,
};
use tracing::warn;

use crate::{
    apply::emit,
    collateral::{Exposure, RatioTier, allocate_collateral},
    context::{ActionOrigin, BlockContext},
    errors::{CheckResult, StfError, StfResult, outcome},
};

#[expect(clippy::too_many_arguments, reason = "mirrors the porting action fields")]
pub(crate) fn decide_porting_request(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    origin: ActionOrigin<'_>,
    duplicate: bool,
    porting_id: &PortingId,
    token: &TokenId,
    porter: &IncAddress,
    amount: u64,
    fee: u64,
    shard_height: u64,
) -> StfResult<Instruction> {
    let mut content = PortingRequestContent {
        tx_id: origin.tx_id.to_owned(),
        porting_id: porting_id.clone(),
        token: token.clone(),
        porter: porter.clone(),
        amount,
        fee,
        shard_id: origin.shard_id,
        shard_height,
        beacon_height: ctx.block_height(),
        custodians: Vec::new(),
        reject_reason: None,
    };

    let checked = if duplicate {
        Err(RejectReason::DuplicateRequestId(porting_id.to_string()).into())
    } else {
        check_porting_request(state, ctx, token, amount, fee)
    };
    let status = match outcome(checked)? {
        Ok(custodians) => {
            content.custodians = custodians;
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
        InstructionContent::PortingRequest(content),
    ))
}

fn check_porting_request(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    token: &TokenId,
    amount: u64,
    fee: u64,
) -> CheckResult<Vec<MatchingPortingCustodianDetail>> {
    let params = ctx.params();
    if !params.is_supported_ptoken(token) {
        return Err(RejectReason::UnsupportedToken(token.clone()).into());
    }
    if amount == 0 {
        return Err(RejectReason::ZeroAmount.into());
    }

    let conv = ctx.converter();
    let min_fee = basis_points_of(conv.to_native(token, amount)?, params.min_percent_porting_fee)?;
    if fee < min_fee {
        return Err(RejectReason::FeeTooLow { fee, min: min_fee }.into());
    }

    match_porting_custodians(state, &conv, params.min_percent_locked_collateral, token, amount)
}

/// Matches custodians for `amount` of `token`, largest free collateral value
/// first, ties broken by descending address.
fn match_porting_custodians(
    state: &PortalSnapshot,
    conv: &RateConverter<'_>,
    min_percent: u64,
    token: &TokenId,
    amount: u64,
) -> CheckResult<Vec<MatchingPortingCustodianDetail>> {
    let mut candidates = Vec::new();
    for cust in state.custodians() {
        if cust.remote_address(token).is_none() {
            continue;
        }
        let free_value = conv.collaterals_to_native(cust.free())?;
        if free_value > 0 {
            candidates.push((free_value, cust));
        }
    }
    candidates.sort_by(|a, b| (a.0, a.1.address()).cmp(&(b.0, b.1.address())));

    let mut remaining = amount;
    let mut details = Vec::new();
    for (free_value, cust) in candidates.into_iter().rev() {
        if remaining == 0 {
            break;
        }
        let capacity = inverse_percent(conv.from_native(token, free_value)?, min_percent)?;
        let hold = capacity.min(remaining);
        if hold == 0 {
            continue;
        }
        let required = conv.to_native(token, percent_of(hold, min_percent)?)?;
        let Some(locked) = allocate_collateral(conv, cust.free(), required)? else {
            continue;
        };
        details.push(MatchingPortingCustodianDetail {
            custodian: cust.address().clone(),
            remote_address: cust.remote_address(token).unwrap_or_default().to_owned(),
            amount: hold,
            locked,
        });
        remaining -= hold;
    }

    if remaining > 0 {
        return Err(RejectReason::InsufficientCustodianCollateral.into());
    }
    Ok(details)
}

pub(crate) fn apply_porting_request(
    state: &mut PortalSnapshot,
    content: &PortingRequestContent,
) -> StfResult<()> {
    for detail in &content.custodians {
        state
            .custodian_mut(&detail.custodian)
            .ok_or_else(|| StfError::MissingCustodian(detail.custodian.clone()))?
            .lock(&content.token, &detail.locked)?;
    }
    state.insert_waiting_porting(WaitingPortingRequest::new(
        content.porting_id.clone(),
        content.token.clone(),
        content.porter.clone(),
        content.amount,
        content.custodians.clone(),
        content.fee,
        content.beacon_height,
        content.shard_id,
        content.shard_height,
    ));
    Ok(())
}

pub(crate) fn decide_request_ptokens(
    state: &PortalSnapshot,
    origin: ActionOrigin<'_>,
    porting_id: &PortingId,
    token: &TokenId,
    porter: &IncAddress,
    amount: u64,
    proof: &RelayProof,
) -> StfResult<Instruction> {
    let mut content = RequestPTokensContent {
        tx_id: origin.tx_id.to_owned(),
        porting_id: porting_id.clone(),
        token: token.clone(),
        porter: porter.clone(),
        amount,
        custodians: Vec::new(),
        fee_rewards: Vec::new(),
        reject_reason: None,
    };

    let checked = check_request_ptokens(state, porting_id, token, porter, amount, proof);
    let status = match outcome(checked)? {
        Ok((custodians, fee_rewards)) => {
            content.custodians = custodians;
            content.fee_rewards = fee_rewards;
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
        InstructionContent::RequestPTokens(content),
    ))
}

type PTokenShares = (Vec<CustodianAmount>, Vec<CustodianAmount>);

fn check_request_ptokens(
    state: &PortalSnapshot,
    porting_id: &PortingId,
    token: &TokenId,
    porter: &IncAddress,
    amount: u64,
    proof: &RelayProof,
) -> CheckResult<PTokenShares> {
    let req = state
        .waiting_porting(porting_id)
        .ok_or_else(|| RejectReason::UnknownRequest(porting_id.to_string()))?;
    if req.token() != token {
        return Err(RejectReason::RequestMismatch("token".to_owned()).into());
    }
    if req.porter() != porter {
        return Err(RejectReason::RequestMismatch("porter".to_owned()).into());
    }
    if req.amount() != amount {
        return Err(RejectReason::RequestMismatch("amount".to_owned()).into());
    }
    if !proof.verified || proof.memo != porting_id.as_str() {
        return Err(RejectReason::InvalidProof.into());
    }

    let mut custodians = Vec::with_capacity(req.custodians().len());
    let mut fee_rewards = Vec::with_capacity(req.custodians().len());
    for detail in req.custodians() {
        if proof.paid_to(&detail.remote_address) < detail.amount {
            return Err(RejectReason::InvalidProof.into());
        }
        custodians.push(CustodianAmount {
            custodian: detail.custodian.clone(),
            amount: detail.amount,
        });
        fee_rewards.push(CustodianAmount {
            custodian: detail.custodian.clone(),
            amount: mul_div_floor(detail.amount, req.fee(), req.amount())?,
        });
    }
    Ok((custodians, fee_rewards))
}

pub(crate) fn apply_request_ptokens(
    state: &mut PortalSnapshot,
    content: &RequestPTokensContent,
) -> StfResult<()> {
    for share in &content.custodians {
        state
            .custodian_mut(&share.custodian)
            .ok_or_else(|| StfError::MissingCustodian(share.custodian.clone()))?
            .add_holding(&content.token, share.amount)?;
    }
    for reward in &content.fee_rewards {
        state
            .custodian_mut(&reward.custodian)
            .ok_or_else(|| StfError::MissingCustodian(reward.custodian.clone()))?
            .credit_reward(&TokenId::native(), reward.amount)?;
    }
    state
        .remove_waiting_porting(&content.porting_id)
        .ok_or_else(|| StfError::MissingPortingRequest(content.porting_id.clone()))?;
    Ok(())
}

/// Builds the expiry of a waiting porting request. All matched collateral
/// goes back to free and the porter gets the fee back.
pub(crate) fn expire_porting(
    req: &WaitingPortingRequest,
    by_liquidation: bool,
) -> Instruction {
    let unlocked = req
        .custodians()
        .iter()
        .map(|d| CustodianCollaterals {
            custodian: d.custodian.clone(),
            collaterals: d.locked.clone(),
        })
        .collect();
    Instruction::new(
        None,
        InstStatus::Expired,
        InstructionContent::ExpiredWaitingPorting(ExpiredPortingContent {
            porting_id: req.porting_id().clone(),
            token: req.token().clone(),
            porter: req.porter().clone(),
            shard_id: req.shard_id(),
            fee_refund: req.fee(),
            by_liquidation,
            unlocked,
        }),
    )
}

pub(crate) fn apply_expired_porting(
    state: &mut PortalSnapshot,
    content: &ExpiredPortingContent,
) -> StfResult<()> {
    for entry in &content.unlocked {
        state
            .custodian_mut(&entry.custodian)
            .ok_or_else(|| StfError::MissingCustodian(entry.custodian.clone()))?
            .unlock(&content.token, &entry.collaterals)?;
    }
    state
        .remove_waiting_porting(&content.porting_id)
        .ok_or_else(|| StfError::MissingPortingRequest(content.porting_id.clone()))?;
    Ok(())
}

/// Expires waiting porting requests that timed out, or that have a matched
/// entry whose collateral ratio dropped below `tp120`.
pub(crate) fn expire_waiting_portings(
    state: &mut PortalSnapshot,
    ctx: &BlockContext<'_>,
    out: &mut Vec<Instruction>,
) -> StfResult<()> {
    let params = ctx.params();
    let conv = ctx.converter();
    let mut expired = Vec::new();
    for req in state.waiting_portings() {
        if req.is_timed_out(ctx.block_height(), params.time_out_porting_request) {
            expired.push(expire_porting(req, false));
            continue;
        }
        for detail in req.custodians() {
            let exposure = Exposure::measure(&conv, req.token(), &detail.locked, detail.amount)?;
            if exposure.tier(params) == RatioTier::Liquidate {
                warn!(
                    porting_id = %req.porting_id(),
                    custodian = %detail.custodian,
                    ratio = ?exposure.ratio(),
                    "porting entry under-collateralized, expiring request"
                );
                expired.push(expire_porting(req, true));
                break;
            }
        }
    }

    for inst in expired {
        emit(state, out, inst)?;
    }
    Ok(())
}
