//! Voluntary collateral top-ups inside the warning band.

use portal_instructions::{InstStatus, Instruction, InstructionContent, RejectReason, TopUpContent};
use portal_primitives::{
    IncAddress, PortingId, TokenId,
    math::{checked_sub, percent_of},
};
use portal_state::{CustodianState, PortalSnapshot, RateConverter};

use crate::{
    collateral::{Exposure, RatioTier, covering_amount, custodian_exposure},
    context::{ActionOrigin, BlockContext},
    errors::{Check, CheckResult, StfError, StfResult, outcome},
};

/// Requested top-up, shared by the custodian-wide and the per-porting
/// variants.
#[derive(Clone, Debug)]
pub(crate) struct TopUpRequest<'a> {
    pub(crate) custodian: &'a IncAddress,
    pub(crate) token: &'a TokenId,
    pub(crate) asset: &'a TokenId,
    pub(crate) deposit: u64,
    pub(crate) free_collateral_selected: bool,
}

impl TopUpRequest<'_> {
    fn content(&self, origin: ActionOrigin<'_>, porting_id: Option<&PortingId>) -> TopUpContent {
        TopUpContent {
            tx_id: origin.tx_id.to_owned(),
            custodian: self.custodian.clone(),
            token: self.token.clone(),
            asset: self.asset.clone(),
            porting_id: porting_id.cloned(),
            deposit: self.deposit,
            locked_added: 0,
            reject_reason: None,
        }
    }
}

/// Amount of `asset` to lock so the exposure reaches the matching
/// collateral ratio, checked against what the custodian can provide.
fn required_lock(
    conv: &RateConverter<'_>,
    min_percent: u64,
    cust: &CustodianState,
    req: &TopUpRequest<'_>,
    exposure: &Exposure,
) -> CheckResult<u64> {
    let target = conv.to_native(req.token, percent_of(exposure.held(), min_percent)?)?;
    let missing = target.saturating_sub(exposure.locked_value());
    let required = covering_amount(conv, req.asset, missing)?;

    let from_free = if req.free_collateral_selected {
        cust.free().get(req.asset).min(required)
    } else {
        0
    };
    let needed_deposit = checked_sub(required, from_free)?;
    if req.deposit < needed_deposit {
        return Err(RejectReason::DepositTooSmall {
            required: needed_deposit,
            deposit: req.deposit,
        }
        .into());
    }
    Ok(required)
}

fn check_common<'s>(
    state: &'s PortalSnapshot,
    ctx: &BlockContext<'_>,
    req: &TopUpRequest<'_>,
) -> CheckResult<&'s CustodianState> {
    let params = ctx.params();
    if !params.is_supported_ptoken(req.token) {
        return Err(RejectReason::UnsupportedToken(req.token.clone()).into());
    }
    if !params.is_supported_collateral(req.asset) {
        return Err(RejectReason::UnsupportedCollateral(req.asset.clone()).into());
    }
    Ok(state
        .custodian(req.custodian)
        .ok_or_else(|| RejectReason::UnknownCustodian(req.custodian.clone()))?)
}

fn finish(
    origin: ActionOrigin<'_>,
    mut content: TopUpContent,
    checked: CheckResult<u64>,
    wrap: fn(TopUpContent) -> InstructionContent,
) -> StfResult<Instruction> {
    let status = match outcome(checked)? {
        Ok(locked_added) => {
            content.locked_added = locked_added;
            InstStatus::Accepted
        }
        Err(reason) => {
            content.reject_reason = Some(reason);
            InstStatus::Rejected
        }
    };
    Ok(Instruction::new(Some(origin.shard_id), status, wrap(content)))
}

pub(crate) fn decide_custodian_top_up(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    origin: ActionOrigin<'_>,
    req: &TopUpRequest<'_>,
) -> StfResult<Instruction> {
    let checked = check_custodian_top_up(state, ctx, req);
    finish(
        origin,
        req.content(origin, None),
        checked,
        InstructionContent::CustodianTopUp,
    )
}

fn check_custodian_top_up(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    req: &TopUpRequest<'_>,
) -> CheckResult<u64> {
    let cust = check_common(state, ctx, req)?;
    let conv = ctx.converter();
    let exposure = custodian_exposure::<Check>(state, &conv, cust, req.token)?;
    if exposure.tier(ctx.params()) != RatioTier::Warning {
        return Err(RejectReason::NotInWarningBand {
            ratio: exposure.ratio().unwrap_or_default(),
        }
        .into());
    }
    required_lock(
        &conv,
        ctx.params().min_percent_locked_collateral,
        cust,
        req,
        &exposure,
    )
}

pub(crate) fn apply_custodian_top_up(
    state: &mut PortalSnapshot,
    content: &TopUpContent,
) -> StfResult<()> {
    let cust = state
        .custodian_mut(&content.custodian)
        .ok_or_else(|| StfError::MissingCustodian(content.custodian.clone()))?;
    cust.top_up(&content.token, &content.asset, content.deposit, content.locked_added)?;
    cust.clear_tp_warning(&content.token);
    Ok(())
}

pub(crate) fn decide_porting_top_up(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    origin: ActionOrigin<'_>,
    porting_id: &PortingId,
    req: &TopUpRequest<'_>,
) -> StfResult<Instruction> {
    let checked = check_porting_top_up(state, ctx, porting_id, req);
    finish(
        origin,
        req.content(origin, Some(porting_id)),
        checked,
        InstructionContent::WaitingPortingTopUp,
    )
}

fn check_porting_top_up(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    porting_id: &PortingId,
    req: &TopUpRequest<'_>,
) -> CheckResult<u64> {
    let cust = check_common(state, ctx, req)?;
    let porting = state
        .waiting_porting(porting_id)
        .ok_or_else(|| RejectReason::UnknownRequest(porting_id.to_string()))?;
    if porting.token() != req.token {
        return Err(RejectReason::RequestMismatch("token".to_owned()).into());
    }
    let detail = porting
        .custodian(req.custodian)
        .ok_or_else(|| RejectReason::CustodianNotMatched(req.custodian.clone()))?;

    let conv = ctx.converter();
    let exposure = Exposure::measure(&conv, req.token, &detail.locked, detail.amount)?;
    if exposure.tier(ctx.params()) != RatioTier::Warning {
        return Err(RejectReason::NotInWarningBand {
            ratio: exposure.ratio().unwrap_or_default(),
        }
        .into());
    }
    required_lock(
        &conv,
        ctx.params().min_percent_locked_collateral,
        cust,
        req,
        &exposure,
    )
}

pub(crate) fn apply_porting_top_up(
    state: &mut PortalSnapshot,
    content: &TopUpContent,
) -> StfResult<()> {
    let porting_id = content.porting_id.as_ref().ok_or_else(|| {
        StfError::Divergence(format!("porting top-up {} without porting id", content.tx_id))
    })?;
    state
        .custodian_mut(&content.custodian)
        .ok_or_else(|| StfError::MissingCustodian(content.custodian.clone()))?
        .top_up(&content.token, &content.asset, content.deposit, content.locked_added)?;
    state
        .waiting_porting_mut(porting_id)
        .ok_or_else(|| StfError::MissingPortingRequest(porting_id.clone()))?
        .add_locked(&content.custodian, &content.asset, content.locked_added)?;
    Ok(())
}
