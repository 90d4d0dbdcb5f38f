//! Status records derived from applied instructions.

use portal_instructions::{
    InstStatus, Instruction, InstructionContent, RedeemTimeoutOutcome, RejectReason,
};
use portal_primitives::{BeaconHeight, RedeemId};
use portal_state::{PortalSnapshot, StatusKind, StatusRecord, TrackedStatus, compound_id};

/// Records an instruction leaves behind, given the state right after it was
/// applied.
///
/// Porting and redeem requests are tracked by their own id. A request
/// rejected for reusing an id is tracked under `DuplicateRequest` by its
/// transaction id instead, so the original request keeps its record.
pub fn status_records(
    inst: &Instruction,
    state_after: &PortalSnapshot,
    height: BeaconHeight,
) -> Vec<StatusRecord> {
    let record = |kind, id: &str, status| StatusRecord {
        kind,
        id: id.to_owned(),
        status,
        beacon_height: height,
    };
    let outcome = |success| match inst.status() {
        InstStatus::Rejected => TrackedStatus::Rejected,
        InstStatus::Refund => TrackedStatus::Refunded,
        _ => success,
    };
    let request_key = |kind, id: &str, tx_id: &str, reason: Option<&RejectReason>| {
        if matches!(reason, Some(RejectReason::DuplicateRequestId(_))) {
            (StatusKind::DuplicateRequest, tx_id.to_owned())
        } else {
            (kind, id.to_owned())
        }
    };
    let redeem_done = |id: &RedeemId| state_after.find_redeem(id).is_none();

    match inst.content() {
        InstructionContent::CustodianDeposit(c) => vec![record(
            StatusKind::CustodianDeposit,
            &c.tx_id,
            outcome(TrackedStatus::Success),
        )],
        InstructionContent::CustodianWithdraw(c) => vec![record(
            StatusKind::CustodianWithdraw,
            &c.tx_id,
            outcome(TrackedStatus::Success),
        )],
        InstructionContent::PortingRequest(c) => {
            let (kind, key) = request_key(
                StatusKind::Porting,
                c.porting_id.as_str(),
                &c.tx_id,
                c.reject_reason.as_ref(),
            );
            vec![record(kind, &key, outcome(TrackedStatus::Waiting))]
        }
        InstructionContent::RequestPTokens(c) => {
            let mut out = vec![record(
                StatusKind::RequestPTokens,
                &c.tx_id,
                outcome(TrackedStatus::Success),
            )];
            if c.reject_reason.is_none() {
                out.push(record(
                    StatusKind::Porting,
                    c.porting_id.as_str(),
                    TrackedStatus::Success,
                ));
            }
            out
        }
        InstructionContent::ExchangeRates(c) => vec![record(
            StatusKind::ExchangeRates,
            &c.tx_id,
            outcome(TrackedStatus::Success),
        )],
        InstructionContent::RedeemRequest(c) => {
            let (kind, key) = request_key(
                StatusKind::Redeem,
                c.redeem_id.as_str(),
                &c.tx_id,
                c.reject_reason.as_ref(),
            );
            let matched = if c.fully_matched {
                TrackedStatus::Matched
            } else {
                TrackedStatus::Waiting
            };
            vec![record(kind, &key, outcome(matched))]
        }
        InstructionContent::RedeemMatching(c) => {
            let mut out = vec![record(
                StatusKind::RedeemMatching,
                &c.tx_id,
                outcome(TrackedStatus::Success),
            )];
            if c.reject_reason.is_none() && c.fully_matched {
                out.push(record(
                    StatusKind::Redeem,
                    c.redeem_id.as_str(),
                    TrackedStatus::Matched,
                ));
            }
            out
        }
        InstructionContent::UnlockCollateral(c) => {
            let mut out = vec![record(
                StatusKind::UnlockCollateral,
                &c.tx_id,
                outcome(TrackedStatus::Success),
            )];
            if c.reject_reason.is_none() && redeem_done(&c.redeem_id) {
                out.push(record(
                    StatusKind::Redeem,
                    c.redeem_id.as_str(),
                    TrackedStatus::Success,
                ));
            }
            out
        }
        InstructionContent::RedeemLiquidation(c) => {
            let id = compound_id(c.redeem_id.as_str(), c.custodian.as_str());
            let mut out = vec![record(
                StatusKind::RedeemLiquidation,
                &id,
                TrackedStatus::Liquidated,
            )];
            if redeem_done(&c.redeem_id) {
                out.push(record(
                    StatusKind::Redeem,
                    c.redeem_id.as_str(),
                    TrackedStatus::Liquidated,
                ));
            }
            out
        }
        InstructionContent::ExpiredWaitingPorting(c) => {
            let status = if c.by_liquidation {
                TrackedStatus::Liquidated
            } else {
                TrackedStatus::Expired
            };
            vec![record(StatusKind::Porting, c.porting_id.as_str(), status)]
        }
        InstructionContent::RedeemTimeout(c) => {
            let status = match &c.outcome {
                RedeemTimeoutOutcome::Rematched { .. } => TrackedStatus::Matched,
                RedeemTimeoutOutcome::Cancelled {
                    pool_payout: Some(_),
                    ..
                } => TrackedStatus::Liquidated,
                RedeemTimeoutOutcome::Cancelled { .. } => TrackedStatus::Refunded,
            };
            vec![record(StatusKind::Redeem, c.redeem_id.as_str(), status)]
        }
        InstructionContent::TpLiquidation(c) => vec![record(
            StatusKind::CustodianLiquidation,
            &compound_id(c.custodian.as_str(), c.token.as_str()),
            TrackedStatus::Liquidated,
        )],
        InstructionContent::TpWarning(c) => {
            let status = if c.raised {
                TrackedStatus::Warning
            } else {
                TrackedStatus::Cleared
            };
            vec![record(
                StatusKind::CustodianLiquidation,
                &compound_id(c.custodian.as_str(), c.token.as_str()),
                status,
            )]
        }
        InstructionContent::LiquidationPoolRedeem(c) => vec![record(
            StatusKind::LiquidationPoolRedeem,
            &c.tx_id,
            outcome(TrackedStatus::Success),
        )],
        InstructionContent::CustodianTopUp(c) | InstructionContent::WaitingPortingTopUp(c) => {
            vec![record(StatusKind::TopUp, &c.tx_id, outcome(TrackedStatus::Success))]
        }
        InstructionContent::RewardDistribution(c) => vec![record(
            StatusKind::RewardDistribution,
            &c.tx_id,
            outcome(TrackedStatus::Success),
        )],
        InstructionContent::RewardWithdraw(c) => vec![record(
            StatusKind::RewardWithdraw,
            &c.tx_id,
            outcome(TrackedStatus::Success),
        )],
    }
}
