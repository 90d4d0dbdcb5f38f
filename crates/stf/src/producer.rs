//! Instruction producer.

use std::collections::BTreeSet;

use portal_instructions::{Action, Instruction, ShardAction, canonicalize};
use portal_params::ParamsSchedule;
use portal_primitives::{PortingId, RedeemId};
use portal_state::{PortalSnapshot, StatusKind, StatusLookup};
use tracing::{info, warn};

use crate::{
    apply::emit,
    context::{ActionOrigin, BlockContext},
    custodian,
    errors::StfResult,
    exchange_rates, liquidation, porting, redeem, reward,
    topup::{self, TopUpRequest},
};

/// Request ids already used by actions earlier in the block.
#[derive(Debug, Default)]
struct BlockIds {
    portings: BTreeSet<PortingId>,
    redeems: BTreeSet<RedeemId>,
}

/// Decides the instruction list for the height after `prev`.
///
/// Actions are put in canonical order and decided one at a time against a
/// working copy of the state, each decision seeing the effects of the ones
/// before it. The periodic scans run afterwards, in order: run-away
/// custodians, redeem timeouts, porting expiry, collateral ratios. The scans
/// price with the rates this height will finalize to.
pub fn produce_instructions<L: StatusLookup>(
    prev: &PortalSnapshot,
    schedule: &ParamsSchedule,
    lookup: &L,
    mut actions: Vec<ShardAction>,
) -> StfResult<Vec<Instruction>> {
    let mut state = prev.advanced();
    let height = state.beacon_height();
    let params = schedule.params_at(height)?;
    canonicalize(&mut actions);

    let rates = state.final_exchange_rates().cloned().unwrap_or_default();
    let mut ctx = BlockContext::new(params, height, rates);
    let mut seen = BlockIds::default();
    let mut out = Vec::with_capacity(actions.len());

    for sa in &actions {
        let inst = decide_action(&state, &ctx, lookup, &mut seen, sa)?;
        if let Some(reason) = inst.content().reject_reason() {
            warn!(%reason, tx_id = %sa.tx_id, meta = ?inst.meta_type(), "rejected portal action");
        }
        emit(&mut state, &mut out, inst)?;
    }

    if let Some(rates) = exchange_rates::pending_rates(&state) {
        ctx.set_rates(rates);
    }
    liquidation::liquidate_run_away_custodians(&mut state, &ctx, &mut out)?;
    redeem::time_out_waiting_redeems(&mut state, &ctx, &mut out)?;
    porting::expire_waiting_portings(&mut state, &ctx, &mut out)?;
    liquidation::scan_collateral_ratios(&mut state, &ctx, &mut out)?;

    state.check_invariants()?;
    info!(height, actions = actions.len(), instructions = out.len(), "produced portal block");
    Ok(out)
}

fn decide_action<L: StatusLookup>(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    lookup: &L,
    seen: &mut BlockIds,
    sa: &ShardAction,
) -> StfResult<Instruction> {
    let origin = ActionOrigin {
        shard_id: sa.shard_id,
        tx_id: &sa.tx_id,
    };

    match &sa.action {
        Action::CustodianDeposit {
            custodian,
            asset,
            amount,
            remote_addresses,
        } => custodian::decide_deposit(
            state,
            ctx,
            origin,
            custodian,
            asset,
            *amount,
            remote_addresses,
        ),
        Action::CustodianWithdraw {
            custodian,
            asset,
            amount,
        } => custodian::decide_withdraw(state, origin, custodian, asset, *amount),
        Action::PortingRequest {
            porting_id,
            token,
            porter,
            amount,
            fee,
            shard_height,
        } => {
            let duplicate = !seen.portings.insert(porting_id.clone())
                || state.waiting_porting(porting_id).is_some()
                || lookup
                    .request_status(StatusKind::Porting, porting_id.as_str())?
                    .is_some();
            porting::decide_porting_request(
                state,
                ctx,
                origin,
                duplicate,
                porting_id,
                token,
                porter,
                *amount,
                *fee,
                *shard_height,
            )
        }
        Action::RequestPTokens {
            porting_id,
            token,
            porter,
            amount,
            proof,
        } => porting::decide_request_ptokens(
            state, origin, porting_id, token, porter, *amount, proof,
        ),
        Action::ExchangeRates { sender, rates } => {
            exchange_rates::decide_exchange_rates(ctx, origin, sender, rates)
        }
        Action::RedeemRequest {
            redeem_id,
            token,
            redeemer,
            remote_address,
            amount,
            fee,
        } => {
            let duplicate = !seen.redeems.insert(redeem_id.clone())
                || state.find_redeem(redeem_id).is_some()
                || lookup
                    .request_status(StatusKind::Redeem, redeem_id.as_str())?
                    .is_some();
            redeem::decide_redeem_request(
                state,
                ctx,
                origin,
                duplicate,
                redeem_id,
                token,
                redeemer,
                remote_address,
                *amount,
                *fee,
            )
        }
        Action::RedeemMatching {
            redeem_id,
            custodian,
        } => redeem::decide_redeem_matching(state, origin, redeem_id, custodian),
        Action::UnlockCollateral {
            redeem_id,
            token,
            custodian,
            redeem_amount,
            proof,
        } => redeem::decide_unlock_collateral(
            state,
            origin,
            redeem_id,
            token,
            custodian,
            *redeem_amount,
            proof,
        ),
        Action::CustodianTopUp {
            custodian,
            token,
            asset,
            deposit,
            free_collateral_selected,
        } => {
            let req = TopUpRequest {
                custodian,
                token,
                asset,
                deposit: *deposit,
                free_collateral_selected: *free_collateral_selected,
            };
            topup::decide_custodian_top_up(state, ctx, origin, &req)
        }
        Action::WaitingPortingTopUp {
            porting_id,
            custodian,
            token,
            asset,
            deposit,
            free_collateral_selected,
        } => {
            let req = TopUpRequest {
                custodian,
                token,
                asset,
                deposit: *deposit,
                free_collateral_selected: *free_collateral_selected,
            };
            topup::decide_porting_top_up(state, ctx, origin, porting_id, &req)
        }
        Action::RedeemFromLiquidationPool {
            token,
            redeemer,
            amount,
            fee,
        } => liquidation::decide_pool_redeem(state, ctx, origin, token, redeemer, *amount, *fee),
        Action::DistributeEpochRewards { rewards } => {
            reward::decide_reward_distribution(state, ctx, origin, rewards)
        }
        Action::WithdrawReward { custodian, token } => {
            reward::decide_reward_withdraw(state, origin, custodian, token)
        }
    }
}
