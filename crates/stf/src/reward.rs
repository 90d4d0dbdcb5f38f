//! Epoch reward distribution and reward withdrawal.

use std::collections::BTreeMap;

use portal_instructions::{
    CustodianReward, InstStatus, Instruction, InstructionContent, RejectReason,
    RewardDistributionContent, RewardWithdrawContent,
};
use portal_params::PortalParams;
use portal_primitives::{
    Collaterals, IncAddress, MathError, MathResult, TokenId,
    math::{
        PERCENT_BASE, checked_add, mul_div_floor, mul_div_floor_u128, percent_of, ratio_percent,
    },
};
use portal_state::{CustodianState, PortalSnapshot, RateConverter};

use crate::{
    context::{ActionOrigin, BlockContext},
    errors::{CheckResult, StfError, StfResult, outcome},
};

fn total_locked(cust: &CustodianState) -> MathResult<Collaterals> {
    let mut locked = Collaterals::new();
    for bag in cust.locked().values() {
        locked.checked_add_assign(bag)?;
    }
    Ok(locked)
}

/// Custodian share of the epoch rewards, in percent.
///
/// Moves from the minimum to the maximum percent as the share of custodian
/// collateral that is locked grows.
fn custodian_percent(
    params: &PortalParams,
    state: &PortalSnapshot,
    conv: &RateConverter<'_>,
) -> CheckResult<u64> {
    let mut locked_value = 0u64;
    let mut total_value = 0u64;
    for cust in state.custodians() {
        let locked = total_locked(cust)?;
        locked_value = checked_add(locked_value, conv.collaterals_to_native(&locked)?)?;
        total_value = checked_add(total_value, conv.collaterals_to_native(cust.total())?)?;
    }

    let utilization = if total_value == 0 {
        0
    } else {
        ratio_percent(locked_value, total_value)?.min(PERCENT_BASE)
    };
    let spread = params.max_percent_custodian_rewards - params.min_percent_custodian_rewards;
    Ok(params.min_percent_custodian_rewards + mul_div_floor(spread, utilization, PERCENT_BASE)?)
}

pub(crate) fn decide_reward_distribution(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    origin: ActionOrigin<'_>,
    funds: &BTreeMap<TokenId, u64>,
) -> StfResult<Instruction> {
    let mut content = RewardDistributionContent {
        tx_id: origin.tx_id.to_owned(),
        beacon_height: ctx.block_height(),
        funds: funds.clone(),
        custodian_percent: 0,
        rewards: Vec::new(),
        reject_reason: None,
    };

    let status = match outcome(split_rewards(state, ctx, funds))? {
        Ok((percent, rewards)) => {
            content.custodian_percent = percent;
            content.rewards = rewards;
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
        InstructionContent::RewardDistribution(content),
    ))
}

/// Splits the custodian share of `funds` by the locked collateral each
/// custodian accumulated over the epoch. Flooring residue stays
/// unallocated.
fn split_rewards(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    funds: &BTreeMap<TokenId, u64>,
) -> CheckResult<(u64, Vec<CustodianReward>)> {
    let height = ctx.block_height();
    if !ctx.params().is_epoch_boundary(height) {
        return Err(RejectReason::NotEpochBoundary(height).into());
    }

    let accumulated = state.locked_collateral();
    if accumulated.total() == 0 {
        return Err(RejectReason::NoLockedCollateral.into());
    }
    let percent = custodian_percent(ctx.params(), state, &ctx.converter())?;

    let mut per_custodian: BTreeMap<IncAddress, BTreeMap<TokenId, u64>> = BTreeMap::new();
    for (asset, amount) in funds {
        let distributable = u128::from(percent_of(*amount, percent)?);
        for (custodian, locked) in accumulated.per_custodian() {
            let share = mul_div_floor_u128(*locked, distributable, accumulated.total())?;
            let share = u64::try_from(share).map_err(|_| MathError::Overflow)?;
            if share > 0 {
                per_custodian
                    .entry(custodian.clone())
                    .or_default()
                    .insert(asset.clone(), share);
            }
        }
    }

    let rewards = per_custodian
        .into_iter()
        .map(|(custodian, rewards)| CustodianReward { custodian, rewards })
        .collect();
    Ok((percent, rewards))
}

pub(crate) fn apply_reward_distribution(
    state: &mut PortalSnapshot,
    content: &RewardDistributionContent,
) -> StfResult<()> {
    for reward in &content.rewards {
        let cust = state
            .custodian_mut(&reward.custodian)
            .ok_or_else(|| StfError::MissingCustodian(reward.custodian.clone()))?;
        for (asset, amount) in &reward.rewards {
            cust.credit_reward(asset, *amount)?;
        }
    }
    state.locked_collateral_mut().reset();
    Ok(())
}

pub(crate) fn decide_reward_withdraw(
    state: &PortalSnapshot,
    origin: ActionOrigin<'_>,
    custodian: &IncAddress,
    token: &TokenId,
) -> StfResult<Instruction> {
    let (amount, reject_reason) = match state.custodian(custodian) {
        None => (0, Some(RejectReason::UnknownCustodian(custodian.clone()))),
        Some(cust) => match cust.reward(token) {
            0 => (0, Some(RejectReason::NoReward)),
            amount => (amount, None),
        },
    };
    let status = if reject_reason.is_some() {
        InstStatus::Rejected
    } else {
        InstStatus::Accepted
    };

    Ok(Instruction::new(
        Some(origin.shard_id),
        status,
        InstructionContent::RewardWithdraw(RewardWithdrawContent {
            tx_id: origin.tx_id.to_owned(),
            custodian: custodian.clone(),
            token: token.clone(),
            amount,
            reject_reason,
        }),
    ))
}

pub(crate) fn apply_reward_withdraw(
    state: &mut PortalSnapshot,
    content: &RewardWithdrawContent,
) -> StfResult<()> {
    let taken = state
        .custodian_mut(&content.custodian)
        .ok_or_else(|| StfError::MissingCustodian(content.custodian.clone()))?
        .take_reward(&content.token);
    if taken != content.amount {
        return Err(StfError::Divergence(format!(
            "custodian {} had {taken} {} of reward, instruction paid {}",
            content.custodian, content.token, content.amount
        )));
    }
    Ok(())
}

/// Adds every custodian's locked collateral value to the epoch accumulator.
pub(crate) fn accumulate_locked_collateral(
    state: &mut PortalSnapshot,
    conv: &RateConverter<'_>,
) -> StfResult<()> {
    let mut values = Vec::new();
    for cust in state.custodians() {
        let locked = total_locked(cust)?;
        values.push((cust.address().clone(), conv.collaterals_to_native(&locked)?));
    }
    for (addr, value) in values {
        state.locked_collateral_mut().accumulate(&addr, value)?;
    }
    Ok(())
}
