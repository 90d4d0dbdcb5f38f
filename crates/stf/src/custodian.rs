//! Custodian deposits and withdrawals.

use std::collections::BTreeMap;

use portal_instructions::{
    CustodianDepositContent, CustodianWithdrawContent, InstStatus, Instruction,
    InstructionContent, RejectReason,
};
use portal_primitives::{IncAddress, TokenId};
use portal_state::PortalSnapshot;

use crate::{
    context::{ActionOrigin, BlockContext},
    errors::{CheckResult, StfError, StfResult, outcome},
};

pub(crate) fn decide_deposit(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    origin: ActionOrigin<'_>,
    custodian: &IncAddress,
    asset: &TokenId,
    amount: u64,
    remote_addresses: &BTreeMap<TokenId, String>,
) -> StfResult<Instruction> {
    let mut content = CustodianDepositContent {
        tx_id: origin.tx_id.to_owned(),
        custodian: custodian.clone(),
        asset: asset.clone(),
        amount,
        remote_addresses: BTreeMap::new(),
        reject_reason: None,
    };

    let checked = check_deposit(state, ctx, custodian, asset, amount, remote_addresses);
    let status = match outcome(checked)? {
        Ok(new_addresses) => {
            content.remote_addresses = new_addresses;
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
        InstructionContent::CustodianDeposit(content),
    ))
}

/// Returns the remote addresses the deposit registers.
fn check_deposit(
    state: &PortalSnapshot,
    ctx: &BlockContext<'_>,
    custodian: &IncAddress,
    asset: &TokenId,
    amount: u64,
    remote_addresses: &BTreeMap<TokenId, String>,
) -> CheckResult<BTreeMap<TokenId, String>> {
    let params = ctx.params();
    if amount == 0 {
        return Err(RejectReason::ZeroAmount.into());
    }
    if !params.is_supported_collateral(asset) {
        return Err(RejectReason::UnsupportedCollateral(asset.clone()).into());
    }
    if let Some(token) = remote_addresses
        .keys()
        .find(|t| !params.is_supported_ptoken(t))
    {
        return Err(RejectReason::UnsupportedToken(token.clone()).into());
    }
    // every deposited asset must stay valuable in native units
    ctx.converter().to_native(asset, amount)?;

    Ok(match state.custodian(custodian) {
        Some(cust) => cust.new_remote_addresses(remote_addresses),
        None => remote_addresses.clone(),
    })
}

pub(crate) fn apply_deposit(
    state: &mut PortalSnapshot,
    content: &CustodianDepositContent,
) -> StfResult<()> {
    let cust = state.custodian_or_insert(&content.custodian);
    cust.deposit(&content.asset, content.amount)?;
    cust.register_remote_addresses(&content.remote_addresses);
    Ok(())
}

pub(crate) fn decide_withdraw(
    state: &PortalSnapshot,
    origin: ActionOrigin<'_>,
    custodian: &IncAddress,
    asset: &TokenId,
    amount: u64,
) -> StfResult<Instruction> {
    let reject_reason = match state.custodian(custodian) {
        None => Some(RejectReason::UnknownCustodian(custodian.clone())),
        Some(_) if amount == 0 => Some(RejectReason::ZeroAmount),
        Some(cust) if cust.free().get(asset) < amount => {
            Some(RejectReason::InsufficientFreeCollateral)
        }
        Some(_) => None,
    };
    let status = if reject_reason.is_some() {
        InstStatus::Rejected
    } else {
        InstStatus::Accepted
    };

    Ok(Instruction::new(
        Some(origin.shard_id),
        status,
        InstructionContent::CustodianWithdraw(CustodianWithdrawContent {
            tx_id: origin.tx_id.to_owned(),
            custodian: custodian.clone(),
            asset: asset.clone(),
            amount,
            reject_reason,
        }),
    ))
}

pub(crate) fn apply_withdraw(
    state: &mut PortalSnapshot,
    content: &CustodianWithdrawContent,
) -> StfResult<()> {
    state
        .custodian_mut(&content.custodian)
        .ok_or_else(|| StfError::MissingCustodian(content.custodian.clone()))?
        .withdraw(&content.asset, content.amount)?;
    Ok(())
}
