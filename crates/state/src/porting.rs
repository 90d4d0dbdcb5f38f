//! Waiting porting (mint) requests.

use borsh::{BorshDeserialize, BorshSerialize};
use portal_primitives::{
    BeaconHeight, Collaterals, IncAddress, PortingId, ShardId, TokenId, math::checked_add,
};
use serde::{Deserialize, Serialize};

use crate::errors::{StateError, StateResult};

/// One custodian's share of a porting request.
#[derive(
    Clone, Debug, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct MatchingPortingCustodianDetail {
    pub custodian: IncAddress,
    pub remote_address: String,
    pub amount: u64,
    /// Collateral locked for this share, across all collateral assets.
    pub locked: Collaterals,
}

impl MatchingPortingCustodianDetail {
    pub fn locked_collateral(&self) -> u64 {
        self.locked.native()
    }
}

/// A porting request whose custodians are matched and which waits for the
/// porter's external deposit proof.
#[derive(
    Clone, Debug, Eq, PartialEq, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct WaitingPortingRequest {
    porting_id: PortingId,
    token: TokenId,
    porter: IncAddress,
    amount: u64,
    custodians: Vec<MatchingPortingCustodianDetail>,
    fee: u64,
    beacon_height: BeaconHeight,
    shard_id: ShardId,
    shard_height: u64,
}

impl WaitingPortingRequest {
    #[expect(clippy::too_many_arguments, reason = "plain record constructor")]
    pub fn new(
        porting_id: PortingId,
        token: TokenId,
        porter: IncAddress,
        amount: u64,
        custodians: Vec<MatchingPortingCustodianDetail>,
        fee: u64,
        beacon_height: BeaconHeight,
        shard_id: ShardId,
        shard_height: u64,
    ) -> Self {
        Self {
            porting_id,
            token,
            porter,
            amount,
            custodians,
            fee,
            beacon_height,
            shard_id,
            shard_height,
        }
    }

    pub fn porting_id(&self) -> &PortingId {
        &self.porting_id
    }

    pub fn token(&self) -> &TokenId {
        &self.token
    }

    pub fn porter(&self) -> &IncAddress {
        &self.porter
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn custodians(&self) -> &[MatchingPortingCustodianDetail] {
        &self.custodians
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn beacon_height(&self) -> BeaconHeight {
        self.beacon_height
    }

    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    pub fn shard_height(&self) -> u64 {
        self.shard_height
    }

    pub fn custodian(&self, addr: &IncAddress) -> Option<&MatchingPortingCustodianDetail> {
        self.custodians.iter().find(|c| &c.custodian == addr)
    }

    pub fn matched_amount(&self) -> u64 {
        self.custodians.iter().map(|c| c.amount).sum()
    }

    /// True once `timeout` blocks have passed since creation.
    pub fn is_timed_out(&self, block_height: BeaconHeight, timeout: u64) -> bool {
        block_height.saturating_sub(self.beacon_height) >= timeout
    }

    /// Records extra collateral a custodian locked for its share.
    pub fn add_locked(
        &mut self,
        custodian: &IncAddress,
        asset: &TokenId,
        amount: u64,
    ) -> StateResult<()> {
        let detail = self
            .custodians
            .iter_mut()
            .find(|c| &c.custodian == custodian)
            .ok_or_else(|| {
                StateError::CustodianNotMatched(custodian.clone(), self.porting_id.to_string())
            })?;
        detail.locked.add_asset(asset, amount)?;
        Ok(())
    }

    /// Checks that the matched shares add up to the requested amount.
    pub fn check_matched(&self) -> StateResult<()> {
        let mut sum = 0u64;
        for c in &self.custodians {
            sum = checked_add(sum, c.amount)?;
        }
        if sum != self.amount {
            return Err(StateError::Invariant(format!(
                "porting {} matched {sum} of {}",
                self.porting_id, self.amount
            )));
        }
        Ok(())
    }
}
