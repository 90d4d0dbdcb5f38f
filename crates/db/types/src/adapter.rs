//! Splits snapshots into height-addressed records and reassembles them.

use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use portal_primitives::BeaconHeight;
use portal_state::{
    CustodianState, ExchangeRateSubmission, FinalExchangeRates, LiquidationPool,
    LockedCollateralState, PortalSnapshot, RedeemPool, RedeemRequest, StatusKind, StatusLookup,
    StatusLookupError, StatusRecord, WaitingPortingRequest,
};
use tracing::debug;

use crate::{
    DbError, DbResult,
    keys::{RecordCategory, StoreKey},
    traits::{StateStore, WriteBatch},
};

/// Stored once per height, written in the same batch as the records.
#[derive(Clone, Debug, Eq, PartialEq, BorshDeserialize, BorshSerialize)]
struct SnapshotHeader {
    height: BeaconHeight,
    digest: [u8; 32],
}

fn redeem_category(pool: RedeemPool) -> RecordCategory {
    match pool {
        RedeemPool::Waiting => RecordCategory::WaitingRedeem,
        RedeemPool::Matched => RecordCategory::MatchedRedeem,
    }
}

fn put_record<T: BorshSerialize>(
    batch: &mut WriteBatch,
    category: RecordCategory,
    height: BeaconHeight,
    id: &str,
    value: &T,
) -> DbResult<()> {
    batch.put(StoreKey::record(category, height, id), borsh::to_vec(value)?);
    Ok(())
}

/// Persists snapshots and status records through a [`StateStore`].
#[derive(Debug)]
pub struct PersistenceAdapter<S> {
    store: Arc<S>,
}

impl<S> Clone for PersistenceAdapter<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: StateStore> PersistenceAdapter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stores `snapshot` under its own height, together with the status
    /// records produced while computing it. A height is written once.
    pub fn put_block(&self, snapshot: &PortalSnapshot, statuses: &[StatusRecord]) -> DbResult<()> {
        let height = snapshot.beacon_height();
        let header_key = StoreKey::record(RecordCategory::Header, height, "");
        if self.store.get(&header_key)?.is_some() {
            return Err(DbError::SnapshotExists(height));
        }

        let header = SnapshotHeader {
            height,
            digest: snapshot.digest()?,
        };
        let mut batch = WriteBatch::new();
        batch.put(header_key, borsh::to_vec(&header)?);

        for cust in snapshot.custodians() {
            put_record(
                &mut batch,
                RecordCategory::Custodian,
                height,
                cust.address().as_str(),
                cust,
            )?;
        }
        for req in snapshot.waiting_portings() {
            put_record(
                &mut batch,
                RecordCategory::WaitingPorting,
                height,
                req.porting_id().as_str(),
                req,
            )?;
        }
        for pool in [RedeemPool::Waiting, RedeemPool::Matched] {
            for req in snapshot.redeems(pool) {
                put_record(
                    &mut batch,
                    redeem_category(pool),
                    height,
                    req.redeem_id().as_str(),
                    req,
                )?;
            }
        }
        for (sender, sub) in snapshot.exchange_rate_submissions() {
            put_record(
                &mut batch,
                RecordCategory::RateSubmission,
                height,
                sender.as_str(),
                sub,
            )?;
        }
        if let Some(rates) = snapshot.final_exchange_rates() {
            put_record(&mut batch, RecordCategory::FinalRates, height, "", rates)?;
        }
        put_record(
            &mut batch,
            RecordCategory::LiquidationPool,
            height,
            "",
            snapshot.liquidation_pool(),
        )?;
        put_record(
            &mut batch,
            RecordCategory::LockedCollateral,
            height,
            "",
            snapshot.locked_collateral(),
        )?;

        for rec in statuses {
            batch.put(StoreKey::status(rec.kind, rec.id.clone()), borsh::to_vec(rec)?);
        }

        let records = batch.len();
        self.store.write_batch(batch)?;
        debug!(height, records, statuses = statuses.len(), "stored portal snapshot");
        Ok(())
    }

    pub fn put_snapshot(&self, snapshot: &PortalSnapshot) -> DbResult<()> {
        self.put_block(snapshot, &[])
    }

    /// Reassembles the snapshot stored at `height` and checks it against
    /// the digest recorded when it was written.
    pub fn get_snapshot(&self, height: BeaconHeight) -> DbResult<Option<PortalSnapshot>> {
        let header_key = StoreKey::record(RecordCategory::Header, height, "");
        let Some(raw) = self.store.get(&header_key)? else {
            return Ok(None);
        };
        let header: SnapshotHeader = borsh::from_slice(&raw)?;

        let mut snap = PortalSnapshot::genesis(height);
        for cust in self.records::<CustodianState>(RecordCategory::Custodian, height)? {
            snap.insert_custodian(cust);
        }
        for req in self.records::<WaitingPortingRequest>(RecordCategory::WaitingPorting, height)? {
            snap.insert_waiting_porting(req);
        }
        for pool in [RedeemPool::Waiting, RedeemPool::Matched] {
            for req in self.records::<RedeemRequest>(redeem_category(pool), height)? {
                snap.insert_redeem(pool, req);
            }
        }
        for sub in self.records::<ExchangeRateSubmission>(RecordCategory::RateSubmission, height)? {
            snap.record_rate_submission(sub);
        }
        let rates = self.singleton::<FinalExchangeRates>(RecordCategory::FinalRates, height)?;
        if let Some(rates) = rates {
            snap.set_final_exchange_rates(rates);
        }
        *snap.liquidation_pool_mut() = self
            .singleton::<LiquidationPool>(RecordCategory::LiquidationPool, height)?
            .ok_or(DbError::MissingRecord(RecordCategory::LiquidationPool, height))?;
        *snap.locked_collateral_mut() = self
            .singleton::<LockedCollateralState>(RecordCategory::LockedCollateral, height)?
            .ok_or(DbError::MissingRecord(RecordCategory::LockedCollateral, height))?;

        if snap.digest()? != header.digest {
            return Err(DbError::DigestMismatch(height));
        }
        Ok(Some(snap))
    }

    /// Highest height with a stored snapshot.
    pub fn latest_height(&self) -> DbResult<Option<BeaconHeight>> {
        self.store.max_height(RecordCategory::Header)
    }

    pub fn get_latest_snapshot(&self) -> DbResult<Option<PortalSnapshot>> {
        match self.latest_height()? {
            Some(height) => self.get_snapshot(height),
            None => Ok(None),
        }
    }

    pub fn get_status(&self, kind: StatusKind, id: &str) -> DbResult<Option<StatusRecord>> {
        self.store
            .get(&StoreKey::status(kind, id))?
            .map(|raw| borsh::from_slice(&raw))
            .transpose()
            .map_err(DbError::from)
    }

    fn records<T: BorshDeserialize>(
        &self,
        category: RecordCategory,
        height: BeaconHeight,
    ) -> DbResult<Vec<T>> {
        self.store
            .scan_records(category, height)?
            .into_iter()
            .map(|(_, raw)| borsh::from_slice(&raw).map_err(DbError::from))
            .collect()
    }

    fn singleton<T: BorshDeserialize>(
        &self,
        category: RecordCategory,
        height: BeaconHeight,
    ) -> DbResult<Option<T>> {
        self.store
            .get(&StoreKey::record(category, height, ""))?
            .map(|raw| borsh::from_slice(&raw))
            .transpose()
            .map_err(DbError::from)
    }
}

impl<S: StateStore> StatusLookup for PersistenceAdapter<S> {
    fn request_status(
        &self,
        kind: StatusKind,
        id: &str,
    ) -> Result<Option<StatusRecord>, StatusLookupError> {
        self.get_status(kind, id)
            .map_err(|e| StatusLookupError(e.to_string()))
    }
}
