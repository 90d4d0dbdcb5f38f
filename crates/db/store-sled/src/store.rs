use std::fmt;

use portal_db_types::{
    DbError, DbResult, RecordCategory, StateStore, StoreKey, WriteBatch, keys::decode_record_key,
};
use portal_primitives::BeaconHeight;
use tracing::trace;

use crate::{SledDbConfig, config::STATE_TREE};

fn to_db_error(e: sled::Error) -> DbError {
    DbError::Backend(e.to_string())
}

/// [`StateStore`] backed by a single sled tree.
pub struct SledStore {
    tree: sled::Tree,
    config: SledDbConfig,
}

impl fmt::Debug for SledStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledStore")
            .field("tree", &STATE_TREE)
            .field("config", &self.config)
            .finish()
    }
}

impl SledStore {
    pub fn new(db: &sled::Db, config: SledDbConfig) -> DbResult<Self> {
        let tree = db.open_tree(STATE_TREE).map_err(to_db_error)?;
        Ok(Self { tree, config })
    }
}

impl StateStore for SledStore {
    fn get(&self, key: &StoreKey) -> DbResult<Option<Vec<u8>>> {
        let value = self.tree.get(key.encode()).map_err(to_db_error)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn write_batch(&self, batch: WriteBatch) -> DbResult<()> {
        let entries = batch.len();
        let mut sled_batch = sled::Batch::default();
        for (key, value) in batch.into_entries() {
            sled_batch.insert(key.encode(), value);
        }
        self.tree.apply_batch(sled_batch).map_err(to_db_error)?;
        if self.config.flush_every_batch {
            self.tree.flush().map_err(to_db_error)?;
        }
        trace!(entries, "applied sled batch");
        Ok(())
    }

    fn scan_records(
        &self,
        category: RecordCategory,
        height: BeaconHeight,
    ) -> DbResult<Vec<(String, Vec<u8>)>> {
        self.tree
            .scan_prefix(category.height_prefix(height))
            .map(|item| {
                let (k, v) = item.map_err(to_db_error)?;
                let (_, _, id) = decode_record_key(&k)?;
                Ok((id, v.to_vec()))
            })
            .collect()
    }

    fn max_height(&self, category: RecordCategory) -> DbResult<Option<BeaconHeight>> {
        match self.tree.scan_prefix(category.prefix()).next_back() {
            Some(item) => {
                let (k, _) = item.map_err(to_db_error)?;
                Ok(Some(decode_record_key(&k)?.1))
            }
            None => Ok(None),
        }
    }
}
