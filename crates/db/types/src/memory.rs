//! In-memory [`StateStore`], for tests and dry runs.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use portal_primitives::BeaconHeight;

use crate::{
    DbResult,
    keys::{RecordCategory, StoreKey, decode_record_key},
    traits::{StateStore, WriteBatch},
};

/// Keeps encoded keys in a sorted map so scans see the same order as the
/// on-disk backends.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &StoreKey) -> DbResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(&key.encode()).cloned())
    }

    fn write_batch(&self, batch: WriteBatch) -> DbResult<()> {
        let mut entries = self.entries.write();
        for (key, value) in batch.into_entries() {
            entries.insert(key.encode(), value);
        }
        Ok(())
    }

    fn scan_records(
        &self,
        category: RecordCategory,
        height: BeaconHeight,
    ) -> DbResult<Vec<(String, Vec<u8>)>> {
        let prefix = category.height_prefix(height);
        let entries = self.entries.read();
        entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| {
                let (_, _, id) = decode_record_key(k)?;
                Ok((id, v.clone()))
            })
            .collect()
    }

    fn max_height(&self, category: RecordCategory) -> DbResult<Option<BeaconHeight>> {
        let prefix = category.prefix();
        let entries = self.entries.read();
        let last = entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .last();
        match last {
            Some((k, _)) => Ok(Some(decode_record_key(k)?.1)),
            None => Ok(None),
        }
    }
}
