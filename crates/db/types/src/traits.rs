//! Trait definitions for the low level state store.

use portal_primitives::BeaconHeight;

use crate::{
    DbResult,
    keys::{RecordCategory, StoreKey},
};

/// Entries written together by [`StateStore::write_batch`].
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    puts: Vec<(StoreKey, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: StoreKey, value: Vec<u8>) {
        self.puts.push((key, value));
    }

    pub fn len(&self) -> usize {
        self.puts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty()
    }

    pub fn into_entries(self) -> Vec<(StoreKey, Vec<u8>)> {
        self.puts
    }
}

/// Byte-level key/value store with height-addressed record keys.
///
/// Operations are NOT VALIDATED at this level. Snapshots are written and
/// read through [`PersistenceAdapter`](crate::PersistenceAdapter).
pub trait StateStore: Send + Sync + 'static {
    fn get(&self, key: &StoreKey) -> DbResult<Option<Vec<u8>>>;

    /// Writes every entry of `batch` atomically.
    fn write_batch(&self, batch: WriteBatch) -> DbResult<()>;

    /// Returns the `(id, value)` pairs stored for `category` at `height`,
    /// ordered by id.
    fn scan_records(
        &self,
        category: RecordCategory,
        height: BeaconHeight,
    ) -> DbResult<Vec<(String, Vec<u8>)>>;

    /// Highest height holding a record of `category`.
    fn max_height(&self, category: RecordCategory) -> DbResult<Option<BeaconHeight>>;
}
