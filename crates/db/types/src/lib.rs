//! Storage interface for portal state.
//!
//! A [`StateStore`] is a byte-level key/value store whose record keys carry
//! the beacon height they belong to. The [`PersistenceAdapter`] writes every
//! record category of a processed snapshot under its height and keeps the
//! latest status of each request by id.

mod adapter;
mod errors;
pub mod keys;
mod memory;
pub mod traits;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use adapter::PersistenceAdapter;
pub use errors::{DbError, DbResult};
pub use keys::{RecordCategory, StoreKey};
pub use memory::MemoryStore;
pub use traits::{StateStore, WriteBatch};
