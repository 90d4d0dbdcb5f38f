//! Sled store for portal state.

mod config;
mod init;
mod store;

pub use config::SledDbConfig;
pub use init::{open_sled_database, open_sled_store};
pub use store::SledStore;

pub const SLED_NAME: &str = "portal";
