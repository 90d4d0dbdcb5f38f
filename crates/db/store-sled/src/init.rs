use std::{fs, path::Path, sync::Arc};

use anyhow::Context;

use crate::{SledDbConfig, SledStore};

// Opens sled database instance from datadir
pub fn open_sled_database(datadir: &Path, dbname: &'static str) -> anyhow::Result<sled::Db> {
    let mut database_dir = datadir.to_path_buf();
    database_dir.push("sled");
    database_dir.push(dbname);

    if !database_dir.exists() {
        fs::create_dir_all(&database_dir)
            .with_context(|| format!("creating {}", database_dir.display()))?;
    }

    sled::open(&database_dir).context("opening sled database")
}

/// Opens the portal state store under `datadir`.
pub fn open_sled_store(
    datadir: &Path,
    dbname: &'static str,
    config: SledDbConfig,
) -> anyhow::Result<Arc<SledStore>> {
    let db = open_sled_database(datadir, dbname)?;
    let store = SledStore::new(&db, config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize sled store: {}", e))?;
    Ok(Arc::new(store))
}
