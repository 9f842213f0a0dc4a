use sqlx::MySqlPool;

use crate::config::{Config, StorageBackend};
use crate::store::{MemoryTables, MySqlTables, TableStore};

pub async fn init_db(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    MySqlPool::connect(database_url).await
}

/// Builds the table store selected by `STORAGE_BACKEND`.
pub async fn init_store(config: &Config) -> anyhow::Result<TableStore> {
    match config.storage_backend {
        StorageBackend::MySql => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
            let pool = init_db(url).await?;
            Ok(TableStore::MySql(MySqlTables::new(pool)))
        }
        StorageBackend::Memory => Ok(TableStore::Memory(MemoryTables::default())),
    }
}
