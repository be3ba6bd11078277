use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::{
    config::{Config, StoreBackend},
    services::{EntryStore, MemoryEntryStore, PgEntryStore},
};

pub type DbPool = PgPool;

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn create_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Opens the configured store. Postgres stores are migrated before use.
pub async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn EntryStore>> {
    match config.store_backend() {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory logbook store; entries are lost on restart");
            Ok(Arc::new(MemoryEntryStore::new()))
        }
        StoreBackend::Postgres(url) => {
            let pool = create_pool(&url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            Ok(Arc::new(PgEntryStore::new(pool)))
        }
    }
}
