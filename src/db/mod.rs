pub mod diesel_pool;
pub mod memory_store;
pub mod pg_store;
pub mod store;

pub use diesel_pool::{
    check_diesel_health, create_diesel_pool, mask_connection_string, DieselDatabaseConfig,
    DieselPool,
};
pub use memory_store::MemoryStore;
pub use pg_store::PgStore;
pub use store::{Store, StoreError, StoreResult};

use std::sync::Arc;

use crate::app_config::{DatabaseConfig, StoreBackend};

/// Build the configured store backend
pub async fn init_store(
    config: &DatabaseConfig,
) -> Result<Arc<dyn Store>, Box<dyn std::error::Error + Send + Sync>> {
    match config.backend {
        StoreBackend::Postgres => {
            let pool = create_diesel_pool(DieselDatabaseConfig::from(config)).await?;
            Ok(Arc::new(PgStore::new(pool, config.url.clone())))
        },
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        },
    }
}
