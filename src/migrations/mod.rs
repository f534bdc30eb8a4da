// Migration orchestrator
// Embedded in the application binary so deploys need no migration tooling

pub mod diesel;

use crate::app_config::{AppConfig, StoreBackend};
use crate::db::Store;
use std::error::Error;
use tracing::{error, info};

/// Run pending migrations at startup
pub async fn run_startup_migrations(
    store: &dyn Store,
    config: &AppConfig,
) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
    info!(
        "[MIGRATIONS] Starting migration process for environment: {}",
        config.server.environment
    );

    match store.run_migrations().await {
        Ok(applied) => {
            if applied.is_empty() {
                info!("[MIGRATIONS] ✓ Migrations up to date");
            } else {
                info!("[MIGRATIONS] ✓ Applied {} migrations", applied.len());
            }
            Ok(applied)
        },
        Err(e) => {
            error!("[MIGRATIONS] ✗ Migration failed: {}", e);
            Err(format!("Migration failed: {}", e).into())
        },
    }
}

/// Embedded migrations run unless disabled or the store has no schema
pub fn should_run_migrations(config: &AppConfig) -> bool {
    if config.database.disable_embedded_migrations {
        return false;
    }

    config.database.backend == StoreBackend::Postgres
}
