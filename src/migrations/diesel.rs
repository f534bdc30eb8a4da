// Diesel migration runner for PostgreSQL
// diesel_migrations requires sync connections, not async

use crate::db::diesel_pool::MIGRATIONS;
use diesel::Connection;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use std::error::Error;
use tracing::{debug, info};

/// Run all pending Diesel migrations.
/// Returns the versions that were applied.
pub async fn run_migrations(database_url: String) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
    info!("[DIESEL] Starting Diesel migration process...");

    // MigrationHarness is sync
    let applied = tokio::task::spawn_blocking(
        move || -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
            debug!("[DIESEL] Establishing sync connection for migrations...");

            let mut conn = PgConnection::establish(&database_url)
                .map_err(|e| format!("Failed to establish sync connection: {}", e))?;

            let pending = conn
                .pending_migrations(MIGRATIONS)
                .map_err(|e| format!("Failed to check pending migrations: {}", e))?;

            if pending.is_empty() {
                debug!("[DIESEL] No pending migrations found");
                return Ok(Vec::new());
            }

            info!("[DIESEL] Found {} pending migrations", pending.len());

            let applied = conn
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| format!("Failed to run migrations: {}", e))?;

            for migration in &applied {
                debug!("[DIESEL] Applied migration: {}", migration);
            }

            Ok(applied.iter().map(|m| m.to_string()).collect())
        },
    )
    .await
    .map_err(|e| format!("Migration task panicked: {}", e))??;

    info!(
        "[DIESEL] Diesel migration process completed, {} applied",
        applied.len()
    );
    Ok(applied)
}
