// Library exports for the Reviews & Marketing backend
// The binary and the integration tests build the app through this crate

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

use std::sync::Arc;

use anyhow::Context;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::{MemoryStore, PgStore, Store, StoreError};
pub use middleware::AuthenticatedUser;
pub use utils::{ApiError, ApiResult};

/// Connect the store, run startup migrations and build the production providers
pub async fn initialize_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    info!("Initializing {:?} store...", config.database.backend);
    let store = db::init_store(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Store initialization failed: {}", e))?;

    if migrations::should_run_migrations(&config) {
        info!("Running embedded migrations...");
        migrations::run_startup_migrations(store.as_ref(), &config)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }

    let identity = Arc::new(services::FirebaseIdentity::new(config.identity.clone()));
    let billing = Arc::new(services::StripeClient::new(&config.stripe));
    let transport = services::EmailService::postmark_transport(&config.email);
    let places = Arc::new(services::GoogleProvider::new(config.google.clone()));

    AppState::new(config, store, identity, billing, transport, places)
        .context("Failed to initialize email templates")
}

/// Full HTTP surface: the JSON API under `/api` plus the short link redirect
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", handlers::api_routes())
        .route("/r/{slug}", get(handlers::links::redirect_short_link))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::dynamic_cors_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
