// HTTP handlers and route tables

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod billing;
pub mod businesses;
pub mod health;
pub mod links;
pub mod members;
pub mod places;
pub mod qr;
pub mod reviews;

use crate::app::AppState;
use axum::{
    routing::{get, post},
    Router,
};

// Session and account routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/session",
            post(auth::create_session).delete(auth::delete_session),
        )
        .route("/me", get(auth::me))
        .route("/email", post(auth::send_auth_email))
}

pub fn member_routes() -> Router<AppState> {
    Router::new()
        .route("/list", get(members::list_members))
        .route("/invite", post(members::invite_member))
        .route("/accept", post(members::accept_invite))
        .route("/remove", post(members::remove_member))
}

// Operator routes; each handler checks its own token
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/plan", get(admin::user_plan))
        .route("/users/list", get(admin::list_users))
        .route("/subscriptions/list", get(admin::list_subscriptions))
        .route("/email/log", get(admin::email_log))
        .route("/email/send-test", post(admin::send_test_email))
        .route(
            "/features",
            get(admin::get_features).post(admin::put_features),
        )
        .route("/migrate", post(admin::run_migrations))
}

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/links/timeseries", get(analytics::link_timeseries))
        .route("/summary", get(analytics::daily_summary))
        .route("/subscribers", get(analytics::subscribers))
}

/// Everything under `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/members", member_routes())
        .nest("/admin", admin_routes())
        .nest("/analytics", analytics_routes())
        .route("/businesses/me", get(businesses::get_my_business))
        .route("/businesses/upsert", post(businesses::upsert_business))
        .route("/qr", get(qr::generate_qr))
        .route("/maps/static", get(places::static_map))
        .route("/places/autocomplete", post(places::autocomplete))
        .route("/places/details", get(places::place_details))
        .route("/stripe/checkout", post(billing::create_checkout))
        .route("/webhooks/stripe", post(billing::stripe_webhook))
        .route("/entitlements", get(billing::entitlements))
        .route("/plan/status", get(billing::get_plan_status))
        .route("/limits/reviews", get(billing::review_limits))
        .route("/reviews/send", post(reviews::send_review_request))
        .route("/links", post(links::create_link).get(links::list_links))
        .route("/digest/daily", post(analytics::send_daily_digest))
        .route("/contact", post(health::contact))
        .route("/health", get(health::health_check))
}
