// Checkout, entitlements, plan status and revenue reports

mod common;

use axum::http::StatusCode;
use common::{setup_test_app, ADMIN_TOKEN, APP_URL, MONTHLY_PRICE, YEARLY_PRICE};
use serde_json::{json, Value};

#[tokio::test]
async fn test_checkout_uses_requested_plan() {
    let app = setup_test_app().await;
    let cookie = app.sign_in("user-1", "owner@example.com").await;

    // No body means the monthly plan
    let response = app.post("/api/stripe/checkout").cookie(&cookie).send().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(
        body["url"],
        format!("https://checkout.example.com/pay/{}", MONTHLY_PRICE)
    );

    let response = app
        .post("/api/stripe/checkout")
        .cookie(&cookie)
        .json(&json!({ "plan": "yearly" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let checkouts = app.billing.checkouts.lock().await;
    assert_eq!(checkouts.len(), 2);
    assert_eq!(checkouts[0].price_id, MONTHLY_PRICE);
    assert_eq!(checkouts[1].price_id, YEARLY_PRICE);
    assert_eq!(checkouts[0].uid, "user-1");
    assert_eq!(checkouts[0].customer_email.as_deref(), Some("owner@example.com"));
    assert_eq!(
        checkouts[0].success_url,
        format!("{}/dashboard?sub=success", APP_URL)
    );
    assert_eq!(checkouts[0].cancel_url, format!("{}/pricing?canceled=1", APP_URL));
}

#[tokio::test]
async fn test_checkout_rejects_unknown_plan_and_anonymous() {
    let app = setup_test_app().await;
    let cookie = app.sign_in("user-1", "owner@example.com").await;

    let response = app
        .post("/api/stripe/checkout")
        .cookie(&cookie)
        .json(&json!({ "plan": "weekly" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.post("/api/stripe/checkout").send().await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.billing.checkouts.lock().await.is_empty());
}

#[tokio::test]
async fn test_entitlement_follows_subscription_status() {
    let app = setup_test_app().await;
    let cookie = app.sign_in("user-1", "owner@example.com").await;

    let plan: Value = app.get("/api/plan/status").cookie(&cookie).send().await.json().await;
    assert_eq!(plan["status"], "none");

    for (status, pro) in [
        ("incomplete", false),
        ("past_due", false),
        ("trialing", true),
        ("active", true),
        ("canceled", false),
    ] {
        app.set_subscription("user-1", "sub_1", status).await;

        let body: Value = app
            .get("/api/entitlements")
            .cookie(&cookie)
            .send()
            .await
            .json()
            .await;
        assert_eq!(body["pro"], pro, "status {}", status);

        let plan: Value = app.get("/api/plan/status").cookie(&cookie).send().await.json().await;
        assert_eq!(plan["status"], status);
    }
}

#[tokio::test]
async fn test_review_limits_reflect_plan() {
    let app = setup_test_app().await;
    let cookie = app.sign_in("user-1", "owner@example.com").await;
    app.create_business("user-1", "ChIJ123").await;

    let body: Value = app.get("/api/limits/reviews").cookie(&cookie).send().await.json().await;
    assert_eq!(body, json!({ "pro": false, "used": 0, "limit": 5 }));

    app.grant_pro("user-1").await;
    let body: Value = app.get("/api/limits/reviews").cookie(&cookie).send().await.json().await;
    assert_eq!(body["pro"], true);
    assert!(body["limit"].is_null());
}

#[tokio::test]
async fn test_revenue_reports_require_admin_token() {
    let app = setup_test_app().await;
    app.billing
        .put_subscription("sub_m", "cus_m", "active", MONTHLY_PRICE)
        .await;
    app.billing
        .put_subscription("sub_y", "cus_y", "active", YEARLY_PRICE)
        .await;
    app.billing
        .put_subscription("sub_c", "cus_c", "canceled", MONTHLY_PRICE)
        .await;

    for uri in ["/api/analytics/subscribers", "/api/analytics/summary"] {
        let response = app.get(uri).send().await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);

        let response = app.get(uri).header("x-admin-token", "wrong").send().await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
    }

    let stats: Value = app
        .get("/api/analytics/subscribers")
        .header("x-admin-token", ADMIN_TOKEN)
        .send()
        .await
        .json()
        .await;
    assert_eq!(stats["active"], 2);
    // 29.00 monthly plus 29.00 / 12 yearly
    assert_eq!(stats["mrrUSD"], 31.42);

    let summary: Value = app
        .get("/api/analytics/summary")
        .header("x-admin-token", ADMIN_TOKEN)
        .send()
        .await
        .json()
        .await;
    assert_eq!(summary["revenueUSD"], 58.0);
    assert_eq!(summary["totalClicks"], 0);
    assert_eq!(summary["newBusinesses"], 0);
}
