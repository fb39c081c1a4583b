//! Checkout endpoint validation tests.
//!
//! These cover the validation and auth paths that run before any payment
//! provider API call; the full issue flow would require HTTP mocking.

use axum::{body::Body, http::Request};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::*;

fn checkout_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/billing/checkout")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_checkout_without_session_or_email_is_unauthorized() {
    let state = create_test_app_state();
    let app = billing_app(state);

    let body = json!({
        "plan": "pro",
        "billing_interval": "monthly",
        "success_url": "https://app.snapmenu.test/success",
        "cancel_url": "https://app.snapmenu.test/cancel"
    });

    let response = app.oneshot(checkout_request(&body)).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_free_plan_is_rejected() {
    let state = create_test_app_state();
    {
        let conn = state.db.get().unwrap();
        create_test_user(&conn, "free@example.com");
    }
    let app = billing_app(state);

    let body = json!({
        "plan": "free",
        "billing_interval": "monthly",
        "email": "free@example.com",
        "success_url": "https://app.snapmenu.test/success",
        "cancel_url": "https://app.snapmenu.test/cancel"
    });

    let response = app.oneshot(checkout_request(&body)).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_unknown_plan_is_rejected() {
    let state = create_test_app_state();
    let app = billing_app(state);

    let body = json!({
        "plan": "enterprise",
        "billing_interval": "monthly",
        "email": "x@example.com",
        "success_url": "https://app.snapmenu.test/success",
        "cancel_url": "https://app.snapmenu.test/cancel"
    });

    let response = app.oneshot(checkout_request(&body)).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_missing_urls_is_rejected() {
    let state = create_test_app_state();
    {
        let conn = state.db.get().unwrap();
        create_test_user(&conn, "urls@example.com");
    }
    let app = billing_app(state);

    let body = json!({
        "plan": "pro",
        "billing_interval": "monthly",
        "email": "urls@example.com"
    });

    let response = app.oneshot(checkout_request(&body)).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_mobile_money_on_stripe_is_rejected() {
    let state = create_test_app_state();
    {
        let conn = state.db.get().unwrap();
        create_test_user(&conn, "momo@example.com");
    }
    let app = billing_app(state);

    let body = json!({
        "plan": "pro",
        "billing_interval": "monthly",
        "email": "momo@example.com",
        "provider": "stripe",
        "payment_method": "mobile_money",
        "success_url": "https://app.snapmenu.test/success",
        "cancel_url": "https://app.snapmenu.test/cancel"
    });

    let response = app.oneshot(checkout_request(&body)).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("Error body must be JSON");
    assert!(body.get("error").is_some());
}

#[tokio::test]
async fn test_checkout_invalid_provider_is_rejected() {
    let state = create_test_app_state();
    {
        let conn = state.db.get().unwrap();
        create_test_user(&conn, "prov@example.com");
    }
    let app = billing_app(state);

    let body = json!({
        "plan": "pro",
        "billing_interval": "monthly",
        "email": "prov@example.com",
        "provider": "square",
        "success_url": "https://app.snapmenu.test/success",
        "cancel_url": "https://app.snapmenu.test/cancel"
    });

    let response = app.oneshot(checkout_request(&body)).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_unknown_email_is_not_found() {
    let state = create_test_app_state();
    let app = billing_app(state);

    let body = json!({
        "plan": "pro",
        "billing_interval": "monthly",
        "email": "nobody@example.com",
        "success_url": "https://app.snapmenu.test/success",
        "cancel_url": "https://app.snapmenu.test/cancel"
    });

    let response = app.oneshot(checkout_request(&body)).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_error_body_is_json() {
    let state = create_test_app_state();
    let app = billing_app(state);

    // Malformed body: plan is a number
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/billing/checkout")
                .header("content-type", "application/json")
                .body(Body::from("{\"plan\": 42}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("Rejection body must be JSON");
    assert!(body.get("error").is_some());
}

// ============ Subscription read endpoint ============

#[tokio::test]
async fn test_subscription_read_requires_session() {
    let state = create_test_app_state();
    let app = billing_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/billing/subscription")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_subscription_read_returns_tier() {
    let state = create_test_app_state();
    let token;
    {
        let conn = state.db.get().unwrap();
        let (user, t) = create_test_user(&conn, "tier@example.com");
        token = t;
        queries::set_user_tier(&conn, &user.id, PlanTier::Pro).unwrap();
    }
    let app = billing_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/billing/subscription")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["subscription_tier"], "pro");
}
