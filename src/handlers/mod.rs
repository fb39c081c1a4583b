pub mod checkout;
pub mod subscription;
pub mod webhooks;

pub use checkout::create_checkout_session;
pub use subscription::get_subscription;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::rate_limit;

/// Extract a Bearer token from the Authorization header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Billing endpoints plus health, with per-tier rate limits.
pub fn billing_router(rate: RateLimitConfig) -> Router<AppState> {
    let checkout = Router::new()
        .route("/billing/checkout", post(create_checkout_session))
        .route_layer(rate_limit::strict_layer(rate.strict_rpm));

    let subscription = Router::new()
        .route("/billing/subscription", get(get_subscription))
        .route_layer(rate_limit::standard_layer(rate.standard_rpm));

    let health = Router::new()
        .route("/health", get(health))
        .route_layer(rate_limit::relaxed_layer(rate.relaxed_rpm));

    checkout.merge(subscription).merge(health)
}

/// Webhook endpoints with the standard rate limit tier.
pub fn webhook_router(rate: RateLimitConfig) -> Router<AppState> {
    webhooks::router().route_layer(rate_limit::standard_layer(rate.standard_rpm))
}
