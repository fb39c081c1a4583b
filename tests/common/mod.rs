//! Test utilities and fixtures for billing integration tests

#![allow(dead_code)]

use axum::routing::{get, post};
use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use snapmenu_billing::config::{RateLimitConfig, Secrets};
pub use snapmenu_billing::db::{init_db, queries, AppState};
pub use snapmenu_billing::handlers::webhooks::common::{ChargeData, CheckoutMetadata};
pub use snapmenu_billing::handlers::{create_checkout_session, get_subscription};
pub use snapmenu_billing::models::*;
pub use snapmenu_billing::payments::PaymentProvider;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a test user; returns the account and its session token.
pub fn create_test_user(conn: &Connection, email: &str) -> (UserAccount, String) {
    let input = CreateUser {
        email: email.to_string(),
        name: format!("Test User {}", email),
        country: Some("NG".to_string()),
    };
    queries::create_user(conn, &input).expect("Failed to create test user")
}

/// Test secrets with every provider configured.
pub fn test_secrets() -> Secrets {
    Secrets {
        stripe_secret_key: Some("sk_test_xxx".to_string()),
        stripe_webhook_secret: Some("whsec_test_secret".to_string()),
        paystack_secret_key: Some("sk_paystack_test".to_string()),
        flutterwave_secret_key: Some("flwseck_test".to_string()),
        flutterwave_webhook_hash: Some("flw_test_hash".to_string()),
    }
}

/// Create an AppState for testing with an in-memory database.
///
/// max_size(1) so every `get()` sees the same in-memory database.
pub fn create_test_app_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        base_url: "http://localhost:3000".to_string(),
        secrets: test_secrets(),
        http: reqwest::Client::new(),
        paid_trial_days: None,
        rate_limit: RateLimitConfig::default(),
    }
}

/// Router with the billing endpoints (no rate limiting in tests)
pub fn billing_app(state: AppState) -> Router {
    Router::new()
        .route("/billing/checkout", post(create_checkout_session))
        .route("/billing/subscription", get(get_subscription))
        .with_state(state)
}

/// Charge-success event data for a recurring plan purchase.
pub fn recurring_charge(reference: &str, user_id: &str, plan: &str, interval: &str) -> ChargeData {
    ChargeData {
        reference: reference.to_string(),
        amount_minor: Some(999_000),
        currency: Some("NGN".to_string()),
        provider_transaction_id: Some("12345".to_string()),
        customer_code: Some("CUS_test".to_string()),
        authorization_code: Some("AUTH_test".to_string()),
        subscription_code: None,
        recurring_plan: Some("PLN_test".to_string()),
        metadata: CheckoutMetadata {
            user_id: Some(user_id.to_string()),
            plan: Some(plan.to_string()),
            billing_interval: Some(interval.to_string()),
        },
    }
}

/// Charge-success event data for a one-off (non-plan) charge.
pub fn one_off_charge(reference: &str, user_id: &str, plan: &str, interval: &str) -> ChargeData {
    ChargeData {
        recurring_plan: None,
        ..recurring_charge(reference, user_id, plan, interval)
    }
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Seconds in a day, for period assertions
pub const ONE_DAY: i64 = 86400;
