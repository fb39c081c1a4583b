use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Canonical error message strings shared between handlers and tests.
pub mod msg {
    pub const MISSING_SIGNATURE: &str = "Missing signature header";
    pub const INVALID_SIGNATURE: &str = "Invalid webhook signature";
    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const MISSING_WEBHOOK_SECRET: &str = "Webhook secret not configured";
    pub const VERIFICATION_MISMATCH: &str = "Transaction verification mismatch";
    pub const MISSING_CHECKOUT_METADATA: &str = "Missing checkout metadata";
    pub const SUBSCRIPTION_NOT_FOUND: &str = "Subscription not found";
    pub const USER_NOT_FOUND: &str = "User not found";
    pub const EMAIL_REQUIRED: &str = "Email required";
    pub const FREE_PLAN_NOT_PURCHASABLE: &str = "Free plan cannot be purchased";
    pub const INVALID_PLAN: &str = "Invalid plan";
    pub const INVALID_INTERVAL: &str = "Invalid billing interval";
    pub const INVALID_PROVIDER: &str = "Invalid payment provider";
    pub const UNSUPPORTED_PAYMENT_METHOD: &str = "Payment method not supported by provider";
    pub const SUCCESS_URL_REQUIRED: &str = "success_url is required";
    pub const CANCEL_URL_REQUIRED: &str = "cancel_url is required";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation: {0}")]
    Validation(String),

    #[error("Authorization: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::Authorization(msg) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded", None),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Axum's JSON extractor rejection, mapped so malformed request bodies come
/// back as our structured 400 instead of axum's plain-text rejection.
impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Convert an `Option` into a `NotFound` error with a canonical message.
pub trait OptionExt<T> {
    fn or_not_found(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(msg.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
