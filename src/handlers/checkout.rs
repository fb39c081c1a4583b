use axum::{extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, Result};
use crate::extractors::Json;
use crate::geo;
use crate::id::EntityType;
use crate::models::{BillingInterval, PaymentMethod, PlanTier, UserAccount};
use crate::payments::{FlutterwaveClient, PaymentProvider, PaystackClient, StripeClient};

use super::bearer_token;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan: PlanTier,
    pub billing_interval: BillingInterval,
    /// Explicit currency/country win over header detection.
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    /// Used only when the request carries no authenticated session.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub provider: Option<String>,
    /// Caller-supplied idempotency key; becomes the canonical reference.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    /// Canonical reference echoed back on the success webhook and used
    /// for idempotent matching.
    pub reference: String,
    pub provider: String,
}

/// Create a provider-hosted checkout session.
///
/// Picks currency and provider, stages `{user_id, plan, billing_interval}`
/// as session metadata (the reconciler's only source of truth about what
/// was purchased), and returns the hosted URL plus the canonical
/// reference. No ledger or subscription state is touched here.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let conn = state.db.get()?;

    // Authenticated user's email takes precedence over a body email.
    let authed: Option<UserAccount> = match bearer_token(&headers) {
        Some(token) => queries::get_user_by_auth_token(&conn, token)?,
        None => None,
    };

    let email = authed
        .as_ref()
        .map(|u| u.email.clone())
        .or_else(|| request.email.clone().filter(|e| !e.trim().is_empty()))
        .ok_or_else(|| AppError::Authorization(msg::EMAIL_REQUIRED.into()))?;

    if !request.plan.is_paid() {
        return Err(AppError::Validation(msg::FREE_PLAN_NOT_PURCHASABLE.into()));
    }

    let success_url = request
        .success_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::Validation(msg::SUCCESS_URL_REQUIRED.into()))?;
    let cancel_url = request
        .cancel_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::Validation(msg::CANCEL_URL_REQUIRED.into()))?;

    // The reconciler attributes the charge to this user via metadata, so
    // checkout needs a known account up front.
    let user = match authed {
        Some(user) => user,
        None => queries::get_user_by_email(&conn, &email)?
            .ok_or_else(|| AppError::NotFound(msg::USER_NOT_FOUND.into()))?,
    };

    let locale = geo::detect(
        &headers,
        request.country_code.as_deref(),
        request.currency.as_deref(),
    );

    let provider = match request.provider.as_deref() {
        Some(p) => p
            .parse::<PaymentProvider>()
            .map_err(|_| AppError::Validation(msg::INVALID_PROVIDER.into()))?,
        None => geo::recommend_provider(&locale.currency),
    };

    if let Some(method) = request.payment_method {
        if !provider.supports(method) {
            return Err(AppError::Validation(msg::UNSUPPORTED_PAYMENT_METHOD.into()));
        }
    }

    let reference = request
        .idempotency_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| EntityType::Reference.gen_id());

    let checkout_url = match provider {
        PaymentProvider::Stripe => {
            let secret_key = state
                .secrets
                .get("stripe_secret_key")
                .ok_or_else(|| AppError::Internal("Stripe not configured".into()))?;
            let webhook_secret = state.secrets.get("stripe_webhook_secret").unwrap_or("");

            let client = StripeClient::new(&state.http, secret_key, webhook_secret);
            let (_, url) = client
                .create_checkout_session(
                    &reference,
                    &user.id,
                    request.plan,
                    request.billing_interval,
                    &locale.currency,
                    &email,
                    success_url,
                    cancel_url,
                )
                .await?;
            url
        }
        PaymentProvider::Paystack => {
            let secret_key = state
                .secrets
                .get("paystack_secret_key")
                .ok_or_else(|| AppError::Internal("Paystack not configured".into()))?;

            let client = PaystackClient::new(&state.http, secret_key);
            let (_, url) = client
                .initialize_transaction(
                    &reference,
                    &user.id,
                    request.plan,
                    request.billing_interval,
                    &locale.currency,
                    &email,
                    success_url,
                    request.payment_method,
                )
                .await?;
            url
        }
        PaymentProvider::Flutterwave => {
            let secret_key = state
                .secrets
                .get("flutterwave_secret_key")
                .ok_or_else(|| AppError::Internal("Flutterwave not configured".into()))?;
            let hash = state.secrets.get("flutterwave_webhook_hash").unwrap_or("");

            let client = FlutterwaveClient::new(&state.http, secret_key, hash);
            let (_, url) = client
                .create_payment_link(
                    &reference,
                    &user.id,
                    request.plan,
                    request.billing_interval,
                    &locale.currency,
                    &email,
                    success_url,
                    request.payment_method,
                )
                .await?;
            url
        }
    };

    tracing::info!(
        "Checkout session issued: user={}, plan={}, interval={}, provider={}, currency={}, reference={}",
        user.id,
        request.plan.as_str(),
        request.billing_interval.as_str(),
        provider.as_str(),
        locale.currency,
        reference
    );

    Ok(Json(CheckoutResponse {
        checkout_url,
        reference,
        provider: provider.as_str().to_string(),
    }))
}
