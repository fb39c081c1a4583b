use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse};

use crate::db::AppState;
use crate::error::{msg, AppError, Result};
use crate::payments::{
    FlutterwaveCharge, FlutterwaveClient, FlutterwaveSubscriptionEvent, FlutterwaveWebhookEvent,
    PaymentProvider,
};

use super::common::{
    handle_webhook, BillingEvent, ChargeData, CheckoutMetadata, WebhookGateway,
};

pub struct FlutterwaveWebhookGateway;

impl WebhookGateway for FlutterwaveWebhookGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Flutterwave
    }

    fn extract_signature(&self, headers: &HeaderMap) -> Result<String> {
        headers
            .get("verif-hash")
            .ok_or_else(|| AppError::Validation(msg::MISSING_SIGNATURE.into()))?
            .to_str()
            .map(|s| s.to_string())
            .map_err(|e| {
                tracing::debug!("Invalid UTF-8 in Flutterwave signature header: {}", e);
                AppError::Validation(msg::MISSING_SIGNATURE.into())
            })
    }

    fn verify_signature(&self, state: &AppState, _body: &[u8], signature: &str) -> Result<()> {
        let hash = state
            .secrets
            .get("flutterwave_webhook_hash")
            .ok_or_else(|| AppError::Internal(msg::MISSING_WEBHOOK_SECRET.into()))?;
        let secret_key = state.secrets.get("flutterwave_secret_key").unwrap_or("");

        let client = FlutterwaveClient::new(&state.http, secret_key, hash);
        if !client.verify_webhook_signature(signature)? {
            return Err(AppError::Authorization(msg::INVALID_SIGNATURE.into()));
        }
        Ok(())
    }

    fn parse_event(&self, body: &[u8]) -> Result<BillingEvent> {
        let event: FlutterwaveWebhookEvent = serde_json::from_slice(body).map_err(|e| {
            tracing::error!("Failed to parse Flutterwave webhook: {}", e);
            AppError::Validation("Invalid JSON".into())
        })?;

        match event.event.as_str() {
            "charge.completed" => parse_charge_completed(&event),
            "subscription.cancelled" => parse_subscription_cancelled(&event),
            _ => Ok(BillingEvent::Ignored),
        }
    }
}

fn parse_charge_completed(event: &FlutterwaveWebhookEvent) -> Result<BillingEvent> {
    let charge: FlutterwaveCharge = serde_json::from_value(event.data.clone()).map_err(|e| {
        tracing::error!("Failed to parse Flutterwave charge: {}", e);
        AppError::Validation("Invalid charge payload".into())
    })?;

    match charge.status.as_str() {
        "successful" => {}
        // Failed one-off charges carry no subscription code; the
        // reconciler treats that as nothing-to-transition.
        "failed" => return Ok(BillingEvent::ChargeFailed { subscription_code: None }),
        _ => return Ok(BillingEvent::Ignored),
    }

    let metadata = charge
        .meta
        .as_ref()
        .map(|m| CheckoutMetadata {
            user_id: m.user_id.clone(),
            plan: m.plan.clone(),
            billing_interval: m.billing_interval.clone(),
        })
        .unwrap_or_default();

    Ok(BillingEvent::ChargeSucceeded(ChargeData {
        // Amounts arrive in major units; the ledger stores minor units.
        amount_minor: charge.amount.map(|a| (a * 100.0).round() as i64),
        reference: charge.tx_ref.clone(),
        currency: charge.currency.clone(),
        provider_transaction_id: charge.id.map(|id| id.to_string()),
        customer_code: charge
            .customer
            .as_ref()
            .and_then(|c| c.id.map(|id| id.to_string())),
        authorization_code: None,
        subscription_code: None,
        recurring_plan: charge.payment_plan.map(|p| p.to_string()),
        metadata,
    }))
}

fn parse_subscription_cancelled(event: &FlutterwaveWebhookEvent) -> Result<BillingEvent> {
    let data: FlutterwaveSubscriptionEvent =
        serde_json::from_value(event.data.clone()).map_err(|e| {
            tracing::error!("Failed to parse Flutterwave subscription event: {}", e);
            AppError::Validation("Invalid subscription payload".into())
        })?;

    let subscription_code = data
        .subscription_code
        .or_else(|| data.id.map(|id| format!("sub_flw_{}", id)))
        .ok_or_else(|| AppError::Validation("Missing subscription code".into()))?;

    Ok(BillingEvent::SubscriptionDisabled { subscription_code })
}

/// Axum handler for Flutterwave webhooks.
pub async fn handle_flutterwave_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(&FlutterwaveWebhookGateway, &state, &headers, &body).await
}
