use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse};

use crate::db::AppState;
use crate::error::{msg, AppError, Result};
use crate::payments::{
    PaymentProvider, PaystackCharge, PaystackClient, PaystackInvoiceEvent,
    PaystackSubscriptionEvent, PaystackWebhookEvent,
};

use super::common::{
    handle_webhook, BillingEvent, ChargeData, CheckoutMetadata, WebhookGateway,
};

pub struct PaystackWebhookGateway;

impl WebhookGateway for PaystackWebhookGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Paystack
    }

    fn extract_signature(&self, headers: &HeaderMap) -> Result<String> {
        headers
            .get("x-paystack-signature")
            .ok_or_else(|| AppError::Validation(msg::MISSING_SIGNATURE.into()))?
            .to_str()
            .map(|s| s.to_string())
            .map_err(|e| {
                tracing::debug!("Invalid UTF-8 in Paystack signature header: {}", e);
                AppError::Validation(msg::MISSING_SIGNATURE.into())
            })
    }

    fn verify_signature(&self, state: &AppState, body: &[u8], signature: &str) -> Result<()> {
        let secret = state
            .secrets
            .get("paystack_secret_key")
            .ok_or_else(|| AppError::Internal(msg::MISSING_WEBHOOK_SECRET.into()))?;

        let client = PaystackClient::new(&state.http, secret);
        if !client.verify_webhook_signature(body, signature)? {
            return Err(AppError::Authorization(msg::INVALID_SIGNATURE.into()));
        }
        Ok(())
    }

    fn parse_event(&self, body: &[u8]) -> Result<BillingEvent> {
        let event: PaystackWebhookEvent = serde_json::from_slice(body).map_err(|e| {
            tracing::error!("Failed to parse Paystack webhook: {}", e);
            AppError::Validation("Invalid JSON".into())
        })?;

        match event.event.as_str() {
            "charge.success" => parse_charge_success(&event),
            "subscription.create" => Ok(BillingEvent::SubscriptionCreated),
            "subscription.disable" => parse_subscription_disable(&event),
            "subscription.not_renew" => parse_subscription_not_renew(&event),
            "invoice.payment_failed" => parse_invoice_failed(&event),
            _ => Ok(BillingEvent::Ignored),
        }
    }
}

fn parse_charge_success(event: &PaystackWebhookEvent) -> Result<BillingEvent> {
    let charge: PaystackCharge = serde_json::from_value(event.data.clone()).map_err(|e| {
        tracing::error!("Failed to parse Paystack charge: {}", e);
        AppError::Validation("Invalid charge payload".into())
    })?;

    if charge.status != "success" {
        return Ok(BillingEvent::Ignored);
    }

    // Paystack sends "plan": {} for one-off charges; only a populated
    // plan_code marks the charge as recurring.
    let recurring_plan = charge.plan.as_ref().and_then(|p| p.plan_code.clone());

    let metadata = charge
        .metadata
        .as_ref()
        .map(|m| CheckoutMetadata {
            user_id: m.user_id.clone(),
            plan: m.plan.clone(),
            billing_interval: m.billing_interval.clone(),
        })
        .unwrap_or_default();

    Ok(BillingEvent::ChargeSucceeded(ChargeData {
        reference: charge.reference.clone(),
        amount_minor: charge.amount,
        currency: charge.currency.clone(),
        provider_transaction_id: charge.id.map(|id| id.to_string()),
        customer_code: charge.customer.as_ref().and_then(|c| c.customer_code.clone()),
        authorization_code: charge
            .authorization
            .as_ref()
            .and_then(|a| a.authorization_code.clone()),
        subscription_code: None,
        recurring_plan,
        metadata,
    }))
}

fn parse_subscription_disable(event: &PaystackWebhookEvent) -> Result<BillingEvent> {
    let data: PaystackSubscriptionEvent =
        serde_json::from_value(event.data.clone()).map_err(|e| {
            tracing::error!("Failed to parse Paystack subscription event: {}", e);
            AppError::Validation("Invalid subscription payload".into())
        })?;

    let subscription_code = data
        .subscription_code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("Missing subscription code".into()))?;

    Ok(BillingEvent::SubscriptionDisabled { subscription_code })
}

fn parse_subscription_not_renew(event: &PaystackWebhookEvent) -> Result<BillingEvent> {
    let data: PaystackSubscriptionEvent =
        serde_json::from_value(event.data.clone()).map_err(|e| {
            tracing::error!("Failed to parse Paystack subscription event: {}", e);
            AppError::Validation("Invalid subscription payload".into())
        })?;

    let subscription_code = data
        .subscription_code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("Missing subscription code".into()))?;

    Ok(BillingEvent::SubscriptionWillNotRenew { subscription_code })
}

fn parse_invoice_failed(event: &PaystackWebhookEvent) -> Result<BillingEvent> {
    let data: PaystackInvoiceEvent = serde_json::from_value(event.data.clone()).map_err(|e| {
        tracing::error!("Failed to parse Paystack invoice event: {}", e);
        AppError::Validation("Invalid invoice payload".into())
    })?;

    Ok(BillingEvent::ChargeFailed {
        subscription_code: data.subscription.and_then(|s| s.subscription_code),
    })
}

/// Axum handler for Paystack webhooks.
pub async fn handle_paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(&PaystackWebhookGateway, &state, &headers, &body).await
}
