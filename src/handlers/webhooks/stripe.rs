use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse};

use crate::db::AppState;
use crate::error::{msg, AppError, Result};
use crate::payments::{
    PaymentProvider, StripeCheckoutSession, StripeClient, StripeInvoice, StripeSubscription,
    StripeWebhookEvent,
};

use super::common::{
    handle_webhook, BillingEvent, ChargeData, CheckoutMetadata, WebhookGateway,
};

pub struct StripeWebhookGateway;

impl WebhookGateway for StripeWebhookGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    fn extract_signature(&self, headers: &HeaderMap) -> Result<String> {
        headers
            .get("stripe-signature")
            .ok_or_else(|| AppError::Validation(msg::MISSING_SIGNATURE.into()))?
            .to_str()
            .map(|s| s.to_string())
            .map_err(|e| {
                tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
                AppError::Validation(msg::MISSING_SIGNATURE.into())
            })
    }

    fn verify_signature(&self, state: &AppState, body: &[u8], signature: &str) -> Result<()> {
        let webhook_secret = state
            .secrets
            .get("stripe_webhook_secret")
            .ok_or_else(|| AppError::Internal(msg::MISSING_WEBHOOK_SECRET.into()))?;
        let secret_key = state.secrets.get("stripe_secret_key").unwrap_or("");

        let client = StripeClient::new(&state.http, secret_key, webhook_secret);
        if !client.verify_webhook_signature(body, signature)? {
            return Err(AppError::Authorization(msg::INVALID_SIGNATURE.into()));
        }
        Ok(())
    }

    fn parse_event(&self, body: &[u8]) -> Result<BillingEvent> {
        let event: StripeWebhookEvent = serde_json::from_slice(body).map_err(|e| {
            tracing::error!("Failed to parse Stripe webhook: {}", e);
            AppError::Validation("Invalid JSON".into())
        })?;

        match event.event_type.as_str() {
            "checkout.session.completed" => parse_checkout_completed(&event),
            "invoice.paid" => parse_invoice_paid(&event),
            "customer.subscription.created" => Ok(BillingEvent::SubscriptionCreated),
            "customer.subscription.deleted" => parse_subscription_deleted(&event),
            "customer.subscription.updated" => parse_subscription_updated(&event),
            "invoice.payment_failed" => parse_invoice_failed(&event),
            _ => Ok(BillingEvent::Ignored),
        }
    }
}

fn parse_checkout_completed(event: &StripeWebhookEvent) -> Result<BillingEvent> {
    let session: StripeCheckoutSession = serde_json::from_value(event.data.object.clone())
        .map_err(|e| {
            tracing::error!("Failed to parse checkout session: {}", e);
            AppError::Validation("Invalid checkout session".into())
        })?;

    if session.payment_status != "paid" {
        return Ok(BillingEvent::Ignored);
    }

    // client_reference_id is the canonical reference staged at issue time;
    // the session id is only a fallback for sessions created out of band.
    let reference = session
        .client_reference_id
        .clone()
        .unwrap_or_else(|| session.id.clone());

    Ok(BillingEvent::ChargeSucceeded(ChargeData {
        reference,
        amount_minor: session.amount_total,
        currency: session.currency.clone().map(|c| c.to_uppercase()),
        provider_transaction_id: Some(session.id.clone()),
        customer_code: session.customer.clone(),
        authorization_code: None,
        subscription_code: session.subscription.clone(),
        recurring_plan: session.subscription.clone(),
        metadata: CheckoutMetadata {
            user_id: session.metadata.user_id.clone(),
            plan: session.metadata.plan.clone(),
            billing_interval: session.metadata.billing_interval.clone(),
        },
    }))
}

fn parse_invoice_paid(event: &StripeWebhookEvent) -> Result<BillingEvent> {
    let invoice: StripeInvoice = serde_json::from_value(event.data.object.clone()).map_err(|e| {
        tracing::error!("Failed to parse invoice: {}", e);
        AppError::Validation("Invalid invoice".into())
    })?;

    if invoice.status.as_deref() != Some("paid") {
        return Ok(BillingEvent::Ignored);
    }

    let metadata = invoice
        .subscription_details
        .as_ref()
        .map(|d| CheckoutMetadata {
            user_id: d.metadata.user_id.clone(),
            plan: d.metadata.plan.clone(),
            billing_interval: d.metadata.billing_interval.clone(),
        })
        .unwrap_or_default();

    // The invoice id is the unique reference for renewal charges, so each
    // billing cycle lands its own ledger row while redeliveries collide.
    Ok(BillingEvent::ChargeSucceeded(ChargeData {
        reference: invoice.id.clone(),
        amount_minor: invoice.amount_paid,
        currency: invoice.currency.clone().map(|c| c.to_uppercase()),
        provider_transaction_id: Some(invoice.id.clone()),
        customer_code: invoice.customer.clone(),
        authorization_code: None,
        subscription_code: invoice.subscription.clone(),
        recurring_plan: invoice.subscription.clone(),
        metadata,
    }))
}

fn parse_subscription_deleted(event: &StripeWebhookEvent) -> Result<BillingEvent> {
    let subscription: StripeSubscription = serde_json::from_value(event.data.object.clone())
        .map_err(|e| {
            tracing::error!("Failed to parse subscription: {}", e);
            AppError::Validation("Invalid subscription".into())
        })?;

    Ok(BillingEvent::SubscriptionDisabled {
        subscription_code: subscription.id,
    })
}

fn parse_subscription_updated(event: &StripeWebhookEvent) -> Result<BillingEvent> {
    let subscription: StripeSubscription = serde_json::from_value(event.data.object.clone())
        .map_err(|e| {
            tracing::error!("Failed to parse subscription: {}", e);
            AppError::Validation("Invalid subscription".into())
        })?;

    // Only the will-not-renew flag matters from update events; everything
    // else about the subscription is owned by charge/cancel events.
    if subscription.cancel_at_period_end {
        Ok(BillingEvent::SubscriptionWillNotRenew {
            subscription_code: subscription.id,
        })
    } else {
        Ok(BillingEvent::Ignored)
    }
}

fn parse_invoice_failed(event: &StripeWebhookEvent) -> Result<BillingEvent> {
    let invoice: StripeInvoice = serde_json::from_value(event.data.object.clone()).map_err(|e| {
        tracing::error!("Failed to parse invoice: {}", e);
        AppError::Validation("Invalid invoice".into())
    })?;

    Ok(BillingEvent::ChargeFailed {
        subscription_code: invoice.subscription,
    })
}

/// Axum handler for Stripe webhooks.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(&StripeWebhookGateway, &state, &headers, &body).await
}
