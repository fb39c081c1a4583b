//! Common webhook handling infrastructure for payment providers.
//!
//! This module provides a trait-based approach to unify the Stripe,
//! Paystack and Flutterwave webhook handlers: each provider supplies
//! signature extraction/verification and a parser into the shared
//! `BillingEvent` model, and the reconciliation pipeline here folds the
//! event into subscription, payment and entitlement state.
//!
//! Deliveries are at-least-once and unordered. Nothing here takes a lock;
//! correctness under concurrent duplicate delivery comes from the unique
//! constraints and conditional writes in `db::queries`.

use axum::body::Bytes;
use axum::http::HeaderMap;
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, Result};
use crate::extractors::Json;
use crate::models::{
    BillingInterval, PlanTier, RecordPayment, SubscriptionStatus, UpsertSubscription,
};
use crate::payments::{FlutterwaveClient, PaymentProvider, PaystackClient};

/// Body of every accepted-or-ignored webhook response. Providers retry on
/// any non-2xx, so unknown event types are acknowledged, never errored.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Checkout metadata echoed back by the provider. Staged at session
/// creation time, this is the only channel through which a webhook learns
/// what was purchased.
#[derive(Debug, Clone, Default)]
pub struct CheckoutMetadata {
    pub user_id: Option<String>,
    pub plan: Option<String>,
    pub billing_interval: Option<String>,
}

/// Data extracted from a verified charge-success event.
#[derive(Debug, Clone)]
pub struct ChargeData {
    /// Canonical reference for idempotent matching (the checkout
    /// reference, or the provider's invoice id for renewals).
    pub reference: String,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub customer_code: Option<String>,
    pub authorization_code: Option<String>,
    /// Explicit provider subscription code, when the event carries one.
    pub subscription_code: Option<String>,
    /// Recurring-plan identifier; presence selects the subscription flow.
    pub recurring_plan: Option<String>,
    pub metadata: CheckoutMetadata,
}

/// Parsed webhook event with provider-agnostic data.
///
/// Every provider parser is total over its event-type space: recognized
/// families map to a variant, everything else is `Ignored` - an explicit
/// arm, never a silent fallthrough.
#[derive(Debug)]
pub enum BillingEvent {
    /// Verified successful charge - runs the full reconciliation pipeline.
    ChargeSucceeded(ChargeData),
    /// Subscription object created upstream. Activation is deferred to the
    /// paired charge-success event, so this is acknowledged without writes.
    SubscriptionCreated,
    /// Subscription disabled/deleted - transition to canceled, downgrade.
    SubscriptionDisabled { subscription_code: String },
    /// Subscription will not renew - flag only, no status change.
    SubscriptionWillNotRenew { subscription_code: String },
    /// Charge or invoice failed - matched subscription goes past_due.
    ChargeFailed { subscription_code: Option<String> },
    /// Event type not relevant to billing state.
    Ignored,
}

/// Trait for payment provider webhook handling.
///
/// Implementors supply signature handling and payload parsing; the generic
/// pipeline in `handle_webhook` owns verification order and reconciliation.
pub trait WebhookGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Extract the provider's signature from request headers.
    fn extract_signature(&self, headers: &HeaderMap) -> Result<String>;

    /// Verify the signature over the raw body. Must error (never silently
    /// pass) on mismatch - the pipeline will not parse an unverified body.
    fn verify_signature(&self, state: &AppState, body: &[u8], signature: &str) -> Result<()>;

    /// Parse the raw body into a provider-agnostic event.
    fn parse_event(&self, body: &[u8]) -> Result<BillingEvent>;
}

/// Generic webhook pipeline: verify, parse, re-verify, reconcile.
///
/// The raw body bytes are what was signed - they are verified exactly as
/// received and only parsed afterwards.
pub async fn handle_webhook<G: WebhookGateway>(
    gateway: &G,
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = gateway.extract_signature(headers)?;
    gateway.verify_signature(state, body, &signature)?;

    let event = gateway.parse_event(body)?;
    let provider = gateway.provider();

    match event {
        BillingEvent::ChargeSucceeded(charge) => {
            reverify_charge(state, provider, &charge).await?;

            let conn = state.db.get()?;
            process_charge_success(&conn, state.paid_trial_days, provider, &charge)?;
        }
        BillingEvent::SubscriptionCreated => {
            tracing::debug!(
                "{} subscription created event acknowledged (activation deferred to charge success)",
                provider.as_str()
            );
        }
        BillingEvent::SubscriptionDisabled { subscription_code } => {
            let conn = state.db.get()?;
            process_subscription_disabled(&conn, provider, &subscription_code)?;
        }
        BillingEvent::SubscriptionWillNotRenew { subscription_code } => {
            let conn = state.db.get()?;
            process_will_not_renew(&conn, provider, &subscription_code)?;
        }
        BillingEvent::ChargeFailed { subscription_code } => {
            let conn = state.db.get()?;
            process_charge_failed(&conn, provider, subscription_code.as_deref())?;
        }
        BillingEvent::Ignored => {
            tracing::debug!("{} webhook event ignored", provider.as_str());
        }
    }

    Ok(Json(WebhookAck { received: true }))
}

/// Defense-in-depth re-verification against the provider's authoritative
/// transaction API, for providers whose webhook payloads cannot be fully
/// trusted even after a signature check (shared/rotatable secrets).
///
/// Accept only if the fetched reference equals the webhook's reference AND
/// the fetched status is success. Any mismatch is treated as a potentially
/// forged or stale event and aborts before any write. Timeouts propagate
/// and fail the delivery, which makes the provider retry.
async fn reverify_charge(
    state: &AppState,
    provider: PaymentProvider,
    charge: &ChargeData,
) -> Result<()> {
    match provider {
        // Per-endpoint secret plus timestamped signature; no round trip.
        PaymentProvider::Stripe => Ok(()),
        PaymentProvider::Paystack => {
            let secret = state
                .secrets
                .get("paystack_secret_key")
                .ok_or_else(|| AppError::Internal(msg::MISSING_WEBHOOK_SECRET.into()))?;
            let client = PaystackClient::new(&state.http, secret);
            let verified = client.verify_transaction(&charge.reference).await?;

            if verified.reference != charge.reference || verified.status != "success" {
                tracing::warn!(
                    "Paystack re-verification mismatch: reference={}, fetched_status={}",
                    charge.reference,
                    verified.status
                );
                return Err(AppError::Authorization(msg::VERIFICATION_MISMATCH.into()));
            }
            Ok(())
        }
        PaymentProvider::Flutterwave => {
            let secret = state
                .secrets
                .get("flutterwave_secret_key")
                .ok_or_else(|| AppError::Internal(msg::MISSING_WEBHOOK_SECRET.into()))?;
            let hash = state.secrets.get("flutterwave_webhook_hash").unwrap_or("");
            let client = FlutterwaveClient::new(&state.http, secret, hash);
            let verified = client.verify_transaction(&charge.reference).await?;

            if verified.tx_ref != charge.reference || verified.status != "successful" {
                tracing::warn!(
                    "Flutterwave re-verification mismatch: reference={}, fetched_status={}",
                    charge.reference,
                    verified.status
                );
                return Err(AppError::Authorization(msg::VERIFICATION_MISMATCH.into()));
            }
            Ok(())
        }
    }
}

/// Reconcile a verified charge-success event.
///
/// Decision tree:
/// 1. Recurring-plan identifier present -> subscription flow: upsert on
///    the provider subscription code (explicit, or synthesized from the
///    reference), status=active.
/// 2. Otherwise a trial interval -> paid-trial flow: code is
///    `trial_{reference}` so redeliveries collide, status=trialing,
///    cancel_at_period_end set.
/// 3. Otherwise a one-off charge: ledger entry only, no subscription row.
///
/// Replaying the same event N times converges on one subscription row (by
/// code) and at most one payment row (by reference).
pub fn process_charge_success(
    conn: &Connection,
    paid_trial_days: Option<i64>,
    provider: PaymentProvider,
    charge: &ChargeData,
) -> Result<()> {
    // Metadata gate: without user and plan the event cannot be attributed.
    // Nothing is written past this point on failure.
    let user_id = charge
        .metadata
        .user_id
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(msg::MISSING_CHECKOUT_METADATA.into()))?;
    let plan: PlanTier = charge
        .metadata
        .plan
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| AppError::Validation(msg::MISSING_CHECKOUT_METADATA.into()))?;
    let interval: Option<BillingInterval> = charge
        .metadata
        .billing_interval
        .as_deref()
        .and_then(|v| v.parse().ok());

    let user = queries::get_user_by_id(conn, user_id)?
        .ok_or_else(|| AppError::NotFound(msg::USER_NOT_FOUND.into()))?;

    let now = Utc::now();
    let is_recurring = charge.subscription_code.is_some() || charge.recurring_plan.is_some();

    let subscription = if is_recurring {
        let interval = interval
            .ok_or_else(|| AppError::Validation(msg::MISSING_CHECKOUT_METADATA.into()))?;
        let code = charge
            .subscription_code
            .clone()
            .unwrap_or_else(|| format!("sub_{}", charge.reference));
        let period_end = crate::payments::period::compute_period_end(interval, now, paid_trial_days);

        Some(queries::upsert_subscription(
            conn,
            &UpsertSubscription {
                user_id: user.id.clone(),
                plan,
                status: SubscriptionStatus::Active,
                provider: provider.as_str().to_string(),
                provider_subscription_code: code,
                provider_customer_code: charge.customer_code.clone(),
                provider_authorization_code: charge.authorization_code.clone(),
                current_period_start: now.timestamp(),
                current_period_end: period_end.timestamp(),
                cancel_at_period_end: false,
            },
        )?)
    } else if interval == Some(BillingInterval::Trial) {
        // Synthesized code keyed on the reference: repeated deliveries of
        // the same trial charge collide on the same row.
        let code = format!("trial_{}", charge.reference);
        let period_end = crate::payments::period::compute_period_end(
            BillingInterval::Trial,
            now,
            paid_trial_days,
        );

        Some(queries::upsert_subscription(
            conn,
            &UpsertSubscription {
                user_id: user.id.clone(),
                plan,
                status: SubscriptionStatus::Trialing,
                provider: provider.as_str().to_string(),
                provider_subscription_code: code,
                provider_customer_code: charge.customer_code.clone(),
                provider_authorization_code: charge.authorization_code.clone(),
                current_period_start: now.timestamp(),
                current_period_end: period_end.timestamp(),
                cancel_at_period_end: true,
            },
        )?)
    } else {
        // One-off, non-subscription charge: no recurring entitlement
        // implied, nothing to reconcile beyond the ledger.
        None
    };

    // Payment ledger is a soft dependency: subscription and entitlement
    // state must be correct even if payment history cannot be recorded.
    let ledger = RecordPayment {
        user_id: user.id.clone(),
        amount_cents: charge.amount_minor.unwrap_or(0),
        currency: charge.currency.clone().unwrap_or_else(|| "USD".to_string()),
        status: "success".to_string(),
        provider: provider.as_str().to_string(),
        provider_reference: charge.reference.clone(),
        provider_transaction_id: charge.provider_transaction_id.clone(),
        description: Some(format!("{} plan charge", plan.as_str())),
    };
    match queries::record_payment(conn, &ledger) {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(
                "Payment {} already recorded (duplicate delivery)",
                charge.reference
            );
        }
        Err(e) => {
            tracing::warn!(
                "Payment ledger write failed for {} (continuing): {}",
                charge.reference,
                e
            );
        }
    }

    // Entitlement update happens in the same logical step as the
    // subscription write - a lagging tier would deny a paying user access.
    // A stale retry that hit the canceled guard grants nothing.
    if let Some(sub) = &subscription {
        if sub.status != SubscriptionStatus::Canceled {
            if !queries::set_user_tier(conn, &sub.user_id, plan)? {
                tracing::warn!("Entitlement update skipped: user {} missing", sub.user_id);
            }
        } else {
            tracing::info!(
                "{} stale success for canceled subscription {} ignored",
                provider.as_str(),
                sub.provider_subscription_code
            );
            return Ok(());
        }
    }

    tracing::info!(
        "{} charge reconciled: reference={}, user={}, plan={}, subscription={:?}",
        provider.as_str(),
        charge.reference,
        user.id,
        plan.as_str(),
        subscription
            .as_ref()
            .map(|s| s.provider_subscription_code.as_str())
    );

    Ok(())
}

/// Transition a subscription to canceled and downgrade the entitlement.
/// The cancellation event owns only the status field.
pub fn process_subscription_disabled(
    conn: &Connection,
    provider: PaymentProvider,
    subscription_code: &str,
) -> Result<()> {
    let subscription = queries::cancel_subscription(conn, subscription_code)?
        .ok_or_else(|| AppError::NotFound(msg::SUBSCRIPTION_NOT_FOUND.into()))?;

    if !queries::set_user_tier(conn, &subscription.user_id, PlanTier::Free)? {
        tracing::warn!(
            "Entitlement downgrade skipped: user {} missing",
            subscription.user_id
        );
    }

    tracing::info!(
        "{} subscription canceled: code={}, user={}",
        provider.as_str(),
        subscription_code,
        subscription.user_id
    );

    Ok(())
}

/// Flag a subscription to lapse at period end. Status is untouched - the
/// user keeps access until the paid-for period runs out.
pub fn process_will_not_renew(
    conn: &Connection,
    provider: PaymentProvider,
    subscription_code: &str,
) -> Result<()> {
    if !queries::set_cancel_at_period_end(conn, subscription_code)? {
        return Err(AppError::NotFound(msg::SUBSCRIPTION_NOT_FOUND.into()));
    }

    tracing::info!(
        "{} subscription will not renew: code={}",
        provider.as_str(),
        subscription_code
    );

    Ok(())
}

/// Transition a matched subscription to past_due after a failed charge.
///
/// A failed charge with no subscription code (one-off or trial payment)
/// has no canonical row to match and is acknowledged as a no-op.
pub fn process_charge_failed(
    conn: &Connection,
    provider: PaymentProvider,
    subscription_code: Option<&str>,
) -> Result<()> {
    let Some(code) = subscription_code.filter(|c| !c.is_empty()) else {
        tracing::debug!(
            "{} charge failed without subscription code; nothing to transition",
            provider.as_str()
        );
        return Ok(());
    };

    if !queries::mark_subscription_past_due(conn, code)? {
        return Err(AppError::NotFound(msg::SUBSCRIPTION_NOT_FOUND.into()));
    }

    tracing::info!(
        "{} subscription past due: code={}",
        provider.as_str(),
        code
    );

    Ok(())
}
