use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{msg, AppError, Result};
use crate::models::{BillingInterval, PaymentMethod, PlanTier};
use crate::payments::plan_amount_minor;

const VERIFY_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Serialize)]
struct CreatePaymentRequest<'a> {
    tx_ref: &'a str,
    amount: String,
    currency: &'a str,
    redirect_url: &'a str,
    customer: PaymentCustomer<'a>,
    meta: PaymentMeta<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_options: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct PaymentCustomer<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct PaymentMeta<'a> {
    user_id: &'a str,
    plan: &'a str,
    billing_interval: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentResponse {
    status: String,
    data: Option<CreatePaymentData>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentData {
    link: String,
}

#[derive(Debug, Deserialize)]
struct VerifyByReferenceResponse {
    status: String,
    data: Option<FlutterwaveVerifiedTransaction>,
    message: Option<String>,
}

/// Authoritative transaction state from the verify-by-reference API.
#[derive(Debug, Clone, Deserialize)]
pub struct FlutterwaveVerifiedTransaction {
    pub tx_ref: String,
    pub status: String,
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

/// Secondary African aggregator. Webhook auth is a shared secret hash in
/// the `verif-hash` header - the weakest of the three schemes, so verified
/// payloads are always re-checked against the transactions API.
#[derive(Debug, Clone)]
pub struct FlutterwaveClient {
    client: Client,
    secret_key: String,
    webhook_hash: String,
}

impl FlutterwaveClient {
    pub fn new(client: &Client, secret_key: &str, webhook_hash: &str) -> Self {
        Self {
            client: client.clone(),
            secret_key: secret_key.to_string(),
            webhook_hash: webhook_hash.to_string(),
        }
    }

    /// Create a hosted payment link carrying the reconciliation metadata.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_payment_link(
        &self,
        reference: &str,
        user_id: &str,
        plan: PlanTier,
        interval: BillingInterval,
        currency: &str,
        email: &str,
        redirect_url: &str,
        payment_method: Option<PaymentMethod>,
    ) -> Result<(String, String)> {
        // Minor units -> major units string, which is what this API takes.
        let amount_minor = plan_amount_minor(plan, interval, currency);
        let amount = format!("{}.{:02}", amount_minor / 100, amount_minor % 100);

        let payment_options = match payment_method {
            Some(PaymentMethod::MobileMoney) => Some("mobilemoney"),
            Some(PaymentMethod::Card) => Some("card"),
            None => None,
        };

        let request = CreatePaymentRequest {
            tx_ref: reference,
            amount,
            currency,
            redirect_url,
            customer: PaymentCustomer { email },
            meta: PaymentMeta {
                user_id,
                plan: plan.as_str(),
                billing_interval: interval.as_str(),
            },
            payment_options,
        };

        let response = self
            .client
            .post("https://api.flutterwave.com/v3/payments")
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Flutterwave API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Flutterwave API error: {}",
                error_text
            )));
        }

        let body: CreatePaymentResponse = response.json().await.map_err(|e| {
            AppError::Internal(format!("Failed to parse Flutterwave response: {}", e))
        })?;

        let data = match (body.status.as_str(), body.data) {
            ("success", Some(data)) => data,
            _ => {
                return Err(AppError::Internal(format!(
                    "Flutterwave payment creation failed: {}",
                    body.message.unwrap_or_default()
                )))
            }
        };

        Ok((reference.to_string(), data.link))
    }

    /// Flutterwave sends the configured secret hash verbatim in the
    /// `verif-hash` header rather than signing the body. Compare in
    /// constant time; the real trust anchor is the re-verification call.
    pub fn verify_webhook_signature(&self, signature: &str) -> Result<bool> {
        if self.webhook_hash.is_empty() {
            return Err(AppError::Internal(msg::MISSING_WEBHOOK_SECRET.into()));
        }

        let expected_bytes = self.webhook_hash.as_bytes();
        let provided_bytes = signature.as_bytes();

        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }

    /// Re-fetch a transaction by reference from the authoritative API.
    /// Same contract as the Paystack re-verifier: mismatch aborts the
    /// delivery before any write, timeout fails the delivery.
    pub async fn verify_transaction(&self, tx_ref: &str) -> Result<FlutterwaveVerifiedTransaction> {
        let response = self
            .client
            .get("https://api.flutterwave.com/v3/transactions/verify_by_reference")
            .query(&[("tx_ref", tx_ref)])
            .bearer_auth(&self.secret_key)
            .timeout(Duration::from_secs(VERIFY_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Flutterwave verify error: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "Flutterwave verify returned {}",
                response.status()
            )));
        }

        let body: VerifyByReferenceResponse = response.json().await.map_err(|e| {
            AppError::Internal(format!("Failed to parse Flutterwave verify: {}", e))
        })?;

        match (body.status.as_str(), body.data) {
            ("success", Some(data)) => Ok(data),
            _ => Err(AppError::Authorization(format!(
                "{}: {}",
                msg::VERIFICATION_MISMATCH,
                body.message.unwrap_or_default()
            ))),
        }
    }
}

// ============ Webhook payload schemas ============

/// Generic Flutterwave webhook event.
#[derive(Debug, Deserialize)]
pub struct FlutterwaveWebhookEvent {
    #[serde(rename = "event")]
    pub event: String,
    pub data: serde_json::Value,
}

// ============ charge.completed ============

#[derive(Debug, Deserialize)]
pub struct FlutterwaveCharge {
    pub id: Option<i64>,
    pub tx_ref: String,
    /// "successful" or "failed"
    pub status: String,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub customer: Option<FlutterwaveCustomer>,
    /// Recurring-plan identifier (payment plan id) when present.
    pub payment_plan: Option<i64>,
    pub meta: Option<FlutterwaveMeta>,
}

#[derive(Debug, Deserialize)]
pub struct FlutterwaveCustomer {
    pub id: Option<i64>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FlutterwaveMeta {
    pub user_id: Option<String>,
    pub plan: Option<String>,
    pub billing_interval: Option<String>,
}

// ============ subscription.cancelled ============

#[derive(Debug, Deserialize)]
pub struct FlutterwaveSubscriptionEvent {
    pub id: Option<i64>,
    /// Provider-side subscription/plan reference used as our match key.
    pub subscription_code: Option<String>,
    pub status: Option<String>,
}
