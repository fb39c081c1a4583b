use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::error::{msg, AppError, Result};
use crate::models::{BillingInterval, PaymentMethod, PlanTier};
use crate::payments::plan_amount_minor;

type HmacSha512 = Hmac<Sha512>;

/// Bound on the authoritative transaction lookup. A hung provider call must
/// fail the webhook (so the provider retries) rather than hold the request.
const VERIFY_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Serialize)]
struct InitializeTransactionRequest<'a> {
    email: &'a str,
    /// Amount in the currency's minor unit (kobo for NGN).
    amount: i64,
    currency: &'a str,
    reference: &'a str,
    callback_url: &'a str,
    metadata: CheckoutMetadataPayload<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<&'a [&'a str]>,
}

#[derive(Debug, Serialize)]
struct CheckoutMetadataPayload<'a> {
    user_id: &'a str,
    plan: &'a str,
    billing_interval: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitializeTransactionResponse {
    status: bool,
    data: Option<InitializeTransactionData>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitializeTransactionData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyTransactionResponse {
    status: bool,
    data: Option<VerifiedTransaction>,
    message: Option<String>,
}

/// Authoritative transaction state fetched back from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedTransaction {
    pub reference: String,
    pub status: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
}

/// Mobile-money-heavy aggregator. Webhook signatures are a raw HMAC-SHA512
/// of the body under a shared, rotatable secret - which is why verified
/// payloads are still re-checked against the transaction lookup API before
/// any write.
#[derive(Debug, Clone)]
pub struct PaystackClient {
    client: Client,
    secret_key: String,
}

impl PaystackClient {
    pub fn new(client: &Client, secret_key: &str) -> Self {
        Self {
            client: client.clone(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Initialize a hosted checkout. The metadata block rides the
    /// transaction and comes back on the charge.success webhook; its
    /// presence there is what makes reconciliation possible.
    #[allow(clippy::too_many_arguments)]
    pub async fn initialize_transaction(
        &self,
        reference: &str,
        user_id: &str,
        plan: PlanTier,
        interval: BillingInterval,
        currency: &str,
        email: &str,
        callback_url: &str,
        payment_method: Option<PaymentMethod>,
    ) -> Result<(String, String)> {
        let channels: Option<&[&str]> = match payment_method {
            Some(PaymentMethod::MobileMoney) => Some(&["mobile_money"]),
            Some(PaymentMethod::Card) => Some(&["card"]),
            None => None,
        };

        let request = InitializeTransactionRequest {
            email,
            amount: plan_amount_minor(plan, interval, currency),
            currency,
            reference,
            callback_url,
            metadata: CheckoutMetadataPayload {
                user_id,
                plan: plan.as_str(),
                billing_interval: interval.as_str(),
            },
            channels,
        };

        let response = self
            .client
            .post("https://api.paystack.co/transaction/initialize")
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Paystack API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Paystack API error: {}",
                error_text
            )));
        }

        let body: InitializeTransactionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Paystack response: {}", e)))?;

        let data = match (body.status, body.data) {
            (true, Some(data)) => data,
            _ => {
                return Err(AppError::Internal(format!(
                    "Paystack initialize failed: {}",
                    body.message.unwrap_or_default()
                )))
            }
        };

        Ok((data.reference, data.authorization_url))
    }

    /// Paystack signs the raw body with HMAC-SHA512 under the API secret
    /// key and sends the hex digest in `x-paystack-signature`.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let mut mac = HmacSha512::new_from_slice(self.secret_key.as_bytes())
            .map_err(|_| AppError::Internal(msg::MISSING_WEBHOOK_SECRET.into()))?;
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());

        // Constant-time comparison. The length check is not constant-time,
        // but signature length is not secret (always 128 hex chars).
        let expected_bytes = expected.as_bytes();
        let provided_bytes = signature.as_bytes();

        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }

    /// Re-fetch a transaction from the authoritative lookup API.
    ///
    /// Defense-in-depth on top of the signature check: the caller must
    /// compare the returned reference and status against the webhook
    /// payload and abort on any mismatch. Timeouts and transport errors
    /// propagate so the delivery fails and the provider retries.
    pub async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction> {
        let url = format!("https://api.paystack.co/transaction/verify/{}", reference);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .timeout(Duration::from_secs(VERIFY_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Paystack verify error: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "Paystack verify returned {}",
                response.status()
            )));
        }

        let body: VerifyTransactionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Paystack verify: {}", e)))?;

        match (body.status, body.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(AppError::Authorization(format!(
                "{}: {}",
                msg::VERIFICATION_MISMATCH,
                body.message.unwrap_or_default()
            ))),
        }
    }
}

// ============ Webhook payload schemas ============

/// Generic Paystack webhook event - data is parsed based on event name.
#[derive(Debug, Deserialize)]
pub struct PaystackWebhookEvent {
    pub event: String,
    pub data: serde_json::Value,
}

// ============ charge.success ============

#[derive(Debug, Deserialize)]
pub struct PaystackCharge {
    pub reference: String,
    pub status: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub id: Option<i64>,
    pub customer: Option<PaystackCustomer>,
    pub authorization: Option<PaystackAuthorization>,
    /// Present when the charge belongs to a recurring plan.
    pub plan: Option<PaystackPlan>,
    pub metadata: Option<PaystackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct PaystackCustomer {
    pub customer_code: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaystackAuthorization {
    pub authorization_code: Option<String>,
}

/// Recurring-plan identifier. An empty object (no plan_code) means the
/// charge was a one-off; Paystack sends `"plan": {}` in that case rather
/// than omitting the key.
#[derive(Debug, Deserialize)]
pub struct PaystackPlan {
    pub plan_code: Option<String>,
    pub interval: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaystackMetadata {
    pub user_id: Option<String>,
    pub plan: Option<String>,
    pub billing_interval: Option<String>,
}

// ============ subscription.* ============

#[derive(Debug, Deserialize)]
pub struct PaystackSubscriptionEvent {
    pub subscription_code: Option<String>,
    pub status: Option<String>,
}

// ============ invoice.payment_failed ============

#[derive(Debug, Deserialize)]
pub struct PaystackInvoiceEvent {
    pub subscription: Option<PaystackInvoiceSubscription>,
}

#[derive(Debug, Deserialize)]
pub struct PaystackInvoiceSubscription {
    pub subscription_code: Option<String>,
}
