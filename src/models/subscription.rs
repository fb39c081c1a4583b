use serde::{Deserialize, Serialize};

use super::PlanTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            _ => Err(()),
        }
    }
}

/// One row per provider subscription code, no matter how many webhook
/// deliveries created or touched it. Rows are never deleted; cancellation
/// is a status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan: PlanTier,
    pub status: SubscriptionStatus,
    pub provider: String,
    pub provider_subscription_code: String,
    pub provider_customer_code: Option<String>,
    pub provider_authorization_code: Option<String>,
    /// Unix timestamps; `current_period_end > current_period_start` always.
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for the conditional subscription upsert.
///
/// The field set is exactly what a verified charge-success event owns;
/// status transitions driven by other event types go through their own
/// narrower queries.
#[derive(Debug, Clone)]
pub struct UpsertSubscription {
    pub user_id: String,
    pub plan: PlanTier,
    pub status: SubscriptionStatus,
    pub provider: String,
    pub provider_subscription_code: String,
    pub provider_customer_code: Option<String>,
    pub provider_authorization_code: Option<String>,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
}
