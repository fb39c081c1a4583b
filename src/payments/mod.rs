mod flutterwave;
mod paystack;
pub mod period;
mod stripe;

pub use flutterwave::*;
pub use paystack::*;
pub use stripe::*;

use crate::models::{BillingInterval, PaymentMethod, PlanTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProvider {
    Stripe,
    Paystack,
    Flutterwave,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Paystack => "paystack",
            PaymentProvider::Flutterwave => "flutterwave",
        }
    }

    /// Stripe is card-only for us; the African aggregators take both.
    pub fn supports(&self, method: PaymentMethod) -> bool {
        match self {
            PaymentProvider::Stripe => method == PaymentMethod::Card,
            PaymentProvider::Paystack | PaymentProvider::Flutterwave => true,
        }
    }
}

impl std::str::FromStr for PaymentProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stripe" => Ok(PaymentProvider::Stripe),
            "paystack" => Ok(PaymentProvider::Paystack),
            "flutterwave" | "flw" => Ok(PaymentProvider::Flutterwave),
            _ => Err(()),
        }
    }
}

/// Checkout price in the currency's minor unit (cents, kobo, pesewas).
///
/// Base prices are USD; other supported currencies use fixed conversion
/// tables so provider-hosted pages show round local amounts. Unsupported
/// currencies fall back to USD pricing.
pub fn plan_amount_minor(plan: PlanTier, interval: BillingInterval, currency: &str) -> i64 {
    // (plan, interval) -> USD cents. Trials charge a nominal card-check fee.
    let usd_cents: i64 = match (plan, interval) {
        (PlanTier::Pro, BillingInterval::Monthly) => 999,
        (PlanTier::Pro, BillingInterval::Yearly) => 9900,
        (PlanTier::Business, BillingInterval::Monthly) => 2900,
        (PlanTier::Business, BillingInterval::Yearly) => 29000,
        (_, BillingInterval::Trial) => 100,
        (PlanTier::Free, _) => 0,
    };

    // Rounded market-rate multipliers, reviewed quarterly.
    match currency.to_uppercase().as_str() {
        "NGN" => usd_cents * 1500,
        "GHS" => usd_cents * 15,
        "KES" => usd_cents * 130,
        "ZAR" => usd_cents * 18,
        "EUR" => usd_cents * 92 / 100,
        _ => usd_cents,
    }
}
