//! Currency/country detection and payment provider recommendation.
//!
//! Checkout requests may name their currency and country explicitly; when
//! they don't, the edge proxy's geo headers decide. The recommendation is a
//! routing default only - an explicit `provider` on the request wins.

use axum::http::HeaderMap;

use crate::payments::PaymentProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub country: Option<String>,
    pub currency: String,
}

/// Resolve country and currency for a checkout request.
///
/// Explicit overrides win; otherwise the `cf-ipcountry` / `x-country-code`
/// headers set by the edge are consulted. Falls back to USD.
pub fn detect(
    headers: &HeaderMap,
    explicit_country: Option<&str>,
    explicit_currency: Option<&str>,
) -> Locale {
    let country = explicit_country
        .map(str::to_uppercase)
        .or_else(|| header_country(headers));

    let currency = explicit_currency
        .map(str::to_uppercase)
        .or_else(|| country.as_deref().map(currency_for_country))
        .unwrap_or_else(|| "USD".to_string());

    Locale { country, currency }
}

fn header_country(headers: &HeaderMap) -> Option<String> {
    headers
        .get("cf-ipcountry")
        .or_else(|| headers.get("x-country-code"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_uppercase)
        .filter(|c| c.len() == 2 && c != "XX")
}

fn currency_for_country(country: &str) -> String {
    let currency = match country {
        "NG" => "NGN",
        "GH" => "GHS",
        "KE" => "KES",
        "ZA" => "ZAR",
        "UG" => "UGX",
        "TZ" => "TZS",
        "RW" => "RWF",
        "CM" | "TD" | "CF" | "GA" | "CG" | "GQ" => "XAF",
        "SN" | "CI" | "BJ" | "BF" | "ML" | "NE" | "TG" => "XOF",
        "GB" => "GBP",
        "DE" | "FR" | "ES" | "IT" | "NL" | "PT" | "IE" | "AT" | "BE" | "FI" => "EUR",
        _ => "USD",
    };
    currency.to_string()
}

/// Pick a payment provider for a currency.
///
/// Mobile-money-heavy West African markets route to Paystack, the East and
/// Central African corridors to Flutterwave, everything else to the
/// card-first global processor.
pub fn recommend_provider(currency: &str) -> PaymentProvider {
    match currency.to_uppercase().as_str() {
        "NGN" | "GHS" | "ZAR" => PaymentProvider::Paystack,
        "KES" | "UGX" | "TZS" | "RWF" | "XAF" | "XOF" => PaymentProvider::Flutterwave,
        _ => PaymentProvider::Stripe,
    }
}
