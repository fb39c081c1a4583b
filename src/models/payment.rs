use serde::{Deserialize, Serialize};

/// Append-only payment ledger entry, one per verified charge event.
/// Keyed by `provider_reference`; never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    /// Amount in minor units (cents, kobo, pesewas).
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub provider: String,
    pub provider_reference: String,
    pub provider_transaction_id: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub user_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub provider: String,
    pub provider_reference: String,
    pub provider_transaction_id: Option<String>,
    pub description: Option<String>,
}
