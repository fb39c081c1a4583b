use serde::{Deserialize, Serialize};

use super::PlanTier;

/// User account with the denormalized entitlement tier.
///
/// `subscription_tier` is owned by the reconciliation flow and read by the
/// platform's feature gate; everything else belongs to the (external)
/// account system and is carried here only as far as billing needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub email: String,
    pub name: String,
    pub subscription_tier: PlanTier,
    /// Opaque bearer token backing the authenticated checkout path.
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub country: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
}
