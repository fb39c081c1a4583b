use axum::{extract::State, http::HeaderMap};
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{PlanTier, Subscription};

use super::bearer_token;

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub subscription_tier: PlanTier,
    /// Most recent subscription still granting entitlement, if any.
    pub subscription: Option<Subscription>,
}

/// Read the caller's current entitlement and subscription.
///
/// Debug/read path only - the platform's feature gate reads the
/// denormalized tier directly; this endpoint exposes the same state to the
/// account UI without any reconciliation semantics.
pub async fn get_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SubscriptionResponse>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Authorization("Missing session".into()))?;

    let conn = state.db.get()?;
    let user = queries::get_user_by_auth_token(&conn, token)?
        .ok_or_else(|| AppError::Authorization("Invalid session".into()))?;

    let subscription = queries::get_current_subscription_for_user(&conn, &user.id)?;

    Ok(Json(SubscriptionResponse {
        subscription_tier: user.subscription_tier,
        subscription,
    }))
}
