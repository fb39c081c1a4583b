use rusqlite::{params, Connection};
use uuid::Uuid;

use super::from_row::{query_all, query_one, PAYMENT_COLS, SUBSCRIPTION_COLS, USER_COLS};
use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Generate an opaque bearer token for the authenticated checkout path.
pub fn generate_auth_token() -> String {
    format!("smtk_{}{}", Uuid::new_v4().as_simple(), Uuid::new_v4().as_simple())
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<(UserAccount, String)> {
    let id = EntityType::User.gen_id();
    let token = generate_auth_token();
    let ts = now();

    conn.execute(
        "INSERT INTO users (id, email, name, subscription_tier, auth_token, country, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'free', ?4, ?5, ?6, ?6)",
        params![id, input.email, input.name, token, input.country, ts],
    )?;

    Ok((
        UserAccount {
            id,
            email: input.email.clone(),
            name: input.name.clone(),
            subscription_tier: PlanTier::Free,
            auth_token: Some(token.clone()),
            country: input.country.clone(),
            created_at: ts,
            updated_at: ts,
        },
        token,
    ))
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserAccount>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserAccount>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

pub fn get_user_by_auth_token(conn: &Connection, token: &str) -> Result<Option<UserAccount>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE auth_token = ?1", USER_COLS),
        &[&token],
    )
}

/// Denormalize the resolved plan onto the user record (the entitlement
/// read by the platform's feature gate). Returns false if the user row
/// does not exist.
pub fn set_user_tier(conn: &Connection, user_id: &str, tier: PlanTier) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET subscription_tier = ?1, updated_at = ?2 WHERE id = ?3",
        params![tier.as_str(), now(), user_id],
    )?;
    Ok(affected > 0)
}

// ============ Subscriptions ============

/// Idempotent upsert keyed on the provider subscription code.
///
/// A single conditional write, never read-then-branch-then-write: two
/// concurrent deliveries of the same event converge on one row via the
/// unique constraint. The `WHERE status <> 'canceled'` arm keeps a stale
/// success retry from resurrecting a subscription that a disable event
/// already canceled.
///
/// Returns the row as it stands after the write (which for a canceled
/// subscription is the untouched canceled row).
pub fn upsert_subscription(conn: &Connection, input: &UpsertSubscription) -> Result<Subscription> {
    let id = EntityType::Subscription.gen_id();
    let ts = now();

    conn.execute(
        "INSERT INTO subscriptions (
            id, user_id, plan, status, provider, provider_subscription_code,
            provider_customer_code, provider_authorization_code,
            current_period_start, current_period_end, cancel_at_period_end,
            created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
         ON CONFLICT(provider_subscription_code) DO UPDATE SET
            user_id = excluded.user_id,
            plan = excluded.plan,
            status = excluded.status,
            provider = excluded.provider,
            provider_customer_code = excluded.provider_customer_code,
            provider_authorization_code = excluded.provider_authorization_code,
            current_period_start = excluded.current_period_start,
            current_period_end = excluded.current_period_end,
            cancel_at_period_end = excluded.cancel_at_period_end,
            updated_at = excluded.updated_at
         WHERE subscriptions.status <> 'canceled'",
        params![
            id,
            input.user_id,
            input.plan.as_str(),
            input.status.as_str(),
            input.provider,
            input.provider_subscription_code,
            input.provider_customer_code,
            input.provider_authorization_code,
            input.current_period_start,
            input.current_period_end,
            input.cancel_at_period_end as i32,
            ts,
        ],
    )?;

    get_subscription_by_code(conn, &input.provider_subscription_code)?
        .ok_or_else(|| crate::error::AppError::Internal("Upserted subscription vanished".into()))
}

pub fn get_subscription_by_code(conn: &Connection, code: &str) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE provider_subscription_code = ?1",
            SUBSCRIPTION_COLS
        ),
        &[&code],
    )
}

/// Most recent subscription that still grants entitlement for a user.
pub fn get_current_subscription_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM subscriptions
             WHERE user_id = ?1 AND status IN ('active', 'trialing')
             ORDER BY updated_at DESC LIMIT 1",
            SUBSCRIPTION_COLS
        ),
        &[&user_id],
    )
}

/// Transition a subscription to canceled. Only the status field (plus
/// updated_at) is touched; the cancellation event does not own period or
/// plan fields. Returns the canceled row, or None if the code is unknown.
pub fn cancel_subscription(conn: &Connection, code: &str) -> Result<Option<Subscription>> {
    let affected = conn.execute(
        "UPDATE subscriptions SET status = 'canceled', updated_at = ?1
         WHERE provider_subscription_code = ?2",
        params![now(), code],
    )?;
    if affected == 0 {
        return Ok(None);
    }
    get_subscription_by_code(conn, code)
}

/// Flag a subscription to lapse at period end without changing status.
/// Returns false if the code is unknown.
pub fn set_cancel_at_period_end(conn: &Connection, code: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE subscriptions SET cancel_at_period_end = 1, updated_at = ?1
         WHERE provider_subscription_code = ?2",
        params![now(), code],
    )?;
    Ok(affected > 0)
}

/// Transition a subscription to past_due after a failed charge.
/// Returns false if the code is unknown.
pub fn mark_subscription_past_due(conn: &Connection, code: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE subscriptions SET status = 'past_due', updated_at = ?1
         WHERE provider_subscription_code = ?2",
        params![now(), code],
    )?;
    Ok(affected > 0)
}

// ============ Payments ============

/// Idempotent append to the payment ledger.
///
/// INSERT OR IGNORE keyed on provider_reference: a redelivered event hits
/// the unique constraint and is silently dropped. Returns true if a new
/// row was written.
pub fn record_payment(conn: &Connection, input: &RecordPayment) -> Result<bool> {
    let id = EntityType::Payment.gen_id();
    let affected = conn.execute(
        "INSERT OR IGNORE INTO payments (
            id, user_id, amount_cents, currency, status, provider,
            provider_reference, provider_transaction_id, description, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            input.user_id,
            input.amount_cents,
            input.currency,
            input.status,
            input.provider,
            input.provider_reference,
            input.provider_transaction_id,
            input.description,
            now(),
        ],
    )?;
    Ok(affected > 0)
}

pub fn get_payment_by_reference(conn: &Connection, reference: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE provider_reference = ?1",
            PAYMENT_COLS
        ),
        &[&reference],
    )
}

/// Payment history for a user, newest first.
pub fn list_payments_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Payment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE user_id = ?1 ORDER BY created_at DESC",
            PAYMENT_COLS
        ),
        &[&user_id],
    )
}

pub fn count_payments_for_user(conn: &Connection, user_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payments WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_subscriptions_by_code(conn: &Connection, code: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM subscriptions WHERE provider_subscription_code = ?1",
        params![code],
        |row| row.get(0),
    )?;
    Ok(count)
}
