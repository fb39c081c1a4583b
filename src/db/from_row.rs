//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupted data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str =
    "id, email, name, subscription_tier, auth_token, country, created_at, updated_at";

pub const SUBSCRIPTION_COLS: &str = "id, user_id, plan, status, provider, provider_subscription_code, provider_customer_code, provider_authorization_code, current_period_start, current_period_end, cancel_at_period_end, created_at, updated_at";

pub const PAYMENT_COLS: &str = "id, user_id, amount_cents, currency, status, provider, provider_reference, provider_transaction_id, description, created_at";

// ============ FromRow Implementations ============

impl FromRow for UserAccount {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(UserAccount {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            subscription_tier: parse_enum(row, 3, "subscription_tier")?,
            auth_token: row.get(4)?,
            country: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for Subscription {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subscription {
            id: row.get(0)?,
            user_id: row.get(1)?,
            plan: parse_enum(row, 2, "plan")?,
            status: parse_enum(row, 3, "status")?,
            provider: row.get(4)?,
            provider_subscription_code: row.get(5)?,
            provider_customer_code: row.get(6)?,
            provider_authorization_code: row.get(7)?,
            current_period_start: row.get(8)?,
            current_period_end: row.get(9)?,
            cancel_at_period_end: row.get::<_, i32>(10)? != 0,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            amount_cents: row.get(2)?,
            currency: row.get(3)?,
            status: row.get(4)?,
            provider: row.get(5)?,
            provider_reference: row.get(6)?,
            provider_transaction_id: row.get(7)?,
            description: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}
