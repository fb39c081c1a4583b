use rusqlite::Connection;

/// Initialize the billing database schema.
///
/// Idempotency under concurrent, duplicated webhook delivery hangs entirely
/// off the two unique indexes here: subscriptions are keyed by
/// provider_subscription_code, payments by provider_reference. There is no
/// in-process locking anywhere in the service.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (identity lives in the platform; billing carries what the
        -- entitlement gate and checkout need)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            subscription_tier TEXT NOT NULL DEFAULT 'free'
                CHECK (subscription_tier IN ('free', 'pro', 'business')),
            auth_token TEXT UNIQUE,
            country TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        -- Subscriptions: exactly one row per provider subscription code.
        -- Never deleted; cancellation is a status transition.
        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            plan TEXT NOT NULL CHECK (plan IN ('free', 'pro', 'business')),
            status TEXT NOT NULL
                CHECK (status IN ('trialing', 'active', 'past_due', 'canceled')),
            provider TEXT NOT NULL,
            provider_subscription_code TEXT NOT NULL UNIQUE,
            provider_customer_code TEXT,
            provider_authorization_code TEXT,
            current_period_start INTEGER NOT NULL,
            current_period_end INTEGER NOT NULL,
            cancel_at_period_end INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            CHECK (current_period_end > current_period_start)
        );
        CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id);
        CREATE INDEX IF NOT EXISTS idx_subscriptions_status ON subscriptions(user_id, status);

        -- Payments: append-only ledger, one row per verified charge.
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL,
            provider TEXT NOT NULL,
            provider_reference TEXT NOT NULL UNIQUE,
            provider_transaction_id TEXT,
            description TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id, created_at DESC);
        "#,
    )?;
    Ok(())
}
