mod from_row;
mod schema;
pub mod queries;

pub use from_row::FromRow;
pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::{RateLimitConfig, Secrets};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool and configuration.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Base URL for provider callbacks (e.g., https://billing.snapmenu.app)
    pub base_url: String,
    /// Provider credentials (the credential resolver).
    pub secrets: Secrets,
    /// Shared HTTP client for provider API calls.
    pub http: reqwest::Client,
    /// Paid trial length override; period math clamps and defaults.
    pub paid_trial_days: Option<i64>,
    pub rate_limit: RateLimitConfig,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
