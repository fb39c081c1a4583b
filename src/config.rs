use std::env;

/// Provider credentials resolved at startup.
///
/// Webhook handlers look secrets up by name at request time; a missing
/// secret for a provider that receives traffic is a deployment error and
/// surfaces as a 500 so the provider retries after the fix.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub paystack_secret_key: Option<String>,
    pub flutterwave_secret_key: Option<String>,
    pub flutterwave_webhook_hash: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").ok(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").ok(),
            paystack_secret_key: env::var("PAYSTACK_SECRET_KEY").ok(),
            flutterwave_secret_key: env::var("FLUTTERWAVE_SECRET_KEY").ok(),
            flutterwave_webhook_hash: env::var("FLUTTERWAVE_WEBHOOK_HASH").ok(),
        }
    }

    /// Look up a credential by name. Returns None when unset or empty.
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "stripe_secret_key" => self.stripe_secret_key.as_deref(),
            "stripe_webhook_secret" => self.stripe_webhook_secret.as_deref(),
            "paystack_secret_key" => self.paystack_secret_key.as_deref(),
            "flutterwave_secret_key" => self.flutterwave_secret_key.as_deref(),
            "flutterwave_webhook_hash" => self.flutterwave_webhook_hash.as_deref(),
            _ => None,
        };
        value.filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    /// Length of a paid trial in days. Unset or unparseable falls back to 7;
    /// the period calculator clamps to 1..=31 regardless.
    pub paid_trial_days: Option<i64>,
    pub secrets: Secrets,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub strict_rpm: u32,
    pub standard_rpm: u32,
    pub relaxed_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strict_rpm: 10,
            standard_rpm: 60,
            relaxed_rpm: 120,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("SNAPMENU_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let rate_limit = RateLimitConfig {
            strict_rpm: env_rpm("RATE_LIMIT_STRICT_RPM", 10),
            standard_rpm: env_rpm("RATE_LIMIT_STANDARD_RPM", 60),
            relaxed_rpm: env_rpm("RATE_LIMIT_RELAXED_RPM", 120),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "snapmenu_billing.db".to_string()),
            base_url,
            dev_mode,
            paid_trial_days: env::var("PAID_TRIAL_DAYS").ok().and_then(|v| v.parse().ok()),
            secrets: Secrets::from_env(),
            rate_limit,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_rpm(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&v| v > 0)
        .unwrap_or(default)
}
