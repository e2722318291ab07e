use std::env;
use std::time::Duration;

use crate::models::JoinFee;

/// Used when `JWT_SECRET` is unset. Only acceptable for local development.
pub const DEV_JWT_SECRET: &str = "rideshare-dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub db_pool_size: u32,
    pub db_busy_timeout: Duration,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    /// Overrides the Stripe API host (stripe-mock, an egress proxy).
    pub stripe_api_base: Option<String>,
    pub jwt_secret: String,
    pub join_fee: JoinFee,
    pub dev_mode: bool,
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read the fee from `JOIN_FEE_CENTS` / `JOIN_FEE_CURRENCY`, falling back to
/// the default for unset variables. A set but unusable value is an error.
fn join_fee_from(cents: Option<String>, currency: Option<String>) -> Result<JoinFee, String> {
    let default_fee = JoinFee::default();
    let amount_cents = match cents {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("JOIN_FEE_CENTS is not an integer: {:?}", raw))?,
        None => default_fee.amount_cents,
    };
    let currency = currency.unwrap_or(default_fee.currency);

    JoinFee::new(amount_cents, &currency).map_err(|e| e.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("RIDESHARE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using the development placeholder");
            DEV_JWT_SECRET.to_string()
        });

        let join_fee = join_fee_from(
            env::var("JOIN_FEE_CENTS").ok(),
            env::var("JOIN_FEE_CURRENCY").ok(),
        )
        .unwrap_or_else(|e| panic!("Invalid join fee configuration: {}", e));

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_or("PORT", 8080),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "rideshare.db".to_string()),
            db_pool_size: parse_or("DB_POOL_SIZE", 10),
            db_busy_timeout: Duration::from_millis(parse_or("DB_BUSY_TIMEOUT_MS", 5000)),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            stripe_api_base: env::var("STRIPE_API_BASE").ok().filter(|v| !v.trim().is_empty()),
            jwt_secret,
            join_fee,
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
