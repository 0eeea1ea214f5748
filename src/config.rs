use std::env;
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable not set: {0}")]
    Missing(String),
    #[error("Invalid value for {0}: {1}")]
    Invalid(String, String),
}

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_CURRENCY: &str = "usd";
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Runtime settings collected from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub stripe: StripeConfig,
}

/// Payment processor settings. Both secrets are optional so the service can
/// boot without payments; the adapter refuses to work until they are set.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub currency: String,
    pub webhook_tolerance_secs: i64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::Missing("DATABASE_URL".to_string()))?;

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(value) => value
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::Invalid("BIND_ADDR".to_string(), e.to_string()))?,
            Err(_) => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        Ok(Self {
            database_url,
            bind_addr,
            stripe: StripeConfig::from_env(),
        })
    }
}

impl StripeConfig {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());

        let secret_key = non_empty("STRIPE_SECRET_KEY");
        if secret_key.is_none() {
            tracing::warn!("STRIPE_SECRET_KEY is not set, payment functionality is disabled");
        }

        Self {
            secret_key,
            webhook_secret: non_empty("STRIPE_WEBHOOK_SECRET"),
            api_base: non_empty("STRIPE_API_BASE")
                .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
            currency: non_empty("PAYMENT_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }
}
