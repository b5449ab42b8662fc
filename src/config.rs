use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use tracing_subscriber::EnvFilter;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Payment gateway connection settings.
///
/// `secret_key` authenticates outbound API calls and is also the shared
/// secret for webhook HMAC verification.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct GatewayConfig {
    pub base_url: String,

    #[validate(length(min = 8))]
    pub secret_key: String,

    /// Where the gateway sends the browser back after payment.
    pub callback_url: String,

    /// Bound on gateway API calls (initialize and verify).
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
}

/// SMTP delivery settings for order-confirmation email.
/// Absent config disables outbound mail entirely.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[validate(email)]
    pub from_address: String,
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// ISO currency code orders are priced in
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Flat delivery surcharge added to every order total
    #[serde(default = "default_delivery_fee")]
    pub delivery_fee: Decimal,

    /// Bearer token granting the admin identity
    #[validate(length(min = 32))]
    pub admin_token: String,

    /// Browser redirect targets for the payment callback flow
    pub checkout_success_url: String,
    pub checkout_failure_url: String,
    pub checkout_error_url: String,

    /// Pending orders older than this are swept to `expired`
    #[serde(default = "default_order_expiry_hours")]
    pub order_expiry_hours: i64,

    /// Sweep interval in seconds; 0 disables the sweep task
    #[serde(default)]
    pub order_expiry_sweep_secs: u64,

    #[validate]
    pub gateway: GatewayConfig,

    #[validate]
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_currency() -> String {
    "NGN".to_string()
}

fn default_delivery_fee() -> Decimal {
    dec!(500)
}

fn default_gateway_timeout_secs() -> u64 {
    15
}

fn default_smtp_port() -> u16 {
    587
}

fn default_order_expiry_hours() -> i64 {
    24
}

impl AppConfig {
    /// Minimal constructor used by tests; production loads via [`load_config`].
    pub fn new(
        database_url: impl Into<String>,
        admin_token: impl Into<String>,
        gateway_base_url: impl Into<String>,
        gateway_secret_key: impl Into<String>,
    ) -> Self {
        Self {
            database_url: database_url.into(),
            host: default_host(),
            port: default_port(),
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: 1,
            db_min_connections: 1,
            currency: default_currency(),
            delivery_fee: default_delivery_fee(),
            admin_token: admin_token.into(),
            checkout_success_url: "http://localhost:3000/payment/success".to_string(),
            checkout_failure_url: "http://localhost:3000/payment/failed".to_string(),
            checkout_error_url: "http://localhost:3000/payment/error".to_string(),
            order_expiry_hours: default_order_expiry_hours(),
            order_expiry_sweep_secs: 0,
            gateway: GatewayConfig {
                base_url: gateway_base_url.into(),
                secret_key: gateway_secret_key.into(),
                callback_url: "http://localhost:8080/api/v1/checkout/callback".to_string(),
                timeout_secs: 5,
            },
            smtp: None,
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Loads configuration from `config/default.toml`, an environment-specific
/// overlay, and `APP__`-prefixed environment variables (highest precedence).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let raw = Config::builder()
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let cfg: AppConfig = raw.try_deserialize()?;
    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;
    Ok(cfg)
}

/// Installs the global tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
