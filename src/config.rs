use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.mercadopago.com";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PAYMENT_METHOD_ID: &str = "pix";
const DEFAULT_PAYER_EMAIL_DOMAIN: &str = "exemplo.com";
const DEFAULT_DISCOUNT_THRESHOLD: u32 = 11;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const CONFIG_DIR: &str = "config";

/// Payment gateway connection settings.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the payment API
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,

    /// Bearer token for the payment API; empty selects the in-memory gateway
    #[serde(default)]
    pub access_token: String,

    /// Hard timeout applied to every gateway call
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,

    /// Payment method identifier sent on intent creation
    #[serde(default = "default_payment_method_id")]
    pub payment_method_id: String,

    /// Domain used to synthesize payer e-mails from chat ids
    #[serde(default = "default_payer_email_domain")]
    pub payer_email_domain: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            access_token: String::new(),
            timeout_secs: default_gateway_timeout_secs(),
            payment_method_id: default_payment_method_id(),
            payer_email_domain: default_payer_email_domain(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Directory holding the JSON snapshot files
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Chat id of the administrator; 0 disables admin notifications
    #[serde(default)]
    pub admin_chat_id: i64,

    /// Minimum credit quantity that qualifies for the bulk discount
    #[serde(default = "default_discount_threshold")]
    #[validate(range(min = 1))]
    pub discount_threshold: u32,

    /// Price multiplier applied when the discount triggers (0.95 = 5% off)
    #[serde(default = "default_discount_multiplier")]
    #[validate(custom = "validate_discount_multiplier")]
    pub discount_multiplier: Decimal,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Payment gateway settings
    #[serde(default)]
    #[validate]
    pub gateway: GatewayConfig,
}

impl AppConfig {
    /// Minimal configuration rooted at `data_dir`, suitable for tests and
    /// local development without a gateway token.
    pub fn new(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            admin_chat_id: 0,
            discount_threshold: default_discount_threshold(),
            discount_multiplier: default_discount_multiplier(),
            event_channel_capacity: default_event_channel_capacity(),
            gateway: GatewayConfig::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn gateway_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.gateway.timeout_secs)
    }
}

fn validate_discount_multiplier(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO && *value <= Decimal::ONE {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("discount multiplier must be within (0, 1]".into());
        Err(err)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_data_dir() -> String {
    DEFAULT_DATA_DIR.to_string()
}
fn default_gateway_base_url() -> String {
    DEFAULT_GATEWAY_BASE_URL.to_string()
}
fn default_gateway_timeout_secs() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}
fn default_payment_method_id() -> String {
    DEFAULT_PAYMENT_METHOD_ID.to_string()
}
fn default_payer_email_domain() -> String {
    DEFAULT_PAYER_EMAIL_DOMAIN.to_string()
}
fn default_discount_threshold() -> u32 {
    DEFAULT_DISCOUNT_THRESHOLD
}
fn default_discount_multiplier() -> Decimal {
    dec!(0.95)
}
fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("digicompras_api={level}");
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration.
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let config = Config::builder()
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .set_default("environment", run_env.clone())?
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    info!(environment = %app_config.environment, data_dir = %app_config.data_dir, "configuration loaded");
    Ok(app_config)
}
