//! Application configuration loaded from a JSON file with environment overrides.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use strum::{Display, EnumString};

use crate::error::ConfigError;
use crate::market::Bar;
use crate::trading::TradeMode;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// OKX API credentials and endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OkxCredentials {
    /// API key.
    #[serde(default)]
    pub api_key: String,

    /// API secret used for request signing.
    #[serde(default)]
    pub secret: String,

    /// API passphrase.
    #[serde(default)]
    pub password: String,

    /// Send `x-simulated-trading: 1` (demo trading account).
    #[serde(default)]
    pub simulated: bool,

    /// REST base URL. Accepts `baseUrl` or `base_url`.
    #[serde(default = "default_base_url", alias = "base_url")]
    pub base_url: String,
}

/// Per-instrument quoting settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PairConfig {
    /// OKX instrument id, e.g. `BTC-USDT-SWAP`.
    pub inst_id: String,
    /// Notional in USDT converted to contracts every cycle.
    pub amount_usdt: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PairSettings {
    #[serde(default = "default_amount_usdt")]
    amount_usdt: Decimal,
}

/// How the limit price is derived from the mark price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PricingMode {
    /// Discount from ATR and average amplitude.
    #[default]
    Volatility,
    /// Fixed `fixed_price_factor` below mark.
    Fixed,
}

/// Application configuration.
///
/// Unknown keys are rejected so a misspelled `dry_run` cannot silently
/// mean live trading.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    // === Exchange ===
    /// OKX credentials.
    pub okx: OkxCredentials,

    /// Instruments to quote, in file order.
    #[serde(rename = "tradingPairs", deserialize_with = "pairs_in_file_order")]
    pub trading_pairs: Vec<PairConfig>,

    // === Loop ===
    /// Seconds between cycles.
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval: u64,

    /// Webhook receiving error notifications. Empty disables delivery.
    #[serde(default)]
    pub feishu_webhook: String,

    // === Volatility ===
    /// Candle granularity.
    #[serde(default)]
    pub bar: Bar,

    /// Number of candles requested per cycle.
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,

    /// ATR window.
    #[serde(default = "default_period")]
    pub atr_period: usize,

    /// Average amplitude window.
    #[serde(default = "default_period")]
    pub amplitude_period: usize,

    /// Minimum discount in percentage points.
    #[serde(default = "default_discount_floor")]
    pub discount_floor_pct: f64,

    /// Pricing policy.
    #[serde(default)]
    pub pricing: PricingMode,

    /// Price factor used by [`PricingMode::Fixed`].
    #[serde(default = "default_fixed_price_factor")]
    pub fixed_price_factor: f64,

    // === Orders ===
    /// OKX `tdMode` for new orders.
    #[serde(default)]
    pub trade_mode: TradeMode,

    /// Log the intended order instead of cancelling/placing.
    #[serde(default)]
    pub dry_run: bool,

    // === Runtime ===
    /// Directory for the rotating log file.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Per-request HTTP timeout.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Prometheus exporter port. Disabled when absent.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Environment variables that take precedence over the file.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    api_key: Option<String>,
    secret: Option<String>,
    password: Option<String>,
    feishu_webhook: Option<String>,
}

/// Prefix for environment overrides, e.g. `OKX_QUOTER_API_KEY`.
pub const ENV_PREFIX: &str = "OKX_QUOTER_";

fn default_base_url() -> String {
    "https://www.okx.com".to_string()
}

fn default_amount_usdt() -> Decimal {
    Decimal::new(20, 0)
}

fn default_monitor_interval() -> u64 {
    60
}

fn default_candle_limit() -> usize {
    100
}

fn default_period() -> usize {
    crate::strategy::volatility::DEFAULT_PERIOD
}

fn default_discount_floor() -> f64 {
    crate::strategy::discount::DEFAULT_FLOOR_PCT
}

fn default_fixed_price_factor() -> f64 {
    crate::strategy::discount::DEFAULT_FIXED_PRICE_FACTOR
}

fn default_log_dir() -> String {
    "log".to_string()
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn pairs_in_file_order<'de, D>(deserializer: D) -> Result<Vec<PairConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(inst_id, value)| {
            let settings: PairSettings =
                serde_json::from_value(value).map_err(serde::de::Error::custom)?;
            Ok(PairConfig {
                inst_id,
                amount_usdt: settings.amount_usdt,
            })
        })
        .collect()
}

impl Config {
    /// Load configuration from `path`, reading .env and environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut config = Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_env()?;
        config.apply_overrides(overrides);

        Ok(config)
    }

    /// Parse configuration from a JSON string without touching the environment.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    fn apply_overrides(&mut self, overrides: EnvOverrides) {
        if let Some(api_key) = overrides.api_key {
            self.okx.api_key = api_key;
        }
        if let Some(secret) = overrides.secret {
            self.okx.secret = secret;
        }
        if let Some(password) = overrides.password {
            self.okx.password = password;
        }
        if let Some(webhook) = overrides.feishu_webhook {
            self.feishu_webhook = webhook;
        }
    }

    /// Check if the configuration is valid for trading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.okx.api_key.is_empty() || self.okx.secret.is_empty() || self.okx.password.is_empty() {
            return Err(ConfigError::Invalid(
                "okx.apiKey, okx.secret and okx.password are required".to_string(),
            ));
        }
        self.validate_settings()
    }

    /// Everything [`Config::validate`] checks except credentials.
    ///
    /// Enough for commands that only read public market data.
    pub fn validate_settings(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if url::Url::parse(&self.okx.base_url).is_err() {
            return invalid("okx.baseUrl is not a valid URL");
        }

        if self.trading_pairs.is_empty() {
            return invalid("tradingPairs must contain at least one instrument");
        }

        if let Some(pair) = self
            .trading_pairs
            .iter()
            .find(|p| p.amount_usdt <= Decimal::ZERO)
        {
            return Err(ConfigError::Invalid(format!(
                "amount_usdt for {} must be positive",
                pair.inst_id
            )));
        }

        if self.monitor_interval == 0 {
            return invalid("monitor_interval must be at least 1 second");
        }

        if self.atr_period == 0 || self.amplitude_period == 0 {
            return invalid("atr_period and amplitude_period must be positive");
        }

        if self.candle_limit < self.atr_period + 1 || self.candle_limit < self.amplitude_period {
            return invalid("candle_limit must cover atr_period + 1 and amplitude_period");
        }

        if !(self.discount_floor_pct >= 0.0 && self.discount_floor_pct < 100.0) {
            return invalid("discount_floor_pct must be in [0, 100)");
        }

        if !(self.fixed_price_factor > 0.0 && self.fixed_price_factor <= 1.0) {
            return invalid("fixed_price_factor must be in (0, 1]");
        }

        if !self.feishu_webhook.is_empty() && url::Url::parse(&self.feishu_webhook).is_err() {
            return invalid("feishu_webhook is not a valid URL");
        }

        Ok(())
    }

    /// Whether error notifications are delivered anywhere.
    pub fn notifications_enabled(&self) -> bool {
        !self.feishu_webhook.is_empty()
    }
}
