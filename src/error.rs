//! Unified error types for the quoter.

use strum::Display;
use thiserror::Error;

/// Unified error type for the quoter.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Market data error.
    #[error("market error: {0}")]
    Market(#[from] MarketError),

    /// Volatility estimation or discount selection error.
    #[error("indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    /// Trading/order error.
    #[error("trading error: {0}")]
    Trading(#[from] TradingError),

    /// Notification delivery error.
    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),
}

impl BotError {
    /// Whether waiting for the next cycle can plausibly clear the error.
    ///
    /// Authentication rejections, bad configuration and malformed indicator
    /// input will fail the same way every cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            BotError::Config(_) => false,
            BotError::Indicator(IndicatorError::InsufficientData { .. }) => true,
            BotError::Indicator(_) => false,
            BotError::Trading(TradingError::AuthenticationFailed(_)) => false,
            BotError::Trading(TradingError::InvalidParams(_)) => false,
            _ => true,
        }
    }
}

/// Configuration file and environment errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected shape.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Environment override could not be deserialized.
    #[error("environment override error: {0}")]
    Env(#[from] envy::Error),

    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Market data errors.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Request to the market data endpoint failed.
    #[error("failed to fetch {endpoint} for {inst_id}: {reason}")]
    FetchFailed {
        /// Endpoint that failed.
        endpoint: &'static str,
        /// Instrument requested.
        inst_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// The exchange answered with a non-zero code.
    #[error("exchange rejected {endpoint}: code={code} msg={msg}")]
    Rejected {
        /// Endpoint that rejected the request.
        endpoint: &'static str,
        /// OKX error code.
        code: String,
        /// OKX error message.
        msg: String,
    },

    /// The response did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    ParseError(String),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Volatility estimation and discount selection errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    /// Not enough candles for the requested window.
    #[error("insufficient data: need at least {required} candles, got {available}")]
    InsufficientData {
        /// Minimum number of candles needed.
        required: usize,
        /// Candles actually supplied.
        available: usize,
    },

    /// A candle cannot be used (e.g. non-positive close).
    #[error("invalid candle at index {index}: {reason}")]
    InvalidCandle {
        /// Index into the candle slice.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// The selected discount does not yield a positive price.
    #[error("invalid discount: {0}")]
    InvalidDiscount(String),
}

/// Trading and order errors.
#[derive(Error, Debug)]
pub enum TradingError {
    /// Listing live orders failed.
    #[error("failed to list open orders for {inst_id}: {reason}")]
    ListFailed {
        /// Instrument.
        inst_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to cancel order.
    #[error("failed to cancel order {order_id}: {reason}")]
    CancelFailed {
        /// Order ID that failed to cancel.
        order_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// The conversion request itself failed (transport or shape).
    #[error("contract conversion failed: {0}")]
    ConversionFailed(String),

    /// Order submission failed.
    #[error("order submission failed: {0}")]
    SubmissionFailed(String),

    /// Order rejected by the exchange.
    #[error("order rejected: code={code} msg={msg}")]
    OrderRejected {
        /// OKX error code.
        code: String,
        /// Rejection reason from the exchange.
        msg: String,
    },

    /// Invalid order parameters.
    #[error("invalid order parameters: {0}")]
    InvalidParams(String),

    /// Request signing error.
    #[error("signing error: {0}")]
    SigningError(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Notification delivery errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Webhook answered with a non-200 status.
    #[error("webhook returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Step of a per-pair cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CycleStep {
    /// Fetching mark price and candles.
    Fetching,
    /// Computing volatility and discount.
    Estimating,
    /// Cancelling live orders.
    Cancelling,
    /// Converting notional to contracts.
    Converting,
    /// Placing the new order.
    Placing,
}

/// A failed cycle for one instrument.
#[derive(Error, Debug)]
#[error("{inst_id} failed while {step}: {source}")]
pub struct CycleError {
    /// Instrument being processed.
    pub inst_id: String,
    /// Step that failed.
    pub step: CycleStep,
    /// Underlying error.
    #[source]
    pub source: BotError,
}

impl CycleError {
    /// Wrap an error with the instrument and step it happened in.
    pub fn new(inst_id: impl Into<String>, step: CycleStep, source: impl Into<BotError>) -> Self {
        Self {
            inst_id: inst_id.into(),
            step,
            source: source.into(),
        }
    }

    /// See [`BotError::is_retryable`].
    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}
