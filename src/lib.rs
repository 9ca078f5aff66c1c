//! Volatility-discount quoting bot for OKX.
//!
//! For every configured instrument the bot keeps one resting limit buy
//! below the current mark price. The discount adapts to recent volatility:
//!
//! ```text
//! ratio    = (mark / ATR) / 100
//! selected = max(min(avg amplitude %, ratio), floor)
//! price    = mark * (1 - selected / 100)
//! ```
//!
//! Each cycle cancels the instrument's live orders, converts the USDT
//! notional into contracts at the new price and places the replacement.
//! Failures are logged and pushed to a Feishu webhook; the loop keeps going.
//!
//! # Modules
//!
//! - [`config`]: Configuration from JSON with environment overrides
//! - [`error`]: Unified error types
//! - [`market`]: OKX REST client and market data
//! - [`strategy`]: Volatility estimation, discount selection, quoting loop
//! - [`trading`]: Order types and the cancel/replace sequence
//! - [`notify`]: Webhook notifications
//! - [`signing`]: OKX request signing
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Runtime helpers

pub mod config;
pub mod error;
pub mod market;
pub mod metrics;
pub mod notify;
pub mod signing;
pub mod strategy;
pub mod trading;
pub mod utils;

pub use config::Config;
pub use error::{BotError, CycleError};
