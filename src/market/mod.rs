//! Market data for OKX instruments.
//!
//! This module handles:
//! - Candle and ticker types
//! - The [`MarketData`] seam the quoter fetches through
//! - The OKX REST client
//! - Mock exchange for testing

use async_trait::async_trait;

use crate::error::MarketError;

pub mod client;
pub mod mock;
pub mod types;

pub use client::OkxClient;
pub use mock::{MockConfig, MockExchange, TradingCall};
pub use types::{Bar, Candle};

/// Source of mark prices and candles.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Last traded price for `inst_id`.
    async fn mark_price(&self, inst_id: &str) -> Result<f64, MarketError>;

    /// Up to `limit` most recent candles, ordered oldest to newest.
    async fn candles(&self, inst_id: &str, bar: Bar, limit: usize) -> Result<Vec<Candle>, MarketError>;
}
