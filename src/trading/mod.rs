//! Trading module for order management and execution.
//!
//! This module handles:
//! - Order types and creation
//! - Notional to contract conversion
//! - The cancel-all / place-new replacement cycle

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::TradingError;

pub mod execution;
pub mod order;

pub use execution::{
    cancel_all_orders, replace_order, CancelReport, ReplaceOutcome, ReplaceRequest, Replacement,
};
pub use order::{price_from_f64, OrderIntent, PlaceOrderRequest, TradeMode};

/// Parameters for `/api/v5/public/convert-contract-coin`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    /// Instrument id.
    pub inst_id: String,
    /// USDT notional.
    pub notional: Decimal,
    /// Price the notional is converted at.
    pub price: Decimal,
}

/// Result of a conversion request.
///
/// A non-"0" `code` is a business rejection and is returned as data rather
/// than an error; the caller decides what to do with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// OKX response code, "0" on success.
    pub code: String,
    /// OKX message.
    pub msg: String,
    /// Converted size in contracts, when the exchange returned one.
    pub size: Option<Decimal>,
}

impl Conversion {
    /// Whether the exchange accepted the conversion.
    pub fn is_ok(&self) -> bool {
        self.code == "0"
    }
}

/// Order endpoints the replacer drives.
#[async_trait]
pub trait TradingApi: Send + Sync {
    /// Ids of live orders for `inst_id`.
    async fn open_order_ids(&self, inst_id: &str) -> Result<Vec<String>, TradingError>;

    /// Cancel one order.
    async fn cancel_order(&self, inst_id: &str, order_id: &str) -> Result<(), TradingError>;

    /// Convert a USDT notional into contracts at a price.
    async fn convert_to_contracts(&self, request: &ConversionRequest) -> Result<Conversion, TradingError>;

    /// Place an order, returning the exchange order id.
    async fn place_order(&self, intent: &OrderIntent) -> Result<String, TradingError>;
}
