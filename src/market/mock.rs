//! Mock OKX exchange for unit testing.
//!
//! This module provides an in-memory exchange implementing both
//! [`MarketData`] and [`TradingApi`] that records every trading call
//! without making network requests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{MarketError, TradingError};
use crate::trading::{Conversion, ConversionRequest, OrderIntent, TradingApi};

use super::types::{Bar, Candle};
use super::MarketData;

/// A trading call observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum TradingCall {
    /// `open_order_ids(inst_id)`.
    ListOpen(String),
    /// `cancel_order(inst_id, order_id)`.
    Cancel(String, String),
    /// `convert_to_contracts(request)`.
    Convert(ConversionRequest),
    /// `place_order(intent)`.
    Place(OrderIntent),
}

/// Configuration for mock exchange behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Instruments whose price fetch fails.
    pub fail_price: HashSet<String>,
    /// Instruments whose open-order listing fails.
    pub fail_list: HashSet<String>,
    /// Order ids whose cancellation fails.
    pub fail_cancel: HashSet<String>,
    /// Whether placement fails.
    pub fail_place: bool,
}

#[derive(Debug, Default)]
struct MockState {
    prices: HashMap<String, f64>,
    candles: HashMap<String, Vec<Candle>>,
    open_orders: HashMap<String, Vec<String>>,
    conversions: HashMap<String, Conversion>,
    calls: Vec<TradingCall>,
    next_order_id: u64,
}

/// Mock exchange for testing.
#[derive(Debug, Clone, Default)]
pub struct MockExchange {
    config: MockConfig,
    state: Arc<Mutex<MockState>>,
}

impl MockExchange {
    /// Create a new mock exchange with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock exchange with custom failure configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            state: Arc::default(),
        }
    }

    /// Set the mark price for an instrument.
    pub fn set_price(&self, inst_id: &str, price: f64) {
        self.state.lock().unwrap().prices.insert(inst_id.to_string(), price);
    }

    /// Set the candles (oldest first) for an instrument.
    pub fn set_candles(&self, inst_id: &str, candles: Vec<Candle>) {
        self.state.lock().unwrap().candles.insert(inst_id.to_string(), candles);
    }

    /// Set the live order ids for an instrument.
    pub fn set_open_orders(&self, inst_id: &str, order_ids: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .open_orders
            .insert(inst_id.to_string(), order_ids.iter().map(|s| s.to_string()).collect());
    }

    /// Set the conversion answer for an instrument.
    pub fn set_conversion(&self, inst_id: &str, code: &str, msg: &str, size: Option<Decimal>) {
        self.state.lock().unwrap().conversions.insert(
            inst_id.to_string(),
            Conversion {
                code: code.to_string(),
                msg: msg.to_string(),
                size,
            },
        );
    }

    /// Every trading call, in order.
    pub fn calls(&self) -> Vec<TradingCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Cancelled order ids, in order.
    pub fn cancelled(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TradingCall::Cancel(_, id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Placed orders, in order.
    pub fn placed(&self) -> Vec<OrderIntent> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TradingCall::Place(intent) => Some(intent),
                _ => None,
            })
            .collect()
    }

    /// Live order ids currently held for an instrument.
    pub fn open_orders(&self, inst_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .open_orders
            .get(inst_id)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, call: TradingCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl MarketData for MockExchange {
    async fn mark_price(&self, inst_id: &str) -> Result<f64, MarketError> {
        if self.config.fail_price.contains(inst_id) {
            return Err(MarketError::FetchFailed {
                endpoint: "ticker",
                inst_id: inst_id.to_string(),
                reason: "mock price failure".to_string(),
            });
        }
        self.state
            .lock()
            .unwrap()
            .prices
            .get(inst_id)
            .copied()
            .ok_or_else(|| MarketError::ParseError(format!("no ticker data for {}", inst_id)))
    }

    async fn candles(&self, inst_id: &str, _bar: Bar, limit: usize) -> Result<Vec<Candle>, MarketError> {
        let state = self.state.lock().unwrap();
        let candles = state.candles.get(inst_id).cloned().unwrap_or_default();
        let skip = candles.len().saturating_sub(limit);
        Ok(candles.into_iter().skip(skip).collect())
    }
}

#[async_trait]
impl TradingApi for MockExchange {
    async fn open_order_ids(&self, inst_id: &str) -> Result<Vec<String>, TradingError> {
        self.record(TradingCall::ListOpen(inst_id.to_string()));
        if self.config.fail_list.contains(inst_id) {
            return Err(TradingError::ListFailed {
                inst_id: inst_id.to_string(),
                reason: "mock list failure".to_string(),
            });
        }
        Ok(self.open_orders(inst_id))
    }

    async fn cancel_order(&self, inst_id: &str, order_id: &str) -> Result<(), TradingError> {
        self.record(TradingCall::Cancel(inst_id.to_string(), order_id.to_string()));
        if self.config.fail_cancel.contains(order_id) {
            return Err(TradingError::CancelFailed {
                order_id: order_id.to_string(),
                reason: "mock cancel failure".to_string(),
            });
        }
        if let Some(orders) = self.state.lock().unwrap().open_orders.get_mut(inst_id) {
            orders.retain(|id| id != order_id);
        }
        Ok(())
    }

    async fn convert_to_contracts(&self, request: &ConversionRequest) -> Result<Conversion, TradingError> {
        self.record(TradingCall::Convert(request.clone()));
        let configured = self.state.lock().unwrap().conversions.get(&request.inst_id).cloned();
        // One contract per 10 USDT of notional unless configured otherwise.
        Ok(configured.unwrap_or_else(|| Conversion {
            code: "0".to_string(),
            msg: String::new(),
            size: Some((request.notional / Decimal::TEN).floor()),
        }))
    }

    async fn place_order(&self, intent: &OrderIntent) -> Result<String, TradingError> {
        self.record(TradingCall::Place(intent.clone()));
        if self.config.fail_place {
            return Err(TradingError::OrderRejected {
                code: "51008".to_string(),
                msg: "mock placement failure".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.next_order_id += 1;
        let order_id = format!("mock-{}", state.next_order_id);
        state
            .open_orders
            .entry(intent.inst_id.clone())
            .or_default()
            .push(order_id.clone());
        Ok(order_id)
    }
}
