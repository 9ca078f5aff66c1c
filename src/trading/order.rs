//! Order types and creation.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::TradingError;

/// Significant digits kept when a float price becomes an order price.
const PRICE_SIGNIFICANT_DIGITS: u32 = 8;

/// The quoter only ever rests limit bids.
const SIDE_BUY: &str = "buy";
const ORD_TYPE_LIMIT: &str = "limit";

/// OKX `tdMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TradeMode {
    /// Spot / non-margin.
    #[default]
    Cash,
    /// Cross margin.
    Cross,
    /// Isolated margin.
    Isolated,
}

/// A limit buy to place for one instrument in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    /// Instrument id.
    pub inst_id: String,
    /// Trade mode.
    pub trade_mode: TradeMode,
    /// Limit price.
    pub price: Decimal,
    /// Size in contracts.
    pub size: Decimal,
}

impl OrderIntent {
    /// Create a limit buy.
    pub fn limit_buy(inst_id: impl Into<String>, price: Decimal, size: Decimal) -> Self {
        Self {
            inst_id: inst_id.into(),
            trade_mode: TradeMode::Cash,
            price,
            size,
        }
    }

    /// Set trade mode.
    pub fn with_trade_mode(mut self, trade_mode: TradeMode) -> Self {
        self.trade_mode = trade_mode;
        self
    }

    /// Validate order parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.inst_id.is_empty() {
            return Err("inst_id is required".to_string());
        }
        if self.price <= Decimal::ZERO {
            return Err("price must be positive".to_string());
        }
        if self.size <= Decimal::ZERO {
            return Err("size must be positive".to_string());
        }
        Ok(())
    }

    /// Request body for `POST /api/v5/trade/order`.
    pub fn to_request(&self) -> PlaceOrderRequest {
        PlaceOrderRequest {
            inst_id: self.inst_id.clone(),
            td_mode: self.trade_mode.to_string(),
            side: SIDE_BUY,
            ord_type: ORD_TYPE_LIMIT,
            sz: self.size.normalize().to_string(),
            px: self.price.normalize().to_string(),
        }
    }
}

/// Request body for `POST /api/v5/trade/order`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    /// Instrument id.
    pub inst_id: String,
    /// Trade mode.
    pub td_mode: String,
    /// Always "buy".
    pub side: &'static str,
    /// Always "limit".
    pub ord_type: &'static str,
    /// Size in contracts.
    pub sz: String,
    /// Limit price.
    pub px: String,
}

/// Convert an indicator-layer float price into an order price.
///
/// Keeps [`PRICE_SIGNIFICANT_DIGITS`] significant digits so float noise such
/// as `98.99999999999999` does not reach the exchange.
pub fn price_from_f64(price: f64) -> Result<Decimal, TradingError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(TradingError::InvalidParams(format!(
            "price must be a positive finite number, got {}",
            price
        )));
    }
    let value = Decimal::from_f64(price).ok_or_else(|| {
        TradingError::InvalidParams(format!("price {} is out of range", price))
    })?;
    Ok(value
        .round_sf(PRICE_SIGNIFICANT_DIGITS)
        .unwrap_or(value)
        .normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn intent_creation() {
        let intent = OrderIntent::limit_buy("BTC-USDT-SWAP", dec!(60000.5), dec!(3))
            .with_trade_mode(TradeMode::Cross);
        assert_eq!(intent.trade_mode, TradeMode::Cross);
        assert_eq!(intent.price, dec!(60000.5));
    }

    #[test]
    fn intent_validation() {
        let valid = OrderIntent::limit_buy("BTC-USDT-SWAP", dec!(1), dec!(1));
        assert!(valid.validate().is_ok());

        let no_inst = OrderIntent::limit_buy("", dec!(1), dec!(1));
        assert!(no_inst.validate().is_err());

        let zero_price = OrderIntent::limit_buy("X", dec!(0), dec!(1));
        assert!(zero_price.validate().is_err());

        let zero_size = OrderIntent::limit_buy("X", dec!(1), dec!(0));
        assert!(zero_size.validate().is_err());
    }

    #[test]
    fn request_uses_okx_field_names() {
        let intent = OrderIntent::limit_buy("CTC-USDT-SWAP", dec!(0.4950), dec!(40.0));
        let json = serde_json::to_value(intent.to_request()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "instId": "CTC-USDT-SWAP",
                "tdMode": "cash",
                "side": "buy",
                "ordType": "limit",
                "sz": "40",
                "px": "0.495",
            })
        );
    }

    #[test]
    fn float_prices_are_rounded() {
        assert_eq!(price_from_f64(98.99999999999999).unwrap(), dec!(99));
        assert_eq!(price_from_f64(0.123456789123).unwrap(), dec!(0.12345679));
        assert!(price_from_f64(0.0).is_err());
        assert!(price_from_f64(f64::NAN).is_err());
    }

    #[test]
    fn enums_from_string() {
        use std::str::FromStr;
        assert_eq!(TradeMode::from_str("isolated").unwrap(), TradeMode::Isolated);
        assert_eq!(TradeMode::Cross.to_string(), "cross");
    }
}
