//! Market data types and OKX wire shapes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Candle granularity accepted by `/api/v5/market/candles`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
pub enum Bar {
    /// 1 minute.
    #[serde(rename = "1m")]
    #[strum(serialize = "1m")]
    OneMinute,
    /// 5 minutes.
    #[serde(rename = "5m")]
    #[strum(serialize = "5m")]
    FiveMinutes,
    /// 15 minutes.
    #[serde(rename = "15m")]
    #[strum(serialize = "15m")]
    FifteenMinutes,
    /// 1 hour.
    #[default]
    #[serde(rename = "1H")]
    #[strum(serialize = "1H")]
    OneHour,
    /// 4 hours.
    #[serde(rename = "4H")]
    #[strum(serialize = "4H")]
    FourHours,
    /// 1 day (UTC+8 boundary, OKX default).
    #[serde(rename = "1D")]
    #[strum(serialize = "1D")]
    OneDay,
}

/// One OHLCV candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    /// Open time, epoch milliseconds.
    pub timestamp: i64,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Volume in contracts.
    pub volume: f64,
}

impl Candle {
    /// Build a candle from OHLCV values.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Parse one row of `/market/candles` (`[ts, o, h, l, c, vol, ...]`, all strings).
    pub fn from_row(row: &[String]) -> Option<Self> {
        if row.len() < 6 {
            return None;
        }
        Some(Self {
            timestamp: row[0].parse().ok()?,
            open: row[1].parse().ok()?,
            high: row[2].parse().ok()?,
            low: row[3].parse().ok()?,
            close: row[4].parse().ok()?,
            volume: row[5].parse().ok()?,
        })
    }
}

/// Standard OKX v5 response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct OkxResponse<T> {
    /// "0" on success.
    pub code: String,
    /// Error message, empty on success.
    #[serde(default)]
    pub msg: String,
    /// Payload rows.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> OkxResponse<T> {
    /// Whether the exchange reported success.
    pub fn is_ok(&self) -> bool {
        self.code == "0"
    }
}

/// Row of `/market/ticker`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerRow {
    /// Instrument id.
    pub inst_id: String,
    /// Last traded price.
    pub last: String,
}
