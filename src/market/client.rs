//! OKX v5 REST client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{Config, OkxCredentials};
use crate::error::{MarketError, TradingError};
use crate::metrics;
use crate::signing;
use crate::trading::{Conversion, ConversionRequest, OrderIntent, TradingApi};

use super::types::{Bar, Candle, OkxResponse, TickerRow};
use super::MarketData;

/// OKX codes for a bad key, passphrase, signature or timestamp.
const AUTH_ERROR_CODES: &[&str] = &["50101", "50102", "50103", "50104", "50105", "50111", "50113"];

/// Row of `/trade/orders-pending`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrderRow {
    /// Exchange order id.
    pub ord_id: String,
}

/// Row of `/trade/order` and `/trade/cancel-order` responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAckRow {
    /// Exchange order id.
    #[serde(default)]
    pub ord_id: String,
    /// Per-order result code, "0" on success.
    #[serde(default)]
    pub s_code: String,
    /// Per-order result message.
    #[serde(default)]
    pub s_msg: String,
}

/// Row of `/public/convert-contract-coin`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertRow {
    /// Converted size.
    pub sz: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelOrderRequest<'a> {
    inst_id: &'a str,
    ord_id: &'a str,
}

/// OKX REST API client.
#[derive(Debug, Clone)]
pub struct OkxClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// REST base URL.
    base_url: Url,
    /// API credentials.
    credentials: OkxCredentials,
}

impl OkxClient {
    /// Create a new OKX client from config.
    pub fn new(config: &Config) -> Result<Self, MarketError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .connect_timeout(Duration::from_secs(5))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        let base_url = Url::parse(&config.okx.base_url)
            .map_err(|e| MarketError::ParseError(format!("invalid base url: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            credentials: config.okx.clone(),
        })
    }

    /// Get the REST base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `path?query` exactly as it is signed and sent.
    fn request_path(path: &str, query: &[(&str, &str)]) -> String {
        if query.is_empty() {
            return path.to_string();
        }
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(query)
            .finish();
        format!("{}?{}", path, encoded)
    }

    fn url_for(&self, request_path: &str) -> Result<Url, String> {
        self.base_url
            .join(request_path)
            .map_err(|e| format!("invalid request path {}: {}", request_path, e))
    }

    /// Unauthenticated GET returning the OKX envelope.
    async fn public_get<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<OkxResponse<T>, String> {
        let request_path = Self::request_path(path, query);
        let url = self.url_for(&request_path)?;

        let start = Instant::now();
        let response = self.http.get(url).send().await.map_err(|e| e.to_string())?;
        metrics::record_http_latency(start, endpoint);

        Self::read_envelope(response).await
    }

    /// Signed request returning the OKX envelope.
    async fn private_request<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<String>,
    ) -> Result<OkxResponse<T>, TradingError> {
        let request_path = Self::request_path(path, query);
        let url = self.url_for(&request_path).map_err(TradingError::SubmissionFailed)?;
        let body = body.unwrap_or_default();

        let headers = signing::auth_headers(&self.credentials, method.as_str(), &request_path, &body)?;

        let mut request = self.http.request(method, url);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        if !body.is_empty() {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let start = Instant::now();
        let response = request.send().await?;
        metrics::record_http_latency(start, endpoint);

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(TradingError::AuthenticationFailed(body));
        }

        let envelope: OkxResponse<T> = Self::read_envelope(response)
            .await
            .map_err(TradingError::SubmissionFailed)?;

        if AUTH_ERROR_CODES.contains(&envelope.code.as_str()) {
            return Err(TradingError::AuthenticationFailed(format!(
                "code={} msg={}",
                envelope.code, envelope.msg
            )));
        }

        Ok(envelope)
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<OkxResponse<T>, String> {
        let status = response.status();
        let text = response.text().await.map_err(|e| e.to_string())?;

        // OKX reports most failures with HTTP 4xx and a JSON envelope; prefer the envelope.
        match serde_json::from_str::<OkxResponse<T>>(&text) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(format!("HTTP {} - {}", status, text)),
            Err(e) => Err(format!("failed to parse response: {}", e)),
        }
    }
}

#[async_trait]
impl MarketData for OkxClient {
    #[instrument(skip(self))]
    async fn mark_price(&self, inst_id: &str) -> Result<f64, MarketError> {
        let response: OkxResponse<TickerRow> = self
            .public_get("ticker", "/api/v5/market/ticker", &[("instId", inst_id)])
            .await
            .map_err(|reason| MarketError::FetchFailed {
                endpoint: "ticker",
                inst_id: inst_id.to_string(),
                reason,
            })?;

        let price = ticker_price(inst_id, response)?;
        debug!(price, "Fetched mark price");
        Ok(price)
    }

    #[instrument(skip(self))]
    async fn candles(&self, inst_id: &str, bar: Bar, limit: usize) -> Result<Vec<Candle>, MarketError> {
        let bar = bar.to_string();
        let limit = limit.to_string();
        let response: OkxResponse<Vec<String>> = self
            .public_get(
                "candles",
                "/api/v5/market/candles",
                &[("instId", inst_id), ("bar", &bar), ("limit", &limit)],
            )
            .await
            .map_err(|reason| MarketError::FetchFailed {
                endpoint: "candles",
                inst_id: inst_id.to_string(),
                reason,
            })?;

        let candles = candles_from_response(response)?;
        debug!(count = candles.len(), "Fetched candles");
        Ok(candles)
    }
}

#[async_trait]
impl TradingApi for OkxClient {
    #[instrument(skip(self))]
    async fn open_order_ids(&self, inst_id: &str) -> Result<Vec<String>, TradingError> {
        let response: OkxResponse<PendingOrderRow> = self
            .private_request(
                "orders_pending",
                reqwest::Method::GET,
                "/api/v5/trade/orders-pending",
                &[("instId", inst_id), ("state", "live")],
                None,
            )
            .await?;

        pending_order_ids(inst_id, response)
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, inst_id: &str, order_id: &str) -> Result<(), TradingError> {
        let body = serde_json::to_string(&CancelOrderRequest {
            inst_id,
            ord_id: order_id,
        })
        .map_err(|e| TradingError::InvalidParams(e.to_string()))?;

        let response: OkxResponse<OrderAckRow> = self
            .private_request(
                "cancel_order",
                reqwest::Method::POST,
                "/api/v5/trade/cancel-order",
                &[],
                Some(body),
            )
            .await?;

        cancel_result(order_id, response)
    }

    #[instrument(skip(self, request), fields(inst_id = %request.inst_id))]
    async fn convert_to_contracts(&self, request: &ConversionRequest) -> Result<Conversion, TradingError> {
        let notional = request.notional.normalize().to_string();
        let price = request.price.normalize().to_string();
        let response: OkxResponse<ConvertRow> = self
            .public_get(
                "convert_contract_coin",
                "/api/v5/public/convert-contract-coin",
                &[
                    ("type", "1"),
                    ("instId", &request.inst_id),
                    ("sz", &notional),
                    ("px", &price),
                    ("unit", "usdt"),
                    ("opType", "open"),
                ],
            )
            .await
            .map_err(TradingError::ConversionFailed)?;

        conversion_from_response(response)
    }

    #[instrument(skip(self, intent), fields(inst_id = %intent.inst_id, px = %intent.price, sz = %intent.size))]
    async fn place_order(&self, intent: &OrderIntent) -> Result<String, TradingError> {
        intent.validate().map_err(TradingError::InvalidParams)?;

        let body = serde_json::to_string(&intent.to_request())
            .map_err(|e| TradingError::InvalidParams(e.to_string()))?;

        let response: OkxResponse<OrderAckRow> = self
            .private_request("place_order", reqwest::Method::POST, "/api/v5/trade/order", &[], Some(body))
            .await?;

        let result = order_ack_result(response);
        if let Err(e) = &result {
            warn!(error = %e, "Order rejected");
        }
        result
    }
}

/// Last price from a ticker envelope.
pub fn ticker_price(inst_id: &str, response: OkxResponse<TickerRow>) -> Result<f64, MarketError> {
    if !response.is_ok() {
        return Err(MarketError::Rejected {
            endpoint: "ticker",
            code: response.code,
            msg: response.msg,
        });
    }

    let row = response
        .data
        .first()
        .ok_or_else(|| MarketError::ParseError(format!("ticker for {} has no data rows", inst_id)))?;

    row.last
        .parse()
        .map_err(|e| MarketError::ParseError(format!("ticker last {:?} is not a number: {}", row.last, e)))
}

/// Candles from a candles envelope, oldest first.
pub fn candles_from_response(response: OkxResponse<Vec<String>>) -> Result<Vec<Candle>, MarketError> {
    if !response.is_ok() {
        return Err(MarketError::Rejected {
            endpoint: "candles",
            code: response.code,
            msg: response.msg,
        });
    }

    let mut candles = response
        .data
        .iter()
        .map(|row| {
            Candle::from_row(row).ok_or_else(|| MarketError::ParseError(format!("malformed candle row {:?}", row)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    // OKX returns newest first.
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

/// Live order ids from an orders-pending envelope.
pub fn pending_order_ids(inst_id: &str, response: OkxResponse<PendingOrderRow>) -> Result<Vec<String>, TradingError> {
    if !response.is_ok() {
        return Err(TradingError::ListFailed {
            inst_id: inst_id.to_string(),
            reason: format!("code={} msg={}", response.code, response.msg),
        });
    }
    Ok(response.data.into_iter().map(|row| row.ord_id).collect())
}

/// Outcome of a cancel-order envelope. A non-"0" `sCode` fails even under `code` "0".
pub fn cancel_result(order_id: &str, response: OkxResponse<OrderAckRow>) -> Result<(), TradingError> {
    let ack = response.data.first();
    if response.is_ok() && !ack.is_some_and(|a| a.s_code != "0") {
        return Ok(());
    }

    let reason = match ack {
        Some(a) if !a.s_msg.is_empty() => format!("sCode={} sMsg={}", a.s_code, a.s_msg),
        _ => format!("code={} msg={}", response.code, response.msg),
    };
    Err(TradingError::CancelFailed {
        order_id: order_id.to_string(),
        reason,
    })
}

/// Conversion from a convert-contract-coin envelope.
///
/// A non-"0" code is returned as data; only an unparsable `sz` is an error.
pub fn conversion_from_response(response: OkxResponse<ConvertRow>) -> Result<Conversion, TradingError> {
    let size = match response.data.first() {
        Some(row) => Some(row.sz.parse::<Decimal>().map_err(|e| {
            TradingError::ConversionFailed(format!("sz {:?} is not a number: {}", row.sz, e))
        })?),
        None => None,
    };

    Ok(Conversion {
        code: response.code,
        msg: response.msg,
        size,
    })
}

/// Order id from a place-order envelope.
///
/// The per-order `sCode`/`sMsg` is preferred over the envelope code when present.
pub fn order_ack_result(response: OkxResponse<OrderAckRow>) -> Result<String, TradingError> {
    match response.data.into_iter().next() {
        Some(ack) if response.code == "0" && ack.s_code == "0" => Ok(ack.ord_id),
        Some(ack) if !ack.s_code.is_empty() && ack.s_code != "0" => Err(TradingError::OrderRejected {
            code: ack.s_code,
            msg: ack.s_msg,
        }),
        _ => Err(TradingError::OrderRejected {
            code: response.code,
            msg: response.msg,
        }),
    }
}
