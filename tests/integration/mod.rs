//! Integration tests for the OKX quoter.
//!
//! Tests against the in-memory exchange always run. Tests marked `#[ignore]`
//! hit the public OKX REST API and need network access.
//! Run with: cargo test --test integration -- --ignored

use std::sync::Arc;

use okx_quoter::config::Config;
use okx_quoter::error::CycleStep;
use okx_quoter::market::{Bar, Candle, MarketData, MockConfig, MockExchange, OkxClient};
use okx_quoter::notify::RecordingNotifier;
use okx_quoter::strategy::{Quoter, QuoterSettings, VolatilityReport};
use okx_quoter::trading::{ConversionRequest, ReplaceOutcome, TradingApi};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

const CONFIG: &str = r#"{
    "okx": {"apiKey": "key", "secret": "secret", "password": "pass"},
    "tradingPairs": {
        "BTC-USDT-SWAP": {"amount_usdt": 50},
        "DOGE-USDT-SWAP": {}
    },
    "monitor_interval": 1,
    "candle_limit": 20
}"#;

/// Config with a short interval and two pairs.
fn test_config() -> Config {
    let config = Config::from_json(CONFIG).unwrap();
    config.validate().unwrap();
    config
}

/// Twenty candles swinging 1% around `price`.
fn seed(exchange: &MockExchange, inst_id: &str, price: f64) {
    exchange.set_price(inst_id, price);
    exchange.set_candles(
        inst_id,
        (0..20)
            .map(|i| Candle::new(i * 3_600_000, price, price * 1.005, price * 0.995, price, 10.0))
            .collect(),
    );
}

fn quoter(config: &Config, exchange: &MockExchange, notifier: &RecordingNotifier) -> Quoter {
    Quoter::new(
        Arc::new(exchange.clone()),
        Arc::new(exchange.clone()),
        Arc::new(notifier.clone()),
        config.trading_pairs.clone(),
        QuoterSettings::from_config(config),
    )
}

#[tokio::test]
async fn test_cycle_keeps_one_order_per_pair() {
    let config = test_config();
    let exchange = MockExchange::new();
    let notifier = RecordingNotifier::new();
    seed(&exchange, "BTC-USDT-SWAP", 60000.0);
    seed(&exchange, "DOGE-USDT-SWAP", 0.2);
    exchange.set_open_orders("BTC-USDT-SWAP", &["stale-1", "stale-2"]);

    let quoter = quoter(&config, &exchange, &notifier);

    // Two cycles: the second must replace what the first placed.
    quoter.run_cycle().await.unwrap();
    let results = quoter.run_cycle().await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].inst_id, "BTC-USDT-SWAP");
    assert_eq!(results[1].inst_id, "DOGE-USDT-SWAP");
    assert_eq!(results[0].replacement.cancels.cancelled, vec!["mock-1"]);

    assert_eq!(exchange.open_orders("BTC-USDT-SWAP"), vec!["mock-3"]);
    assert_eq!(exchange.open_orders("DOGE-USDT-SWAP"), vec!["mock-4"]);
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn test_amplitude_above_floor_sets_discount() {
    let config = test_config();
    let exchange = MockExchange::new();
    seed(&exchange, "BTC-USDT-SWAP", 60000.0);
    seed(&exchange, "DOGE-USDT-SWAP", 0.2);

    let quoter = quoter(&config, &exchange, &RecordingNotifier::new());
    let results = quoter.run_cycle().await.unwrap();

    // amplitude 1%, ATR 600 → ratio 1.0; min is 1% and beats the 0.5% floor
    let pricing = &results[0].pricing;
    assert_eq!(
        pricing.report.map(|r: VolatilityReport| (r.atr.round(), r.average_amplitude_pct.round())),
        Some((600.0, 1.0))
    );
    match &results[0].replacement.outcome {
        ReplaceOutcome::Placed { intent, .. } => {
            assert_eq!(intent.price, dec!(59400));
            assert_eq!(intent.size, dec!(5));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_pair_aborts_cycle_and_notifies() {
    let config = test_config();
    let exchange = MockExchange::with_config(MockConfig {
        fail_list: ["BTC-USDT-SWAP".to_string()].into_iter().collect(),
        ..Default::default()
    });
    let notifier = RecordingNotifier::new();
    seed(&exchange, "BTC-USDT-SWAP", 60000.0);
    seed(&exchange, "DOGE-USDT-SWAP", 0.2);

    let quoter = quoter(&config, &exchange, &notifier);
    let err = quoter.run_cycle().await.unwrap_err();
    assert_eq!(err.step, CycleStep::Cancelling);

    quoter.report_failure(&err).await;

    assert!(exchange.placed().is_empty());
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("BTC-USDT-SWAP failed while cancelling"));
}

#[tokio::test]
async fn test_dry_run_cycle_leaves_book_untouched() {
    let mut config = test_config();
    config.dry_run = true;
    let exchange = MockExchange::new();
    seed(&exchange, "BTC-USDT-SWAP", 60000.0);
    seed(&exchange, "DOGE-USDT-SWAP", 0.2);
    exchange.set_open_orders("BTC-USDT-SWAP", &["resting"]);

    let quoter = quoter(&config, &exchange, &RecordingNotifier::new());
    let results = quoter.run_cycle().await.unwrap();

    assert!(results
        .iter()
        .all(|r| matches!(r.replacement.outcome, ReplaceOutcome::DryRun { .. })));
    assert_eq!(exchange.open_orders("BTC-USDT-SWAP"), vec!["resting"]);
    assert!(exchange.placed().is_empty());
}

#[tokio::test]
async fn test_loop_survives_failures_until_shutdown() {
    let config = test_config();
    let exchange = MockExchange::with_config(MockConfig {
        fail_place: true,
        ..Default::default()
    });
    let notifier = RecordingNotifier::new();
    seed(&exchange, "BTC-USDT-SWAP", 60000.0);
    seed(&exchange, "DOGE-USDT-SWAP", 0.2);

    let quoter = quoter(&config, &exchange, &notifier);
    quoter.run(std::future::ready(())).await;

    assert_eq!(notifier.messages().len(), 1);
    assert!(notifier.messages()[0].contains("placing"));
}

/// Live public endpoints; no credentials needed.
fn public_client() -> OkxClient {
    OkxClient::new(&test_config()).unwrap()
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_live_mark_price() {
    let client = public_client();
    let price = client.mark_price("BTC-USDT-SWAP").await.unwrap();
    println!("BTC-USDT-SWAP last: {}", price);
    assert!(price > 0.0);
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_live_candles_are_oldest_first() {
    let client = public_client();
    let candles = client.candles("BTC-USDT-SWAP", Bar::OneHour, 20).await.unwrap();

    assert_eq!(candles.len(), 20);
    assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

    let report = VolatilityReport::from_candles(&candles, 14, 14).unwrap();
    println!("ATR: {:.2}, amplitude: {:.4}%", report.atr, report.average_amplitude_pct);
    assert!(report.atr > 0.0);
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_live_conversion() {
    let client = public_client();
    let conversion = client
        .convert_to_contracts(&ConversionRequest {
            inst_id: "BTC-USDT-SWAP".to_string(),
            notional: dec!(1000),
            price: dec!(50000),
        })
        .await
        .unwrap();

    println!("Conversion: {:?}", conversion);
    assert!(conversion.is_ok());
    assert!(conversion.size.is_some());
}
