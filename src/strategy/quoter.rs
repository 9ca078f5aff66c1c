//! The quoting loop: fetch, estimate, price and replace, pair by pair.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::config::{Config, PairConfig};
use crate::error::{CycleError, CycleStep};
use crate::market::{Bar, MarketData};
use crate::metrics;
use crate::notify::{alert, Notifier};
use crate::trading::{price_from_f64, replace_order, ReplaceRequest, Replacement, TradeMode, TradingApi};

use super::discount::{DiscountPolicy, Quote};
use super::volatility::VolatilityReport;

/// Loop parameters derived from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoterSettings {
    /// Candle granularity.
    pub bar: Bar,
    /// Candles requested per cycle.
    pub candle_limit: usize,
    /// ATR window.
    pub atr_period: usize,
    /// Amplitude window.
    pub amplitude_period: usize,
    /// Pricing policy.
    pub policy: DiscountPolicy,
    /// Trade mode of new orders.
    pub trade_mode: TradeMode,
    /// Skip cancel/place.
    pub dry_run: bool,
    /// Sleep between cycles.
    pub interval: Duration,
}

impl QuoterSettings {
    /// Settings described by the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            bar: config.bar,
            candle_limit: config.candle_limit,
            atr_period: config.atr_period,
            amplitude_period: config.amplitude_period,
            policy: DiscountPolicy::from_config(config),
            trade_mode: config.trade_mode,
            dry_run: config.dry_run,
            interval: Duration::from_secs(config.monitor_interval),
        }
    }
}

/// Pricing for one instrument, before any order is touched.
#[derive(Debug, Clone, PartialEq)]
pub struct Pricing {
    /// Volatility measures, absent for fixed pricing.
    pub report: Option<VolatilityReport>,
    /// Selected discount and target price.
    pub quote: Quote,
}

/// Result of one instrument's cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PairCycle {
    /// Instrument id.
    pub inst_id: String,
    /// How the order was priced.
    pub pricing: Pricing,
    /// What happened to the orders.
    pub replacement: Replacement,
}

/// Everything a cycle needs, constructed once at startup.
pub struct Quoter {
    market: Arc<dyn MarketData>,
    trading: Arc<dyn TradingApi>,
    notifier: Arc<dyn Notifier>,
    pairs: Vec<PairConfig>,
    settings: QuoterSettings,
}

impl Quoter {
    /// Assemble a quoter from its collaborators.
    pub fn new(
        market: Arc<dyn MarketData>,
        trading: Arc<dyn TradingApi>,
        notifier: Arc<dyn Notifier>,
        pairs: Vec<PairConfig>,
        settings: QuoterSettings,
    ) -> Self {
        Self {
            market,
            trading,
            notifier,
            pairs,
            settings,
        }
    }

    /// Configured instruments, in processing order.
    pub fn pairs(&self) -> &[PairConfig] {
        &self.pairs
    }

    /// Loop settings.
    pub fn settings(&self) -> &QuoterSettings {
        &self.settings
    }

    /// Fetch market data and price a bid for `inst_id`.
    #[instrument(skip(self))]
    pub async fn price(&self, inst_id: &str) -> Result<Pricing, CycleError> {
        let mark_price = self
            .market
            .mark_price(inst_id)
            .await
            .map_err(|e| CycleError::new(inst_id, CycleStep::Fetching, e))?;

        let report = if self.settings.policy.needs_volatility() {
            let candles = self
                .market
                .candles(inst_id, self.settings.bar, self.settings.candle_limit)
                .await
                .map_err(|e| CycleError::new(inst_id, CycleStep::Fetching, e))?;

            let report =
                VolatilityReport::from_candles(&candles, self.settings.atr_period, self.settings.amplitude_period)
                    .map_err(|e| CycleError::new(inst_id, CycleStep::Estimating, e))?;
            Some(report)
        } else {
            None
        };

        let quote = self
            .settings
            .policy
            .quote(mark_price, report.as_ref())
            .map_err(|e| CycleError::new(inst_id, CycleStep::Estimating, e))?;

        if let Some(report) = &report {
            info!(
                mark_price,
                atr = report.atr,
                avg_amplitude_pct = report.average_amplitude_pct,
                discount_pct = quote.discount_pct,
                target_price = quote.target_price,
                "Priced bid"
            );
        } else {
            info!(mark_price, target_price = quote.target_price, "Priced bid at fixed factor");
        }
        metrics::set_quote(inst_id, quote.discount_pct, quote.target_price);

        Ok(Pricing { report, quote })
    }

    /// Price and replace the bid for one instrument.
    pub async fn run_pair(&self, pair: &PairConfig) -> Result<PairCycle, CycleError> {
        let pricing = self.price(&pair.inst_id).await?;

        let target_price = price_from_f64(pricing.quote.target_price)
            .map_err(|e| CycleError::new(&pair.inst_id, CycleStep::Estimating, e))?;

        let request = ReplaceRequest {
            inst_id: pair.inst_id.clone(),
            target_price,
            amount_usdt: pair.amount_usdt,
            trade_mode: self.settings.trade_mode,
            dry_run: self.settings.dry_run,
        };
        let replacement = replace_order(self.trading.as_ref(), self.notifier.as_ref(), &request).await?;

        Ok(PairCycle {
            inst_id: pair.inst_id.clone(),
            pricing,
            replacement,
        })
    }

    /// Run every pair once, in order. The first failure aborts the rest.
    pub async fn run_cycle(&self) -> Result<Vec<PairCycle>, CycleError> {
        let mut results = Vec::with_capacity(self.pairs.len());
        for pair in &self.pairs {
            results.push(self.run_pair(pair).await?);
        }
        Ok(results)
    }

    /// Log, count and notify a failed cycle.
    pub async fn report_failure(&self, err: &CycleError) {
        metrics::inc_cycle_failures(&err.step.to_string());
        let retry = if err.is_retryable() {
            format!("retrying in {}s", self.settings.interval.as_secs())
        } else {
            "will keep failing until fixed".to_string()
        };
        alert(self.notifier.as_ref(), &format!("Cycle aborted: {} ({})", err, retry)).await;
    }

    /// Run cycles until `shutdown` resolves.
    ///
    /// A failed cycle never stops the loop. Shutdown is observed between
    /// cycles only.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            pairs = self.pairs.len(),
            interval_s = self.settings.interval.as_secs(),
            dry_run = self.settings.dry_run,
            "Starting quoting loop"
        );

        loop {
            let start = Instant::now();
            match self.run_cycle().await {
                Ok(results) => {
                    metrics::record_cycle(start);
                    info!(pairs = results.len(), elapsed_ms = start.elapsed().as_millis() as u64, "Cycle complete");
                }
                Err(e) => self.report_failure(&e).await,
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Shutdown requested, leaving resting orders in place");
                    break;
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Candle, MockConfig, MockExchange};
    use crate::notify::RecordingNotifier;
    use crate::trading::ReplaceOutcome;
    use rust_decimal_macros::dec;

    fn settings(policy: DiscountPolicy) -> QuoterSettings {
        QuoterSettings {
            bar: Bar::OneHour,
            candle_limit: 20,
            atr_period: 14,
            amplitude_period: 14,
            policy,
            trade_mode: TradeMode::Cash,
            dry_run: false,
            interval: Duration::from_millis(1),
        }
    }

    fn pair(inst_id: &str) -> PairConfig {
        PairConfig {
            inst_id: inst_id.to_string(),
            amount_usdt: dec!(20),
        }
    }

    fn seed(exchange: &MockExchange, inst_id: &str, price: f64) {
        exchange.set_price(inst_id, price);
        exchange.set_candles(
            inst_id,
            (0..20)
                .map(|i| Candle::new(i, price, price * 1.002, price * 0.998, price, 1.0))
                .collect(),
        );
    }

    fn quoter(exchange: &MockExchange, notifier: &RecordingNotifier, pairs: &[&str]) -> Quoter {
        Quoter::new(
            Arc::new(exchange.clone()),
            Arc::new(exchange.clone()),
            Arc::new(notifier.clone()),
            pairs.iter().map(|p| pair(p)).collect(),
            settings(DiscountPolicy::default()),
        )
    }

    #[tokio::test]
    async fn prices_with_floor_discount() {
        let exchange = MockExchange::new();
        seed(&exchange, "BTC-USDT-SWAP", 100.0);
        let quoter = quoter(&exchange, &RecordingNotifier::new(), &["BTC-USDT-SWAP"]);

        let pricing = quoter.price("BTC-USDT-SWAP").await.unwrap();

        // amplitude 0.4%, ratio huge -> floor 0.5%
        let report = pricing.report.unwrap();
        assert!((report.average_amplitude_pct - 0.4).abs() < 1e-9);
        assert_eq!(pricing.quote.price_factor, 0.995);
    }

    #[tokio::test]
    async fn cycle_places_one_order_per_pair() {
        let exchange = MockExchange::new();
        seed(&exchange, "BTC-USDT-SWAP", 100.0);
        seed(&exchange, "ETH-USDT-SWAP", 10.0);
        exchange.set_open_orders("BTC-USDT-SWAP", &["a", "b"]);
        let quoter = quoter(&exchange, &RecordingNotifier::new(), &["BTC-USDT-SWAP", "ETH-USDT-SWAP"]);

        let results = quoter.run_cycle().await.unwrap();

        assert_eq!(results.len(), 2);
        let placed = exchange.placed();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].price, dec!(99.5));
        assert_eq!(placed[1].price, dec!(9.95));
        assert_eq!(exchange.open_orders("BTC-USDT-SWAP").len(), 1);
    }

    #[tokio::test]
    async fn failure_aborts_remaining_pairs() {
        let config = MockConfig {
            fail_price: ["ETH-USDT-SWAP".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let exchange = MockExchange::with_config(config);
        for inst in ["BTC-USDT-SWAP", "ETH-USDT-SWAP", "SOL-USDT-SWAP"] {
            seed(&exchange, inst, 100.0);
        }
        let quoter = quoter(
            &exchange,
            &RecordingNotifier::new(),
            &["BTC-USDT-SWAP", "ETH-USDT-SWAP", "SOL-USDT-SWAP"],
        );

        let err = quoter.run_cycle().await.unwrap_err();

        assert_eq!(err.inst_id, "ETH-USDT-SWAP");
        assert_eq!(err.step, CycleStep::Fetching);
        let placed: Vec<_> = exchange.placed().into_iter().map(|o| o.inst_id).collect();
        assert_eq!(placed, vec!["BTC-USDT-SWAP"]);
    }

    #[tokio::test]
    async fn short_history_fails_in_estimating() {
        let exchange = MockExchange::new();
        exchange.set_price("BTC-USDT-SWAP", 100.0);
        exchange.set_candles("BTC-USDT-SWAP", vec![Candle::new(0, 1.0, 1.0, 1.0, 1.0, 1.0)]);
        let quoter = quoter(&exchange, &RecordingNotifier::new(), &["BTC-USDT-SWAP"]);

        let err = quoter.run_cycle().await.unwrap_err();

        assert_eq!(err.step, CycleStep::Estimating);
        assert!(exchange.calls().is_empty());
    }

    #[tokio::test]
    async fn conversion_rejection_does_not_abort_other_pairs() {
        let exchange = MockExchange::new();
        seed(&exchange, "BTC-USDT-SWAP", 100.0);
        seed(&exchange, "ETH-USDT-SWAP", 100.0);
        exchange.set_conversion("BTC-USDT-SWAP", "51001", "Instrument ID does not exist", None);
        let notifier = RecordingNotifier::new();
        let quoter = quoter(&exchange, &notifier, &["BTC-USDT-SWAP", "ETH-USDT-SWAP"]);

        let results = quoter.run_cycle().await.unwrap();

        assert!(matches!(
            results[0].replacement.outcome,
            ReplaceOutcome::ConversionRejected { .. }
        ));
        assert!(matches!(results[1].replacement.outcome, ReplaceOutcome::Placed { .. }));
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn fixed_policy_skips_candles() {
        let exchange = MockExchange::new();
        exchange.set_price("CTC-USDT-SWAP", 2.0);
        let notifier = RecordingNotifier::new();
        let quoter = Quoter::new(
            Arc::new(exchange.clone()),
            Arc::new(exchange.clone()),
            Arc::new(notifier),
            vec![pair("CTC-USDT-SWAP")],
            settings(DiscountPolicy::Fixed { price_factor: 0.99 }),
        );

        let results = quoter.run_cycle().await.unwrap();

        assert!(results[0].pricing.report.is_none());
        assert_eq!(exchange.placed()[0].price, dec!(1.98));
    }

    #[tokio::test]
    async fn failed_cycle_is_notified_and_loop_stops_on_shutdown() {
        let config = MockConfig {
            fail_price: ["BTC-USDT-SWAP".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let exchange = MockExchange::with_config(config);
        let notifier = RecordingNotifier::new();
        let quoter = quoter(&exchange, &notifier, &["BTC-USDT-SWAP"]);

        quoter.run(std::future::ready(())).await;

        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("BTC-USDT-SWAP failed while fetching"));
        assert!(messages[0].contains("retrying"));
    }
}
