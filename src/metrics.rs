//! Prometheus metrics for the quoting loop.
//!
//! This module provides metrics for:
//! - Cycle outcomes and latency
//! - Order placement, cancellation and conversion results
//! - HTTP request latency per endpoint
//! - The last computed discount and target price per instrument

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{debug, info};

// === Metric Name Constants ===

/// Completed cycles counter metric name.
pub const METRIC_CYCLES: &str = "quoter_cycles_total";
/// Failed cycles counter metric name (labelled by step).
pub const METRIC_CYCLE_FAILURES: &str = "quoter_cycle_failures_total";
/// Cycle latency metric name.
pub const METRIC_CYCLE_LATENCY: &str = "quoter_cycle_latency_ms";
/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";
/// Orders placed counter metric name.
pub const METRIC_ORDERS_PLACED: &str = "orders_placed_total";
/// Orders cancelled counter metric name.
pub const METRIC_ORDERS_CANCELLED: &str = "orders_cancelled_total";
/// Failed cancellations counter metric name.
pub const METRIC_CANCEL_FAILURES: &str = "order_cancel_failures_total";
/// Conversion rejections counter metric name.
pub const METRIC_CONVERSION_REJECTIONS: &str = "conversion_rejections_total";
/// Skipped placements (size rounded to zero) counter metric name.
pub const METRIC_SIZE_TOO_SMALL: &str = "size_too_small_total";
/// Failed notifications counter metric name.
pub const METRIC_NOTIFICATIONS_FAILED: &str = "notifications_failed_total";
/// Selected discount gauge metric name.
pub const METRIC_DISCOUNT_PCT: &str = "quoter_discount_pct";
/// Target price gauge metric name.
pub const METRIC_TARGET_PRICE: &str = "quoter_target_price";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(METRIC_CYCLES, "Total number of completed quoting cycles");
    describe_counter!(METRIC_CYCLE_FAILURES, "Total number of aborted cycles by failing step");
    describe_histogram!(METRIC_CYCLE_LATENCY, "Duration of a full quoting cycle in milliseconds");
    describe_histogram!(METRIC_HTTP_REQUEST_LATENCY, "HTTP request latency in milliseconds");
    describe_counter!(METRIC_ORDERS_PLACED, "Total number of limit orders placed");
    describe_counter!(METRIC_ORDERS_CANCELLED, "Total number of live orders cancelled");
    describe_counter!(METRIC_CANCEL_FAILURES, "Total number of cancellations that failed");
    describe_counter!(
        METRIC_CONVERSION_REJECTIONS,
        "Total number of notional conversions rejected by the exchange"
    );
    describe_counter!(METRIC_SIZE_TOO_SMALL, "Total number of placements skipped for zero size");
    describe_counter!(METRIC_NOTIFICATIONS_FAILED, "Total number of undelivered notifications");
    describe_gauge!(METRIC_DISCOUNT_PCT, "Last selected discount below mark, in percent");
    describe_gauge!(METRIC_TARGET_PRICE, "Last target limit price");

    debug!("Metrics initialized");
}

/// Start the Prometheus scrape endpoint on `port`.
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

/// Record a completed cycle and its latency.
pub fn record_cycle(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_CYCLE_LATENCY).record(latency_ms);
    counter!(METRIC_CYCLES).increment(1);
}

/// Increment failed cycles for a step.
pub fn inc_cycle_failures(step: &str) {
    counter!(METRIC_CYCLE_FAILURES, "step" => step.to_string()).increment(1);
}

/// Record HTTP request latency.
pub fn record_http_latency(start: Instant, endpoint: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "endpoint" => endpoint.to_string()).record(latency_ms);
}

/// Increment orders placed counter.
pub fn inc_orders_placed() {
    counter!(METRIC_ORDERS_PLACED).increment(1);
}

/// Add to the cancelled and failed-cancel counters.
pub fn record_cancellations(cancelled: usize, failed: usize) {
    counter!(METRIC_ORDERS_CANCELLED).increment(cancelled as u64);
    counter!(METRIC_CANCEL_FAILURES).increment(failed as u64);
}

/// Increment conversion rejections counter.
pub fn inc_conversion_rejections() {
    counter!(METRIC_CONVERSION_REJECTIONS).increment(1);
}

/// Increment size-too-small counter.
pub fn inc_size_too_small() {
    counter!(METRIC_SIZE_TOO_SMALL).increment(1);
}

/// Increment failed notifications counter.
pub fn inc_notifications_failed() {
    counter!(METRIC_NOTIFICATIONS_FAILED).increment(1);
}

/// Publish the latest pricing decision for an instrument.
pub fn set_quote(inst_id: &str, discount_pct: f64, target_price: f64) {
    gauge!(METRIC_DISCOUNT_PCT, "inst_id" => inst_id.to_string()).set(discount_pct);
    gauge!(METRIC_TARGET_PRICE, "inst_id" => inst_id.to_string()).set(target_price);
}
