//! Order replacement: cancel every live order, then place one new bid.
//!
//! Cancel and place are separate requests. If the cycle fails between them
//! the instrument has no resting order until the next cycle places one.

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use super::order::{OrderIntent, TradeMode};
use super::{ConversionRequest, TradingApi};
use crate::error::{CycleError, CycleStep, TradingError};
use crate::metrics;
use crate::notify::{alert, Notifier};

/// What one replacement is asked to do.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceRequest {
    /// Instrument id.
    pub inst_id: String,
    /// Limit price for the new bid.
    pub target_price: Decimal,
    /// USDT notional to convert into contracts.
    pub amount_usdt: Decimal,
    /// Trade mode for the new order.
    pub trade_mode: TradeMode,
    /// Log the order instead of cancelling/placing.
    pub dry_run: bool,
}

/// Result of the cancel-all step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CancelReport {
    /// Order ids cancelled.
    pub cancelled: Vec<String>,
    /// Order ids that could not be cancelled, with the reason.
    pub failed: Vec<(String, String)>,
}

impl CancelReport {
    /// Whether every listed order was cancelled.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// How a replacement ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplaceOutcome {
    /// A new order rests on the book.
    Placed {
        /// Exchange order id.
        order_id: String,
        /// The order that was placed.
        intent: OrderIntent,
    },
    /// The exchange refused to convert the notional; nothing was placed.
    ConversionRejected {
        /// OKX code.
        code: String,
        /// OKX message.
        msg: String,
    },
    /// The notional converts to zero contracts; nothing was placed.
    SizeTooSmall,
    /// Dry run: the order that would have been placed.
    DryRun {
        /// The order that would have been placed.
        intent: OrderIntent,
    },
}

/// Outcome of [`replace_order`].
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    /// Cancel-all result (empty in dry run).
    pub cancels: CancelReport,
    /// Placement result.
    pub outcome: ReplaceOutcome,
}

/// Cancel every live order for `inst_id`.
///
/// Listing failures abort; individual cancel failures are recorded and the
/// remaining cancels are still attempted.
#[instrument(skip(trading))]
pub async fn cancel_all_orders(trading: &dyn TradingApi, inst_id: &str) -> Result<CancelReport, TradingError> {
    let order_ids = trading.open_order_ids(inst_id).await?;

    let mut report = CancelReport::default();
    for order_id in order_ids {
        match trading.cancel_order(inst_id, &order_id).await {
            Ok(()) => report.cancelled.push(order_id),
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "Cancel failed, continuing");
                report.failed.push((order_id, e.to_string()));
            }
        }
    }

    metrics::record_cancellations(report.cancelled.len(), report.failed.len());
    info!(
        cancelled = report.cancelled.len(),
        failed = report.failed.len(),
        "Cancelled open orders"
    );

    Ok(report)
}

/// Replace the resting bid for one instrument.
#[instrument(skip(trading, notifier, request), fields(inst_id = %request.inst_id, px = %request.target_price))]
pub async fn replace_order(
    trading: &dyn TradingApi,
    notifier: &dyn Notifier,
    request: &ReplaceRequest,
) -> Result<Replacement, CycleError> {
    let inst_id = request.inst_id.as_str();
    let fail = |step: CycleStep| move |e: TradingError| CycleError::new(inst_id, step, e);

    let cancels = if request.dry_run {
        CancelReport::default()
    } else {
        cancel_all_orders(trading, inst_id)
            .await
            .map_err(fail(CycleStep::Cancelling))?
    };

    let conversion = trading
        .convert_to_contracts(&ConversionRequest {
            inst_id: inst_id.to_string(),
            notional: request.amount_usdt,
            price: request.target_price,
        })
        .await
        .map_err(fail(CycleStep::Converting))?;

    if !conversion.is_ok() {
        metrics::inc_conversion_rejections();
        alert(
            notifier,
            &format!("{} contract conversion failed: {}", inst_id, conversion.msg),
        )
        .await;
        return Ok(Replacement {
            cancels,
            outcome: ReplaceOutcome::ConversionRejected {
                code: conversion.code,
                msg: conversion.msg,
            },
        });
    }

    let size = conversion.size.ok_or_else(|| {
        CycleError::new(
            inst_id,
            CycleStep::Converting,
            TradingError::ConversionFailed("response has no sz".to_string()),
        )
    })?;

    if size <= Decimal::ZERO {
        metrics::inc_size_too_small();
        info!(amount_usdt = %request.amount_usdt, "Converted size too small, skipping");
        return Ok(Replacement {
            cancels,
            outcome: ReplaceOutcome::SizeTooSmall,
        });
    }

    let intent = OrderIntent::limit_buy(inst_id, request.target_price, size).with_trade_mode(request.trade_mode);

    if request.dry_run {
        info!(sz = %intent.size, px = %intent.price, "Dry run, not placing");
        return Ok(Replacement {
            cancels,
            outcome: ReplaceOutcome::DryRun { intent },
        });
    }

    let order_id = trading
        .place_order(&intent)
        .await
        .map_err(fail(CycleStep::Placing))?;

    metrics::inc_orders_placed();
    info!(order_id = %order_id, sz = %intent.size, px = %intent.price, "Placed limit buy");

    Ok(Replacement {
        cancels,
        outcome: ReplaceOutcome::Placed { order_id, intent },
    })
}
