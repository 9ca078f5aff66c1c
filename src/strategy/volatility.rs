//! Volatility measures over a trailing candle window.

use crate::error::IndicatorError;
use crate::market::Candle;

/// Default trailing window for both measures.
pub const DEFAULT_PERIOD: usize = 14;

/// Volatility measures for one instrument in one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityReport {
    /// Average true range, in price units.
    pub atr: f64,
    /// Mean of (high - low) / close, in percent.
    pub average_amplitude_pct: f64,
}

impl VolatilityReport {
    /// Compute both measures from `candles` (oldest first).
    pub fn from_candles(
        candles: &[Candle],
        atr_period: usize,
        amplitude_period: usize,
    ) -> Result<Self, IndicatorError> {
        Ok(Self {
            atr: compute_atr(candles, atr_period)?,
            average_amplitude_pct: compute_average_amplitude(candles, amplitude_period)?,
        })
    }
}

/// True range of `current` given the previous close.
pub fn true_range(current: &Candle, prev_close: f64) -> f64 {
    (current.high - current.low)
        .max((current.high - prev_close).abs())
        .max((current.low - prev_close).abs())
}

/// Average true range over the last `period` bars.
///
/// The sum of the most recent `period` true ranges is always divided by
/// `period`, so with fewer than `period + 1` candles the result is
/// proportionally understated.
pub fn compute_atr(candles: &[Candle], period: usize) -> Result<f64, IndicatorError> {
    if period == 0 || candles.len() < 2 {
        return Err(IndicatorError::InsufficientData {
            required: 2,
            available: candles.len(),
        });
    }

    let ranges: Vec<f64> = candles
        .windows(2)
        .map(|pair| true_range(&pair[1], pair[0].close))
        .collect();

    let start = ranges.len().saturating_sub(period);
    let sum: f64 = ranges[start..].iter().sum();
    Ok(sum / period as f64)
}

/// Mean amplitude, in percent, of the last `period` candles.
pub fn compute_average_amplitude(candles: &[Candle], period: usize) -> Result<f64, IndicatorError> {
    if period == 0 || candles.len() < period {
        return Err(IndicatorError::InsufficientData {
            required: period.max(1),
            available: candles.len(),
        });
    }

    let start = candles.len() - period;
    let mut sum = 0.0;
    for (offset, candle) in candles[start..].iter().enumerate() {
        if !(candle.close > 0.0) {
            return Err(IndicatorError::InvalidCandle {
                index: start + offset,
                reason: format!("close must be positive, got {}", candle.close),
            });
        }
        sum += (candle.high - candle.low) / candle.close * 100.0;
    }
    Ok(sum / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, close, high, low, close, 0.0)
    }

    #[test]
    fn flat_candles_have_zero_volatility() {
        let candles = vec![candle(100.0, 100.0, 100.0); 20];
        assert_eq!(compute_atr(&candles, 14).unwrap(), 0.0);
        assert_eq!(compute_average_amplitude(&candles, 14).unwrap(), 0.0);
    }

    #[test]
    fn atr_single_period() {
        let candles = vec![candle(110.0, 90.0, 100.0), candle(120.0, 80.0, 100.0)];
        assert_eq!(compute_atr(&candles, 1).unwrap(), 40.0);
    }

    #[test]
    fn true_range_uses_gap_from_previous_close() {
        // Gap up: high-low is 2 but the jump from the previous close is 12.
        let current = candle(112.0, 110.0, 111.0);
        assert_eq!(true_range(&current, 100.0), 12.0);
        // Gap down.
        let current = candle(90.0, 88.0, 89.0);
        assert_eq!(true_range(&current, 100.0), 12.0);
    }

    #[test]
    fn atr_averages_only_the_last_period() {
        let candles = vec![
            candle(100.0, 100.0, 100.0),
            candle(200.0, 0.0, 100.0), // TR 200
            candle(101.0, 99.0, 100.0), // TR 2
            candle(101.0, 99.0, 100.0), // TR 2
        ];
        assert_eq!(compute_atr(&candles, 2).unwrap(), 2.0);
        assert_eq!(compute_atr(&candles, 3).unwrap(), 68.0);
    }

    #[test]
    fn atr_divides_by_period_with_short_history() {
        let candles = vec![candle(110.0, 90.0, 100.0), candle(120.0, 80.0, 100.0)];
        // One true range of 40 divided by the literal period.
        assert_eq!(compute_atr(&candles, 14).unwrap(), 40.0 / 14.0);
    }

    #[test]
    fn atr_requires_two_candles() {
        let err = compute_atr(&[candle(1.0, 1.0, 1.0)], 14).unwrap_err();
        assert!(matches!(err, IndicatorError::InsufficientData { available: 1, .. }));
        assert!(compute_atr(&[], 14).is_err());
        assert!(compute_atr(&vec![candle(1.0, 1.0, 1.0); 5], 0).is_err());
    }

    #[test]
    fn atr_is_non_negative() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let base = 100.0 + ((i * 37) % 11) as f64 - 5.0;
                candle(base + 1.5, base - 2.0, base + 0.25)
            })
            .collect();
        for period in 1..20 {
            assert!(compute_atr(&candles, period).unwrap() >= 0.0);
        }
    }

    #[test]
    fn amplitude_uses_last_period_candles() {
        let candles = vec![
            candle(150.0, 50.0, 100.0), // 100%, outside the window
            candle(102.0, 98.0, 100.0), // 4%
            candle(51.0, 49.0, 50.0),   // 4%
        ];
        assert_eq!(compute_average_amplitude(&candles, 2).unwrap(), 4.0);
        assert_eq!(compute_average_amplitude(&candles, 3).unwrap(), 36.0);
    }

    #[test]
    fn amplitude_requires_period_candles() {
        let candles = vec![candle(1.0, 1.0, 1.0); 13];
        let err = compute_average_amplitude(&candles, 14).unwrap_err();
        assert_eq!(
            err,
            IndicatorError::InsufficientData {
                required: 14,
                available: 13
            }
        );
    }

    #[test]
    fn amplitude_rejects_zero_close() {
        let candles = vec![candle(1.0, 0.0, 1.0), candle(1.0, 0.0, 0.0)];
        let err = compute_average_amplitude(&candles, 2).unwrap_err();
        assert!(matches!(err, IndicatorError::InvalidCandle { index: 1, .. }));
    }

    #[test]
    fn report_combines_both_measures() {
        let candles = vec![candle(110.0, 90.0, 100.0), candle(120.0, 80.0, 100.0)];
        let report = VolatilityReport::from_candles(&candles, 1, 2).unwrap();
        assert_eq!(report.atr, 40.0);
        assert_eq!(report.average_amplitude_pct, 30.0);
    }
}
