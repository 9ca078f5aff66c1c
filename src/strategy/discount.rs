//! Discount selection: how far below mark the bid rests.

use crate::config::{Config, PricingMode};
use crate::error::IndicatorError;

use super::volatility::VolatilityReport;

/// Default minimum discount, in percentage points.
pub const DEFAULT_FLOOR_PCT: f64 = 0.5;

/// Price factor of the fixed pricing mode.
pub const DEFAULT_FIXED_PRICE_FACTOR: f64 = 0.99;

/// Pricing decision for one instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    /// Mark price the quote is anchored to.
    pub mark_price: f64,
    /// Discount below mark, in percent.
    pub discount_pct: f64,
    /// `1 - discount_pct / 100`.
    pub price_factor: f64,
    /// `mark_price * price_factor`.
    pub target_price: f64,
}

/// Turns a mark price (and volatility) into a limit price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiscountPolicy {
    /// Discount from the smaller volatility signal, floored.
    Volatility {
        /// Minimum discount, in percentage points.
        floor_pct: f64,
    },
    /// Constant price factor regardless of volatility.
    Fixed {
        /// Multiplier applied to mark.
        price_factor: f64,
    },
}

impl Default for DiscountPolicy {
    fn default() -> Self {
        DiscountPolicy::Volatility {
            floor_pct: DEFAULT_FLOOR_PCT,
        }
    }
}

impl DiscountPolicy {
    /// Policy described by the configuration.
    pub fn from_config(config: &Config) -> Self {
        match config.pricing {
            PricingMode::Volatility => DiscountPolicy::Volatility {
                floor_pct: config.discount_floor_pct,
            },
            PricingMode::Fixed => DiscountPolicy::Fixed {
                price_factor: config.fixed_price_factor,
            },
        }
    }

    /// Whether candles are needed to price.
    pub fn needs_volatility(&self) -> bool {
        matches!(self, DiscountPolicy::Volatility { .. })
    }

    /// Price a bid below `mark_price`.
    ///
    /// `report` is ignored by [`DiscountPolicy::Fixed`].
    pub fn quote(&self, mark_price: f64, report: Option<&VolatilityReport>) -> Result<Quote, IndicatorError> {
        if !(mark_price.is_finite() && mark_price > 0.0) {
            return Err(IndicatorError::InvalidDiscount(format!(
                "mark price must be positive, got {}",
                mark_price
            )));
        }

        let price_factor = match *self {
            DiscountPolicy::Volatility { floor_pct } => {
                let report = report.ok_or_else(|| {
                    IndicatorError::InvalidDiscount("volatility pricing needs a report".to_string())
                })?;
                select_discount_with_floor(mark_price, report.atr, report.average_amplitude_pct, floor_pct)?
            }
            DiscountPolicy::Fixed { price_factor } => {
                if !(price_factor > 0.0 && price_factor <= 1.0) {
                    return Err(IndicatorError::InvalidDiscount(format!(
                        "price factor {} outside (0, 1]",
                        price_factor
                    )));
                }
                price_factor
            }
        };

        Ok(Quote {
            mark_price,
            discount_pct: (1.0 - price_factor) * 100.0,
            price_factor,
            target_price: mark_price * price_factor,
        })
    }
}

/// Price factor from mark price, ATR and average amplitude, floored at 0.5%.
pub fn select_discount(mark_price: f64, atr: f64, average_amplitude_pct: f64) -> Result<f64, IndicatorError> {
    select_discount_with_floor(mark_price, atr, average_amplitude_pct, DEFAULT_FLOOR_PCT)
}

/// Price factor from mark price, ATR and average amplitude.
///
/// `ratio = mark / atr / 100`; the selected discount is
/// `max(min(amplitude, ratio), floor)` and the factor is `1 - selected / 100`.
/// With any realistic price the ratio is large, so the amplitude is selected
/// and the floor only applies when the amplitude is below it.
pub fn select_discount_with_floor(
    mark_price: f64,
    atr: f64,
    average_amplitude_pct: f64,
    floor_pct: f64,
) -> Result<f64, IndicatorError> {
    if atr.is_nan() || atr < 0.0 || average_amplitude_pct.is_nan() || average_amplitude_pct < 0.0 {
        return Err(IndicatorError::InvalidDiscount(format!(
            "volatility must be non-negative, got atr={} amplitude={}",
            atr, average_amplitude_pct
        )));
    }

    // atr == 0 gives an infinite ratio, so min() falls back to the amplitude.
    let ratio = (mark_price / atr) / 100.0;
    let selected = average_amplitude_pct.min(ratio).max(floor_pct);

    if !(selected < 100.0) {
        return Err(IndicatorError::InvalidDiscount(format!(
            "selected discount {}% leaves no positive price",
            selected
        )));
    }

    Ok(1.0 - selected / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_binds_when_both_signals_are_small() {
        let factor = select_discount(100.0, 50.0, 0.4).unwrap();
        assert_eq!(factor, 0.995);
    }

    #[test]
    fn amplitude_wins_when_ratio_is_larger() {
        // ratio = (60000 / 300) / 100 = 2.0, amplitude 1.2 → 1.2
        let factor = select_discount(60000.0, 300.0, 1.2).unwrap();
        assert!((factor - 0.988).abs() < 1e-12);
    }

    #[test]
    fn ratio_wins_when_smaller_than_amplitude() {
        // ratio = (100 / 0.5) / 100 = 2.0, amplitude 3 → 2.0
        let factor = select_discount(100.0, 0.5, 3.0).unwrap();
        assert!((factor - 0.98).abs() < 1e-12);
    }

    #[test]
    fn zero_atr_falls_back_to_amplitude() {
        let factor = select_discount(100.0, 0.0, 2.0).unwrap();
        assert!((factor - 0.98).abs() < 1e-12);
        // Flat market: both signals zero, floor applies.
        assert_eq!(select_discount(100.0, 0.0, 0.0).unwrap(), 0.995);
    }

    #[test]
    fn factor_stays_in_unit_interval() {
        for &(mark, atr, amp) in &[
            (0.0001, 0.00001, 0.01),
            (1.0, 0.5, 50.0),
            (65000.0, 850.0, 1.7),
            (3.2, 0.04, 99.0),
            (1e9, 1e-9, 0.0),
        ] {
            let factor = select_discount(mark, atr, amp).unwrap();
            assert!(factor > 0.0 && factor <= 1.0, "{} {} {} -> {}", mark, atr, amp, factor);
        }
    }

    #[test]
    fn discount_of_one_hundred_percent_is_rejected() {
        assert!(select_discount_with_floor(100.0, 0.0, 150.0, 0.5).is_err());
        assert!(select_discount(100.0, -1.0, 1.0).is_err());
    }

    #[test]
    fn realistic_prices_select_amplitude_above_floor() {
        // BTC-like: ratio = (65000 / 850) / 100 ≈ 0.76, amplitude 0.6 → 0.6
        let factor = select_discount(65000.0, 850.0, 0.6).unwrap();
        assert!((factor - 0.994).abs() < 1e-12);
        // Same market, quieter candles: amplitude 0.3 is floored to 0.5
        assert_eq!(select_discount(65000.0, 850.0, 0.3).unwrap(), 0.995);
    }

    #[test]
    fn custom_floor() {
        let factor = select_discount_with_floor(100.0, 50.0, 0.4, 0.0).unwrap();
        // ratio 0.02 is the smaller signal and no floor applies
        assert!((factor - 0.9998).abs() < 1e-12);
    }

    #[test]
    fn volatility_policy_quotes_target_price() {
        let report = VolatilityReport {
            atr: 50.0,
            average_amplitude_pct: 0.4,
        };
        let quote = DiscountPolicy::default().quote(100.0, Some(&report)).unwrap();
        assert_eq!(quote.price_factor, 0.995);
        assert_eq!(quote.target_price, 99.5);
        assert!((quote.discount_pct - 0.5).abs() < 1e-9);
    }

    #[test]
    fn volatility_policy_requires_report() {
        assert!(DiscountPolicy::default().quote(100.0, None).is_err());
    }

    #[test]
    fn fixed_policy_ignores_volatility() {
        let policy = DiscountPolicy::Fixed {
            price_factor: DEFAULT_FIXED_PRICE_FACTOR,
        };
        assert!(!policy.needs_volatility());
        let quote = policy.quote(200.0, None).unwrap();
        assert_eq!(quote.target_price, 198.0);
    }

    #[test]
    fn non_positive_mark_is_rejected() {
        assert!(DiscountPolicy::default().quote(0.0, None).is_err());
        let fixed = DiscountPolicy::Fixed { price_factor: 0.99 };
        assert!(fixed.quote(f64::NAN, None).is_err());
    }
}
