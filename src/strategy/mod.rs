//! Pricing strategy and the quoting loop.
//!
//! Each cycle walks the configured instruments in order:
//! - fetch the mark price and recent candles
//! - estimate ATR and average amplitude
//! - select a discount below mark
//! - replace the resting bid at the discounted price

pub mod discount;
pub mod quoter;
pub mod volatility;

pub use discount::{select_discount, select_discount_with_floor, DiscountPolicy, Quote};
pub use quoter::{PairCycle, Pricing, Quoter, QuoterSettings};
pub use volatility::{compute_atr, compute_average_amplitude, true_range, VolatilityReport};
