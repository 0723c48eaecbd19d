//! Indicator implementations and the per-bar indicator table.
//!
//! Single-series indicators implement [`Indicator`] and are precomputed once over
//! the whole series. `augment` assembles them (plus the optional setup counts and
//! trend classifier) into an [`IndicatorSeries`] that the signal generator reads.

pub mod augment;
pub mod ema;
pub mod impulse;
pub mod money_flow;
pub mod sentiment;
pub mod setup;
pub mod sma;
pub mod window;

pub use augment::{augment, augment_full, FullIndicators, IndicatorParams, IndicatorRow, IndicatorSeries};
pub use ema::Ema;
pub use impulse::{Impulse, TrendState};
pub use money_flow::MoneyFlow;
pub use sentiment::Sentiment;
pub use setup::SetupCount;
pub use sma::Sma;

use crate::domain::Bar;

/// An indicator computed over a full bar history.
///
/// `compute` returns one value per bar. `None` marks bars where the indicator is
/// undefined (warmup, degenerate input). Values at index `t` depend only on
/// `bars[..=t]`.
pub trait Indicator: Send + Sync {
    fn name(&self) -> &str;

    /// Number of leading bars that are always `None`.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>>;
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for first bar), high = max(open, close) + 1.0,
/// low = min(open, close) - 1.0, volume = 1000, consecutive daily dates.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            bar_at(i, open, high, low, close, 1000)
        })
        .collect()
}

/// One test bar dated `i` days after 2024-01-02.
#[cfg(test)]
pub fn bar_at(i: usize, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Bar {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    Bar {
        date: base_date + chrono::Duration::days(i as i64),
        open,
        high,
        low,
        close,
        volume,
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
