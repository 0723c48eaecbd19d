//! Exponential Moving Average (EMA), span form.
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (span + 1).
//! Seed: EMA[0] = x[0], so the series is defined from the first bar.
//! Lookback: 0.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    span: usize,
    name: String,
}

impl Ema {
    pub fn new(span: usize) -> Self {
        assert!(span >= 1, "EMA span must be >= 1");
        Self {
            span,
            name: format!("ema_{span}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        ema_of_series(&closes, self.span).into_iter().map(Some).collect()
    }
}

/// EMA of an arbitrary series. Used by the trend classifier for MACD and its signal line.
pub fn ema_of_series(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn ema_span_1_equals_close() {
        let bars = make_bars(&[100.0, 200.0, 300.0]);
        let result = Ema::new(1).compute(&bars);
        assert_eq!(result, vec![Some(100.0), Some(200.0), Some(300.0)]);
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5, seeded with the first value
        // 10 → 10, 12 → 11, 14 → 12.5, 10 → 11.25
        let result = ema_of_series(&[10.0, 12.0, 14.0, 10.0], 3);
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 11.0, DEFAULT_EPSILON);
        assert_approx(result[2], 12.5, DEFAULT_EPSILON);
        assert_approx(result[3], 11.25, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_of_empty_series() {
        assert!(ema_of_series(&[], 13).is_empty());
    }

    #[test]
    fn ema_indicator_matches_series_helper() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let from_indicator = Ema::new(4).compute(&bars);
        let from_series = ema_of_series(&closes, 4);
        for (a, b) in from_indicator.iter().zip(from_series) {
            assert_approx(a.unwrap(), b, DEFAULT_EPSILON);
        }
    }
}
