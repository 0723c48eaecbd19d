//! Composite sentiment score (fear & greed style).
//!
//! Four components, each smoothed and clipped, blended 45/45/5/5:
//! - momentum: 5-bar log return in percent, mean over 7 bars, / 10, clip [-1, 1.5]
//! - position: close within its 52-bar min/max range, mean over 7 bars, * 2 - 1, clip [-1, 1.5]
//! - volume surge: mean5(volume) / mean20(volume) clip [0, 3], mean over 10 bars - 1, clip [-0.5, 1.2]
//! - volatility spike: std5(ret) / std20(ret) clip [0, 3], mean over 10 bars - 1, clip [-0.5, 1.2], negated
//!
//! Every window except the 5-bar momentum lag accepts partial history (at least one
//! present value). The score is missing whenever any component is; in practice that
//! is the first five bars.

use super::window::RollingWindow;
use super::Indicator;
use crate::domain::Bar;

const MOMENTUM_LAG: usize = 5;
const POSITION_WINDOW: usize = 52;
const SURGE_FAST: usize = 5;
const SURGE_SLOW: usize = 20;
const SMOOTH_PRICE: usize = 7;
const SMOOTH_VOLUME: usize = 10;

const WEIGHT_MOMENTUM: f64 = 0.45;
const WEIGHT_POSITION: f64 = 0.45;
const WEIGHT_SURGE: f64 = 0.05;
const WEIGHT_SPIKE: f64 = 0.05;

#[derive(Debug, Clone, Default)]
pub struct Sentiment;

impl Sentiment {
    pub fn new() -> Self {
        Self
    }
}

/// `num / den` clipped to `[lo, hi]`.
///
/// A zero denominator yields `hi` for a positive numerator, `lo` for a negative
/// one, and no value for `0 / 0`.
fn clipped_ratio(num: f64, den: f64, lo: f64, hi: f64) -> Option<f64> {
    if den == 0.0 {
        return if num > 0.0 {
            Some(hi)
        } else if num < 0.0 {
            Some(lo)
        } else {
            None
        };
    }
    Some((num / den).clamp(lo, hi))
}

/// Running state for one pass over the bars.
struct SentimentState {
    closes: Vec<f64>,
    range: RollingWindow,
    vol_fast: RollingWindow,
    vol_slow: RollingWindow,
    ret_fast: RollingWindow,
    ret_slow: RollingWindow,
    momentum: RollingWindow,
    position: RollingWindow,
    surge: RollingWindow,
    spike: RollingWindow,
}

impl SentimentState {
    fn new(capacity: usize) -> Self {
        Self {
            closes: Vec::with_capacity(capacity),
            range: RollingWindow::new(POSITION_WINDOW),
            vol_fast: RollingWindow::new(SURGE_FAST),
            vol_slow: RollingWindow::new(SURGE_SLOW),
            ret_fast: RollingWindow::new(SURGE_FAST),
            ret_slow: RollingWindow::new(SURGE_SLOW),
            momentum: RollingWindow::new(SMOOTH_PRICE),
            position: RollingWindow::new(SMOOTH_PRICE),
            surge: RollingWindow::new(SMOOTH_VOLUME),
            spike: RollingWindow::new(SMOOTH_VOLUME),
        }
    }

    fn step(&mut self, bar: &Bar) -> Option<f64> {
        let close = bar.close;
        let t = self.closes.len();
        self.closes.push(close);

        // Momentum
        let mom = if t >= MOMENTUM_LAG {
            let past = self.closes[t - MOMENTUM_LAG];
            (close > 0.0 && past > 0.0).then(|| (close.ln() - past.ln()) * 100.0)
        } else {
            None
        };
        self.momentum.push(mom);

        // 52-bar position
        self.range.push(Some(close));
        let pos = match (self.range.min(), self.range.max()) {
            (Some(lo), Some(hi)) => clipped_ratio(close - lo, hi - lo, 0.0, 1.0),
            _ => None,
        };
        self.position.push(pos);

        // Volume surge
        let vol = bar.volume as f64;
        self.vol_fast.push(Some(vol));
        self.vol_slow.push(Some(vol));
        let surge = match (self.vol_fast.mean(1), self.vol_slow.mean(1)) {
            (Some(fast), Some(slow)) => clipped_ratio(fast, slow, 0.0, 3.0),
            _ => None,
        };
        self.surge.push(surge);

        // Volatility spike
        let ret = if t >= 1 {
            let prev = self.closes[t - 1];
            (prev != 0.0).then(|| (close - prev) / prev)
        } else {
            None
        };
        self.ret_fast.push(ret);
        self.ret_slow.push(ret);
        let spike = match (self.ret_fast.std(1), self.ret_slow.std(1)) {
            (Some(fast), Some(slow)) => clipped_ratio(fast, slow, 0.0, 3.0),
            _ => None,
        };
        self.spike.push(spike);

        let m = (self.momentum.mean(1)? / 10.0).clamp(-1.0, 1.5);
        let p = (2.0 * self.position.mean(1)? - 1.0).clamp(-1.0, 1.5);
        let v = (self.surge.mean(1)? - 1.0).clamp(-0.5, 1.2);
        let vs = -(self.spike.mean(1)? - 1.0).clamp(-0.5, 1.2);

        Some(WEIGHT_MOMENTUM * m + WEIGHT_POSITION * p + WEIGHT_SURGE * v + WEIGHT_SPIKE * vs)
    }
}

impl Indicator for Sentiment {
    fn name(&self) -> &str {
        "sentiment"
    }

    fn lookback(&self) -> usize {
        MOMENTUM_LAG
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let mut state = SentimentState::new(bars.len());
        bars.iter().map(|bar| state.step(bar)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn clipped_ratio_edges() {
        assert_eq!(clipped_ratio(1.0, 0.0, 0.0, 3.0), Some(3.0));
        assert_eq!(clipped_ratio(0.0, 0.0, 0.0, 3.0), None);
        assert_eq!(clipped_ratio(10.0, 2.0, 0.0, 3.0), Some(3.0));
        assert_eq!(clipped_ratio(1.0, 2.0, 0.0, 3.0), Some(0.5));
    }

    #[test]
    fn warmup_is_five_bars() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let result = Sentiment::new().compute(&make_bars(&closes));
        assert!(result[..MOMENTUM_LAG].iter().all(Option::is_none));
        assert!(result[MOMENTUM_LAG..].iter().all(Option::is_some));
    }

    #[test]
    fn steady_uptrend_is_greedy() {
        // Alternating +3% / +1% gains: every close is a new high (p = 1) and the
        // 5-bar momentum is about 9-11%, so m is close to 1. Volume is flat (v = 0)
        // and the volatility term contributes at most 0.05 * 1.2 either way.
        let mut closes = vec![100.0];
        for i in 1..60 {
            let gain = if i % 2 == 0 { 1.03 } else { 1.01 };
            closes.push(closes[i - 1] * gain);
        }
        let result = Sentiment::new().compute(&make_bars(&closes));
        let last = result.last().copied().flatten().unwrap();
        assert!(last > 0.8 && last < 0.95, "{last}");
    }

    #[test]
    fn flat_volume_gives_neutral_surge() {
        let closes: Vec<f64> = (0..25).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let mut state = SentimentState::new(bars.len());
        for bar in &bars {
            state.step(bar);
        }
        assert_approx(state.surge.mean(1).unwrap(), 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bounded_range() {
        let closes: Vec<f64> = (0..80)
            .map(|i| 50.0 + (i as f64 * 0.3).cos() * 20.0 + i as f64 * 0.1)
            .collect();
        for v in Sentiment::new().compute(&make_bars(&closes)).into_iter().flatten() {
            assert!((-1.0 - DEFAULT_EPSILON..=1.5 + DEFAULT_EPSILON).contains(&v), "{v}");
        }
    }
}
