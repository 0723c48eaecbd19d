//! Chaikin Money Flow.
//!
//! Per bar: multiplier = ((close - low) - (high - close)) / (high - low), which is
//! undefined on a bar with no range. Over the last `period` bars:
//! sum(multiplier * volume) / sum(volume), in [-1, 1].
//!
//! No value until `period` bars exist, while any bar in the window has an
//! undefined multiplier, or when the window traded no volume.
//! Lookback: period - 1.

use super::window::RollingWindow;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct MoneyFlow {
    period: usize,
    name: String,
}

impl MoneyFlow {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "money flow period must be >= 1");
        Self {
            period,
            name: format!("cmf_{period}"),
        }
    }
}

/// Close location within the bar's range, scaled to [-1, 1].
fn multiplier(bar: &Bar) -> Option<f64> {
    let range = bar.range();
    if range == 0.0 {
        return None;
    }
    Some(((bar.close - bar.low) - (bar.high - bar.close)) / range)
}

impl Indicator for MoneyFlow {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let mut flow = RollingWindow::new(self.period);
        let mut volume = RollingWindow::new(self.period);

        bars.iter()
            .map(|bar| {
                let vol = bar.volume as f64;
                flow.push(multiplier(bar).map(|m| m * vol));
                volume.push(Some(vol));

                if !flow.is_complete() {
                    return None;
                }
                let total_volume = volume.sum(self.period)?;
                if total_volume == 0.0 {
                    return None;
                }
                flow.sum(self.period).map(|f| f / total_volume)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, bar_at, DEFAULT_EPSILON};

    #[test]
    fn close_at_high_is_full_inflow() {
        let bars: Vec<Bar> = (0..4).map(|i| bar_at(i, 10.0, 12.0, 8.0, 12.0, 100)).collect();
        let result = MoneyFlow::new(2).compute(&bars);
        assert!(result[0].is_none());
        for v in &result[1..] {
            assert_approx(v.unwrap(), 1.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn volume_weighted_mix() {
        // bar 0: close at low (-1) with volume 100; bar 1: close mid-range (0) with volume 300
        let bars = vec![
            bar_at(0, 10.0, 12.0, 8.0, 8.0, 100),
            bar_at(1, 10.0, 12.0, 8.0, 10.0, 300),
        ];
        let result = MoneyFlow::new(2).compute(&bars);
        assert_approx(result[1].unwrap(), -100.0 / 400.0, DEFAULT_EPSILON);
    }

    #[test]
    fn zero_range_bar_blanks_its_windows() {
        let bars = vec![
            bar_at(0, 10.0, 12.0, 8.0, 11.0, 100),
            bar_at(1, 10.0, 10.0, 10.0, 10.0, 100),
            bar_at(2, 10.0, 12.0, 8.0, 11.0, 100),
            bar_at(3, 10.0, 12.0, 8.0, 11.0, 100),
        ];
        let result = MoneyFlow::new(2).compute(&bars);
        assert!(result[1].is_none());
        assert!(result[2].is_none());
        assert_approx(result[3].unwrap(), 0.5, DEFAULT_EPSILON);
    }

    #[test]
    fn zero_volume_window_has_no_value() {
        let bars: Vec<Bar> = (0..3).map(|i| bar_at(i, 10.0, 12.0, 8.0, 11.0, 0)).collect();
        assert!(MoneyFlow::new(2).compute(&bars).iter().all(Option::is_none));
    }

    #[test]
    fn bounded_by_one() {
        let bars = crate::indicators::make_bars(&[10.0, 12.0, 11.0, 15.0, 9.0, 9.5, 14.0]);
        for v in MoneyFlow::new(3).compute(&bars).into_iter().flatten() {
            assert!((-1.0..=1.0).contains(&v));
        }
    }
}
