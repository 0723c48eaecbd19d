//! Signal stage: raw buy/sell rules plus the position-gated exit filter.
//!
//! Raw signals are stateless per-bar predicates over the indicator row. The
//! actual-exit filter carries one flag (in position or not) and only exists to
//! mark which sells would close a position. The backtest engine never reads it;
//! it replays the raw stream through its own state machine.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, BarSeries, SeriesError, Timeframe};
use crate::indicators::{IndicatorRow, IndicatorSeries};

/// Signal flags for one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub buy: bool,
    pub sell: bool,
    /// A sell that closes a position opened by an earlier buy.
    pub actual_sell: bool,
}

/// Strict `a > b`; false when either side is missing.
fn gt(a: f64, b: Option<f64>) -> bool {
    b.is_some_and(|b| a > b)
}

fn lt(a: f64, b: Option<f64>) -> bool {
    b.is_some_and(|b| a < b)
}

/// Breakout above the prior high, close above the average, money flowing in.
pub fn is_buy(bar: &Bar, row: &IndicatorRow) -> bool {
    gt(bar.high, row.prev_high) && gt(bar.close, row.ma) && row.money_flow.is_some_and(|mf| mf > 0.0)
}

/// Breakdown below the prior low, close below the average, money flowing out.
pub fn is_sell(bar: &Bar, row: &IndicatorRow) -> bool {
    lt(bar.low, row.prev_low) && lt(bar.close, row.ma) && row.money_flow.is_some_and(|mf| mf < 0.0)
}

/// Mark the sells that close a position, scanning from bar 1.
fn actual_exits(raw: &[(bool, bool)]) -> Vec<bool> {
    let mut out = vec![false; raw.len()];
    let mut in_position = false;
    for (t, &(buy, sell)) in raw.iter().enumerate().skip(1) {
        if !in_position && buy {
            in_position = true;
        } else if in_position && sell {
            out[t] = true;
            in_position = false;
        }
    }
    out
}

fn combine(raw: &[(bool, bool)]) -> Vec<Signal> {
    let exits = actual_exits(raw);
    raw.iter()
        .zip(exits)
        .map(|(&(buy, sell), actual_sell)| Signal {
            buy,
            sell,
            actual_sell,
        })
        .collect()
}

/// Indicator series with one [`Signal`] per bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSeries {
    indicators: IndicatorSeries,
    signals: Vec<Signal>,
}

impl SignalSeries {
    /// Scripted raw `(buy, sell)` flags over a plain bar series.
    ///
    /// The exit filter is applied the same way as for generated signals.
    pub fn from_raw(series: BarSeries, raw: Vec<(bool, bool)>) -> Result<Self, SeriesError> {
        if raw.len() != series.len() {
            return Err(SeriesError::LengthMismatch {
                bars: series.len(),
                other: raw.len(),
                what: "signals",
            });
        }
        Ok(Self {
            signals: combine(&raw),
            indicators: IndicatorSeries::bare(series),
        })
    }

    pub fn indicators(&self) -> &IndicatorSeries {
        &self.indicators
    }

    pub fn bars(&self) -> &[Bar] {
        self.indicators.bars()
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn timeframe(&self) -> Timeframe {
        self.indicators.timeframe()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Bars, indicator rows and signals, in date order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bar, &IndicatorRow, &Signal)> {
        self.indicators
            .iter()
            .zip(&self.signals)
            .map(|((bar, row), signal)| (bar, row, signal))
    }

    pub fn buy_count(&self) -> usize {
        self.signals.iter().filter(|s| s.buy).count()
    }

    pub fn sell_count(&self) -> usize {
        self.signals.iter().filter(|s| s.sell).count()
    }
}

/// Evaluate the buy/sell rules on every bar and apply the exit filter.
pub fn generate_signals(indicators: IndicatorSeries) -> SignalSeries {
    let raw: Vec<(bool, bool)> = indicators
        .iter()
        .map(|(bar, row)| (is_buy(bar, row), is_sell(bar, row)))
        .collect();
    SignalSeries {
        signals: combine(&raw),
        indicators,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{augment, make_bars, IndicatorParams};

    fn bars_series(n: usize) -> BarSeries {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        BarSeries::new(Timeframe::Weekly, make_bars(&closes)).unwrap()
    }

    fn row(ma: f64, money_flow: f64, prev_high: f64, prev_low: f64) -> IndicatorRow {
        IndicatorRow {
            ma: Some(ma),
            money_flow: Some(money_flow),
            prev_high: Some(prev_high),
            prev_low: Some(prev_low),
            ..IndicatorRow::default()
        }
    }

    #[test]
    fn buy_rule_needs_all_three_conditions() {
        let bar = crate::indicators::bar_at(0, 10.0, 12.0, 9.0, 11.0, 100);
        assert!(is_buy(&bar, &row(10.0, 0.2, 11.5, 8.0)));
        assert!(!is_buy(&bar, &row(10.0, 0.2, 12.0, 8.0)), "equal high is not a breakout");
        assert!(!is_buy(&bar, &row(11.0, 0.2, 11.5, 8.0)), "close must exceed the average");
        assert!(!is_buy(&bar, &row(10.0, 0.0, 11.5, 8.0)), "money flow must be positive");
    }

    #[test]
    fn sell_rule_mirrors_buy() {
        let bar = crate::indicators::bar_at(0, 10.0, 11.0, 8.0, 9.0, 100);
        assert!(is_sell(&bar, &row(10.0, -0.3, 12.0, 8.5)));
        assert!(!is_sell(&bar, &row(10.0, 0.3, 12.0, 8.5)));
    }

    #[test]
    fn missing_operand_is_false() {
        let bar = crate::indicators::bar_at(0, 10.0, 12.0, 9.0, 11.0, 100);
        let mut r = row(10.0, 0.2, 11.5, 8.0);
        r.money_flow = None;
        assert!(!is_buy(&bar, &r));
        let r = IndicatorRow::default();
        assert!(!is_buy(&bar, &r) && !is_sell(&bar, &r));
    }

    #[test]
    fn exit_filter_gates_on_position() {
        // sell at 1 (no position), buy at 2, buy at 3, sell at 4, sell at 5
        let raw = vec![
            (false, false),
            (false, true),
            (true, false),
            (true, false),
            (false, true),
            (false, true),
        ];
        let s = SignalSeries::from_raw(bars_series(6), raw).unwrap();
        let actual: Vec<bool> = s.signals().iter().map(|s| s.actual_sell).collect();
        assert_eq!(actual, vec![false, false, false, false, true, false]);
    }

    #[test]
    fn exit_filter_ignores_bar_zero() {
        let raw = vec![(true, false), (false, true), (true, false), (false, true)];
        let s = SignalSeries::from_raw(bars_series(4), raw).unwrap();
        let actual: Vec<bool> = s.signals().iter().map(|s| s.actual_sell).collect();
        assert_eq!(actual, vec![false, false, false, true]);
    }

    #[test]
    fn buy_and_sell_on_same_bar_opens_only() {
        let raw = vec![(false, false), (true, true), (false, true)];
        let s = SignalSeries::from_raw(bars_series(3), raw).unwrap();
        assert!(!s.signals()[1].actual_sell);
        assert!(s.signals()[2].actual_sell);
        assert!(s.signals()[1].buy && s.signals()[1].sell);
    }

    #[test]
    fn from_raw_checks_length() {
        let err = SignalSeries::from_raw(bars_series(3), vec![(false, false)]).unwrap_err();
        assert!(matches!(err, SeriesError::LengthMismatch { bars: 3, other: 1, .. }));
    }

    #[test]
    fn generated_signals_cover_every_bar() {
        let closes = [
            100.0, 101.0, 103.0, 102.0, 105.0, 107.0, 104.0, 99.0, 97.0, 98.0, 103.0, 108.0,
        ];
        let series = BarSeries::new(Timeframe::Daily, make_bars(&closes)).unwrap();
        let out = generate_signals(augment(series, &IndicatorParams { ma_period: 3, money_flow_period: 2 }));
        assert_eq!(out.len(), closes.len());
        assert!(!out.signals()[0].buy && !out.signals()[0].sell);
        for (_, _, s) in out.iter() {
            assert!(!s.actual_sell || s.sell);
        }
    }

    #[test]
    fn empty_series_has_no_signals() {
        let out = generate_signals(IndicatorSeries::bare(BarSeries::empty(Timeframe::Daily)));
        assert!(out.is_empty());
        assert_eq!(out.buy_count(), 0);
    }
}
