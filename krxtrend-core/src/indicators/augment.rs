//! Indicator-augmented bar series.
//!
//! Columns are computed once over the whole series and stored row-per-bar next to
//! the bars they describe. `IndicatorSeries` owns its `BarSeries`, so row `i`
//! always belongs to bar `i`.

use serde::{Deserialize, Serialize};

use super::impulse::{impulse, Impulse, DEFAULT_TREND_EMA};
use super::money_flow::MoneyFlow;
use super::sentiment::Sentiment;
use super::setup::{setup_counts, SetupCount, DEFAULT_SETUP_LAG};
use super::sma::Sma;
use super::Indicator;
use crate::domain::{Bar, BarSeries, Timeframe};

/// Window parameters for the base indicator bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub ma_period: usize,
    pub money_flow_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_period: 10,
            money_flow_period: 4,
        }
    }
}

/// Optional columns for [`augment_full`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullIndicators {
    pub setup_counts: bool,
    pub trend: bool,
}

/// Derived values for one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub ma: Option<f64>,
    pub money_flow: Option<f64>,
    pub sentiment: Option<f64>,
    pub prev_high: Option<f64>,
    pub prev_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<SetupCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Impulse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    series: BarSeries,
    rows: Vec<IndicatorRow>,
    params: IndicatorParams,
}

impl IndicatorSeries {
    /// Bars with every indicator column empty. Used when signals are scripted.
    pub fn bare(series: BarSeries) -> Self {
        let rows = vec![IndicatorRow::default(); series.len()];
        Self {
            series,
            rows,
            params: IndicatorParams::default(),
        }
    }

    /// Attach setup counts with the given lag.
    pub fn with_setup_counts(mut self, lag: usize) -> Self {
        let counts = setup_counts(self.series.bars(), lag);
        for (row, count) in self.rows.iter_mut().zip(counts) {
            row.setup = Some(count);
        }
        self
    }

    /// Attach the trend classifier with the given EMA span.
    pub fn with_trend(mut self, ema_span: usize) -> Self {
        let states = impulse(self.series.bars(), ema_span);
        for (row, state) in self.rows.iter_mut().zip(states) {
            row.trend = Some(state);
        }
        self
    }

    pub fn series(&self) -> &BarSeries {
        &self.series
    }

    pub fn bars(&self) -> &[Bar] {
        self.series.bars()
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&IndicatorRow> {
        self.rows.get(index)
    }

    pub fn params(&self) -> IndicatorParams {
        self.params
    }

    pub fn timeframe(&self) -> Timeframe {
        self.series.timeframe()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bars paired with their rows, in date order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bar, &IndicatorRow)> {
        self.series.bars().iter().zip(&self.rows)
    }
}

/// Moving average, money flow, sentiment and previous high/low.
pub fn augment(series: BarSeries, params: &IndicatorParams) -> IndicatorSeries {
    let bars = series.bars();
    let ma = Sma::new(params.ma_period).compute(bars);
    let money_flow = MoneyFlow::new(params.money_flow_period).compute(bars);
    let sentiment = Sentiment::new().compute(bars);

    let rows = (0..bars.len())
        .map(|i| {
            let prev = i.checked_sub(1).map(|p| &bars[p]);
            IndicatorRow {
                ma: ma[i],
                money_flow: money_flow[i],
                sentiment: sentiment[i],
                prev_high: prev.map(|b| b.high),
                prev_low: prev.map(|b| b.low),
                setup: None,
                trend: None,
            }
        })
        .collect();

    IndicatorSeries {
        series,
        rows,
        params: *params,
    }
}

/// [`augment`] plus the selected optional columns at their default settings.
pub fn augment_full(
    series: BarSeries,
    params: &IndicatorParams,
    extras: FullIndicators,
) -> IndicatorSeries {
    let mut out = augment(series, params);
    if extras.setup_counts {
        out = out.with_setup_counts(DEFAULT_SETUP_LAG);
    }
    if extras.trend {
        out = out.with_trend(DEFAULT_TREND_EMA);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn series(closes: &[f64]) -> BarSeries {
        BarSeries::new(Timeframe::Daily, make_bars(closes)).unwrap()
    }

    #[test]
    fn rows_align_with_bars() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let out = augment(series(&closes), &IndicatorParams::default());
        assert_eq!(out.len(), 15);
        assert!(out.rows()[8].ma.is_none());
        assert!(out.rows()[9].ma.is_some());
        assert!(out.rows()[2].money_flow.is_none());
        assert!(out.rows()[3].money_flow.is_some());
    }

    #[test]
    fn previous_high_low() {
        let out = augment(series(&[10.0, 12.0, 11.0]), &IndicatorParams::default());
        assert_eq!(out.rows()[0].prev_high, None);
        assert_eq!(out.rows()[1].prev_high, Some(out.bars()[0].high));
        assert_eq!(out.rows()[2].prev_low, Some(out.bars()[1].low));
    }

    #[test]
    fn optional_columns_only_when_requested() {
        let closes: Vec<f64> = (0..8).map(|i| 50.0 + i as f64).collect();
        let base = augment(series(&closes), &IndicatorParams::default());
        assert!(base.rows().iter().all(|r| r.setup.is_none() && r.trend.is_none()));

        let full = augment_full(
            series(&closes),
            &IndicatorParams::default(),
            FullIndicators {
                setup_counts: true,
                trend: false,
            },
        );
        assert_eq!(full.rows()[7].setup, Some(SetupCount { sell: 4, buy: 0 }));
        assert!(full.rows().iter().all(|r| r.trend.is_none()));
    }

    #[test]
    fn empty_series_augments_to_empty() {
        let out = augment(BarSeries::empty(Timeframe::Weekly), &IndicatorParams::default());
        assert!(out.is_empty());
        assert_eq!(out.timeframe(), Timeframe::Weekly);
    }

    #[test]
    fn bare_rows_are_empty() {
        let out = IndicatorSeries::bare(series(&[1.0, 2.0]));
        assert!(out.rows().iter().all(|r| *r == IndicatorRow::default()));
    }
}
