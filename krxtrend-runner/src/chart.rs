//! Chart data for an external renderer.
//!
//! Nothing here draws. A chart is a set of aligned columns (dates, close, MA,
//! sentiment and the optional setup/trend columns) plus signal markers split into
//! primary and auxiliary kinds:
//! - primary buys: trade entry dates
//! - auxiliary buys: every other bar with a raw buy
//! - primary sells: position-gated exits (`actual_sell`)
//! - auxiliary sells: every other bar with a raw sell

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use krxtrend_core::domain::{Timeframe, TradeLedger};
use krxtrend_core::indicators::{IndicatorSeries, SetupCount, TrendState};
use krxtrend_core::signals::SignalSeries;

/// One marker, placed at the bar close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartMarkers {
    pub primary_buys: Vec<Marker>,
    pub aux_buys: Vec<Marker>,
    pub primary_sells: Vec<Marker>,
    pub aux_sells: Vec<Marker>,
}

impl ChartMarkers {
    pub fn classify(signals: &SignalSeries, ledger: &TradeLedger) -> Self {
        let entries: BTreeSet<NaiveDate> = ledger.iter().map(|t| t.entry_date).collect();
        let mut markers = Self::default();

        for (bar, _, signal) in signals.iter() {
            let marker = Marker {
                date: bar.date,
                price: bar.close,
            };
            if entries.contains(&bar.date) {
                markers.primary_buys.push(marker);
            } else if signal.buy {
                markers.aux_buys.push(marker);
            }
            if signal.actual_sell {
                markers.primary_sells.push(marker);
            } else if signal.sell {
                markers.aux_sells.push(marker);
            }
        }
        markers
    }
}

/// Aligned columns for one chart panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub title: String,
    pub timeframe: Timeframe,
    pub dates: Vec<NaiveDate>,
    pub close: Vec<f64>,
    pub ma: Vec<Option<f64>>,
    pub sentiment: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub setup: Option<Vec<SetupCount>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trend: Option<Vec<TrendState>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub markers: Option<ChartMarkers>,
}

impl ChartData {
    /// Indicator columns only, no markers.
    pub fn from_indicators(title: impl Into<String>, series: &IndicatorSeries) -> Self {
        let rows = series.rows();
        let setup = rows
            .iter()
            .map(|r| r.setup)
            .collect::<Option<Vec<_>>>()
            .filter(|v| !v.is_empty());
        let trend = rows
            .iter()
            .map(|r| r.trend.map(|t| t.state))
            .collect::<Option<Vec<_>>>()
            .filter(|v| !v.is_empty());

        Self {
            title: title.into(),
            timeframe: series.timeframe(),
            dates: series.bars().iter().map(|b| b.date).collect(),
            close: series.bars().iter().map(|b| b.close).collect(),
            ma: rows.iter().map(|r| r.ma).collect(),
            sentiment: rows.iter().map(|r| r.sentiment).collect(),
            setup,
            trend,
            markers: None,
        }
    }

    /// Strategy chart: indicator columns plus classified markers.
    pub fn strategy(title: impl Into<String>, signals: &SignalSeries, ledger: &TradeLedger) -> Self {
        Self {
            markers: Some(ChartMarkers::classify(signals, ledger)),
            ..Self::from_indicators(title, signals.indicators())
        }
    }

    /// Keep only the columns dated within `years` of the last date.
    pub fn last_years(mut self, years: u32) -> Self {
        let Some(&last) = self.dates.last() else {
            return self;
        };
        let cutoff = last
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);
        let skip = self.dates.partition_point(|d| *d < cutoff);

        self.dates.drain(..skip);
        self.close.drain(..skip);
        self.ma.drain(..skip);
        self.sentiment.drain(..skip);
        if let Some(v) = self.setup.as_mut() {
            v.drain(..skip);
        }
        if let Some(v) = self.trend.as_mut() {
            v.drain(..skip);
        }
        if let Some(m) = self.markers.as_mut() {
            for list in [
                &mut m.primary_buys,
                &mut m.aux_buys,
                &mut m.primary_sells,
                &mut m.aux_sells,
            ] {
                list.retain(|marker| marker.date >= cutoff);
            }
        }
        self
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize chart data")
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write chart data to {}", path.display()))
    }
}
