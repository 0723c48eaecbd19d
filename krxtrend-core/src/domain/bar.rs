//! Bar and BarSeries — the fundamental market data units.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// OHLCV bar for a single code over one period (day, week or month).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// True when open, high, low and close are all strictly positive.
    ///
    /// Providers occasionally report halted sessions with zero prices; those
    /// bars are dropped before anything downstream sees them.
    pub fn has_positive_prices(&self) -> bool {
        self.open > 0.0 && self.high > 0.0 && self.low > 0.0 && self.close > 0.0
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Bar granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" | "d" => Ok(Self::Daily),
            "weekly" | "w" => Ok(Self::Weekly),
            "monthly" | "m" => Ok(Self::Monthly),
            other => Err(SeriesError::UnknownTimeframe(other.to_string())),
        }
    }
}

/// Precondition violations on a bar series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar dates must be strictly increasing: {previous} is followed by {next} at index {index}")]
    NonMonotonicDates {
        index: usize,
        previous: NaiveDate,
        next: NaiveDate,
    },

    #[error("duplicate bar date {date} at index {index}")]
    DuplicateDate { index: usize, date: NaiveDate },

    #[error("series length mismatch: {bars} bars but {other} {what}")]
    LengthMismatch {
        bars: usize,
        other: usize,
        what: &'static str,
    },

    #[error("unknown timeframe '{0}' (expected daily, weekly or monthly)")]
    UnknownTimeframe(String),

    #[error("cannot resample {from} bars to {to}")]
    CannotResample { from: Timeframe, to: Timeframe },
}

/// Date-ordered bars at one granularity.
///
/// Construction validates that dates are unique and strictly increasing, so
/// every stage downstream can index bars without re-checking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedSeries")]
pub struct BarSeries {
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

/// Wire shape of a [`BarSeries`]; deserialization goes through `BarSeries::new`.
#[derive(Deserialize)]
struct UncheckedSeries {
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl TryFrom<UncheckedSeries> for BarSeries {
    type Error = SeriesError;

    fn try_from(raw: UncheckedSeries) -> Result<Self, Self::Error> {
        Self::new(raw.timeframe, raw.bars)
    }
}

impl BarSeries {
    pub fn new(timeframe: Timeframe, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (index, pair) in bars.windows(2).enumerate() {
            let (previous, next) = (pair[0].date, pair[1].date);
            if next == previous {
                return Err(SeriesError::DuplicateDate {
                    index: index + 1,
                    date: next,
                });
            }
            if next < previous {
                return Err(SeriesError::NonMonotonicDates {
                    index: index + 1,
                    previous,
                    next,
                });
            }
        }
        Ok(Self { timeframe, bars })
    }

    /// An empty series of the given granularity.
    pub fn empty(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            bars: Vec::new(),
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    /// Keep bars satisfying `keep`. Order is preserved, so the result stays valid.
    pub fn retain(mut self, keep: impl FnMut(&Bar) -> bool) -> Self {
        self.bars.retain(keep);
        self
    }
}

impl std::ops::Index<usize> for BarSeries {
    type Output = Bar;

    fn index(&self, index: usize) -> &Bar {
        &self.bars[index]
    }
}

impl<'a> IntoIterator for &'a BarSeries {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}
