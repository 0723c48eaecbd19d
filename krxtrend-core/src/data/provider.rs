//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over price sources (Naver Finance, the KRX
//! data portal, CSV import) so the loader can swap implementations and tests
//! can run offline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Bar;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("code not found: {code}")]
    CodeNotFound { code: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("{provider} does not serve {kind} prices")]
    UnsupportedAdjustment {
        provider: &'static str,
        kind: &'static str,
    },

    #[error("invalid date '{0}' (expected YYYYMMDD or YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("csv error: {0}")]
    CsvError(String),

    #[error("no cached data for code '{code}' (run `download {code}` first)")]
    NoCachedData { code: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Naver,
    Krx,
    CsvImport,
    Cache,
    Synthetic,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Naver => "naver",
            Self::Krx => "krx",
            Self::CsvImport => "csv",
            Self::Cache => "cache",
            Self::Synthetic => "synthetic",
        }
    }
}

/// Result of a successful fetch for a single code.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub code: String,
    /// Daily bars, date ascending, invalid rows already dropped.
    pub bars: Vec<Bar>,
    pub source: DataSource,
}

/// Trait for daily price providers.
///
/// Implementations handle the specifics of one source. The cache sits above this
/// trait; providers don't know about it.
pub trait DataProvider: Send + Sync {
    /// Short name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for `code` over `[start, end]`.
    ///
    /// `adjusted` selects split-adjusted prices. A provider that cannot serve
    /// the requested kind returns [`DataError::UnsupportedAdjustment`].
    fn fetch(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
        adjusted: bool,
    ) -> Result<FetchResult, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Sort by date, keep the first bar of any duplicated date and drop bars whose
/// prices are not all strictly positive.
pub fn clean_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    let before = bars.len();
    bars.retain(Bar::has_positive_prices);
    let dropped = before - bars.len();
    if dropped > 0 {
        tracing::debug!(dropped, "dropped bars with non-positive prices");
    }
    bars
}

/// Keep bars dated within `[start, end]`.
pub fn within(bars: Vec<Bar>, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    bars.into_iter()
        .filter(|b| b.date >= start && b.date <= end)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10,
        }
    }

    #[test]
    fn clean_sorts_dedups_and_filters() {
        let bars = vec![bar(5, 10.0), bar(4, 0.0), bar(6, 12.0), bar(5, 99.0), bar(7, 13.0)];
        let cleaned = clean_bars(bars);
        let closes: Vec<f64> = cleaned.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![10.0, 12.0, 13.0]);
    }

    #[test]
    fn within_is_inclusive() {
        let bars = vec![bar(4, 1.0), bar(5, 2.0), bar(6, 3.0)];
        let kept = within(
            bars,
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
        );
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn error_messages_are_readable() {
        let err = DataError::NoCachedData {
            code: "005930".into(),
        };
        assert!(err.to_string().contains("download 005930"));
        let err = DataError::UnsupportedAdjustment {
            provider: "naver",
            kind: "unadjusted",
        };
        assert_eq!(err.to_string(), "naver does not serve unadjusted prices");
    }
}
