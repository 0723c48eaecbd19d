//! Parquet cache of daily bars, partitioned by code and year.
//!
//! Layout: `{cache_dir}/code={CODE}/{year}.parquet` plus a `meta.json` sidecar.
//!
//! The cache memoises provider fetches. Each write records the date span it was
//! fetched for, and a range counts as covered only when one recorded span
//! contains it, so bars cached for two separate ranges never stand in for the
//! years between them.
//!
//! Year files are replaced atomically (`.tmp` then rename). A year file that
//! fails to load is renamed to `{year}.parquet.quarantined` and skipped.

use super::provider::{DataError, DataSource};
use crate::domain::Bar;
use chrono::{Datelike, NaiveDate, Weekday};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Inclusive calendar span a provider was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    pub fn contains(&self, other: &DateSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The span without leading and trailing weekend days, `None` if nothing is left.
    pub fn trading_days(&self) -> Option<DateSpan> {
        let mut start = self.start;
        while is_weekend(start) && start < self.end {
            start = start.succ_opt()?;
        }
        let mut end = self.end;
        while is_weekend(end) && end > start {
            end = end.pred_opt()?;
        }
        (!is_weekend(start) && !is_weekend(end)).then_some(DateSpan { start, end })
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// True when `next` starts right after `prev` ends, weekends aside.
fn touches(prev: &DateSpan, next: &DateSpan) -> bool {
    if next.start <= prev.end {
        return true;
    }
    prev.end
        .iter_days()
        .skip(1)
        .take_while(|day| *day < next.start)
        .all(is_weekend)
}

/// Sorted, non-overlapping spans; touching spans are joined.
pub fn merge_spans(mut spans: Vec<DateSpan>) -> Vec<DateSpan> {
    spans.sort();
    let mut merged: Vec<DateSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(last) = merged.last_mut() {
            if touches(last, &span) {
                last.end = last.end.max(span.end);
                continue;
            }
        }
        merged.push(span);
    }
    merged
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub code: String,
    /// First cached bar.
    pub start_date: NaiveDate,
    /// Last cached bar.
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: DataSource,
    pub cached_at: chrono::NaiveDateTime,
    /// Fetched spans, merged. A sidecar without them covers nothing.
    #[serde(default)]
    pub spans: Vec<DateSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub code: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: Option<usize>,
}

/// How well the cache covers a requested date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    /// Something is cached, but no fetched span contains the request.
    PartiallyCovered { spans: Vec<DateSpan> },
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn code_dir(&self, code: &str) -> PathBuf {
        self.cache_dir.join(format!("code={code}"))
    }

    fn year_path(&self, code: &str, year: i32) -> PathBuf {
        self.code_dir(code).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, code: &str) -> PathBuf {
        self.code_dir(code).join("meta.json")
    }

    /// Merge bars fetched for `span` into the cache for `code`.
    ///
    /// New bars win on date collisions. `span` is what the provider was asked
    /// for, not the first and last bar, so non-trading days at either end still
    /// count as fetched.
    pub fn write(
        &self,
        code: &str,
        bars: &[Bar],
        span: DateSpan,
        source: DataSource,
    ) -> Result<(), DataError> {
        if bars.is_empty() {
            return Err(DataError::CacheError("no bars to cache".into()));
        }
        fs::create_dir_all(self.code_dir(code))
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut by_date: BTreeMap<NaiveDate, Bar> = match self.load(code) {
            Ok(existing) => existing.into_iter().map(|b| (b.date, b)).collect(),
            Err(DataError::NoCachedData { .. }) => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        by_date.extend(bars.iter().map(|b| (b.date, *b)));

        let years: BTreeSet<i32> = bars.iter().map(|b| b.date.year()).collect();
        for &year in &years {
            let year_bars: Vec<&Bar> = by_date.values().filter(|b| b.date.year() == year).collect();
            self.replace_year(code, year, &year_bars)?;
        }

        let mut spans = self.get_meta(code).map(|m| m.spans).unwrap_or_default();
        spans.push(span);

        let all: Vec<Bar> = by_date.into_values().collect();
        let (Some(first), Some(last)) = (all.first(), all.last()) else {
            return Err(DataError::CacheError("no bars to cache".into()));
        };
        let hash_input = serde_json::to_vec(&all)
            .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
        let meta = CacheMeta {
            code: code.to_string(),
            start_date: first.date,
            end_date: last.date,
            bar_count: all.len(),
            data_hash: blake3::hash(&hash_input).to_hex().to_string(),
            source,
            cached_at: chrono::Local::now().naive_local(),
            spans: merge_spans(spans),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(code), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        tracing::debug!(code, bars = all.len(), years = years.len(), spans = meta.spans.len(), "cache updated");
        Ok(())
    }

    fn replace_year(&self, code: &str, year: i32, bars: &[&Bar]) -> Result<(), DataError> {
        let df = bars_to_dataframe(bars)?;
        let path = self.year_path(code, year);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })
    }

    /// All cached bars for `code`, date ascending.
    pub fn load(&self, code: &str) -> Result<Vec<Bar>, DataError> {
        let code_dir = self.code_dir(code);
        if !code_dir.exists() {
            return Err(DataError::NoCachedData {
                code: code.to_string(),
            });
        }

        let entries =
            fs::read_dir(&code_dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut all_bars = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path) {
                Ok(bars) => all_bars.extend(bars),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                    let _ = fs::rename(&path, path.with_extension("parquet.quarantined"));
                }
            }
        }

        if all_bars.is_empty() {
            return Err(DataError::NoCachedData {
                code: code.to_string(),
            });
        }

        all_bars.sort_by_key(|b| b.date);
        Ok(all_bars)
    }

    /// Cached bars within `[start, end]`.
    pub fn load_range(&self, code: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, DataError> {
        Ok(super::provider::within(self.load(code)?, start, end))
    }

    pub fn get_meta(&self, code: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(code)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Codes with a cache directory, sorted.
    pub fn cached_codes(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut codes: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_prefix("code="))
                    .map(str::to_string)
            })
            .collect();
        codes.sort();
        codes
    }

    pub fn status(&self, codes: &[&str]) -> Vec<CacheStatus> {
        codes
            .iter()
            .map(|code| {
                let meta = self.get_meta(code);
                CacheStatus {
                    code: code.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    bar_count: meta.as_ref().map(|m| m.bar_count),
                }
            })
            .collect()
    }

    /// Whether one fetched span contains `[start, end]`, ignoring weekend days
    /// at either end of the request.
    pub fn covers_range(&self, code: &str, start: NaiveDate, end: NaiveDate) -> CoverageResult {
        let Some(meta) = self.get_meta(code) else {
            return CoverageResult::NotCached;
        };
        let covered = match DateSpan::new(start, end).trading_days() {
            Some(wanted) => meta.spans.iter().any(|s| s.contains(&wanted)),
            None => !meta.spans.is_empty(),
        };
        if covered {
            CoverageResult::FullyCovered
        } else {
            CoverageResult::PartiallyCovered { spans: meta.spans }
        }
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn bars_to_dataframe(bars: &[&Bar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    for name in COLUMNS {
        if df.column(name).is_err() {
            return Err(DataError::ValidationError(format!("missing column '{name}'")));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let column = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("column read: {e}")))
    };
    let f64_column = |name: &str| -> Result<Float64Chunked, DataError> {
        column(name)?
            .f64()
            .cloned()
            .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))
    };

    let date_ca = column("date")?
        .date()
        .cloned()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let open_ca = f64_column("open")?;
    let high_ca = f64_column("high")?;
    let low_ca = f64_column("low")?;
    let close_ca = f64_column("close")?;
    let vol_ca = column("volume")?
        .u64()
        .cloned()
        .map_err(|e| DataError::ParquetError(format!("volume column type: {e}")))?;

    (0..df.height())
        .map(|i| {
            let days = date_ca
                .get(i)
                .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
            let price = |ca: &Float64Chunked, what: &str| {
                ca.get(i)
                    .ok_or_else(|| DataError::ParquetError(format!("null {what} at row {i}")))
            };
            Ok(Bar {
                date: epoch() + chrono::Duration::days(days as i64),
                open: price(&open_ca, "open")?,
                high: price(&high_ca, "high")?,
                low: price(&low_ca, "low")?,
                close: price(&close_ca, "close")?,
                volume: vol_ca.get(i).unwrap_or(0),
            })
        })
        .collect()
}
