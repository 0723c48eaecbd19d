//! Daily bar loading for one code.
//!
//! Fallback policy:
//! 1. Cache covers the requested range → use it
//! 2. Provider available (and not offline) → fetch, merge into the cache, use it
//! 3. Offline with a partial cache → use whatever the cache holds for the range
//! 4. `synthetic` enabled → generate a deterministic random walk (tagged)
//! 5. Otherwise → fail with a clear error (`UnknownCode` when the provider
//!    does not list the code at all)
//!
//! Adjusted and raw prices never share a cache directory.

use std::path::Path;

use chrono::{Datelike, NaiveDate, Weekday};
use thiserror::Error;

use krxtrend_core::data::{
    CoverageResult, DataError, DataProvider, DataSource, DateSpan, ParquetCache,
};
use krxtrend_core::domain::{Bar, BarSeries, SeriesError, Timeframe};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no cached data for '{code}' and no network access (use --synthetic for synthetic data)")]
    NoCachedDataOffline { code: String },

    #[error("no cached data for '{code}' and download failed: {reason}")]
    DownloadFailed { code: String, reason: String },

    #[error("'{code}' is not listed by the data provider")]
    UnknownCode { code: String },

    #[error("no usable bars for '{code}' between {start} and {end}")]
    NoDataAvailable {
        code: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("series error: {0}")]
    Series(#[from] SeriesError),
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Split-adjusted prices when true.
    pub adjusted: bool,
    /// Never make network requests.
    pub offline: bool,
    /// Generate synthetic bars when real data is unavailable.
    pub synthetic: bool,
    /// Re-fetch even when the cache covers the range.
    pub force: bool,
}

/// Daily bars for one code plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub code: String,
    pub series: BarSeries,
    pub source: DataSource,
    /// BLAKE3 over the loaded bars.
    pub data_hash: String,
}

impl LoadedSeries {
    pub fn is_synthetic(&self) -> bool {
        self.source == DataSource::Synthetic
    }
}

/// Cache for one price kind under `root`.
pub fn price_cache(root: &Path, adjusted: bool) -> ParquetCache {
    ParquetCache::new(root.join(if adjusted { "adjusted" } else { "raw" }))
}

/// Load daily bars for `code` over `[opts.start, opts.end]`.
///
/// `cache` must be the cache for `opts.adjusted` (see [`price_cache`]).
pub fn load_daily(
    code: &str,
    cache: &ParquetCache,
    provider: Option<&dyn DataProvider>,
    opts: &LoadOptions,
) -> Result<LoadedSeries, LoadError> {
    let coverage = cache.covers_range(code, opts.start, opts.end);

    // Step 1: cache
    if !opts.force && coverage == CoverageResult::FullyCovered {
        let bars = cache.load_range(code, opts.start, opts.end)?;
        tracing::debug!(code, bars = bars.len(), "loaded from cache");
        return finish(code, bars, DataSource::Cache, opts);
    }

    // Step 2: provider
    let mut failure: Option<String> = None;
    let mut unlisted = false;
    if !opts.offline {
        match provider {
            Some(p) if p.is_available() => {
                match p.fetch(code, opts.start, opts.end, opts.adjusted) {
                    Ok(fetched) => {
                        if !fetched.bars.is_empty() {
                            let span = DateSpan::new(opts.start, opts.end);
                            if let Err(e) = cache.write(code, &fetched.bars, span, fetched.source) {
                                tracing::warn!(code, error = %e, "failed to cache fetched bars");
                            }
                        }
                        return finish(code, fetched.bars, fetched.source, opts);
                    }
                    Err(DataError::CodeNotFound { .. }) => {
                        tracing::debug!(code, provider = p.name(), "code not listed");
                        unlisted = true;
                        failure = Some(format!("{} does not list {code}", p.name()));
                    }
                    Err(e) => {
                        tracing::warn!(code, provider = p.name(), error = %e, "fetch failed");
                        failure = Some(e.to_string());
                    }
                }
            }
            Some(p) => {
                failure = Some(format!("{} is unavailable (circuit breaker open)", p.name()));
            }
            None => failure = Some("no data provider configured".into()),
        }
    }

    // Step 3: partial cache
    if !matches!(coverage, CoverageResult::NotCached) {
        let bars = cache.load_range(code, opts.start, opts.end)?;
        if !bars.is_empty() {
            tracing::warn!(code, bars = bars.len(), "using partially cached range");
            return finish(code, bars, DataSource::Cache, opts);
        }
    }

    // Step 4: synthetic
    if opts.synthetic {
        tracing::warn!(code, "generating synthetic data, results are tagged as synthetic");
        let bars = generate_synthetic_bars(code, opts.start, opts.end);
        return finish(code, bars, DataSource::Synthetic, opts);
    }

    // Step 5: fail
    if unlisted {
        return Err(LoadError::UnknownCode {
            code: code.to_string(),
        });
    }
    match failure {
        None => Err(LoadError::NoCachedDataOffline {
            code: code.to_string(),
        }),
        Some(reason) => Err(LoadError::DownloadFailed {
            code: code.to_string(),
            reason,
        }),
    }
}

fn finish(
    code: &str,
    bars: Vec<Bar>,
    source: DataSource,
    opts: &LoadOptions,
) -> Result<LoadedSeries, LoadError> {
    let bars: Vec<Bar> = bars
        .into_iter()
        .filter(Bar::has_positive_prices)
        .collect();
    if bars.is_empty() {
        return Err(LoadError::NoDataAvailable {
            code: code.to_string(),
            start: opts.start,
            end: opts.end,
        });
    }
    let data_hash = compute_data_hash(code, &bars);
    let series = BarSeries::new(Timeframe::Daily, bars)?;
    Ok(LoadedSeries {
        code: code.to_string(),
        series,
        source,
        data_hash,
    })
}

fn compute_data_hash(code: &str, bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(code.as_bytes());
    for bar in bars {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Weekday random walk from 50,000 won, seeded by the code.
///
/// Prices are rounded to whole won. Clearly fake; the source is always tagged
/// [`DataSource::Synthetic`].
pub fn generate_synthetic_bars(code: &str, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(code.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 50_000.0_f64;
    let mut current = start;

    while current <= end {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price.round();
        let close = (price * (1.0 + daily_return)).round().max(1.0);
        let high = (open.max(close) * (1.0 + rng.gen_range(0.0..0.01))).round();
        let low = (open.min(close) * (1.0 - rng.gen_range(0.0..0.01))).round().max(1.0);
        let volume = rng.gen_range(50_000..2_000_000u64);

        bars.push(Bar {
            date: current,
            open,
            high,
            low,
            close,
            volume,
        });

        price = close;
        current += chrono::Duration::days(1);
    }

    bars
}
