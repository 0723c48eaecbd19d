//! Batch download into the Parquet cache.

use super::cache::{CoverageResult, DateSpan, ParquetCache};
use super::provider::{DataError, DataProvider};
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub adjusted: bool,
    /// Re-fetch even when the cache already covers the range.
    pub force: bool,
}

#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Fetch each code and merge it into the cache, one at a time.
///
/// Stops early once the provider's circuit breaker is open; the remaining
/// codes are reported as failed.
pub fn download_codes(
    provider: &dyn DataProvider,
    cache: &ParquetCache,
    codes: &[String],
    request: &DownloadRequest,
) -> DownloadSummary {
    let total = codes.len();
    let mut summary = DownloadSummary {
        total,
        succeeded: 0,
        skipped: 0,
        errors: Vec::new(),
    };

    for (i, code) in codes.iter().enumerate() {
        if !request.force
            && cache.covers_range(code, request.start, request.end) == CoverageResult::FullyCovered
        {
            tracing::info!(code = %code, "[{}/{total}] cache covers range, skipping", i + 1);
            summary.skipped += 1;
            continue;
        }

        tracing::info!(code = %code, provider = provider.name(), "[{}/{total}] fetching", i + 1);
        match download_single(provider, cache, code, request) {
            Ok(bars) => {
                tracing::info!(code = %code, bars, "cached");
                summary.succeeded += 1;
            }
            Err(e) => {
                tracing::warn!(code = %code, error = %e, "download failed");
                summary.errors.push((code.clone(), e));
            }
        }

        if !provider.is_available() {
            for rest in &codes[i + 1..] {
                summary
                    .errors
                    .push((rest.clone(), DataError::CircuitBreakerTripped));
            }
            break;
        }
    }

    summary
}

fn download_single(
    provider: &dyn DataProvider,
    cache: &ParquetCache,
    code: &str,
    request: &DownloadRequest,
) -> Result<usize, DataError> {
    let fetched = provider.fetch(code, request.start, request.end, request.adjusted)?;
    if fetched.bars.is_empty() {
        return Err(DataError::ValidationError(format!("no valid bars for {code}")));
    }
    cache.write(code, &fetched.bars, DateSpan::new(request.start, request.end), fetched.source)?;
    Ok(fetched.bars.len())
}
