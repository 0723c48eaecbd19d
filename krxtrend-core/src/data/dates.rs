//! Date argument parsing and the default fetch window.

use super::provider::DataError;
use chrono::{Days, NaiveDate};

/// Default lookback when no start date is given.
pub const DEFAULT_LOOKBACK_DAYS: u64 = 365 * 3;

/// Parse `YYYYMMDD` or `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, DataError> {
    let compact = raw.trim().replace('-', "");
    NaiveDate::parse_from_str(&compact, "%Y%m%d").map_err(|_| DataError::InvalidDate(raw.to_string()))
}

/// Resolve optional start/end arguments against `today`.
///
/// End defaults to `today`; start defaults to three years (3 × 365 days) before
/// the end date.
pub fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), DataError> {
    let end = end.map(parse_date).transpose()?.unwrap_or(today);
    let start = match start {
        Some(raw) => parse_date(raw)?,
        None => end
            .checked_sub_days(Days::new(DEFAULT_LOOKBACK_DAYS))
            .unwrap_or(NaiveDate::MIN),
    };
    if start > end {
        return Err(DataError::ValidationError(format!(
            "start date {start} is after end date {end}"
        )));
    }
    Ok((start, end))
}
