//! Naver Finance provider (split-adjusted daily prices).
//!
//! The `siseJson` endpoint returns a JavaScript-style array: a header row in
//! single quotes followed by one JSON array per trading day,
//! `["20240102", open, high, low, close, volume, foreign_ratio]`. Only the data
//! rows are valid JSON, so the body is parsed line by line.

use super::circuit_breaker::CircuitBreaker;
use super::http::HttpFetcher;
use super::provider::{clean_bars, DataError, DataProvider, DataSource, FetchResult};
use crate::domain::Bar;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const SISE_URL: &str = "https://api.finance.naver.com/siseJson.naver";

pub struct NaverProvider {
    http: HttpFetcher,
}

impl NaverProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        Ok(Self {
            http: HttpFetcher::new(circuit_breaker, Duration::from_secs(30))?,
        })
    }

    pub fn with_fetcher(http: HttpFetcher) -> Self {
        Self { http }
    }
}

fn number(value: &Value, what: &str, date: &str) -> Result<f64, DataError> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
    .ok_or_else(|| DataError::ResponseFormatChanged(format!("bad {what} on {date}: {value}")))
}

/// Parse a `siseJson` body into daily bars.
pub fn parse_sise(body: &str) -> Result<Vec<Bar>, DataError> {
    let mut bars = Vec::new();

    for line in body.lines() {
        let mut row = line.trim().trim_end_matches(',');
        if !row.starts_with("[\"") {
            continue;
        }
        if row.ends_with("]]") {
            row = &row[..row.len() - 1];
        }

        let fields: Vec<Value> = serde_json::from_str(row)
            .map_err(|e| DataError::ResponseFormatChanged(format!("unparseable row '{row}': {e}")))?;
        if fields.len() < 6 {
            return Err(DataError::ResponseFormatChanged(format!(
                "expected at least 6 fields, got {}",
                fields.len()
            )));
        }

        let raw_date = fields[0].as_str().unwrap_or_default().trim();
        let date = NaiveDate::parse_from_str(raw_date, "%Y%m%d")
            .map_err(|_| DataError::ResponseFormatChanged(format!("bad date '{raw_date}'")))?;

        bars.push(Bar {
            date,
            open: number(&fields[1], "open", raw_date)?,
            high: number(&fields[2], "high", raw_date)?,
            low: number(&fields[3], "low", raw_date)?,
            close: number(&fields[4], "close", raw_date)?,
            volume: number(&fields[5], "volume", raw_date)?.max(0.0) as u64,
        });
    }

    Ok(bars)
}

impl DataProvider for NaverProvider {
    fn name(&self) -> &str {
        "naver"
    }

    fn fetch(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
        adjusted: bool,
    ) -> Result<FetchResult, DataError> {
        if !adjusted {
            return Err(DataError::UnsupportedAdjustment {
                provider: "naver",
                kind: "unadjusted",
            });
        }

        let start_s = start.format("%Y%m%d").to_string();
        let end_s = end.format("%Y%m%d").to_string();
        let body = self.http.send(code, |client| {
            client.get(SISE_URL).query(&[
                ("symbol", code),
                ("requestType", "1"),
                ("startTime", start_s.as_str()),
                ("endTime", end_s.as_str()),
                ("timeframe", "day"),
            ])
        })?;

        let bars = clean_bars(parse_sise(&body)?);
        tracing::debug!(code, bars = bars.len(), "naver fetch complete");
        Ok(FetchResult {
            code: code.to_string(),
            bars,
            source: DataSource::Naver,
        })
    }

    fn is_available(&self) -> bool {
        self.http.is_available()
    }
}
