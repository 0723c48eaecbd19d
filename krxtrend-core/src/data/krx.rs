//! KRX data portal provider (unadjusted or adjusted daily prices) and the
//! listed-issue finder used to build the ticker directory.
//!
//! Every portal query is a form POST to one JSON endpoint, selected by `bld`.
//! Daily prices are keyed by ISIN, so the issue list is fetched once and kept.

use super::circuit_breaker::CircuitBreaker;
use super::directory::Listing;
use super::http::HttpFetcher;
use super::provider::{clean_bars, DataError, DataProvider, DataSource, FetchResult};
use crate::domain::Bar;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const JSON_URL: &str = "http://data.krx.co.kr/comm/bldAttendant/getJsonData.cmd";
const REFERER: &str = "http://data.krx.co.kr/contents/MDC/MDI/mdiLoader";
const BLD_DAILY: &str = "dbms/MDC/STAT/standard/MDCSTAT01701";
const BLD_FINDER: &str = "dbms/comm/finder/finder_stkisu";

#[derive(Debug, Deserialize)]
struct DailyResponse {
    output: Vec<DailyRow>,
}

#[derive(Debug, Deserialize)]
struct DailyRow {
    #[serde(rename = "TRD_DD")]
    date: String,
    #[serde(rename = "TDD_OPNPRC")]
    open: String,
    #[serde(rename = "TDD_HGPRC")]
    high: String,
    #[serde(rename = "TDD_LWPRC")]
    low: String,
    #[serde(rename = "TDD_CLSPRC")]
    close: String,
    #[serde(rename = "ACC_TRDVOL")]
    volume: String,
}

#[derive(Debug, Deserialize)]
struct FinderResponse {
    block1: Vec<FinderRow>,
}

#[derive(Debug, Deserialize)]
struct FinderRow {
    full_code: String,
    short_code: String,
    #[serde(rename = "codeName")]
    name: String,
    #[serde(rename = "marketName", default)]
    market: Option<String>,
}

pub struct KrxProvider {
    http: HttpFetcher,
    listings: Mutex<Option<Arc<Vec<Listing>>>>,
}

/// Portal number: thousands separators, `-` for no trade.
fn portal_number(raw: &str) -> Result<f64, DataError> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() || cleaned == "-" {
        return Ok(0.0);
    }
    cleaned
        .parse()
        .map_err(|_| DataError::ResponseFormatChanged(format!("bad number '{raw}'")))
}

/// Parse the daily price block. Rows arrive newest first; the result is unordered.
pub fn parse_daily(body: &str) -> Result<Vec<Bar>, DataError> {
    let resp: DailyResponse = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("daily prices: {e}")))?;

    resp.output
        .iter()
        .map(|row| {
            let date = NaiveDate::parse_from_str(row.date.trim(), "%Y/%m/%d")
                .map_err(|_| DataError::ResponseFormatChanged(format!("bad date '{}'", row.date)))?;
            Ok(Bar {
                date,
                open: portal_number(&row.open)?,
                high: portal_number(&row.high)?,
                low: portal_number(&row.low)?,
                close: portal_number(&row.close)?,
                volume: portal_number(&row.volume)? as u64,
            })
        })
        .collect()
}

/// Parse the issue finder block into listings.
pub fn parse_finder(body: &str) -> Result<Vec<Listing>, DataError> {
    let resp: FinderResponse = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("issue finder: {e}")))?;
    Ok(resp
        .block1
        .into_iter()
        .map(|row| Listing {
            code: row.short_code,
            name: row.name,
            isin: Some(row.full_code),
            market: row.market,
        })
        .collect())
}

impl KrxProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        Ok(Self::with_fetcher(HttpFetcher::new(
            circuit_breaker,
            Duration::from_secs(30),
        )?))
    }

    pub fn with_fetcher(http: HttpFetcher) -> Self {
        Self {
            http,
            listings: Mutex::new(None),
        }
    }

    fn post(&self, label: &str, form: &[(&str, &str)]) -> Result<String, DataError> {
        self.http.send(label, |client| {
            client
                .post(JSON_URL)
                .header(reqwest::header::REFERER, REFERER)
                .form(form)
        })
    }

    /// All listed issues (KOSPI, KOSDAQ, KONEX). Fetched once per provider.
    pub fn listings(&self) -> Result<Arc<Vec<Listing>>, DataError> {
        let mut slot = self.listings.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = slot.as_ref() {
            return Ok(Arc::clone(cached));
        }

        let body = self.post(
            "issue finder",
            &[
                ("bld", BLD_FINDER),
                ("mktsel", "ALL"),
                ("typeNo", "0"),
                ("searchText", ""),
            ],
        )?;
        let listings = Arc::new(parse_finder(&body)?);
        tracing::info!(issues = listings.len(), "loaded KRX issue list");
        *slot = Some(Arc::clone(&listings));
        Ok(listings)
    }

    fn isin(&self, code: &str) -> Result<String, DataError> {
        self.listings()?
            .iter()
            .find(|l| l.code == code)
            .and_then(|l| l.isin.clone())
            .ok_or_else(|| DataError::CodeNotFound {
                code: code.to_string(),
            })
    }
}

impl DataProvider for KrxProvider {
    fn name(&self) -> &str {
        "krx"
    }

    fn fetch(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
        adjusted: bool,
    ) -> Result<FetchResult, DataError> {
        let isin = self.isin(code)?;
        let start_s = start.format("%Y%m%d").to_string();
        let end_s = end.format("%Y%m%d").to_string();
        let body = self.post(
            code,
            &[
                ("bld", BLD_DAILY),
                ("isuCd", isin.as_str()),
                ("strtDd", start_s.as_str()),
                ("endDd", end_s.as_str()),
                ("adjStkPrc_check", "Y"),
                ("adjStkPrc", if adjusted { "2" } else { "1" }),
                ("share", "1"),
                ("money", "1"),
            ],
        )?;

        let bars = clean_bars(parse_daily(&body)?);
        tracing::debug!(code, adjusted, bars = bars.len(), "krx fetch complete");
        Ok(FetchResult {
            code: code.to_string(),
            bars,
            source: DataSource::Krx,
        })
    }

    fn is_available(&self) -> bool {
        self.http.is_available()
    }
}
