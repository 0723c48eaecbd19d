//! Integration tests for the analysis pipelines.
//!
//! A fake provider stands in for the network; bars land in a temp cache and
//! later runs are served from it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};
use krxtrend_core::data::{DataError, DataProvider, DataSource, FetchResult, Listing, TickerDirectory};
use krxtrend_core::domain::{Bar, Timeframe};
use krxtrend_runner::{
    analyze, analyze_full, analyze_multi, import_json, price_cache, render_report, write_analysis,
    AnalysisConfig, AnalysisContext,
};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_dir(label: &str) -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "krxtrend_pipeline_{label}_{}_{id}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Weekday bars following a slow sine cycle, so the strategy trades.
fn cycle_bars(start: NaiveDate, end: NaiveDate, base: f64) -> Vec<Bar> {
    let mut bars = Vec::new();
    let mut date = start;
    let mut i = 0usize;
    while date <= end {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            let close = (base * (1.0 + 0.25 * (i as f64 / 40.0).sin())).round();
            let open = (close * 0.995).round();
            bars.push(Bar {
                date,
                open,
                high: (close.max(open) * 1.01).round(),
                low: (close.min(open) * 0.99).round(),
                close,
                volume: 100_000 + (i as u64 % 13) * 5_000,
            });
            i += 1;
        }
        date += chrono::Duration::days(1);
    }
    bars
}

/// Listed, but every fetch fails at the network level.
const OFFLINE_CODE: &str = "111111";

struct FakeProvider {
    base: HashMap<String, f64>,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn new(codes: &[(&str, f64)]) -> Self {
        Self {
            base: codes.iter().map(|(c, b)| (c.to_string(), *b)).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl DataProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn fetch(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
        _adjusted: bool,
    ) -> Result<FetchResult, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if code == OFFLINE_CODE {
            return Err(DataError::NetworkUnreachable("connection refused".into()));
        }
        let base = self.base.get(code).ok_or_else(|| DataError::CodeNotFound {
            code: code.to_string(),
        })?;
        Ok(FetchResult {
            code: code.to_string(),
            bars: cycle_bars(start, end, *base),
            source: DataSource::Naver,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn directory() -> TickerDirectory {
    TickerDirectory::new(vec![
        Listing::new("005930", "삼성전자"),
        Listing::new("000660", "SK하이닉스"),
        Listing::new("035420", "NAVER"),
    ])
}

fn context(cache_dir: PathBuf, provider: Arc<FakeProvider>) -> AnalysisContext {
    let config = AnalysisConfig {
        cache_dir,
        end: Some("2024-06-28".into()),
        ..Default::default()
    };
    AnalysisContext::new(config, directory(), d(2024, 6, 28)).with_provider(provider)
}

#[test]
fn analyze_fetches_then_serves_from_cache() {
    let dir = temp_dir("cache");
    let provider = Arc::new(FakeProvider::new(&[("005930", 70_000.0)]));
    let ctx = context(dir.clone(), provider.clone());

    let first = analyze("삼성전자", &ctx).unwrap().unwrap();
    assert_eq!(first.source, DataSource::Naver);
    assert_eq!(first.series.timeframe(), Timeframe::Weekly);
    assert!(first.summary.trades > 0, "a 25% sine cycle should trade");

    let second = analyze("005930", &ctx).unwrap().unwrap();
    assert_eq!(second.source, DataSource::Cache);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.ledger, second.ledger);
    assert_eq!(first.data_hash, second.data_hash);

    // adjusted prices were cached under their own root
    assert!(price_cache(&dir, true).get_meta("005930").is_some());
    assert!(price_cache(&dir, false).get_meta("005930").is_none());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_query_is_soft_miss_but_fetch_failure_is_not() {
    let dir = temp_dir("miss");
    let provider = Arc::new(FakeProvider::new(&[]));
    let ctx = context(dir.clone(), provider.clone());

    assert!(analyze("존재하지않는회사", &ctx).unwrap().is_none());
    // six digits resolve as a code, but the provider does not list it
    assert!(analyze("999999", &ctx).unwrap().is_none());
    assert!(analyze_full("999999", &ctx).unwrap().is_none());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

    // a network failure is not a miss
    assert!(analyze(OFFLINE_CODE, &ctx).is_err());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn multi_is_keyed_by_name_and_skips_failures() {
    let dir = temp_dir("multi");
    let provider = Arc::new(FakeProvider::new(&[("005930", 70_000.0), ("000660", 130_000.0)]));
    let ctx = context(dir.clone(), provider);

    let queries: Vec<String> = ["SK하이닉스", "005930", "없는종목", "035420"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let results = analyze_multi(&queries, &ctx);

    let names: Vec<&String> = results.keys().collect();
    assert_eq!(names, vec!["SK하이닉스 (000660)", "삼성전자 (005930)"]);

    // parallel runs match sequential ones
    for analysis in results.values() {
        let single = analyze(&analysis.code, &ctx).unwrap().unwrap();
        assert_eq!(single.ledger, analysis.ledger);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn full_analysis_covers_three_timeframes() {
    let dir = temp_dir("full");
    let provider = Arc::new(FakeProvider::new(&[("035420", 200_000.0)]));
    let ctx = context(dir.clone(), provider);

    let full = analyze_full("NAVER", &ctx).unwrap().unwrap();
    assert_eq!(full.daily.timeframe(), Timeframe::Daily);
    assert_eq!(full.weekly.timeframe(), Timeframe::Weekly);
    assert_eq!(full.monthly.timeframe(), Timeframe::Monthly);

    assert!(full.daily.rows().iter().all(|r| r.setup.is_some() && r.trend.is_none()));
    assert!(full.monthly.rows().iter().all(|r| r.setup.is_some()));
    assert!(full
        .weekly
        .indicators()
        .rows()
        .iter()
        .all(|r| r.setup.is_some() && r.trend.is_some()));

    // the weekly strategy matches a plain weekly analysis
    let plain = analyze("NAVER", &ctx).unwrap().unwrap();
    assert_eq!(plain.ledger, full.ledger);

    let charts = full.charts();
    assert_eq!(charts.len(), 4);
    assert!(charts[0].markers.is_some());
    assert!(charts[2].dates.len() < full.daily.len());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn report_and_export_round_trip() {
    let dir = temp_dir("export");
    let provider = Arc::new(FakeProvider::new(&[("005930", 70_000.0)]));
    let ctx = context(dir.join("cache"), provider);

    let analysis = analyze("005930", &ctx).unwrap().unwrap();
    let text = render_report(&analysis.display_name(), &analysis.ledger, &analysis.summary);
    assert!(text.starts_with("==== 삼성전자 (005930) ====\n"));
    assert!(text.contains("win rate:"));

    let out = dir.join("out");
    write_analysis(&out, &analysis).unwrap();
    let json = std::fs::read_to_string(out.join("005930.json")).unwrap();
    let record = import_json(&json).unwrap();
    assert_eq!(record.ledger, analysis.ledger);
    assert_eq!(record.config_fingerprint, ctx.config.fingerprint());

    let csv = std::fs::read_to_string(out.join("005930_ledger.csv")).unwrap();
    assert_eq!(csv.lines().count(), analysis.ledger.len() + 1);

    let _ = std::fs::remove_dir_all(&dir);
}
