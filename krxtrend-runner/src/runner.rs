//! Analysis pipelines: resolve → load → resample → indicators → signals → backtest.
//!
//! Three entry points:
//! - `analyze()`: one code on the configured timeframe
//! - `analyze_full()`: daily/weekly/monthly with setup counts on all three, the
//!   trend classifier on weekly and the strategy on weekly
//! - `analyze_multi()`: `analyze()` over many queries on the rayon pool
//!
//! An unknown query, a code the provider does not list, or a code with no usable
//! bars is a soft miss: `Ok(None)` and a warning. Everything else is a `RunError`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rayon::prelude::*;
use thiserror::Error;

use krxtrend_core::data::{
    filter_period, resample, resolve_range, DataError, DataProvider, DataSource, TickerDirectory,
};
use krxtrend_core::domain::{BarSeries, SeriesError, Timeframe, TradeLedger};
use krxtrend_core::engine::backtest;
use krxtrend_core::indicators::{augment, augment_full, FullIndicators, IndicatorSeries};
use krxtrend_core::signals::{generate_signals, SignalSeries};

use crate::chart::ChartData;
use crate::config::{AnalysisConfig, ConfigError};
use crate::data_loader::{load_daily, price_cache, LoadError, LoadOptions, LoadedSeries};
use crate::metrics::Summary;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("series error: {0}")]
    Series(#[from] SeriesError),
}

/// Everything an analysis needs besides the query.
#[derive(Clone)]
pub struct AnalysisContext {
    pub config: AnalysisConfig,
    pub directory: Arc<TickerDirectory>,
    pub provider: Option<Arc<dyn DataProvider>>,
    pub offline: bool,
    pub synthetic: bool,
    pub force: bool,
    /// Anchor for the default date range.
    pub today: NaiveDate,
}

impl AnalysisContext {
    pub fn new(config: AnalysisConfig, directory: TickerDirectory, today: NaiveDate) -> Self {
        Self {
            config,
            directory: Arc::new(directory),
            provider: None,
            offline: false,
            synthetic: false,
            force: false,
            today,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    fn load_options(&self) -> Result<LoadOptions, RunError> {
        let (start, end) = resolve_range(
            self.config.start.as_deref(),
            self.config.end.as_deref(),
            self.today,
        )?;
        Ok(LoadOptions {
            start,
            end,
            adjusted: self.config.adjusted,
            offline: self.offline,
            synthetic: self.synthetic,
            force: self.force,
        })
    }
}

/// Result of one single-timeframe analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub code: String,
    pub name: String,
    pub series: SignalSeries,
    pub ledger: TradeLedger,
    pub summary: Summary,
    pub source: DataSource,
    pub data_hash: String,
    pub config_fingerprint: String,
}

impl Analysis {
    /// `name (code)`, or just the code when the name is unknown.
    pub fn display_name(&self) -> String {
        display_name(&self.name, &self.code)
    }

    pub fn chart(&self) -> ChartData {
        ChartData::strategy(self.display_name(), &self.series, &self.ledger)
    }
}

/// Result of a three-timeframe analysis. The strategy runs on `weekly`.
#[derive(Debug, Clone)]
pub struct FullAnalysis {
    pub code: String,
    pub name: String,
    pub daily: IndicatorSeries,
    pub weekly: SignalSeries,
    pub monthly: IndicatorSeries,
    pub ledger: TradeLedger,
    pub summary: Summary,
    pub source: DataSource,
}

impl FullAnalysis {
    pub fn display_name(&self) -> String {
        display_name(&self.name, &self.code)
    }

    /// Weekly strategy (full history), weekly and daily for the last year, monthly in full.
    pub fn charts(&self) -> Vec<ChartData> {
        let name = self.display_name();
        vec![
            ChartData::strategy(format!("{name} weekly strategy"), &self.weekly, &self.ledger),
            ChartData::from_indicators(format!("{name} weekly trend, 1y"), self.weekly.indicators())
                .last_years(1),
            ChartData::from_indicators(format!("{name} daily setup, 1y"), &self.daily).last_years(1),
            ChartData::from_indicators(format!("{name} monthly setup"), &self.monthly),
        ]
    }
}

fn display_name(name: &str, code: &str) -> String {
    if name == code {
        code.to_string()
    } else {
        format!("{name} ({code})")
    }
}

/// Resolve the query and load daily bars. `None` is a soft miss, already logged.
fn resolve_and_load(
    query: &str,
    ctx: &AnalysisContext,
) -> Result<Option<(String, String, LoadedSeries)>, RunError> {
    let Some(code) = ctx.directory.resolve(query) else {
        tracing::warn!(query, "symbol not found");
        return Ok(None);
    };
    let name = ctx.directory.name_of(&code);

    let opts = ctx.load_options()?;
    let cache = price_cache(&ctx.config.cache_dir, opts.adjusted);
    let provider = ctx.provider.as_deref();

    let loaded = match load_daily(&code, &cache, provider, &opts) {
        Ok(loaded) => loaded,
        Err(LoadError::UnknownCode { .. }) => {
            tracing::warn!(query, code = %code, "symbol not listed by the data provider");
            return Ok(None);
        }
        Err(LoadError::NoDataAvailable { .. }) => {
            tracing::warn!(query, code = %code, start = %opts.start, end = %opts.end, "no data available");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Some((code, name, loaded)))
}

fn restrict(series: BarSeries, years: Option<u32>) -> BarSeries {
    match years {
        Some(y) => filter_period(series, y),
        None => series,
    }
}

/// Analyse one query on the configured timeframe.
pub fn analyze(query: &str, ctx: &AnalysisContext) -> Result<Option<Analysis>, RunError> {
    let Some((code, name, loaded)) = resolve_and_load(query, ctx)? else {
        return Ok(None);
    };
    let config = &ctx.config;

    let daily = restrict(loaded.series, config.years);
    let series = resample(&daily, config.timeframe)?;
    if series.is_empty() {
        tracing::warn!(code = %code, "no bars left after filtering");
        return Ok(None);
    }

    let signals = generate_signals(augment(series, &config.indicator_params()));
    let ledger = backtest(&signals, &config.backtest_options());
    let summary = Summary::compute(&ledger);

    tracing::info!(
        code = %code,
        timeframe = %config.timeframe,
        bars = signals.len(),
        trades = summary.trades,
        source = loaded.source.as_str(),
        "analysis done"
    );

    Ok(Some(Analysis {
        code,
        name,
        series: signals,
        ledger,
        summary,
        source: loaded.source,
        data_hash: loaded.data_hash,
        config_fingerprint: config.fingerprint(),
    }))
}

/// Analyse one query on daily, weekly and monthly bars.
///
/// The configured timeframe is ignored; the strategy always runs on weekly bars.
pub fn analyze_full(query: &str, ctx: &AnalysisContext) -> Result<Option<FullAnalysis>, RunError> {
    let Some((code, name, loaded)) = resolve_and_load(query, ctx)? else {
        return Ok(None);
    };
    let config = &ctx.config;
    let params = config.indicator_params();

    let daily = restrict(loaded.series, config.years);
    let weekly = resample(&daily, Timeframe::Weekly)?;
    let monthly = resample(&daily, Timeframe::Monthly)?;
    if weekly.is_empty() {
        tracing::warn!(code = %code, "no bars left after filtering");
        return Ok(None);
    }

    let setup_only = FullIndicators {
        setup_counts: true,
        trend: false,
    };
    let everything = FullIndicators {
        setup_counts: true,
        trend: true,
    };

    let weekly = generate_signals(augment_full(weekly, &params, everything));
    let ledger = backtest(&weekly, &config.backtest_options());
    let summary = Summary::compute(&ledger);

    tracing::info!(code = %code, trades = summary.trades, "full analysis done");

    Ok(Some(FullAnalysis {
        code,
        name,
        daily: augment_full(daily, &params, setup_only),
        weekly,
        monthly: augment_full(monthly, &params, setup_only),
        ledger,
        summary,
        source: loaded.source,
    }))
}

/// Analyse every query in parallel, keyed by display name.
///
/// Keys are `name (code)` rather than the bare name, so two listings sharing a
/// name stay distinct; a code with no known name is keyed by the code alone.
/// Failures are logged and skipped; the result holds only successful analyses.
pub fn analyze_multi(queries: &[String], ctx: &AnalysisContext) -> BTreeMap<String, Analysis> {
    let results: Vec<(&String, Result<Option<Analysis>, RunError>)> = queries
        .par_iter()
        .map(|q| (q, analyze(q, ctx)))
        .collect();

    let mut out = BTreeMap::new();
    for (query, result) in results {
        match result {
            Ok(Some(analysis)) => {
                out.insert(analysis.display_name(), analysis);
            }
            Ok(None) => {}
            Err(e) => tracing::error!(query = %query, error = %e, "analysis failed"),
        }
    }

    tracing::info!("analysis complete {}/{}", out.len(), queries.len());
    out
}
