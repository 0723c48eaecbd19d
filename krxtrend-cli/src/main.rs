//! KRX Trend CLI — analysis, lookup, download and cache commands.
//!
//! Commands:
//! - `analyze` — weekly (or configured) strategy and backtest for one name or code
//! - `full` — daily/weekly/monthly analysis with setup counts and trend state
//! - `multi` — `analyze` over several names or codes in parallel
//! - `lookup` — resolve a name or code against the ticker directory
//! - `download` — fetch daily bars into the Parquet cache
//! - `cache status` — cached codes, date ranges and sizes per price kind

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::prelude::*;

use krxtrend_core::data::{
    download_codes, resolve_range, CacheMeta, CircuitBreaker, CsvProvider, DataProvider,
    DataSource, DownloadRequest, KrxProvider, NaverProvider, TickerDirectory,
};
use krxtrend_core::domain::Timeframe;
use krxtrend_runner::report::render_multi_table;
use krxtrend_runner::{
    analyze, analyze_full, analyze_multi, price_cache, render_report, write_analysis,
    AnalysisConfig, AnalysisContext, ConfigOverrides,
};

#[derive(Parser)]
#[command(name = "krxtrend", about = "KRX Trend CLI — weekly trend-following signals and backtests")]
struct Cli {
    /// Debug-level logging (RUST_LOG still wins when set).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// TOML analysis config. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory. Defaults to the config value (data/cache).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Price source.
    #[arg(long, global = true, value_enum, default_value_t = ProviderKind::Auto)]
    provider: ProviderKind,

    /// Directory of `{code}.csv` files for `--provider csv`.
    #[arg(long, global = true, default_value = "data/csv")]
    csv_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    /// Naver for adjusted prices, KRX for raw prices.
    Auto,
    Naver,
    Krx,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse one stock by name or six-digit code.
    Analyze {
        query: String,
        #[command(flatten)]
        opts: AnalysisArgs,
    },
    /// Daily/weekly/monthly analysis with setup counts and trend state.
    Full {
        query: String,
        #[command(flatten)]
        opts: AnalysisArgs,
    },
    /// Analyse several stocks in parallel.
    Multi {
        #[arg(required = true)]
        queries: Vec<String>,
        #[command(flatten)]
        opts: AnalysisArgs,
    },
    /// Resolve a name or code.
    Lookup {
        query: String,
        /// Re-download the listed-issue directory from KRX first.
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Fetch daily bars into the cache.
    Download {
        #[arg(required = true)]
        queries: Vec<String>,
        /// Start date (YYYYMMDD or YYYY-MM-DD). Defaults to three years before end.
        #[arg(long)]
        start: Option<String>,
        /// End date. Defaults to today.
        #[arg(long)]
        end: Option<String>,
        /// Raw (unadjusted) prices.
        #[arg(long, default_value_t = false)]
        raw: bool,
        /// Re-fetch even if the cache covers the range.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached codes, date ranges and sizes.
    Status,
}

#[derive(Args, Debug, Clone, Default)]
struct AnalysisArgs {
    /// Start date (YYYYMMDD or YYYY-MM-DD).
    #[arg(long)]
    start: Option<String>,
    /// End date (YYYYMMDD or YYYY-MM-DD).
    #[arg(long)]
    end: Option<String>,
    /// Keep only the last N years of bars.
    #[arg(long)]
    years: Option<u32>,
    /// Moving-average window.
    #[arg(long)]
    ma_period: Option<usize>,
    /// Money-flow window.
    #[arg(long)]
    money_flow_period: Option<usize>,
    /// daily, weekly or monthly (ignored by `full`).
    #[arg(long)]
    timeframe: Option<Timeframe>,
    /// Raw (unadjusted) prices.
    #[arg(long, default_value_t = false)]
    raw: bool,
    /// Drop a position still open at the last bar instead of closing it.
    #[arg(long, default_value_t = false)]
    keep_open: bool,
    /// Never touch the network.
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Fall back to synthetic bars when no data is available.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// Re-fetch even if cached.
    #[arg(long, default_value_t = false)]
    force: bool,
    /// Write ledger CSV and summary JSON here.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Write chart JSON here.
    #[arg(long)]
    chart_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let base = match &cli.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    let base = base.apply(ConfigOverrides {
        cache_dir: cli.cache_dir.clone(),
        ..Default::default()
    })?;

    match &cli.command {
        Commands::Analyze { query, opts } => run_analyze(&cli, base, query, opts),
        Commands::Full { query, opts } => run_full(&cli, base, query, opts),
        Commands::Multi { queries, opts } => run_multi(&cli, base, queries, opts),
        Commands::Lookup { query, refresh } => run_lookup(&base, query, *refresh),
        Commands::Download {
            queries,
            start,
            end,
            raw,
            force,
        } => run_download(&cli, &base, queries, start.as_deref(), end.as_deref(), *raw, *force),
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&base.cache_dir),
        },
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("krxtrend_core={default},krxtrend_runner={default},krxtrend={default}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

// ─── Wiring ─────────────────────────────────────────────────────────

fn build_provider(cli: &Cli, adjusted: bool) -> Result<Arc<dyn DataProvider>> {
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let provider: Arc<dyn DataProvider> = match (cli.provider, adjusted) {
        (ProviderKind::Csv, _) => Arc::new(CsvProvider::new(&cli.csv_dir, adjusted)),
        (ProviderKind::Naver, _) | (ProviderKind::Auto, true) => Arc::new(NaverProvider::new(breaker)?),
        (ProviderKind::Krx, _) | (ProviderKind::Auto, false) => Arc::new(KrxProvider::new(breaker)?),
    };
    Ok(provider)
}

fn directory_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("tickers.csv")
}

/// Saved directory if present; otherwise fetch from KRX (unless offline) and save it.
///
/// Without either, the directory is empty and only six-digit codes resolve.
fn load_directory(cache_dir: &Path, offline: bool, refresh: bool) -> Result<TickerDirectory> {
    let path = directory_path(cache_dir);
    if path.exists() && !refresh {
        return TickerDirectory::load_csv(&path).with_context(|| format!("failed to read {}", path.display()));
    }
    if offline {
        tracing::warn!("no saved ticker directory; only six-digit codes will resolve");
        return Ok(TickerDirectory::default());
    }

    let krx = KrxProvider::new(Arc::new(CircuitBreaker::default_provider()))?;
    match krx.listings() {
        Ok(listings) => {
            let directory = TickerDirectory::new(listings.as_ref().clone());
            std::fs::create_dir_all(cache_dir)?;
            directory.save_csv(&path)?;
            tracing::info!(issues = directory.len(), path = %path.display(), "saved ticker directory");
            Ok(directory)
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to fetch ticker directory; only six-digit codes will resolve");
            Ok(TickerDirectory::default())
        }
    }
}

fn build_context(cli: &Cli, base: AnalysisConfig, opts: &AnalysisArgs) -> Result<AnalysisContext> {
    let config = base.apply(ConfigOverrides {
        ma_period: opts.ma_period,
        money_flow_period: opts.money_flow_period,
        adjusted: opts.raw.then_some(false),
        timeframe: opts.timeframe,
        close_last: opts.keep_open.then_some(false),
        start: opts.start.clone(),
        end: opts.end.clone(),
        years: opts.years,
        cache_dir: None,
    })?;

    let directory = load_directory(&config.cache_dir, opts.offline, false)?;
    let provider = if opts.offline {
        None
    } else {
        Some(build_provider(cli, config.adjusted)?)
    };
    let today = chrono::Local::now().date_naive();
    let mut ctx = AnalysisContext::new(config, directory, today);
    if let Some(provider) = provider {
        ctx = ctx.with_provider(provider);
    }
    ctx.offline = opts.offline;
    ctx.synthetic = opts.synthetic;
    ctx.force = opts.force;

    tracing::debug!(fingerprint = %ctx.config.fingerprint(), "analysis config");
    Ok(ctx)
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_analyze(cli: &Cli, base: AnalysisConfig, query: &str, opts: &AnalysisArgs) -> Result<()> {
    let ctx = build_context(cli, base, opts)?;
    let Some(analysis) = analyze(query, &ctx)? else {
        bail!("no analysis for '{query}'");
    };

    print!("{}", render_report(&analysis.display_name(), &analysis.ledger, &analysis.summary));
    if analysis.source == DataSource::Synthetic {
        println!("\nWARNING: results based on SYNTHETIC data");
    }

    if let Some(dir) = &opts.output_dir {
        write_analysis(dir, &analysis)?;
    }
    if let Some(dir) = &opts.chart_dir {
        analysis.chart().write_json(&dir.join(format!("{}_chart.json", analysis.code)))?;
    }
    Ok(())
}

fn run_full(cli: &Cli, base: AnalysisConfig, query: &str, opts: &AnalysisArgs) -> Result<()> {
    let ctx = build_context(cli, base, opts)?;
    let Some(full) = analyze_full(query, &ctx)? else {
        bail!("no analysis for '{query}'");
    };

    print!("{}", render_report(&full.display_name(), &full.ledger, &full.summary));
    println!();
    println!("bars: {} daily, {} weekly, {} monthly", full.daily.len(), full.weekly.len(), full.monthly.len());

    if let Some(row) = full.weekly.indicators().rows().last() {
        if let Some(trend) = row.trend {
            println!("weekly trend: {}", trend.state);
        }
        if let Some(setup) = row.setup {
            println!("weekly setup: sell {} / buy {}", setup.sell, setup.buy);
        }
    }

    if let Some(dir) = &opts.chart_dir {
        for (i, chart) in full.charts().iter().enumerate() {
            chart.write_json(&dir.join(format!("{}_full_{i}.json", full.code)))?;
        }
    }
    Ok(())
}

fn run_multi(cli: &Cli, base: AnalysisConfig, queries: &[String], opts: &AnalysisArgs) -> Result<()> {
    let ctx = build_context(cli, base, opts)?;
    let results = analyze_multi(queries, &ctx);

    for (name, analysis) in &results {
        print!("{}", render_report(name, &analysis.ledger, &analysis.summary));
        println!();
        if let Some(dir) = &opts.output_dir {
            write_analysis(dir, analysis)?;
        }
        if let Some(dir) = &opts.chart_dir {
            analysis.chart().write_json(&dir.join(format!("{}_chart.json", analysis.code)))?;
        }
    }

    print!(
        "{}",
        render_multi_table(results.iter().map(|(name, a)| (name.as_str(), &a.summary)))
    );
    println!("\n=== analysed {}/{} ===", results.len(), queries.len());
    Ok(())
}

fn run_lookup(base: &AnalysisConfig, query: &str, refresh: bool) -> Result<()> {
    let directory = load_directory(&base.cache_dir, false, refresh)?;
    match directory.resolve(query) {
        Some(code) => {
            let listing = directory.get(&code);
            println!("{code}\t{}", directory.name_of(&code));
            if let Some(isin) = listing.and_then(|l| l.isin.as_deref()) {
                println!("isin:   {isin}");
            }
            if let Some(market) = listing.and_then(|l| l.market.as_deref()) {
                println!("market: {market}");
            }
            Ok(())
        }
        None => bail!("'{query}' not found in {} listed issues", directory.len()),
    }
}

fn run_download(
    cli: &Cli,
    base: &AnalysisConfig,
    queries: &[String],
    start: Option<&str>,
    end: Option<&str>,
    raw: bool,
    force: bool,
) -> Result<()> {
    let adjusted = !raw;
    let (start, end) = resolve_range(start, end, chrono::Local::now().date_naive())?;
    let directory = load_directory(&base.cache_dir, false, false)?;

    let mut codes = Vec::new();
    for q in queries {
        match directory.resolve(q) {
            Some(code) => codes.push(code),
            None => tracing::warn!(query = %q, "symbol not found, skipping"),
        }
    }
    if codes.is_empty() {
        bail!("none of the queries resolved to a code");
    }

    let provider = build_provider(cli, adjusted)?;
    let cache = price_cache(&base.cache_dir, adjusted);
    let request = DownloadRequest {
        start,
        end,
        adjusted,
        force,
    };
    let summary = download_codes(provider.as_ref(), &cache, &codes, &request);

    println!(
        "downloaded {} / skipped {} / failed {} of {}",
        summary.succeeded,
        summary.skipped,
        summary.failed(),
        summary.total
    );
    if !summary.all_succeeded() {
        for (code, err) in &summary.errors {
            eprintln!("error for {code}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    for adjusted in [true, false] {
        let cache = price_cache(cache_dir, adjusted);
        let codes = cache.cached_codes();
        let kind = if adjusted { "adjusted" } else { "raw" };
        println!("[{kind}] {}", cache.cache_dir().display());
        if codes.is_empty() {
            println!("  (empty)");
            println!();
            continue;
        }

        let mut total_size = 0u64;
        println!(
            "  {:<8} {:<25} {:>8} {:>6} {:<10} {:>10}",
            "Code", "Date Range", "Bars", "Spans", "Source", "Size"
        );
        println!("  {}", "-".repeat(73));
        for code in &codes {
            let dir = cache.cache_dir().join(format!("code={code}"));
            let size = dir_size(&dir);
            total_size += size;
            let (range, bars, spans, source) = match cache.get_meta(code) {
                Some(CacheMeta {
                    start_date,
                    end_date,
                    bar_count,
                    source,
                    spans,
                    ..
                }) => (
                    format!("{start_date} to {end_date}"),
                    bar_count.to_string(),
                    spans.len().to_string(),
                    source.as_str(),
                ),
                None => ("(no meta)".into(), "-".into(), "-".into(), "-"),
            };
            println!(
                "  {:<8} {:<25} {:>8} {:>6} {:<10} {:>10}",
                code,
                range,
                bars,
                spans,
                source,
                format_size(size)
            );
        }
        println!("  {} codes, {}", codes.len(), format_size(total_size));
        println!();
    }
    Ok(())
}

fn dir_size(path: &Path) -> u64 {
    let mut size = 0u64;
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            if let Ok(meta) = entry.metadata() {
                size += meta.len();
            }
        }
    }
    size
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
