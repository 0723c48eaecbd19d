//! KRX Trend Runner — analysis pipelines, data loading, summary and export.
//!
//! This crate builds on `krxtrend-core` to provide:
//! - Daily bar loading with cache/download/synthetic fallback
//! - `analyze`, `analyze_full` and `analyze_multi` pipelines
//! - Ledger summary statistics and text reports
//! - CSV/JSON export and chart data for external renderers
//! - TOML analysis config with a deterministic fingerprint

pub mod chart;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod report;
pub mod runner;

pub use chart::{ChartData, ChartMarkers, Marker};
pub use config::{AnalysisConfig, ConfigError, ConfigOverrides};
pub use data_loader::{load_daily, price_cache, LoadError, LoadOptions, LoadedSeries};
pub use export::{export_json, export_ledger_csv, import_json, write_analysis, AnalysisRecord};
pub use metrics::Summary;
pub use report::render_report;
pub use runner::{
    analyze, analyze_full, analyze_multi, Analysis, AnalysisContext, FullAnalysis, RunError,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn analysis_is_send_sync() {
        assert_send::<Analysis>();
        assert_sync::<Analysis>();
        assert_send::<FullAnalysis>();
        assert_sync::<FullAnalysis>();
    }

    #[test]
    fn context_is_send_sync() {
        assert_send::<AnalysisContext>();
        assert_sync::<AnalysisContext>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<AnalysisConfig>();
        assert_sync::<AnalysisConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
    }

    #[test]
    fn outputs_are_send_sync() {
        assert_send::<Summary>();
        assert_sync::<Summary>();
        assert_send::<ChartData>();
        assert_sync::<ChartData>();
        assert_send::<AnalysisRecord>();
        assert_sync::<AnalysisRecord>();
    }
}
