//! Analysis configuration, loaded from TOML.
//!
//! Every field has a default so an empty file (or no file at all) yields the
//! stock weekly strategy. CLI flags are applied on top with [`AnalysisConfig::apply`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use krxtrend_core::domain::Timeframe;
use krxtrend_core::engine::BacktestOptions;
use krxtrend_core::indicators::IndicatorParams;

/// Errors from reading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Parameters of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Moving-average window.
    pub ma_period: usize,
    /// Money-flow oscillator window.
    pub money_flow_period: usize,
    /// Split/dividend adjusted prices when true, raw exchange prices otherwise.
    pub adjusted: bool,
    /// Bar granularity the strategy runs on.
    pub timeframe: Timeframe,
    /// Close a still-open position at the last bar.
    pub close_last: bool,
    /// Inclusive start date (`YYYYMMDD` or `YYYY-MM-DD`); defaults to three years before `end`.
    pub start: Option<String>,
    /// Inclusive end date; defaults to today.
    pub end: Option<String>,
    /// Restrict the analysed series to the last N years before indicators are computed.
    pub years: Option<u32>,
    /// Root of the Parquet bar cache.
    pub cache_dir: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let params = IndicatorParams::default();
        Self {
            ma_period: params.ma_period,
            money_flow_period: params.money_flow_period,
            adjusted: true,
            timeframe: Timeframe::Weekly,
            close_last: true,
            start: None,
            end: None,
            years: None,
            cache_dir: PathBuf::from("data/cache"),
        }
    }
}

/// Command-line overrides; `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub ma_period: Option<usize>,
    pub money_flow_period: Option<usize>,
    pub adjusted: Option<bool>,
    pub timeframe: Option<Timeframe>,
    pub close_last: Option<bool>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub years: Option<u32>,
    pub cache_dir: Option<PathBuf>,
}

impl AnalysisConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ma_period == 0 {
            return Err(ConfigError::Invalid("ma_period must be at least 1".into()));
        }
        if self.money_flow_period == 0 {
            return Err(ConfigError::Invalid(
                "money_flow_period must be at least 1".into(),
            ));
        }
        if self.years == Some(0) {
            return Err(ConfigError::Invalid("years must be at least 1".into()));
        }
        Ok(())
    }

    /// Overlay CLI flags and re-validate.
    pub fn apply(mut self, o: ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(v) = o.ma_period {
            self.ma_period = v;
        }
        if let Some(v) = o.money_flow_period {
            self.money_flow_period = v;
        }
        if let Some(v) = o.adjusted {
            self.adjusted = v;
        }
        if let Some(v) = o.timeframe {
            self.timeframe = v;
        }
        if let Some(v) = o.close_last {
            self.close_last = v;
        }
        if o.start.is_some() {
            self.start = o.start;
        }
        if o.end.is_some() {
            self.end = o.end;
        }
        if o.years.is_some() {
            self.years = o.years;
        }
        if let Some(v) = o.cache_dir {
            self.cache_dir = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            ma_period: self.ma_period,
            money_flow_period: self.money_flow_period,
        }
    }

    pub fn backtest_options(&self) -> BacktestOptions {
        BacktestOptions {
            close_last: self.close_last,
        }
    }

    /// Deterministic BLAKE3 hash of the serialized config.
    ///
    /// Two configs that would produce the same analysis share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AnalysisConfig::from_toml("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.ma_period, 10);
        assert_eq!(config.money_flow_period, 4);
        assert!(config.adjusted);
        assert_eq!(config.timeframe, Timeframe::Weekly);
        assert!(config.close_last);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AnalysisConfig::from_toml(
            r#"
ma_period = 20
timeframe = "monthly"
adjusted = false
"#,
        )
        .unwrap();
        assert_eq!(config.ma_period, 20);
        assert_eq!(config.timeframe, Timeframe::Monthly);
        assert!(!config.adjusted);
        assert_eq!(config.money_flow_period, 4);
    }

    #[test]
    fn zero_period_rejected() {
        let err = AnalysisConfig::from_toml("ma_period = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = AnalysisConfig::from_toml("ma_period = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn overrides_win_over_file() {
        let config = AnalysisConfig::default()
            .apply(ConfigOverrides {
                ma_period: Some(5),
                close_last: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.ma_period, 5);
        assert!(!config.close_last);
        assert_eq!(config.money_flow_period, 4);
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = AnalysisConfig::default();
        let b = AnalysisConfig::default();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let c = AnalysisConfig {
            ma_period: 11,
            ..Default::default()
        };
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn toml_round_trip() {
        let config = AnalysisConfig {
            years: Some(2),
            start: Some("2022-01-03".into()),
            ..Default::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(AnalysisConfig::from_toml(&text).unwrap(), config);
    }
}
