//! Ledger and analysis export — CSV and JSON.
//!
//! Persisted analysis JSON carries a `schema_version`; unknown versions are
//! rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use krxtrend_core::domain::{Timeframe, TradeLedger};

use crate::metrics::Summary;
use crate::runner::Analysis;

pub const SCHEMA_VERSION: u32 = 1;

// ─── CSV ────────────────────────────────────────────────────────────

/// Ledger as CSV, one row per trade.
///
/// Columns: entry_index, entry_date, entry_price, exit_index, exit_date,
/// exit_price, return_pct, cumulative_return, bars_held, closed_at_end
pub fn export_ledger_csv(ledger: &TradeLedger) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_index",
        "entry_date",
        "entry_price",
        "exit_index",
        "exit_date",
        "exit_price",
        "return_pct",
        "cumulative_return",
        "bars_held",
        "closed_at_end",
    ])?;

    for t in ledger {
        wtr.write_record([
            &t.entry_index.to_string(),
            &t.entry_date.to_string(),
            &format!("{:.2}", t.entry_price),
            &t.exit_index.to_string(),
            &t.exit_date.to_string(),
            &format!("{:.2}", t.exit_price),
            &format!("{:.6}", t.return_pct),
            &format!("{:.6}", t.cumulative_return),
            &t.bars_held().to_string(),
            &t.closed_at_end.to_string(),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

// ─── JSON ───────────────────────────────────────────────────────────

/// Serializable snapshot of one analysis: identity, ledger and summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub code: String,
    pub name: String,
    pub timeframe: Timeframe,
    pub bar_count: usize,
    pub source: String,
    pub data_hash: String,
    pub config_fingerprint: String,
    pub ledger: TradeLedger,
    pub summary: Summary,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl AnalysisRecord {
    pub fn from_analysis(analysis: &Analysis) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            code: analysis.code.clone(),
            name: analysis.name.clone(),
            timeframe: analysis.series.timeframe(),
            bar_count: analysis.series.len(),
            source: analysis.source.as_str().to_string(),
            data_hash: analysis.data_hash.clone(),
            config_fingerprint: analysis.config_fingerprint.clone(),
            ledger: analysis.ledger.clone(),
            summary: analysis.summary,
        }
    }
}

pub fn export_json(record: &AnalysisRecord) -> Result<String> {
    serde_json::to_string_pretty(record).context("failed to serialize analysis to JSON")
}

pub fn import_json(json: &str) -> Result<AnalysisRecord> {
    let record: AnalysisRecord =
        serde_json::from_str(json).context("failed to deserialize analysis from JSON")?;
    if record.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            record.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(record)
}

/// Write `{dir}/{code}_ledger.csv` and `{dir}/{code}.json`.
pub fn write_analysis(dir: &Path, analysis: &Analysis) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let csv_path = dir.join(format!("{}_ledger.csv", analysis.code));
    std::fs::write(&csv_path, export_ledger_csv(&analysis.ledger)?)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;

    let json_path = dir.join(format!("{}.json", analysis.code));
    std::fs::write(&json_path, export_json(&AnalysisRecord::from_analysis(analysis))?)
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    tracing::info!(code = %analysis.code, dir = %dir.display(), "exported ledger and summary");
    Ok(())
}
