//! Offline provider backed by `{dir}/{code}.csv` files.
//!
//! Columns: `date,open,high,low,close,volume` with ISO dates. The files carry one
//! price kind; the provider reports whatever `adjusted` it was built with.

use super::provider::{clean_bars, within, DataError, DataProvider, DataSource, FetchResult};
use crate::domain::Bar;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub struct CsvProvider {
    dir: PathBuf,
    adjusted: bool,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>, adjusted: bool) -> Self {
        Self {
            dir: dir.into(),
            adjusted,
        }
    }

    pub fn path_for(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{code}.csv"))
    }
}

/// Read every bar from a CSV file.
pub fn read_bars_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::CsvError(format!("{}: {e}", path.display())))?;
    reader
        .deserialize()
        .collect::<Result<Vec<Bar>, _>>()
        .map_err(|e| DataError::CsvError(format!("{}: {e}", path.display())))
}

/// Write bars as CSV with a header row.
pub fn write_bars_csv(path: &Path, bars: &[Bar]) -> Result<(), DataError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| DataError::CsvError(format!("{}: {e}", path.display())))?;
    for bar in bars {
        writer
            .serialize(bar)
            .map_err(|e| DataError::CsvError(e.to_string()))?;
    }
    writer.flush().map_err(|e| DataError::CsvError(e.to_string()))
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
        adjusted: bool,
    ) -> Result<FetchResult, DataError> {
        if adjusted != self.adjusted {
            return Err(DataError::UnsupportedAdjustment {
                provider: "csv",
                kind: if adjusted { "adjusted" } else { "unadjusted" },
            });
        }

        let path = self.path_for(code);
        if !path.exists() {
            return Err(DataError::CodeNotFound {
                code: code.to_string(),
            });
        }

        let bars = within(clean_bars(read_bars_csv(&path)?), start, end);
        Ok(FetchResult {
            code: code.to_string(),
            bars,
            source: DataSource::CsvImport,
        })
    }

    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("krxtrend_csv_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn reads_and_filters_range() {
        let dir = temp_dir();
        fs::write(
            dir.join("005930.csv"),
            "date,open,high,low,close,volume\n\
             2024-01-03, 101, 103, 100, 102, 1100\n\
             2024-01-02, 100, 102, 99, 101, 1000\n\
             2024-01-04, 0, 0, 0, 0, 0\n\
             2024-01-05, 102, 104, 101, 103, 900\n",
        )
        .unwrap();

        let provider = CsvProvider::new(&dir, true);
        let result = provider.fetch("005930", d(2), d(4), true).unwrap();
        assert_eq!(result.source, DataSource::CsvImport);
        assert_eq!(result.bars.len(), 2);
        assert_eq!(result.bars[0].date, d(2));
        assert_eq!(result.bars[1].close, 102.0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = temp_dir();
        let provider = CsvProvider::new(&dir, true);
        assert!(matches!(
            provider.fetch("000000", d(1), d(9), true),
            Err(DataError::CodeNotFound { .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn wrong_adjustment_is_refused() {
        let provider = CsvProvider::new("/nonexistent", true);
        assert!(matches!(
            provider.fetch("005930", d(1), d(9), false),
            Err(DataError::UnsupportedAdjustment { .. })
        ));
    }

    #[test]
    fn write_then_read() {
        let dir = temp_dir();
        let path = dir.join("x.csv");
        let bars = vec![Bar {
            date: d(2),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 7,
        }];
        write_bars_csv(&path, &bars).unwrap();
        assert_eq!(read_bars_csv(&path).unwrap(), bars);
        let _ = fs::remove_dir_all(&dir);
    }
}
