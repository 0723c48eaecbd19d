//! Ticker directory: code/name lookup for listed issues.

use super::provider::DataError;
use crate::domain::Code;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One listed issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Six-character short code, e.g. `005930`.
    pub code: String,
    pub name: String,
    /// Twelve-character ISIN, needed by the KRX portal.
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
}

impl Listing {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            isin: None,
            market: None,
        }
    }
}

/// True for a six-digit numeric string.
pub fn looks_like_code(query: &str) -> bool {
    query.len() == 6 && query.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerDirectory {
    listings: Vec<Listing>,
}

impl TickerDirectory {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self { listings }
    }

    pub fn load_csv(path: &Path) -> Result<Self, DataError> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| DataError::CsvError(format!("{}: {e}", path.display())))?;
        let listings = reader
            .deserialize()
            .collect::<Result<Vec<Listing>, _>>()
            .map_err(|e| DataError::CsvError(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), listings = listings.len(), "loaded ticker directory");
        Ok(Self { listings })
    }

    pub fn save_csv(&self, path: &Path) -> Result<(), DataError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;
        }
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| DataError::CsvError(format!("{}: {e}", path.display())))?;
        for listing in &self.listings {
            writer
                .serialize(listing)
                .map_err(|e| DataError::CsvError(e.to_string()))?;
        }
        writer.flush().map_err(|e| DataError::CsvError(e.to_string()))?;
        Ok(())
    }

    /// Resolve a name or code to a code.
    ///
    /// Order: a six-digit query is taken as a code as-is, then an exact code
    /// match, an exact name match, and finally the first listing whose name
    /// contains the query.
    pub fn resolve(&self, query: &str) -> Option<Code> {
        let q = query.trim();
        if q.is_empty() {
            return None;
        }
        if looks_like_code(q) {
            return Some(q.to_string());
        }

        self.listings
            .iter()
            .find(|l| l.code == q)
            .or_else(|| self.listings.iter().find(|l| l.name == q))
            .or_else(|| self.listings.iter().find(|l| l.name.contains(q)))
            .map(|l| l.code.clone())
    }

    /// Display name for a code, or the code itself when unknown.
    pub fn name_of(&self, code: &str) -> String {
        self.get(code)
            .map(|l| l.name.clone())
            .unwrap_or_else(|| code.to_string())
    }

    pub fn get(&self, code: &str) -> Option<&Listing> {
        self.listings.iter().find(|l| l.code == code)
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}
