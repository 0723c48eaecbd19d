//! Domain types for KRX Trend

pub mod bar;
pub mod trade;

pub use bar::{Bar, BarSeries, SeriesError, Timeframe};
pub use trade::{Trade, TradeLedger};

/// Canonical six-character KRX issue code (e.g. `005930`).
pub type Code = String;
