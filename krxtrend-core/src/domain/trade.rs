//! Trade and TradeLedger — completed round trips produced by the engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A completed long round trip: entry at a bar's open, exit at a bar's close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Entry ──
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_date: NaiveDate,
    pub exit_price: f64,

    // ── Returns ──
    /// `(exit_price - entry_price) / entry_price`.
    pub return_pct: f64,
    /// Running product of `(1 + return_pct)` up to and including this trade.
    pub cumulative_return: f64,

    /// True when the exit was synthesized at the last bar rather than by a sell signal.
    pub closed_at_end: bool,
}

impl Trade {
    pub fn bars_held(&self) -> usize {
        self.exit_index.saturating_sub(self.entry_index)
    }

    pub fn is_winner(&self) -> bool {
        self.return_pct > 0.0
    }
}

/// Chronological, non-overlapping trades from one engine run.
///
/// Read-only once built: the engine is the only producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

/// One closed position before returns are derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ClosedPosition {
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_index: usize,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub closed_at_end: bool,
}

impl TradeLedger {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Derive per-trade and compounded returns, in order.
    pub(crate) fn from_closed(closed: Vec<ClosedPosition>) -> Self {
        let mut equity = 1.0;
        let trades = closed
            .into_iter()
            .map(|c| {
                let return_pct = (c.exit_price - c.entry_price) / c.entry_price;
                equity *= 1.0 + return_pct;
                Trade {
                    entry_index: c.entry_index,
                    entry_date: c.entry_date,
                    entry_price: c.entry_price,
                    exit_index: c.exit_index,
                    exit_date: c.exit_date,
                    exit_price: c.exit_price,
                    return_pct,
                    cumulative_return: equity,
                    closed_at_end: c.closed_at_end,
                }
            })
            .collect();
        Self { trades }
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn last(&self) -> Option<&Trade> {
        self.trades.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trade> {
        self.trades.iter()
    }

    pub fn returns(&self) -> Vec<f64> {
        self.trades.iter().map(|t| t.return_pct).collect()
    }

    pub fn entry_dates(&self) -> Vec<NaiveDate> {
        self.trades.iter().map(|t| t.entry_date).collect()
    }
}

impl<'a> IntoIterator for &'a TradeLedger {
    type Item = &'a Trade;
    type IntoIter = std::slice::Iter<'a, Trade>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.iter()
    }
}
