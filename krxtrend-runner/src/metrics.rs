//! Ledger summary statistics — pure reductions over a trade ledger.
//!
//! Every statistic is 0 on an empty ledger.

use serde::{Deserialize, Serialize};
use krxtrend_core::domain::{Trade, TradeLedger};

/// Aggregate statistics for one backtest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub trades: usize,
    /// Mean per-trade return, as a fraction.
    pub avg_return: f64,
    /// Compounded return of all trades: `last.cumulative_return - 1`.
    pub cumulative_return: f64,
    /// Fraction of trades with a positive return.
    pub win_rate: f64,
    pub best_return: f64,
    pub worst_return: f64,
    pub avg_bars_held: f64,
    /// Largest peak-to-trough decline of the compounded trade equity, non-positive.
    pub max_drawdown: f64,
}

impl Summary {
    pub fn compute(ledger: &TradeLedger) -> Self {
        let trades = ledger.trades();
        if trades.is_empty() {
            return Self::default();
        }
        Self {
            trades: trades.len(),
            avg_return: avg_return(trades),
            cumulative_return: cumulative_return(trades),
            win_rate: win_rate(trades),
            best_return: best_return(trades),
            worst_return: worst_return(trades),
            avg_bars_held: avg_bars_held(trades),
            max_drawdown: max_drawdown(trades),
        }
    }
}

// ─── Individual statistics ──────────────────────────────────────────

pub fn avg_return(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.return_pct).sum::<f64>() / trades.len() as f64
}

pub fn cumulative_return(trades: &[Trade]) -> f64 {
    trades.last().map_or(0.0, |t| t.cumulative_return - 1.0)
}

pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

pub fn best_return(trades: &[Trade]) -> f64 {
    trades
        .iter()
        .map(|t| t.return_pct)
        .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))))
        .unwrap_or(0.0)
}

pub fn worst_return(trades: &[Trade]) -> f64 {
    trades
        .iter()
        .map(|t| t.return_pct)
        .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.min(r))))
        .unwrap_or(0.0)
}

pub fn avg_bars_held(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.bars_held() as f64).sum::<f64>() / trades.len() as f64
}

/// Drawdown over the equity curve `1.0, cum[0], cum[1], ...`.
///
/// The starting equity of 1.0 counts as a peak, so a losing first trade is a drawdown.
pub fn max_drawdown(trades: &[Trade]) -> f64 {
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for t in trades {
        let equity = t.cumulative_return;
        peak = peak.max(equity);
        if peak > 0.0 {
            worst = worst.min((equity - peak) / peak);
        }
    }
    worst
}
