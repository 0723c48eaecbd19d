//! Flat/long replay of buy and sell flags.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::trade::ClosedPosition;
use crate::domain::{Bar, TradeLedger};
use crate::signals::{Signal, SignalSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestOptions {
    /// Close a position still open after the last bar at that bar's close.
    /// When false the open position is dropped.
    pub close_last: bool,
}

impl Default for BacktestOptions {
    fn default() -> Self {
        Self { close_last: true }
    }
}

/// Engine position state between bars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionState {
    Flat,
    Long {
        entry_index: usize,
        entry_date: NaiveDate,
        entry_price: f64,
    },
}

impl PositionState {
    pub fn is_long(&self) -> bool {
        matches!(self, Self::Long { .. })
    }

    /// Apply bar `t`. Entry is checked before exit, so a bar flagged both buy
    /// and sell while flat only opens.
    fn step(self, t: usize, bar: &Bar, signal: &Signal) -> (Self, Option<ClosedPosition>) {
        match self {
            Self::Flat if signal.buy => {
                debug!(index = t, date = %bar.date, price = bar.open, "enter long");
                let next = Self::Long {
                    entry_index: t,
                    entry_date: bar.date,
                    entry_price: bar.open,
                };
                (next, None)
            }
            Self::Long {
                entry_index,
                entry_date,
                entry_price,
            } if signal.sell => {
                debug!(index = t, date = %bar.date, price = bar.close, "exit long");
                let closed = ClosedPosition {
                    entry_index,
                    entry_date,
                    entry_price,
                    exit_index: t,
                    exit_date: bar.date,
                    exit_price: bar.close,
                    closed_at_end: false,
                };
                (Self::Flat, Some(closed))
            }
            state => (state, None),
        }
    }
}

/// Replay `signals` from bar 1 and return the completed trades.
pub fn backtest(signals: &SignalSeries, options: &BacktestOptions) -> TradeLedger {
    replay(signals.bars(), signals.signals(), options)
}

fn replay(bars: &[Bar], signals: &[Signal], options: &BacktestOptions) -> TradeLedger {
    let mut state = PositionState::Flat;
    let mut closed = Vec::new();

    for (t, (bar, signal)) in bars.iter().zip(signals).enumerate().skip(1) {
        let (next, trade) = state.step(t, bar, signal);
        state = next;
        closed.extend(trade);
    }

    if let PositionState::Long {
        entry_index,
        entry_date,
        entry_price,
    } = state
    {
        match bars.last() {
            Some(last) if options.close_last => {
                debug!(date = %last.date, price = last.close, "close open position at last bar");
                closed.push(ClosedPosition {
                    entry_index,
                    entry_date,
                    entry_price,
                    exit_index: bars.len() - 1,
                    exit_date: last.date,
                    exit_price: last.close,
                    closed_at_end: true,
                });
            }
            _ => debug!(%entry_date, "open position discarded"),
        }
    }

    TradeLedger::from_closed(closed)
}
