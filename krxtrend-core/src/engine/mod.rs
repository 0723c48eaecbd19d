//! Backtest engine: replays a raw signal stream into a trade ledger.
//!
//! One pass over the bars with a two-state machine (flat / long). Entries fill at
//! the signal bar's open, exits at the signal bar's close. No sizing, fees or
//! slippage: each trade's return is the price change between the two fills.

pub mod backtest;

pub use backtest::{backtest, BacktestOptions, PositionState};
