//! Setup counters (DeMark-style trend exhaustion).
//!
//! Compares each close with the close `lag` bars earlier:
//! - sell setup: consecutive bars with close[t] > close[t-lag]
//! - buy setup:  consecutive bars with close[t] < close[t-lag]
//!
//! A bar that breaks the streak resets the count to 0. The first `lag` bars are 0.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// Default comparison lag.
pub const DEFAULT_SETUP_LAG: usize = 4;

/// Sell/buy setup counts for one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupCount {
    /// Upside exhaustion count.
    pub sell: u32,
    /// Downside exhaustion count.
    pub buy: u32,
}

/// Compute setup counts for every bar.
pub fn setup_counts(bars: &[Bar], lag: usize) -> Vec<SetupCount> {
    assert!(lag >= 1, "setup lag must be >= 1");
    let mut out = vec![SetupCount::default(); bars.len()];
    for i in lag..bars.len() {
        let (now, then) = (bars[i].close, bars[i - lag].close);
        let prev = out[i - 1];
        out[i] = SetupCount {
            sell: if now > then { prev.sell + 1 } else { 0 },
            buy: if now < then { prev.buy + 1 } else { 0 },
        };
    }
    out
}
