//! Trend classifier (Elder impulse).
//!
//! EMA(span) of close plus MACD(12, 26, 9). A bar is:
//! - bull when both the EMA and the MACD histogram rose vs the prior bar
//! - bear when both fell
//! - neutral otherwise (including bar 0, which has no prior bar)

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ema::ema_of_series;
use crate::domain::Bar;

pub const DEFAULT_TREND_EMA: usize = 13;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendState {
    Bull,
    Bear,
    Neutral,
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bull => "bull",
            Self::Bear => "bear",
            Self::Neutral => "neutral",
        })
    }
}

/// Classifier output for one bar, with the series it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Impulse {
    pub ema: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub state: TrendState,
}

fn classify(ema_slope: Option<f64>, hist_slope: Option<f64>) -> TrendState {
    match (ema_slope, hist_slope) {
        (Some(e), Some(h)) if e > 0.0 && h > 0.0 => TrendState::Bull,
        (Some(e), Some(h)) if e < 0.0 && h < 0.0 => TrendState::Bear,
        _ => TrendState::Neutral,
    }
}

/// Compute the trend classifier for every bar.
pub fn impulse(bars: &[Bar], ema_span: usize) -> Vec<Impulse> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema = ema_of_series(&closes, ema_span);
    let fast = ema_of_series(&closes, MACD_FAST);
    let slow = ema_of_series(&closes, MACD_SLOW);
    let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema_of_series(&macd, MACD_SIGNAL);

    (0..bars.len())
        .map(|i| {
            let hist = macd[i] - signal[i];
            let state = if i == 0 {
                TrendState::Neutral
            } else {
                let prev_hist = macd[i - 1] - signal[i - 1];
                classify(Some(ema[i] - ema[i - 1]), Some(hist - prev_hist))
            };
            Impulse {
                ema: ema[i],
                macd: macd[i],
                macd_signal: signal[i],
                macd_hist: hist,
                state,
            }
        })
        .collect()
}
