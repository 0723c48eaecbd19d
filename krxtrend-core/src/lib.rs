//! KRX Trend Core — bar series, indicators, signal stage, backtest engine, data layer.
//!
//! Pipeline for one code:
//! - `data`: fetch daily bars (Naver / KRX / CSV), cache them, resample
//! - `indicators`: augment the bars with MA, money flow, sentiment and friends
//! - `signals`: raw buy/sell rules plus the position-gated exit filter
//! - `engine`: replay the raw signals into a trade ledger

pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod signals;

pub use domain::{Bar, BarSeries, SeriesError, Timeframe, Trade, TradeLedger};
pub use engine::{backtest, BacktestOptions};
pub use indicators::{augment, augment_full, IndicatorParams, IndicatorSeries};
pub use signals::{generate_signals, Signal, SignalSeries};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: pipeline types can cross threads for multi-code runs.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<BarSeries>();
        require_sync::<BarSeries>();
        require_send::<TradeLedger>();
        require_sync::<TradeLedger>();
        require_send::<IndicatorSeries>();
        require_sync::<IndicatorSeries>();
        require_send::<SignalSeries>();
        require_sync::<SignalSeries>();

        require_send::<data::ParquetCache>();
        require_sync::<data::ParquetCache>();
        require_send::<data::TickerDirectory>();
        require_sync::<data::TickerDirectory>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::NaverProvider>();
        require_sync::<data::NaverProvider>();
        require_send::<data::KrxProvider>();
        require_sync::<data::KrxProvider>();
    }

    #[test]
    fn pipeline_end_to_end_on_synthetic_bars() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.35).sin() * 12.0 + i as f64 * 0.2)
            .collect();
        let series = BarSeries::new(Timeframe::Daily, crate::indicators::make_bars(&closes)).unwrap();

        let signals = generate_signals(augment(series, &IndicatorParams::default()));
        let ledger = backtest(&signals, &BacktestOptions::default());

        assert_eq!(signals.len(), 60);
        for pair in ledger.trades().windows(2) {
            assert!(pair[0].exit_date <= pair[1].entry_date);
        }
        for trade in ledger.iter().filter(|t| !t.closed_at_end) {
            assert!(signals.signals()[trade.exit_index].actual_sell);
        }
    }
}
