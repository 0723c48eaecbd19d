//! Engine behaviour on scripted signal streams.

use chrono::NaiveDate;
use krxtrend_core::domain::{Bar, BarSeries, Timeframe};
use krxtrend_core::engine::{backtest, BacktestOptions};
use krxtrend_core::signals::SignalSeries;

fn weekly_bars(n: usize) -> Vec<Bar> {
    let first_friday = NaiveDate::from_ymd_opt(2023, 1, 6).unwrap();
    (0..n)
        .map(|i| {
            let open = 1_000.0 + i as f64 * 10.0;
            Bar {
                date: first_friday + chrono::Duration::weeks(i as i64),
                open,
                high: open + 40.0,
                low: open - 30.0,
                close: open + 15.0,
                volume: 50_000,
            }
        })
        .collect()
}

fn scripted(n: usize, buys: &[usize], sells: &[usize]) -> SignalSeries {
    let raw = (0..n).map(|i| (buys.contains(&i), sells.contains(&i))).collect();
    let series = BarSeries::new(Timeframe::Weekly, weekly_bars(n)).unwrap();
    SignalSeries::from_raw(series, raw).unwrap()
}

#[test]
fn three_bar_entry_and_exit_prices() {
    let s = scripted(3, &[1], &[2]);
    let ledger = backtest(&s, &BacktestOptions::default());

    assert_eq!(ledger.len(), 1);
    let trade = &ledger.trades()[0];
    assert_eq!(trade.entry_price, s.bars()[1].open);
    assert_eq!(trade.exit_price, s.bars()[2].close);
    assert_eq!(trade.entry_date, s.bars()[1].date);
    assert_eq!(trade.exit_date, s.bars()[2].date);
}

#[test]
fn compounding_ten_up_five_down() {
    let mut bars = weekly_bars(5);
    bars[1].open = 100.0;
    bars[2].close = 110.0;
    bars[3].open = 200.0;
    bars[4].close = 190.0;
    let series = BarSeries::new(Timeframe::Weekly, bars).unwrap();
    let raw = vec![(false, false), (true, false), (false, true), (true, false), (false, true)];
    let ledger = backtest(&SignalSeries::from_raw(series, raw).unwrap(), &BacktestOptions::default());

    let cumulative: Vec<f64> = ledger.iter().map(|t| t.cumulative_return).collect();
    assert_eq!(cumulative.len(), 2);
    assert!((cumulative[0] - 1.10).abs() < 1e-12);
    assert!((cumulative[1] - 1.045).abs() < 1e-12);
}

#[test]
fn repeated_runs_are_identical() {
    let s = scripted(12, &[1, 2, 6], &[4, 9]);
    let a = backtest(&s, &BacktestOptions::default());
    let b = backtest(&s, &BacktestOptions::default());
    assert_eq!(a, b);
}

#[test]
fn silent_stream_gives_empty_ledger() {
    let s = scripted(30, &[], &[]);
    assert!(backtest(&s, &BacktestOptions::default()).is_empty());
}

#[test]
fn consecutive_buys_open_once() {
    let s = scripted(8, &[2, 3, 4, 5], &[7]);
    let ledger = backtest(&s, &BacktestOptions::default());
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.trades()[0].entry_index, 2);
    assert_eq!(ledger.trades()[0].entry_price, s.bars()[2].open);
}

#[test]
fn three_cycle_script_state_machines_agree() {
    // Noise: buy at 0 (ignored), sell at 1 while flat, buy at 3 and 9 while long,
    // sell at 6 while flat, buy+sell at 8 while flat (opens only).
    let buys = [0, 2, 3, 8, 9, 14];
    let sells = [1, 5, 6, 8, 11, 17];
    let s = scripted(20, &buys, &sells);
    let ledger = backtest(&s, &BacktestOptions::default());

    let spans: Vec<(usize, usize)> = ledger.iter().map(|t| (t.entry_index, t.exit_index)).collect();
    assert_eq!(spans, vec![(2, 5), (8, 11), (14, 17)]);
    assert!(ledger.iter().all(|t| !t.closed_at_end));

    let actual: Vec<usize> = s
        .signals()
        .iter()
        .enumerate()
        .filter(|(_, sig)| sig.actual_sell)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(actual, vec![5, 11, 17]);

    // actualSell never fires outside a position
    let mut long = false;
    for (i, sig) in s.signals().iter().enumerate() {
        if sig.actual_sell {
            assert!(long, "actual sell at {i} while flat");
        }
        if ledger.iter().any(|t| t.entry_index == i) {
            long = true;
        }
        if ledger.iter().any(|t| t.exit_index == i) {
            long = false;
        }
    }
}

#[test]
fn close_last_toggle() {
    let s = scripted(6, &[2], &[]);

    let closed = backtest(&s, &BacktestOptions { close_last: true });
    assert_eq!(closed.len(), 1);
    assert!(closed.trades()[0].closed_at_end);
    assert_eq!(closed.trades()[0].exit_date, s.bars()[5].date);
    assert_eq!(closed.trades()[0].exit_price, s.bars()[5].close);

    let dropped = backtest(&s, &BacktestOptions { close_last: false });
    assert!(dropped.is_empty());
}
