//! Criterion benchmarks for the per-code hot path.
//!
//! Benchmarks:
//! 1. Indicator augmentation (base bundle and full bundle)
//! 2. Signal generation over an augmented series
//! 3. Backtest replay
//! 4. Daily to weekly resampling

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use krxtrend_core::data::resample_weekly;
use krxtrend_core::domain::{Bar, BarSeries, Timeframe};
use krxtrend_core::engine::{backtest, BacktestOptions};
use krxtrend_core::indicators::{augment, augment_full, FullIndicators, IndicatorParams};
use krxtrend_core::signals::generate_signals;

fn make_series(n: usize) -> BarSeries {
    let base_date = chrono::NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    let bars = (0..n)
        .map(|i| {
            let close = 50_000.0 + (i as f64 * 0.05).sin() * 5_000.0 + i as f64 * 3.0;
            let open = close * 0.997;
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: close * 1.012,
                low: open * 0.988,
                close,
                volume: 1_000_000 + (i as u64 * 7_919) % 500_000,
            }
        })
        .collect();
    BarSeries::new(Timeframe::Daily, bars).unwrap()
}

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("augment");
    let params = IndicatorParams::default();
    for n in [250usize, 2_500] {
        let series = make_series(n);
        group.bench_with_input(BenchmarkId::new("base", n), &series, |b, s| {
            b.iter(|| augment(black_box(s.clone()), &params))
        });
        group.bench_with_input(BenchmarkId::new("full", n), &series, |b, s| {
            let extras = FullIndicators {
                setup_counts: true,
                trend: true,
            };
            b.iter(|| augment_full(black_box(s.clone()), &params, extras))
        });
    }
    group.finish();
}

fn bench_signals_and_engine(c: &mut Criterion) {
    let series = make_series(2_500);
    let augmented = augment(series, &IndicatorParams::default());

    c.bench_function("generate_signals_2500", |b| {
        b.iter(|| generate_signals(black_box(augmented.clone())))
    });

    let signals = generate_signals(augmented);
    c.bench_function("backtest_2500", |b| {
        b.iter(|| backtest(black_box(&signals), &BacktestOptions::default()))
    });
}

fn bench_resample(c: &mut Criterion) {
    let series = make_series(2_500);
    c.bench_function("resample_weekly_2500", |b| {
        b.iter(|| resample_weekly(black_box(&series)))
    });
}

criterion_group!(benches, bench_indicators, bench_signals_and_engine, bench_resample);
criterion_main!(benches);
