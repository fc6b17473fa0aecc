//! Criterion benchmarks for StratLab hot paths.
//!
//! Benchmarks:
//! 1. Indicator precompute (RSI, MACD, Bollinger for one series)
//! 2. Bar loop per strategy kind
//! 3. Full pipeline: decode params, precompute, build and run

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use stratlab_core::domain::PriceSeries;
use stratlab_core::engine::{run_backtest, EngineConfig};
use stratlab_core::indicators::{compute, IndicatorParams};
use stratlab_core::strategy::{build_strategy, StrategyEnv, StrategyKind, StrategySpec};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_series(n: usize) -> PriceSeries {
    let closes: Vec<f64> = (0..n)
        .map(|i| 100.0 + (i as f64 * 0.1).sin() * 10.0 + (i as f64 * 0.013).cos() * 4.0)
        .collect();
    PriceSeries::from_closes(NaiveDate::from_ymd_opt(2015, 1, 2).unwrap(), &closes).unwrap()
}

// ── 1. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_precompute");
    let params = IndicatorParams::default();

    for &bar_count in &[252, 1260, 2520] {
        let series = make_series(bar_count);
        group.bench_with_input(BenchmarkId::new("rsi_macd_bollinger", bar_count), &series, |b, s| {
            b.iter(|| compute(black_box(s), black_box(&params)))
        });
    }

    group.finish();
}

// ── 2. Bar Loop ──────────────────────────────────────────────────────

fn bench_bar_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("bar_loop");
    let series = make_series(2520);
    let frame = compute(&series, &IndicatorParams::default()).unwrap();
    let config = EngineConfig {
        commission_rate: 0.0003,
        slippage_rate: 0.001,
        stop_loss_pct: Some(0.1),
        ..EngineConfig::default()
    };

    for kind in StrategyKind::ALL {
        let strategy = build_strategy(&StrategySpec::new(kind), &StrategyEnv::default()).unwrap();
        group.bench_function(BenchmarkId::new(kind.as_str(), 2520), |b| {
            b.iter(|| {
                run_backtest(
                    black_box(&series),
                    black_box(&frame),
                    strategy.as_ref(),
                    black_box(&config),
                    None,
                )
            })
        });
    }

    group.finish();
}

// ── 3. Full pipeline ─────────────────────────────────────────────────

fn bench_full_pipeline(c: &mut Criterion) {
    let series = make_series(1260);
    let spec = StrategySpec::new(StrategyKind::Combined);
    let env = StrategyEnv::new("BENCH");

    c.bench_function("precompute_build_run_1260", |b| {
        b.iter(|| {
            let decoded = spec.decode().unwrap();
            let frame = compute(black_box(&series), &decoded.indicators).unwrap();
            let strategy = build_strategy(&spec, &env).unwrap();
            run_backtest(&series, &frame, strategy.as_ref(), &EngineConfig::default(), None)
        })
    });
}

criterion_group!(benches, bench_indicators, bench_bar_loop, bench_full_pipeline);
criterion_main!(benches);
