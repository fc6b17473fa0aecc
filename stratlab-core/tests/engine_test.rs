//! Engine behaviour with real strategies and indicators.

use chrono::NaiveDate;
use stratlab_core::domain::{ExitReason, PriceSeries};
use stratlab_core::engine::{run_backtest, CancelToken, EngineConfig, ExecutionTiming};
use stratlab_core::indicators::{compute, IndicatorParams};
use stratlab_core::strategy::{build_strategy, StrategyEnv, StrategyKind, StrategySpec};
use stratlab_core::CoreError;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

/// Flat at 100, a drop to 90 on bar 25 that pierces the lower band, then a
/// spike to 110 on bar 40 that pierces the upper band.
fn drop_and_spike() -> PriceSeries {
    let mut closes = vec![100.0; 25];
    closes.extend(std::iter::repeat(90.0).take(15));
    closes.extend(std::iter::repeat(110.0).take(5));
    PriceSeries::from_closes(start(), &closes).unwrap()
}

#[test]
fn bollinger_round_trip_on_band_breaks() {
    let series = drop_and_spike();
    let frame = compute(&series, &IndicatorParams::default()).unwrap();
    let strategy =
        build_strategy(&StrategySpec::new(StrategyKind::Bollinger), &StrategyEnv::default())
            .unwrap();
    let run = run_backtest(&series, &frame, strategy.as_ref(), &EngineConfig::new(9_000.0), None)
        .unwrap();

    assert_eq!(run.trades.len(), 1);
    let trade = &run.trades[0];
    assert_eq!(trade.entry_index, 25);
    assert_eq!(trade.entry_price, 90.0);
    assert_eq!(trade.exit_index, 40);
    assert_eq!(trade.exit_price, 110.0);
    assert_eq!(trade.exit_reason, ExitReason::Signal);
    assert!((trade.realized_pnl - 2_000.0).abs() < 1e-6);
    assert!((run.final_equity().unwrap() - 11_000.0).abs() < 1e-6);
}

#[test]
fn linear_rise_is_consistent_for_short_strategies() {
    let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 30.0 / 29.0).collect();
    let series = PriceSeries::from_closes(start(), &closes).unwrap();
    let frame = compute(&series, &IndicatorParams::default()).unwrap();
    let config = EngineConfig::new(10_000.0);

    for kind in [StrategyKind::Bollinger, StrategyKind::Rsi] {
        let strategy = build_strategy(&StrategySpec::new(kind), &StrategyEnv::default()).unwrap();
        let run = run_backtest(&series, &frame, strategy.as_ref(), &config, None).unwrap();
        let pnl: f64 = run.trades.iter().map(|t| t.realized_pnl).sum();
        assert!((config.initial_capital + pnl - run.final_equity().unwrap()).abs() < 1e-6);
        for trade in &run.trades {
            assert_eq!(trade.is_winner(), trade.exit_price > trade.entry_price);
        }
    }

    for kind in [StrategyKind::Macd, StrategyKind::Combined, StrategyKind::AiEnhanced] {
        let strategy = build_strategy(&StrategySpec::new(kind), &StrategyEnv::default()).unwrap();
        let err = run_backtest(&series, &frame, strategy.as_ref(), &config, None).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientData {
                required: 34,
                actual: 30
            }
        );
    }
}

#[test]
fn macd_trades_on_oscillating_series() {
    let closes: Vec<f64> = (0..150)
        .map(|i| 100.0 + 10.0 * (i as f64 * std::f64::consts::TAU / 30.0).sin())
        .collect();
    let series = PriceSeries::from_closes(start(), &closes).unwrap();
    let frame = compute(&series, &IndicatorParams::default()).unwrap();
    let strategy =
        build_strategy(&StrategySpec::new(StrategyKind::Macd), &StrategyEnv::default()).unwrap();
    let run =
        run_backtest(&series, &frame, strategy.as_ref(), &EngineConfig::default(), None).unwrap();

    assert!(run.trades.len() >= 2);
    assert!(run.trades.iter().all(|t| t.entry_index >= 33));
    assert!(run
        .trades
        .iter()
        .filter(|t| t.exit_reason.is_forced())
        .count()
        <= 1);
}

#[test]
fn next_open_timing_enters_one_bar_later() {
    let series = drop_and_spike();
    let frame = compute(&series, &IndicatorParams::default()).unwrap();
    let strategy =
        build_strategy(&StrategySpec::new(StrategyKind::Bollinger), &StrategyEnv::default())
            .unwrap();
    let config = EngineConfig {
        execution: ExecutionTiming::NextOpen,
        ..EngineConfig::new(9_000.0)
    };
    let run = run_backtest(&series, &frame, strategy.as_ref(), &config, None).unwrap();
    let trade = &run.trades[0];
    assert_eq!(trade.entry_index, 26);
    // Open of bar 26 is the close of bar 25.
    assert_eq!(trade.entry_price, 90.0);
    assert_eq!(trade.exit_index, 41);
    assert_eq!(trade.exit_price, 110.0);
}

#[test]
fn stop_loss_cuts_a_falling_position() {
    let mut closes = vec![100.0; 25];
    closes.push(90.0);
    closes.extend((1..=10).map(|i| 90.0 - 2.0 * i as f64));
    let series = PriceSeries::from_closes(start(), &closes).unwrap();
    let frame = compute(&series, &IndicatorParams::default()).unwrap();
    let strategy =
        build_strategy(&StrategySpec::new(StrategyKind::Bollinger), &StrategyEnv::default())
            .unwrap();
    let config = EngineConfig {
        stop_loss_pct: Some(0.05),
        ..EngineConfig::new(9_000.0)
    };
    let run = run_backtest(&series, &frame, strategy.as_ref(), &config, None).unwrap();
    let first = &run.trades[0];
    assert_eq!(first.entry_index, 25);
    assert_eq!(first.exit_reason, ExitReason::StopLoss);
    assert!(first.exit_price <= 85.5 + 1e-9);
    assert!(first.realized_pnl < 0.0);
}

#[test]
fn cancelled_token_aborts_run() {
    let series = drop_and_spike();
    let frame = compute(&series, &IndicatorParams::default()).unwrap();
    let strategy =
        build_strategy(&StrategySpec::new(StrategyKind::Bollinger), &StrategyEnv::default())
            .unwrap();
    let token = CancelToken::new();
    token.cancel();
    let err = run_backtest(
        &series,
        &frame,
        strategy.as_ref(),
        &EngineConfig::default(),
        Some(&token),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::Cancelled { .. }));
}
