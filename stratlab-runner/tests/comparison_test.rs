//! Strategy comparison over a shared series.

use chrono::NaiveDate;
use stratlab_core::domain::PriceSeries;
use stratlab_core::engine::EngineConfig;
use stratlab_core::strategy::{StrategyKind, StrategySpec};
use stratlab_core::CoreError;
use stratlab_runner::export::comparison_report;
use stratlab_runner::{
    compare_strategies, run_backtest, synthetic_series, ComparisonConfig, RankingMetric,
    RunContext, RunError,
};

fn series() -> PriceSeries {
    synthetic_series("CMP", NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(), 400).unwrap()
}

fn all_kinds() -> Vec<StrategySpec> {
    StrategyKind::ALL.iter().map(|&k| StrategySpec::new(k)).collect()
}

#[test]
fn ranks_every_strategy_by_total_return() {
    let series = series();
    let comparison = compare_strategies(
        &series,
        "CMP",
        &all_kinds(),
        &ComparisonConfig::default(),
        &RunContext::default(),
    )
    .unwrap();

    assert_eq!(comparison.results.len(), 5);
    let returns: Vec<f64> = comparison
        .results
        .iter()
        .map(|r| r.metrics.total_return)
        .collect();
    assert!(returns.windows(2).all(|w| w[0] >= w[1]));

    let ranked = comparison.ranked();
    assert_eq!(ranked[0].rank, 1);
    assert_eq!(ranked[4].rank, 5);
    assert_eq!(comparison.best().unwrap().strategy, ranked[0].strategy);
}

#[test]
fn parallel_results_match_individual_runs() {
    let series = series();
    let config = ComparisonConfig {
        max_workers: Some(3),
        ..ComparisonConfig::default()
    };
    let specs = all_kinds();
    let comparison =
        compare_strategies(&series, "CMP", &specs, &config, &RunContext::default()).unwrap();

    for spec in &specs {
        let solo = run_backtest(&series, "CMP", spec, &config.engine, &RunContext::default())
            .unwrap();
        let shared = comparison
            .results
            .iter()
            .find(|r| r.strategy == solo.strategy)
            .unwrap();
        assert_eq!(shared, &solo);
    }
}

#[test]
fn worker_count_does_not_change_ranking() {
    let series = series();
    let run = |workers| {
        let config = ComparisonConfig {
            ranking: RankingMetric::SharpeRatio,
            max_workers: Some(workers),
            engine: EngineConfig::default(),
        };
        compare_strategies(&series, "CMP", &all_kinds(), &config, &RunContext::default())
            .unwrap()
            .ranked()
    };
    assert_eq!(run(1), run(4));
}

#[test]
fn labelled_variants_of_one_kind_compare() {
    let series = series();
    let specs = vec![
        StrategySpec::new(StrategyKind::Rsi).with_label("rsi_fast").with_param("period", 7.0),
        StrategySpec::new(StrategyKind::Rsi).with_label("rsi_slow").with_param("period", 21.0),
    ];
    let comparison = compare_strategies(
        &series,
        "CMP",
        &specs,
        &ComparisonConfig::default(),
        &RunContext::default(),
    )
    .unwrap();
    let mut names: Vec<&str> = comparison.results.iter().map(|r| r.strategy.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, ["rsi_fast", "rsi_slow"]);

    let report = comparison_report(&comparison);
    assert!(report.contains("rsi_fast"));
    assert!(report.contains("Smallest drawdown"));
}

#[test]
fn duplicate_names_are_rejected() {
    let specs = vec![
        StrategySpec::new(StrategyKind::Macd),
        StrategySpec::new(StrategyKind::Macd).with_param("fast_period", 5.0),
    ];
    let err = compare_strategies(
        &series(),
        "CMP",
        &specs,
        &ComparisonConfig::default(),
        &RunContext::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RunError::DuplicateStrategy(name) if name == "macd"));
}

#[test]
fn one_invalid_spec_fails_before_any_run() {
    let specs = vec![
        StrategySpec::new(StrategyKind::Bollinger),
        StrategySpec::new(StrategyKind::Macd)
            .with_param("fast_period", 30.0)
            .with_param("slow_period", 10.0),
    ];
    let err = compare_strategies(
        &series(),
        "CMP",
        &specs,
        &ComparisonConfig::default(),
        &RunContext::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err.core(),
        Some(CoreError::ParameterValidation { .. })
    ));
}

#[test]
fn empty_strategy_list_is_an_error() {
    let err = compare_strategies(
        &series(),
        "CMP",
        &[],
        &ComparisonConfig::default(),
        &RunContext::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RunError::NoStrategies));
}
