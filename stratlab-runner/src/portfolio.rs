//! One strategy across many symbols, summarized.
//!
//! Each symbol is an independent run on the shared worker pool. A symbol
//! whose run fails is listed in `failures` and left out of the averages.

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use stratlab_core::domain::PriceSeries;
use stratlab_core::engine::EngineConfig;
use stratlab_core::strategy::StrategySpec;

use crate::comparison::build_pool;
use crate::runner::{run_backtest, BacktestResult, RunContext, RunError};

/// A symbol that produced no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub strategy: String,
    /// Symbols with a result.
    pub num_symbols: usize,
    pub avg_total_return: f64,
    pub avg_annualized_return: f64,
    pub avg_max_drawdown: f64,
    pub avg_sharpe_ratio: f64,
    pub best_symbol: Option<String>,
    pub best_return: f64,
    pub worst_symbol: Option<String>,
    pub worst_return: f64,
    /// Per-symbol results in input order.
    pub results: Vec<BacktestResult>,
    pub failures: Vec<SymbolFailure>,
}

impl PortfolioSummary {
    fn from_outcomes(strategy: String, outcomes: Vec<(String, Result<BacktestResult, RunError>)>) -> Self {
        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (symbol, outcome) in outcomes {
            match outcome {
                Ok(r) => results.push(r),
                Err(e) => {
                    warn!("{strategy} on {symbol} failed: {e}");
                    failures.push(SymbolFailure {
                        symbol,
                        error: e.to_string(),
                    });
                }
            }
        }

        let n = results.len();
        let avg = |f: fn(&BacktestResult) -> f64| {
            if n == 0 {
                0.0
            } else {
                results.iter().map(f).sum::<f64>() / n as f64
            }
        };
        let avg_total_return = avg(|r| r.metrics.total_return);
        let avg_annualized_return = avg(|r| r.metrics.annualized_return);
        let avg_max_drawdown = avg(|r| r.metrics.max_drawdown);
        let avg_sharpe_ratio = avg(|r| r.metrics.sharpe_ratio);

        // First occurrence wins ties.
        let mut best: Option<&BacktestResult> = None;
        let mut worst: Option<&BacktestResult> = None;
        for r in &results {
            if best.map_or(true, |b| r.metrics.total_return > b.metrics.total_return) {
                best = Some(r);
            }
            if worst.map_or(true, |w| r.metrics.total_return < w.metrics.total_return) {
                worst = Some(r);
            }
        }
        let best_symbol = best.map(|r| r.symbol.clone());
        let best_return = best.map_or(0.0, |r| r.metrics.total_return);
        let worst_symbol = worst.map(|r| r.symbol.clone());
        let worst_return = worst.map_or(0.0, |r| r.metrics.total_return);

        Self {
            strategy,
            num_symbols: n,
            avg_total_return,
            avg_annualized_return,
            avg_max_drawdown,
            avg_sharpe_ratio,
            best_symbol,
            best_return,
            worst_symbol,
            worst_return,
            results,
            failures,
        }
    }
}

/// Run `spec` over every `(symbol, series)` pair.
///
/// An invalid spec or engine config fails the whole call; per-symbol
/// problems such as a short series only land in `failures`.
pub fn run_multi_symbol(
    spec: &StrategySpec,
    universe: &[(String, PriceSeries)],
    engine: &EngineConfig,
    max_workers: Option<usize>,
    ctx: &RunContext,
) -> Result<PortfolioSummary, RunError> {
    if universe.is_empty() {
        return Err(RunError::NoSymbols);
    }
    spec.decode()?;
    engine.validate()?;

    let name = spec.display_name();
    info!("running {name} across {} symbols", universe.len());

    let pool = build_pool(max_workers)?;
    let outcomes: Vec<(String, Result<BacktestResult, RunError>)> = pool.install(|| {
        universe
            .par_iter()
            .map(|(symbol, series)| {
                (
                    symbol.clone(),
                    run_backtest(series, symbol, spec, engine, ctx),
                )
            })
            .collect()
    });

    let summary = PortfolioSummary::from_outcomes(name, outcomes);
    info!(
        "{}: {} ok, {} failed, avg return {:.2}%",
        summary.strategy,
        summary.num_symbols,
        summary.failures.len(),
        summary.avg_total_return * 100.0
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stratlab_core::strategy::StrategyKind;
    use stratlab_core::CoreError;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn drop_and_spike(scale: f64) -> PriceSeries {
        let closes: Vec<f64> = std::iter::repeat(100.0)
            .take(25)
            .chain(std::iter::repeat(90.0).take(15))
            .chain(std::iter::repeat(110.0).take(5))
            .map(|c| c * scale)
            .collect();
        PriceSeries::from_closes(start(), &closes).unwrap()
    }

    fn flat(n: usize) -> PriceSeries {
        PriceSeries::from_closes(start(), &vec![50.0; n]).unwrap()
    }

    #[test]
    fn summarizes_successes_and_records_failures() {
        let universe = vec![
            ("AAA".to_string(), drop_and_spike(1.0)),
            ("BBB".to_string(), flat(40)),
            ("SHORT".to_string(), flat(5)),
        ];
        let spec = StrategySpec::new(StrategyKind::Bollinger);
        let summary = run_multi_symbol(
            &spec,
            &universe,
            &EngineConfig::default(),
            Some(2),
            &RunContext::default(),
        )
        .unwrap();

        assert_eq!(summary.num_symbols, 2);
        assert_eq!(summary.results[0].symbol, "AAA");
        assert_eq!(summary.results[1].symbol, "BBB");
        assert_eq!(summary.best_symbol.as_deref(), Some("AAA"));
        assert_eq!(summary.worst_symbol.as_deref(), Some("BBB"));
        assert_eq!(summary.worst_return, 0.0);
        assert!(summary.best_return > 0.2);
        let expected = (summary.best_return + summary.worst_return) / 2.0;
        assert!((summary.avg_total_return - expected).abs() < 1e-12);

        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].symbol, "SHORT");
        assert!(summary.failures[0].error.contains("insufficient"));
    }

    #[test]
    fn invalid_spec_fails_whole_call() {
        let universe = vec![("AAA".to_string(), drop_and_spike(1.0))];
        let spec = StrategySpec::new(StrategyKind::Rsi).with_param("oversold", 90.0);
        let err = run_multi_symbol(
            &spec,
            &universe,
            &EngineConfig::default(),
            None,
            &RunContext::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.core(),
            Some(CoreError::ParameterValidation { .. })
        ));
    }

    #[test]
    fn empty_universe_is_an_error() {
        let spec = StrategySpec::new(StrategyKind::Macd);
        let err = run_multi_symbol(
            &spec,
            &[],
            &EngineConfig::default(),
            None,
            &RunContext::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RunError::NoSymbols));
    }
}
