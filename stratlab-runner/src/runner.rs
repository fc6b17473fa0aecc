//! Backtest runner: wires strategy construction, indicators, engine and
//! metrics into one call.
//!
//! Two entry points:
//! - `run_backtest()`: validates, precomputes indicators, runs. Used by the CLI.
//! - `run_with_frame()`: takes an already computed `IndicatorFrame`. Used by
//!   the comparison engine so strategies with the same indicator parameters
//!   share one frame.

use std::sync::Arc;

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratlab_core::domain::{EquityPoint, PriceSeries, TradeRecord};
use stratlab_core::engine::{self, CancelToken, EngineConfig};
use stratlab_core::indicators::{self, IndicatorFrame};
use stratlab_core::strategy::{
    build_strategy, SentimentOracle, SignalStrategy, StrategyEnv, StrategySpec,
};
use stratlab_core::CoreError;

use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("cannot fingerprint run: {0}")]
    Fingerprint(#[from] serde_json::Error),
    #[error("no strategies to run")]
    NoStrategies,
    #[error("no symbols to run")]
    NoSymbols,
    #[error("strategy '{0}' appears more than once; give each a distinct label")]
    DuplicateStrategy(String),
    #[error("cannot start worker pool: {0}")]
    Pool(String),
}

impl RunError {
    /// The core error behind this failure, if any.
    pub fn core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(err) => Some(err),
            _ => None,
        }
    }
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Collaborators and controls for a run that are not part of its identity.
#[derive(Clone, Default)]
pub struct RunContext {
    pub oracle: Option<Arc<dyn SentimentOracle>>,
    pub cancel: Option<CancelToken>,
}

impl RunContext {
    pub fn with_oracle(mut self, oracle: Arc<dyn SentimentOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn env(&self, symbol: &str) -> StrategyEnv {
        StrategyEnv {
            symbol: symbol.to_string(),
            oracle: self.oracle.clone(),
        }
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("has_oracle", &self.oracle.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// Complete result of a single backtest run.
///
/// Metrics are flattened, so the JSON form carries `total_return`,
/// `max_drawdown`, `sharpe_ratio`, `num_trades`, `win_rate` at the top level
/// next to `trades` and `equity_curve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// BLAKE3 of the run's inputs (symbol, dates, strategy, engine config).
    pub run_id: String,
    pub strategy: String,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub bar_count: usize,
    pub signal_count: usize,
    /// Decisions the AI-enhanced strategy took without a usable verdict.
    pub technical_only_decisions: usize,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }
}

/// Inputs that determine a result; hashed into `run_id`.
#[derive(Serialize)]
struct RunIdentity<'a> {
    symbol: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    bar_count: usize,
    strategy: &'a StrategySpec,
    engine: &'a EngineConfig,
}

pub fn run_id(
    series: &PriceSeries,
    symbol: &str,
    spec: &StrategySpec,
    engine: &EngineConfig,
) -> Result<String, RunError> {
    let (start_date, end_date) = date_span(series)?;
    let identity = RunIdentity {
        symbol,
        start_date,
        end_date,
        bar_count: series.len(),
        strategy: spec,
        engine,
    };
    let json = serde_json::to_vec(&identity)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

fn date_span(series: &PriceSeries) -> Result<(NaiveDate, NaiveDate), RunError> {
    match (series.first_date(), series.last_date()) {
        (Some(first), Some(last)) => Ok((first, last)),
        _ => Err(CoreError::InsufficientData {
            required: 1,
            actual: 0,
        }
        .into()),
    }
}

/// Build a strategy and make sure the series is long enough for it.
///
/// Everything here happens before any indicator is computed.
pub fn prepare(
    series: &PriceSeries,
    symbol: &str,
    spec: &StrategySpec,
    engine: &EngineConfig,
    ctx: &RunContext,
) -> Result<Box<dyn SignalStrategy>, RunError> {
    engine.validate()?;
    let strategy = build_strategy(spec, &ctx.env(symbol))?;
    let required = strategy.min_bars().max(1);
    if series.len() < required {
        return Err(CoreError::InsufficientData {
            required,
            actual: series.len(),
        }
        .into());
    }
    Ok(strategy)
}

/// Run one strategy over one series.
pub fn run_backtest(
    series: &PriceSeries,
    symbol: &str,
    spec: &StrategySpec,
    engine: &EngineConfig,
    ctx: &RunContext,
) -> Result<BacktestResult, RunError> {
    let strategy = prepare(series, symbol, spec, engine, ctx)?;
    let params = spec.decode()?;
    let frame = indicators::compute(series, &params.indicators)?;
    execute(series, &frame, symbol, spec, strategy.as_ref(), engine, ctx)
}

/// Run one strategy with a precomputed indicator frame.
///
/// The frame must have been computed from `series` with the spec's
/// indicator parameters.
pub fn run_with_frame(
    series: &PriceSeries,
    frame: &IndicatorFrame,
    symbol: &str,
    spec: &StrategySpec,
    engine: &EngineConfig,
    ctx: &RunContext,
) -> Result<BacktestResult, RunError> {
    let strategy = prepare(series, symbol, spec, engine, ctx)?;
    execute(series, frame, symbol, spec, strategy.as_ref(), engine, ctx)
}

fn execute(
    series: &PriceSeries,
    frame: &IndicatorFrame,
    symbol: &str,
    spec: &StrategySpec,
    strategy: &dyn SignalStrategy,
    engine: &EngineConfig,
    ctx: &RunContext,
) -> Result<BacktestResult, RunError> {
    let name = spec.display_name();
    let (start_date, end_date) = date_span(series)?;
    let run_id = run_id(series, symbol, spec, engine)?;
    info!(
        "run {name} on {symbol}: {} bars {start_date}..{end_date}",
        series.len()
    );

    let run = engine::run_backtest(series, frame, strategy, engine, ctx.cancel.as_ref())?;
    let metrics = PerformanceMetrics::compute(&run.equity_curve, &run.trades, engine.initial_capital);
    info!(
        "done {name} on {symbol}: return {:.2}%, {} trades, sharpe {:.2}",
        metrics.total_return * 100.0,
        metrics.num_trades,
        metrics.sharpe_ratio
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        strategy: name,
        symbol: symbol.to_string(),
        start_date,
        end_date,
        initial_capital: engine.initial_capital,
        bar_count: series.len(),
        signal_count: run.signal_count,
        technical_only_decisions: run.technical_only_count,
        metrics,
        trades: run.trades,
        equity_curve: run.equity_curve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratlab_core::strategy::StrategyKind;

    fn series(n: usize) -> PriceSeries {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + (i as f64 * 0.3).sin() * 8.0).collect();
        PriceSeries::from_closes(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), &closes).unwrap()
    }

    #[test]
    fn run_id_is_stable_and_input_sensitive() {
        let s = series(60);
        let spec = StrategySpec::new(StrategyKind::Rsi);
        let engine = EngineConfig::default();
        let a = run_id(&s, "AAA", &spec, &engine).unwrap();
        assert_eq!(a, run_id(&s, "AAA", &spec, &engine).unwrap());
        assert_eq!(a.len(), 64);
        assert_ne!(a, run_id(&s, "BBB", &spec, &engine).unwrap());
        let tweaked = spec.clone().with_param("oversold", 25.0);
        assert_ne!(a, run_id(&s, "AAA", &tweaked, &engine).unwrap());
    }

    #[test]
    fn invalid_params_fail_before_data_check() {
        let spec = StrategySpec::new(StrategyKind::Rsi).with_param("period", 0.0);
        let err = run_backtest(&series(5), "X", &spec, &EngineConfig::default(), &RunContext::default())
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::ParameterValidation { .. })));
    }

    #[test]
    fn empty_series_is_insufficient() {
        let empty = PriceSeries::new(Vec::new()).unwrap();
        let err = run_backtest(
            &empty,
            "X",
            &StrategySpec::new(StrategyKind::Bollinger),
            &EngineConfig::default(),
            &RunContext::default(),
        )
        .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InsufficientData { actual: 0, .. })));
    }

    #[test]
    fn metrics_are_flattened_in_json() {
        let result = run_backtest(
            &series(80),
            "FLAT",
            &StrategySpec::new(StrategyKind::Bollinger),
            &EngineConfig::default(),
            &RunContext::default(),
        )
        .unwrap();
        let value = serde_json::to_value(&result).unwrap();
        for field in [
            "total_return",
            "max_drawdown",
            "sharpe_ratio",
            "num_trades",
            "win_rate",
            "trades",
            "equity_curve",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert!(value.get("metrics").is_none());
    }
}
