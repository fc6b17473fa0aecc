//! ComparisonEngine: run several strategies over the same series and rank
//! them.
//!
//! All specs are validated and checked against the series length before any
//! backtest starts, so one bad spec fails the whole comparison up front.
//! Indicator frames are computed once per distinct parameter set and shared.
//! Runs are independent and dispatched on a bounded rayon pool.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use stratlab_core::domain::PriceSeries;
use stratlab_core::engine::EngineConfig;
use stratlab_core::indicators::{self, IndicatorFrame, IndicatorParams};
use stratlab_core::strategy::StrategySpec;
use stratlab_core::CoreError;

use crate::metrics::PerformanceMetrics;
use crate::runner::{prepare, run_with_frame, BacktestResult, RunContext, RunError};

/// Metric a comparison is sorted by. Higher is better except for
/// `MaxDrawdown`, where smaller ranks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    #[default]
    TotalReturn,
    AnnualizedReturn,
    SharpeRatio,
    MaxDrawdown,
    WinRate,
    ProfitFactor,
}

impl RankingMetric {
    pub const ALL: [RankingMetric; 6] = [
        Self::TotalReturn,
        Self::AnnualizedReturn,
        Self::SharpeRatio,
        Self::MaxDrawdown,
        Self::WinRate,
        Self::ProfitFactor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TotalReturn => "total_return",
            Self::AnnualizedReturn => "annualized_return",
            Self::SharpeRatio => "sharpe_ratio",
            Self::MaxDrawdown => "max_drawdown",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
        }
    }

    /// Score where larger is always better.
    pub fn score(self, m: &PerformanceMetrics) -> f64 {
        match self {
            Self::TotalReturn => m.total_return,
            Self::AnnualizedReturn => m.annualized_return,
            Self::SharpeRatio => m.sharpe_ratio,
            Self::MaxDrawdown => -m.max_drawdown,
            Self::WinRate => m.win_rate,
            Self::ProfitFactor => m.profit_factor,
        }
    }
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown ranking metric '{s}'"))
    }
}

/// Order two results best-first: ranking metric, then higher Sharpe, then
/// smaller drawdown, then name for a stable tail.
pub fn rank_order(metric: RankingMetric, a: &BacktestResult, b: &BacktestResult) -> Ordering {
    metric
        .score(&b.metrics)
        .total_cmp(&metric.score(&a.metrics))
        .then_with(|| b.metrics.sharpe_ratio.total_cmp(&a.metrics.sharpe_ratio))
        .then_with(|| a.metrics.max_drawdown.total_cmp(&b.metrics.max_drawdown))
        .then_with(|| a.strategy.cmp(&b.strategy))
}

/// Settings shared by every run of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ComparisonConfig {
    pub ranking: RankingMetric,
    /// Worker threads; `None` uses rayon's default (available parallelism).
    pub max_workers: Option<usize>,
    pub engine: EngineConfig,
}

/// One row of a ranked comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// 1-based.
    pub rank: usize,
    pub strategy: String,
    pub metrics: PerformanceMetrics,
}

/// Results sorted best-first by `ranking`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub symbol: String,
    pub ranking: RankingMetric,
    pub results: Vec<BacktestResult>,
}

impl Comparison {
    pub fn ranked(&self) -> Vec<RankedEntry> {
        self.results
            .iter()
            .enumerate()
            .map(|(i, r)| RankedEntry {
                rank: i + 1,
                strategy: r.strategy.clone(),
                metrics: r.metrics,
            })
            .collect()
    }

    pub fn best(&self) -> Option<&BacktestResult> {
        self.results.first()
    }

    /// Best result under a different metric, using the same tie-breaks.
    pub fn best_by(&self, metric: RankingMetric) -> Option<&BacktestResult> {
        self.results.iter().min_by(|a, b| rank_order(metric, a, b))
    }
}

/// Frames keyed by indicator parameters; `IndicatorParams` holds an f64 so a
/// linear scan stands in for a map.
struct FrameCache(Vec<(IndicatorParams, Arc<IndicatorFrame>)>);

impl FrameCache {
    fn build(series: &PriceSeries, params: &[IndicatorParams]) -> Result<Self, CoreError> {
        let mut frames: Vec<(IndicatorParams, Arc<IndicatorFrame>)> = Vec::new();
        for p in params {
            if frames.iter().all(|(known, _)| known != p) {
                frames.push((*p, Arc::new(indicators::compute(series, p)?)));
            }
        }
        Ok(Self(frames))
    }

    fn get(&self, params: &IndicatorParams) -> Option<Arc<IndicatorFrame>> {
        self.0
            .iter()
            .find(|(known, _)| known == params)
            .map(|(_, frame)| Arc::clone(frame))
    }
}

pub(crate) fn build_pool(max_workers: Option<usize>) -> Result<rayon::ThreadPool, RunError> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("stratlab-{i}"));
    if let Some(n) = max_workers {
        builder = builder.num_threads(n.max(1));
    }
    builder.build().map_err(|e| RunError::Pool(e.to_string()))
}

/// Run every spec over `series` and rank the results.
pub fn compare_strategies(
    series: &PriceSeries,
    symbol: &str,
    specs: &[StrategySpec],
    config: &ComparisonConfig,
    ctx: &RunContext,
) -> Result<Comparison, RunError> {
    if specs.is_empty() {
        return Err(RunError::NoStrategies);
    }
    let mut seen = HashSet::new();
    for spec in specs {
        let name = spec.display_name();
        if !seen.insert(name.clone()) {
            return Err(RunError::DuplicateStrategy(name));
        }
    }

    // ─── Validate everything before running anything ───
    let mut params = Vec::with_capacity(specs.len());
    for spec in specs {
        prepare(series, symbol, spec, &config.engine, ctx)?;
        params.push(spec.decode()?.indicators);
    }
    let frames = FrameCache::build(series, &params)?;
    info!(
        "comparing {} strategies on {symbol} ({} indicator frames)",
        specs.len(),
        frames.0.len()
    );

    // ─── Run ───
    let pool = build_pool(config.max_workers)?;
    let mut results = pool.install(|| {
        specs
            .par_iter()
            .zip(params.par_iter())
            .map(|(spec, p)| {
                let frame = frames.get(p).ok_or_else(|| CoreError::ParameterValidation {
                    param: "indicators".into(),
                    reason: "frame missing from cache".into(),
                })?;
                run_with_frame(series, &frame, symbol, spec, &config.engine, ctx)
            })
            .collect::<Result<Vec<_>, RunError>>()
    })?;

    // ─── Rank ───
    results.sort_by(|a, b| rank_order(config.ranking, a, b));
    if let Some(best) = results.first() {
        info!(
            "best by {}: {} ({:.4})",
            config.ranking,
            best.strategy,
            config.ranking.score(&best.metrics)
        );
    }

    Ok(Comparison {
        symbol: symbol.to_string(),
        ranking: config.ranking,
        results,
    })
}
