//! StratLab Runner: backtest orchestration, metrics, strategy comparison.
//!
//! This crate builds on `stratlab-core` to provide:
//! - Performance metrics over an equity curve and trade ledger
//! - Single-run orchestration with a content-hashed run id
//! - Parallel strategy comparison and ranking
//! - Multi-symbol portfolio summaries
//! - TOML run configuration, CSV and synthetic price input
//! - JSON, CSV and Markdown export

pub mod comparison;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod portfolio;
pub mod runner;

pub use comparison::{compare_strategies, Comparison, ComparisonConfig, RankedEntry, RankingMetric};
pub use config::{BacktestSection, ConfigError, RunConfig};
pub use data_loader::{load_csv, read_csv, synthetic_series, DateRange, LoadError};
pub use metrics::PerformanceMetrics;
pub use portfolio::{run_multi_symbol, PortfolioSummary, SymbolFailure};
pub use runner::{run_backtest, run_with_frame, BacktestResult, RunContext, RunError, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn results_are_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
        assert_send::<Comparison>();
        assert_sync::<Comparison>();
        assert_send::<PortfolioSummary>();
        assert_sync::<PortfolioSummary>();
    }

    #[test]
    fn run_context_is_send_sync() {
        assert_send::<RunContext>();
        assert_sync::<RunContext>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<ComparisonConfig>();
        assert_sync::<ComparisonConfig>();
    }
}
