//! MetricsCalculator: pure functions that score a completed backtest.
//!
//! Every metric takes the equity curve and/or trade list and returns a
//! scalar. Degenerate inputs (no trades, no volatility, a single bar) map to
//! defined values, never to NaN or infinity.
//!
//! The equity series used for returns and drawdown starts with the initial
//! capital, so entry costs paid on the first bar show up as a loss.

use serde::{Deserialize, Serialize};
use stratlab_core::domain::{EquityPoint, TradeRecord};

/// Trading days per year.
pub const TRADING_DAYS: f64 = 252.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    /// Positive fraction, e.g. 0.15 for a 15% peak-to-trough decline.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub num_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
}

impl PerformanceMetrics {
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[TradeRecord],
        initial_capital: f64,
    ) -> Self {
        let equity = equity_series(equity_curve, initial_capital);
        let total = total_return(&equity, initial_capital);
        Self {
            total_return: total,
            annualized_return: annualized_return(total, equity_curve.len()),
            max_drawdown: max_drawdown(&equity),
            sharpe_ratio: sharpe_ratio(&equity),
            num_trades: trades.len(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Initial capital followed by the per-bar equity values.
pub fn equity_series(equity_curve: &[EquityPoint], initial_capital: f64) -> Vec<f64> {
    std::iter::once(initial_capital)
        .chain(equity_curve.iter().map(|p| p.equity))
        .collect()
}

/// final_equity / initial_capital − 1.
pub fn total_return(equity: &[f64], initial_capital: f64) -> f64 {
    match equity.last() {
        Some(&last) if initial_capital > 0.0 => last / initial_capital - 1.0,
        _ => 0.0,
    }
}

/// Compounded yearly rate over `bar_count` trading days.
///
/// −1 when the run lost everything, 0 for fewer than two bars.
pub fn annualized_return(total_return: f64, bar_count: usize) -> f64 {
    if bar_count < 2 {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(TRADING_DAYS / bar_count as f64) - 1.0
}

/// Largest peak-to-trough decline relative to the peak. 0 if equity never
/// declines.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd
}

/// mean / population stddev of daily returns × sqrt(252).
///
/// 0 when there is no volatility or fewer than two returns.
pub fn sharpe_ratio(equity: &[f64]) -> f64 {
    let returns = daily_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = population_std(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * TRADING_DAYS.sqrt()
}

/// Fraction of trades with positive realized pnl.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross profits / gross losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.realized_pnl > 0.0)
        .map(|t| t.realized_pnl)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.realized_pnl < 0.0)
        .map(|t| t.realized_pnl.abs())
        .sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Bar-over-bar returns of an equity series.
pub fn daily_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation dividing by N.
pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
