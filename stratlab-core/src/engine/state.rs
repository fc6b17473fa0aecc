//! Engine configuration and run output types.

use serde::{Deserialize, Serialize};

use crate::domain::{EquityPoint, Signal, TradeRecord};
use crate::error::{CoreError, CoreResult};

/// Which price a signal on bar t trades at. Fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTiming {
    /// Bar t's close.
    #[default]
    SignalClose,
    /// Bar t+1's open. A signal on the final bar is never filled.
    ///
    /// Stop-loss and take-profit levels apply from the fill bar itself, since
    /// its whole range trades after the open.
    NextOpen,
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Fraction of available cash committed on entry, in (0, 1].
    pub position_fraction: f64,
    pub execution: ExecutionTiming,
    /// Charged on notional at entry and at exit.
    pub commission_rate: f64,
    /// Charged on notional at entry and at exit.
    pub slippage_rate: f64,
    /// Stop at `entry × (1 − pct)`. Checked from the bar after a close fill,
    /// or from the fill bar under [`ExecutionTiming::NextOpen`].
    pub stop_loss_pct: Option<f64>,
    /// Target at `entry × (1 + pct)`.
    pub take_profit_pct: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            position_fraction: 1.0,
            execution: ExecutionTiming::SignalClose,
            commission_rate: 0.0,
            slippage_rate: 0.0,
            stop_loss_pct: None,
            take_profit_pct: None,
        }
    }
}

impl EngineConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            ..Self::default()
        }
    }

    /// Commission plus slippage, as a fraction of notional per side.
    pub fn cost_rate(&self) -> f64 {
        self.commission_rate + self.slippage_rate
    }

    pub fn validate(&self) -> CoreResult<()> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(CoreError::param(
                "initial_capital",
                format!("must be positive, got {}", self.initial_capital),
            ));
        }
        if !(self.position_fraction > 0.0 && self.position_fraction <= 1.0) {
            return Err(CoreError::param(
                "position_fraction",
                format!("must lie in (0, 1], got {}", self.position_fraction),
            ));
        }
        for (name, rate) in [
            ("commission_rate", self.commission_rate),
            ("slippage_rate", self.slippage_rate),
        ] {
            if !(0.0..1.0).contains(&rate) {
                return Err(CoreError::param(name, format!("must lie in [0, 1), got {rate}")));
            }
        }
        if let Some(pct) = self.stop_loss_pct {
            if !(pct > 0.0 && pct < 1.0) {
                return Err(CoreError::param(
                    "stop_loss_pct",
                    format!("must lie in (0, 1), got {pct}"),
                ));
            }
        }
        if let Some(pct) = self.take_profit_pct {
            if !(pct.is_finite() && pct > 0.0) {
                return Err(CoreError::param(
                    "take_profit_pct",
                    format!("must be positive, got {pct}"),
                ));
            }
        }
        Ok(())
    }
}

/// Everything one engine pass produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRun {
    pub trades: Vec<TradeRecord>,
    /// One point per bar, same length as the series.
    pub equity_curve: Vec<EquityPoint>,
    /// The strategy's decision for every bar.
    pub signals: Vec<Signal>,
    /// Non-HOLD signals.
    pub signal_count: usize,
    /// Decisions taken without a usable sentiment verdict.
    pub technical_only_count: usize,
}

impl EngineRun {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|p| p.equity)
    }
}
