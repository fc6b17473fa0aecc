//! TradeRecord: a closed long position with its realized PnL.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Strategy emitted SELL.
    Signal,
    /// Intrabar low breached the stop-loss price.
    StopLoss,
    /// Intrabar high reached the take-profit price.
    TakeProfit,
    /// Still open at the last bar; force-closed at the final close.
    EndOfData,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
            Self::EndOfData => "end_of_data",
        }
    }

    pub fn is_forced(self) -> bool {
        matches!(self, Self::EndOfData)
    }
}

/// A complete round trip: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Entry ──
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_loss_price: Option<f64>,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── PnL ──
    /// Commission plus slippage paid at entry and exit.
    pub costs: f64,
    /// (exit - entry) * quantity - costs.
    pub realized_pnl: f64,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.realized_pnl > 0.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_index - self.entry_index
    }

    /// Realized PnL as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = self.entry_price * self.quantity;
        if notional == 0.0 {
            return 0.0;
        }
        self.realized_pnl / notional
    }
}

/// One point of the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}
