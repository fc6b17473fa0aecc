//! Position: the open long position and its conversion to a trade record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::trade::{ExitReason, TradeRecord};

/// The single open long position of a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_loss_price: Option<f64>,
    pub take_profit_price: Option<f64>,
    /// Costs paid when the position was opened.
    pub entry_costs: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Unrealized PnL at `price`, net of entry costs only.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price) - self.entry_costs
    }

    /// Turn the position into a closed trade.
    pub fn close(
        self,
        exit_index: usize,
        exit_date: NaiveDate,
        exit_price: f64,
        exit_costs: f64,
        exit_reason: ExitReason,
    ) -> TradeRecord {
        let costs = self.entry_costs + exit_costs;
        TradeRecord {
            entry_index: self.entry_index,
            entry_date: self.entry_date,
            entry_price: self.entry_price,
            quantity: self.quantity,
            stop_loss_price: self.stop_loss_price,
            exit_index,
            exit_date,
            exit_price,
            exit_reason,
            costs,
            realized_pnl: self.quantity * (exit_price - self.entry_price) - costs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_deducts_entry_and_exit_costs() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let pos = Position {
            entry_index: 1,
            entry_date: date,
            entry_price: 10.0,
            quantity: 100.0,
            stop_loss_price: None,
            take_profit_price: None,
            entry_costs: 2.0,
        };
        assert!((pos.unrealized_pnl(11.0) - 98.0).abs() < 1e-12);
        let trade = pos.close(5, date, 12.0, 3.0, ExitReason::Signal);
        assert!((trade.realized_pnl - 195.0).abs() < 1e-12);
        assert!((trade.costs - 5.0).abs() < 1e-12);
    }
}
