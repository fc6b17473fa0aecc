//! Bar-by-bar loop: the heart of the backtesting engine.

use chrono::NaiveDate;
use log::debug;

use crate::domain::{
    Action, DecisionSource, EquityPoint, ExitReason, Position, PriceBar, PriceSeries, TradeRecord,
};
use crate::error::{CoreError, CoreResult};
use crate::indicators::IndicatorFrame;
use crate::strategy::SignalStrategy;

use super::cancel::CancelToken;
use super::state::{EngineConfig, EngineRun, ExecutionTiming};

/// Cash and the (at most one) open position.
struct Book<'a> {
    config: &'a EngineConfig,
    cash: f64,
    position: Option<Position>,
    trades: Vec<TradeRecord>,
}

impl<'a> Book<'a> {
    fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            cash: config.initial_capital,
            position: None,
            trades: Vec::new(),
        }
    }

    fn equity(&self, price: f64) -> f64 {
        self.cash + self.position.as_ref().map_or(0.0, |p| p.market_value(price))
    }

    /// FLAT + BUY opens, LONG + SELL closes; every other pair is a no-op.
    fn apply(&mut self, action: Action, index: usize, date: NaiveDate, price: f64) {
        match (action, self.position.is_some()) {
            (Action::Buy, false) => self.open(index, date, price),
            (Action::Sell, true) => self.close(index, date, price, ExitReason::Signal),
            _ => {}
        }
    }

    fn open(&mut self, index: usize, date: NaiveDate, price: f64) {
        if !(price > 0.0) {
            debug!("skip entry on {date}: non-positive price {price}");
            return;
        }
        let rate = self.config.cost_rate();
        let quantity = self.cash * self.config.position_fraction / (price * (1.0 + rate));
        if !(quantity > 0.0) {
            return;
        }
        let entry_costs = quantity * price * rate;
        self.cash -= quantity * price + entry_costs;
        let position = Position {
            entry_index: index,
            entry_date: date,
            entry_price: price,
            quantity,
            stop_loss_price: self.config.stop_loss_pct.map(|pct| price * (1.0 - pct)),
            take_profit_price: self.config.take_profit_pct.map(|pct| price * (1.0 + pct)),
            entry_costs,
        };
        debug!("open {quantity:.4} @ {price:.4} on {date}");
        self.position = Some(position);
    }

    fn close(&mut self, index: usize, date: NaiveDate, price: f64, reason: ExitReason) {
        let Some(position) = self.position.take() else {
            return;
        };
        let exit_costs = position.quantity * price * self.config.cost_rate();
        self.cash += position.quantity * price - exit_costs;
        let trade = position.close(index, date, price, exit_costs, reason);
        debug!(
            "close @ {price:.4} on {date} ({reason:?}), pnl {:.2}",
            trade.realized_pnl
        );
        self.trades.push(trade);
    }

    /// Stop-loss or take-profit fill for this bar, if either is breached.
    ///
    /// A position filled at this bar's open is checked against the same bar;
    /// one filled at a close is first checked on the following bar. When both
    /// levels are inside the bar's range the stop wins.
    fn risk_exit(&self, index: usize, bar: &PriceBar) -> Option<(f64, ExitReason)> {
        let filled_at_open = self.config.execution == ExecutionTiming::NextOpen;
        let position = self
            .position
            .as_ref()
            .filter(|p| p.entry_index < index || filled_at_open)?;
        if let Some(stop) = position.stop_loss_price.filter(|&stop| bar.low <= stop) {
            return Some((bar.open.min(stop), ExitReason::StopLoss));
        }
        if let Some(target) = position.take_profit_price.filter(|&t| bar.high >= t) {
            return Some((bar.open.max(target), ExitReason::TakeProfit));
        }
        None
    }
}

/// Run `strategy` over `series` with precomputed `indicators`.
///
/// Fails before simulating anything if the configuration is invalid, the
/// frame does not match the series, or the series is shorter than the
/// strategy's minimum.
pub fn run_backtest(
    series: &PriceSeries,
    indicators: &IndicatorFrame,
    strategy: &dyn SignalStrategy,
    config: &EngineConfig,
    cancel: Option<&CancelToken>,
) -> CoreResult<EngineRun> {
    config.validate()?;
    if indicators.len() != series.len() {
        return Err(CoreError::param(
            "indicators",
            format!(
                "frame has {} rows for a series of {} bars",
                indicators.len(),
                series.len()
            ),
        ));
    }
    let required = strategy.min_bars();
    if series.len() < required {
        return Err(CoreError::InsufficientData {
            required,
            actual: series.len(),
        });
    }

    let bars = series.bars();
    let mut book = Book::new(config);
    let mut pending: Option<Action> = None;
    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut signals = Vec::with_capacity(bars.len());

    for (t, bar) in bars.iter().enumerate() {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(CoreError::Cancelled { bar_index: t });
        }

        // ─── Start-of-bar ───
        if let Some(action) = pending.take() {
            book.apply(action, t, bar.date, bar.open);
        }

        // ─── Intrabar ───
        let mut exited = false;
        if let Some((price, reason)) = book.risk_exit(t, bar) {
            book.close(t, bar.date, price, reason);
            exited = true;
        }

        // ─── Signal ───
        let signal = strategy.signal(t, series, indicators);
        let action = match signal.action {
            Action::Buy if exited => Action::Hold,
            other => other,
        };
        match config.execution {
            ExecutionTiming::SignalClose => book.apply(action, t, bar.date, bar.close),
            ExecutionTiming::NextOpen if t + 1 < bars.len() && !action.is_hold() => {
                pending = Some(action);
            }
            ExecutionTiming::NextOpen => {}
        }
        signals.push(signal);

        // ─── Post-bar ───
        equity_curve.push(EquityPoint {
            date: bar.date,
            equity: book.equity(bar.close),
        });
    }

    if let Some(last) = bars.last() {
        if book.position.is_some() {
            book.close(bars.len() - 1, last.date, last.close, ExitReason::EndOfData);
            if let Some(point) = equity_curve.last_mut() {
                point.equity = book.cash;
            }
        }
    }

    let signal_count = signals.iter().filter(|s| !s.action.is_hold()).count();
    let technical_only_count = signals
        .iter()
        .filter(|s| s.source == DecisionSource::TechnicalOnly)
        .count();

    Ok(EngineRun {
        trades: book.trades,
        equity_curve,
        signals,
        signal_count,
        technical_only_count,
    })
}
