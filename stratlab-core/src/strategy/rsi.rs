//! RSI threshold crossing strategy.
//!
//! BUY when RSI crosses upward through `oversold` (prev < oversold <= cur);
//! SELL when it crosses downward through `overbought` (prev > overbought >= cur).

use crate::domain::{Action, PriceSeries, Signal};
use crate::indicators::{IndicatorFrame, IndicatorParams};

use super::{prev_and_current, SignalStrategy};

#[derive(Debug, Clone)]
pub struct RsiStrategy {
    pub oversold: f64,
    pub overbought: f64,
    min_bars: usize,
}

impl RsiStrategy {
    /// Thresholds are validated by `StrategySpec::decode`.
    pub fn new(params: &IndicatorParams, oversold: f64, overbought: f64) -> Self {
        Self {
            oversold,
            overbought,
            min_bars: params.rsi_min_bars(),
        }
    }

    pub(crate) fn action(&self, index: usize, frame: &IndicatorFrame) -> Action {
        match prev_and_current(&frame.rsi, index) {
            Some((prev, cur)) if prev < self.oversold && cur >= self.oversold => Action::Buy,
            Some((prev, cur)) if prev > self.overbought && cur <= self.overbought => Action::Sell,
            _ => Action::Hold,
        }
    }
}

impl SignalStrategy for RsiStrategy {
    fn name(&self) -> &str {
        "rsi"
    }

    fn min_bars(&self) -> usize {
        self.min_bars
    }

    fn signal(&self, index: usize, series: &PriceSeries, indicators: &IndicatorFrame) -> Signal {
        let date = series.bars()[index].date;
        Signal::technical(date, self.action(index, indicators), None)
    }
}
