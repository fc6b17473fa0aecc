//! Bollinger band crossing strategy.
//!
//! BUY when the close crosses from at-or-above the lower band to below it;
//! SELL when it crosses from at-or-below the upper band to above it.

use crate::domain::{Action, PriceSeries, Signal};
use crate::indicators::{IndicatorFrame, IndicatorParams};

use super::{prev_and_current, SignalStrategy};

#[derive(Debug, Clone)]
pub struct BollingerStrategy {
    min_bars: usize,
}

impl BollingerStrategy {
    pub fn new(params: &IndicatorParams) -> Self {
        Self {
            min_bars: params.bollinger_min_bars(),
        }
    }

    pub(crate) fn action(&self, index: usize, series: &PriceSeries, frame: &IndicatorFrame) -> Action {
        let bars = series.bars();
        if index == 0 || index >= bars.len() {
            return Action::Hold;
        }
        let (prev_close, close) = (bars[index - 1].close, bars[index].close);

        if let Some((prev_lower, lower)) = prev_and_current(&frame.bollinger_lower, index) {
            if prev_close >= prev_lower && close < lower {
                return Action::Buy;
            }
        }
        if let Some((prev_upper, upper)) = prev_and_current(&frame.bollinger_upper, index) {
            if prev_close <= prev_upper && close > upper {
                return Action::Sell;
            }
        }
        Action::Hold
    }
}

impl SignalStrategy for BollingerStrategy {
    fn name(&self) -> &str {
        "bollinger"
    }

    fn min_bars(&self) -> usize {
        self.min_bars
    }

    fn signal(&self, index: usize, series: &PriceSeries, indicators: &IndicatorFrame) -> Signal {
        let date = series.bars()[index].date;
        Signal::technical(date, self.action(index, series, indicators), None)
    }
}
