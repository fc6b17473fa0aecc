//! Combined strategy: majority vote of the Bollinger, RSI and MACD strategies.
//!
//! BUY or SELL needs at least two of the three voters in that direction;
//! anything else, including a lone non-HOLD vote, is HOLD.

use crate::domain::{Action, PriceSeries, Signal};
use crate::indicators::{IndicatorFrame, IndicatorParams};

use super::{BollingerStrategy, MacdStrategy, RsiStrategy, SignalStrategy};

/// Majority rule over a set of votes.
///
/// Returns the winning action and how many votes backed it. HOLD is returned
/// with the number of HOLD votes when no direction reaches two votes.
pub fn majority_vote(votes: &[Action]) -> (Action, usize) {
    let buys = votes.iter().filter(|a| **a == Action::Buy).count();
    let sells = votes.iter().filter(|a| **a == Action::Sell).count();

    if buys >= 2 && buys > sells {
        (Action::Buy, buys)
    } else if sells >= 2 && sells > buys {
        (Action::Sell, sells)
    } else {
        let holds = votes.iter().filter(|a| a.is_hold()).count();
        (Action::Hold, holds)
    }
}

#[derive(Debug, Clone)]
pub struct CombinedStrategy {
    bollinger: BollingerStrategy,
    rsi: RsiStrategy,
    macd: MacdStrategy,
}

impl CombinedStrategy {
    pub fn new(params: &IndicatorParams, oversold: f64, overbought: f64) -> Self {
        Self {
            bollinger: BollingerStrategy::new(params),
            rsi: RsiStrategy::new(params, oversold, overbought),
            macd: MacdStrategy::new(params),
        }
    }

    /// Individual votes in the order bollinger, rsi, macd.
    pub fn votes(&self, index: usize, series: &PriceSeries, frame: &IndicatorFrame) -> [Action; 3] {
        [
            self.bollinger.action(index, series, frame),
            self.rsi.action(index, frame),
            self.macd.action(index, frame),
        ]
    }
}

impl SignalStrategy for CombinedStrategy {
    fn name(&self) -> &str {
        "combined"
    }

    fn min_bars(&self) -> usize {
        self.bollinger
            .min_bars()
            .max(self.rsi.min_bars())
            .max(self.macd.min_bars())
    }

    fn signal(&self, index: usize, series: &PriceSeries, indicators: &IndicatorFrame) -> Signal {
        let date = series.bars()[index].date;
        let votes = self.votes(index, series, indicators);
        let (action, backing) = majority_vote(&votes);
        let confidence = (!action.is_hold()).then(|| backing as f64 / votes.len() as f64);
        Signal::technical(date, action, confidence)
    }
}
