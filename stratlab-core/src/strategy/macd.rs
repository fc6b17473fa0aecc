//! MACD / signal-line crossover strategy.

use crate::domain::{Action, PriceSeries, Signal};
use crate::indicators::{IndicatorFrame, IndicatorParams};

use super::{prev_and_current, SignalStrategy};

#[derive(Debug, Clone)]
pub struct MacdStrategy {
    min_bars: usize,
}

impl MacdStrategy {
    pub fn new(params: &IndicatorParams) -> Self {
        Self {
            min_bars: params.macd_min_bars(),
        }
    }

    pub(crate) fn action(&self, index: usize, frame: &IndicatorFrame) -> Action {
        let (Some((prev_line, line)), Some((prev_sig, sig))) = (
            prev_and_current(&frame.macd_line, index),
            prev_and_current(&frame.macd_signal, index),
        ) else {
            return Action::Hold;
        };

        if prev_line <= prev_sig && line > sig {
            Action::Buy
        } else if prev_line >= prev_sig && line < sig {
            Action::Sell
        } else {
            Action::Hold
        }
    }
}

impl SignalStrategy for MacdStrategy {
    fn name(&self) -> &str {
        "macd"
    }

    fn min_bars(&self) -> usize {
        self.min_bars
    }

    fn signal(&self, index: usize, series: &PriceSeries, indicators: &IndicatorFrame) -> Signal {
        let date = series.bars()[index].date;
        Signal::technical(date, self.action(index, indicators), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::{empty_frame, flat_series};

    fn frame(line: &[f64], signal: &[f64]) -> IndicatorFrame {
        let mut f = empty_frame(line.len());
        f.macd_line = line.to_vec();
        f.macd_signal = signal.to_vec();
        f
    }

    #[test]
    fn crossovers() {
        let f = frame(&[-1.0, 0.5, 0.6, -0.2], &[0.0, 0.0, 0.1, 0.1]);
        let s = flat_series(4);
        let strat = MacdStrategy::new(&IndicatorParams::default());
        assert_eq!(strat.signal(1, &s, &f).action, Action::Buy);
        assert_eq!(strat.signal(2, &s, &f).action, Action::Hold);
        assert_eq!(strat.signal(3, &s, &f).action, Action::Sell);
    }

    #[test]
    fn touching_then_separating_counts_as_cross() {
        let f = frame(&[0.0, 0.3], &[0.0, 0.1]);
        let strat = MacdStrategy::new(&IndicatorParams::default());
        assert_eq!(strat.signal(1, &flat_series(2), &f).action, Action::Buy);
    }

    #[test]
    fn undefined_signal_line_holds() {
        let f = frame(&[-1.0, 1.0], &[f64::NAN, 0.0]);
        let strat = MacdStrategy::new(&IndicatorParams::default());
        assert_eq!(strat.signal(1, &flat_series(2), &f).action, Action::Hold);
    }
}
