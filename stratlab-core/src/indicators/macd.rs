//! Moving Average Convergence Divergence (MACD).
//!
//! line   = EMA(close, fast) - EMA(close, slow)
//! signal = EMA(line, signal_period), seeded on the first defined line values
//! Lookback: line slow - 1, signal slow + signal_period - 2.

use super::ema::{self, ema_of_series};

#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
}

/// Index of the first defined MACD line value.
pub fn line_lookback(fast: usize, slow: usize) -> usize {
    ema::lookback(fast.max(slow))
}

/// Index of the first defined signal line value.
pub fn signal_lookback(fast: usize, slow: usize, signal: usize) -> usize {
    line_lookback(fast, slow).saturating_add(ema::lookback(signal))
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdLines {
    let n = closes.len();
    let fast_ema = ema_of_series(closes, fast);
    let slow_ema = ema_of_series(closes, slow);

    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();

    let mut signal_line = vec![f64::NAN; n];
    let start = line_lookback(fast, slow);
    if start < n {
        let smoothed = ema_of_series(&line[start..], signal);
        signal_line[start..].copy_from_slice(&smoothed);
    }

    MacdLines {
        line,
        signal: signal_line,
    }
}
