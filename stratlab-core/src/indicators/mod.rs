//! IndicatorEngine: RSI, MACD and Bollinger Bands precomputed once per series.
//!
//! Values are computed for the whole series before the bar loop and queried by
//! index afterwards. Every value at index t depends only on closes `0..=t`.
//! Undefined values (warm-up) are `f64::NAN` and are never replaced by zero.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;

use serde::{Deserialize, Serialize};

use crate::domain::PriceSeries;
use crate::error::{CoreError, CoreResult};

pub use bollinger::{bollinger, BollingerBands};
pub use ema::ema_of_series;
pub use macd::{macd, MacdLines};
pub use rsi::rsi;

/// Longest accepted indicator period.
pub const MAX_PERIOD: usize = 100_000;

/// Periods and multipliers for the three indicator families.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_num_std: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_num_std: 2.0,
        }
    }
}

impl IndicatorParams {
    pub fn validate(&self) -> CoreResult<()> {
        for (name, value) in [
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bollinger_period", self.bollinger_period),
        ] {
            if value == 0 || value > MAX_PERIOD {
                return Err(CoreError::param(
                    name,
                    format!("period must lie in 1..={MAX_PERIOD}, got {value}"),
                ));
            }
        }
        if self.macd_fast >= self.macd_slow {
            return Err(CoreError::param(
                "macd_fast",
                format!(
                    "fast period {} must be shorter than slow period {}",
                    self.macd_fast, self.macd_slow
                ),
            ));
        }
        if !(self.bollinger_num_std.is_finite() && self.bollinger_num_std > 0.0) {
            return Err(CoreError::param(
                "bollinger_num_std",
                format!("must be positive and finite, got {}", self.bollinger_num_std),
            ));
        }
        Ok(())
    }

    /// Bars needed before the RSI has a value.
    pub fn rsi_min_bars(&self) -> usize {
        rsi::lookback(self.rsi_period).saturating_add(1)
    }

    /// Bars needed before both MACD lines have a value.
    pub fn macd_min_bars(&self) -> usize {
        macd::signal_lookback(self.macd_fast, self.macd_slow, self.macd_signal).saturating_add(1)
    }

    /// Bars needed before the bands have a value.
    pub fn bollinger_min_bars(&self) -> usize {
        bollinger::lookback(self.bollinger_period).saturating_add(1)
    }
}

/// Per-bar indicator values, aligned 1:1 with the series by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorFrame {
    pub rsi: Vec<f64>,
    pub macd_line: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub bollinger_upper: Vec<f64>,
    pub bollinger_mid: Vec<f64>,
    pub bollinger_lower: Vec<f64>,
}

impl IndicatorFrame {
    /// Frame of `len` bars with every value undefined.
    pub fn undefined(len: usize) -> Self {
        Self {
            rsi: vec![f64::NAN; len],
            macd_line: vec![f64::NAN; len],
            macd_signal: vec![f64::NAN; len],
            bollinger_upper: vec![f64::NAN; len],
            bollinger_mid: vec![f64::NAN; len],
            bollinger_lower: vec![f64::NAN; len],
        }
    }

    pub fn len(&self) -> usize {
        self.rsi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rsi.is_empty()
    }
}

/// Compute every indicator for `series`.
///
/// Rejects invalid parameters before touching the data. A series shorter
/// than a lookback is not an error here: the affected values stay NaN and the
/// caller decides how much history it needs.
pub fn compute(series: &PriceSeries, params: &IndicatorParams) -> CoreResult<IndicatorFrame> {
    params.validate()?;
    let closes = series.closes();

    let bands = bollinger(&closes, params.bollinger_period, params.bollinger_num_std);
    let lines = macd(
        &closes,
        params.macd_fast,
        params.macd_slow,
        params.macd_signal,
    );

    Ok(IndicatorFrame {
        rsi: rsi(&closes, params.rsi_period),
        macd_line: lines.line,
        macd_signal: lines.signal,
        bollinger_upper: bands.upper,
        bollinger_mid: bands.middle,
        bollinger_lower: bands.lower,
    })
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
