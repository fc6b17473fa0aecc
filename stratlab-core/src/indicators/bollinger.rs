//! Bollinger Bands: moving average ± a multiple of the rolling deviation.
//!
//! - Middle: SMA(close, period)
//! - Upper: middle + num_std * stddev(close, period)
//! - Lower: middle - num_std * stddev(close, period)
//!
//! Uses population stddev (divide by N).
//! Lookback: period - 1.

/// The three bands, aligned with the input.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Index of the first defined band value.
pub fn lookback(period: usize) -> usize {
    period.saturating_sub(1)
}

pub fn bollinger(closes: &[f64], period: usize, num_std: f64) -> BollingerBands {
    let n = closes.len();
    let mut bands = BollingerBands {
        upper: vec![f64::NAN; n],
        middle: vec![f64::NAN; n],
        lower: vec![f64::NAN; n],
    };

    if period == 0 || n < period {
        return bands;
    }

    for i in (period - 1)..n {
        let window = &closes[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }

        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;
        let stddev = variance.sqrt();

        bands.middle[i] = mean;
        bands.upper[i] = mean + num_std * stddev;
        bands.lower[i] = mean - num_std * stddev;
    }

    bands
}
