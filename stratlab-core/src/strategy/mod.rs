//! StrategyEngine: interchangeable signal generators.
//!
//! Every strategy answers one question: given the series and the precomputed
//! indicators up to bar `index`, what should be done at that bar? Strategies
//! hold only the configuration fixed at construction; there is no history
//! beyond what the `IndicatorFrame` already encodes, so calling `signal` for
//! the same index twice yields the same answer.

pub mod ai_enhanced;
pub mod bollinger;
pub mod combined;
pub mod factory;
pub mod macd;
pub mod rsi;
pub mod sentiment;

use crate::domain::{PriceSeries, Signal};
use crate::indicators::IndicatorFrame;

pub use ai_enhanced::{apply_verdict, AiEnhancedStrategy};
pub use bollinger::BollingerStrategy;
pub use combined::{majority_vote, CombinedStrategy};
pub use factory::{build_strategy, StrategyEnv, StrategyKind, StrategyParams, StrategySpec};
pub use macd::MacdStrategy;
pub use rsi::RsiStrategy;
pub use sentiment::{
    OracleError, Outlook, SentimentOracle, SentimentWindow, StaticOracle, TimeoutOracle,
    UnavailableOracle, Verdict,
};

/// Common capability of every strategy variant.
///
/// # Lookahead invariant
/// `signal` may read `series` and `indicators` at indices `0..=index` only.
pub trait SignalStrategy: Send + Sync {
    /// Strategy name as accepted by `StrategyKind::from_str`.
    fn name(&self) -> &str;

    /// Bars the series must contain before this strategy can say anything.
    fn min_bars(&self) -> usize;

    /// Decision for bar `index`. `index` must be within the series.
    fn signal(&self, index: usize, series: &PriceSeries, indicators: &IndicatorFrame) -> Signal;
}

/// Values at `index - 1` and `index`, if both are defined.
pub(crate) fn prev_and_current(values: &[f64], index: usize) -> Option<(f64, f64)> {
    if index == 0 {
        return None;
    }
    let prev = *values.get(index - 1)?;
    let cur = *values.get(index)?;
    if prev.is_nan() || cur.is_nan() {
        None
    } else {
        Some((prev, cur))
    }
}
