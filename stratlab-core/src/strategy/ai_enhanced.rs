//! AI-enhanced strategy: the combined technical signal, subject to a
//! sentiment veto.
//!
//! The collaborator is consulted only when the technical decision is BUY or
//! SELL. A confident opposing verdict downgrades the decision to HOLD. When
//! the collaborator is missing, fails, times out or returns garbage, the
//! technical signal is used unchanged and marked `TechnicalOnly`; the run
//! never fails because of it.

use std::sync::Arc;

use log::warn;

use crate::domain::{DecisionSource, PriceSeries, Signal};
use crate::indicators::{IndicatorFrame, IndicatorParams};

use super::{CombinedStrategy, OracleError, SentimentOracle, SentimentWindow, SignalStrategy, Verdict};

/// Fold a collaborator outcome into a technical signal.
pub fn apply_verdict(
    technical: Signal,
    outcome: Result<Verdict, OracleError>,
    veto_threshold: f64,
) -> Signal {
    if technical.action.is_hold() {
        return technical;
    }
    match outcome.and_then(Verdict::validated) {
        Ok(verdict) if verdict.outlook.opposes(technical.action) && verdict.confidence >= veto_threshold => {
            Signal::hold(technical.date)
                .with_source(DecisionSource::AiVetoed)
                .with_confidence(verdict.confidence)
        }
        Ok(_) => technical.with_source(DecisionSource::AiConfirmed),
        Err(err) => {
            warn!(
                "sentiment unavailable on {}, keeping technical {:?}: {err}",
                technical.date, technical.action
            );
            technical.with_source(DecisionSource::TechnicalOnly)
        }
    }
}

pub struct AiEnhancedStrategy {
    technical: CombinedStrategy,
    oracle: Option<Arc<dyn SentimentOracle>>,
    symbol: String,
    veto_threshold: f64,
    window_bars: usize,
}

impl AiEnhancedStrategy {
    pub const DEFAULT_VETO_THRESHOLD: f64 = 0.7;
    pub const DEFAULT_WINDOW_BARS: usize = 30;

    pub fn new(
        params: &IndicatorParams,
        oversold: f64,
        overbought: f64,
        oracle: Option<Arc<dyn SentimentOracle>>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            technical: CombinedStrategy::new(params, oversold, overbought),
            oracle,
            symbol: symbol.into(),
            veto_threshold: Self::DEFAULT_VETO_THRESHOLD,
            window_bars: Self::DEFAULT_WINDOW_BARS,
        }
    }

    pub fn with_veto_threshold(mut self, threshold: f64) -> Self {
        self.veto_threshold = threshold;
        self
    }

    pub fn with_window_bars(mut self, bars: usize) -> Self {
        self.window_bars = bars.max(1);
        self
    }

    pub fn veto_threshold(&self) -> f64 {
        self.veto_threshold
    }

    fn window(&self, index: usize, series: &PriceSeries, technical: &Signal) -> SentimentWindow {
        let start = (index + 1).saturating_sub(self.window_bars);
        SentimentWindow {
            symbol: self.symbol.clone(),
            date: technical.date,
            bars: series.bars()[start..=index].to_vec(),
            technical: technical.action,
        }
    }
}

impl std::fmt::Debug for AiEnhancedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiEnhancedStrategy")
            .field("technical", &self.technical)
            .field("has_oracle", &self.oracle.is_some())
            .field("symbol", &self.symbol)
            .field("veto_threshold", &self.veto_threshold)
            .field("window_bars", &self.window_bars)
            .finish()
    }
}

impl SignalStrategy for AiEnhancedStrategy {
    fn name(&self) -> &str {
        "ai_enhanced"
    }

    fn min_bars(&self) -> usize {
        self.technical.min_bars()
    }

    fn signal(&self, index: usize, series: &PriceSeries, indicators: &IndicatorFrame) -> Signal {
        let technical = self.technical.signal(index, series, indicators);
        if technical.action.is_hold() {
            return technical;
        }
        let outcome = match &self.oracle {
            Some(oracle) => oracle.evaluate(&self.window(index, series, &technical)),
            None => Err(OracleError::Unreachable("no sentiment oracle".into())),
        };
        apply_verdict(technical, outcome, self.veto_threshold)
    }
}
