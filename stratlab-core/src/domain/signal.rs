//! Signal: one discrete trading decision per bar per strategy.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trading decision for a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn is_hold(self) -> bool {
        matches!(self, Self::Hold)
    }
}

/// How the final action of a signal was reached.
///
/// Only the AI-enhanced strategy produces anything other than `Technical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Pure indicator logic.
    #[default]
    Technical,
    /// Sentiment verdict consulted and did not veto.
    AiConfirmed,
    /// Sentiment verdict strongly disagreed; the action was downgraded to HOLD.
    AiVetoed,
    /// Sentiment collaborator absent, failing or late; technical signal used as-is.
    TechnicalOnly,
}

/// A strategy's decision for one bar.
///
/// Derived only from data at or before `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub date: NaiveDate,
    pub action: Action,
    /// Conviction in [0, 1], when the strategy can express one.
    pub confidence: Option<f64>,
    #[serde(default)]
    pub source: DecisionSource,
}

impl Signal {
    pub fn hold(date: NaiveDate) -> Self {
        Self::technical(date, Action::Hold, None)
    }

    pub fn technical(date: NaiveDate, action: Action, confidence: Option<f64>) -> Self {
        Self {
            date,
            action,
            confidence,
            source: DecisionSource::Technical,
        }
    }

    pub fn with_source(mut self, source: DecisionSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}
