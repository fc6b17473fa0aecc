//! Factory: turns a named strategy plus a flat parameter map into a runtime
//! `SignalStrategy`.
//!
//! Parameters are `f64` values keyed by name. Missing keys take defaults,
//! unknown keys are rejected so that a typo never silently runs the default.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::indicators::{IndicatorParams, MAX_PERIOD};

use super::{
    AiEnhancedStrategy, BollingerStrategy, CombinedStrategy, MacdStrategy, RsiStrategy,
    SentimentOracle, SignalStrategy,
};

// ─── Strategy kinds ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Bollinger,
    Rsi,
    Macd,
    Combined,
    AiEnhanced,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        Self::Bollinger,
        Self::Rsi,
        Self::Macd,
        Self::Combined,
        Self::AiEnhanced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bollinger => "bollinger",
            Self::Rsi => "rsi",
            Self::Macd => "macd",
            Self::Combined => "combined",
            Self::AiEnhanced => "ai_enhanced",
        }
    }

    /// Parameter keys this strategy accepts.
    pub fn param_keys(self) -> &'static [&'static str] {
        match self {
            Self::Bollinger => &["period", "std"],
            Self::Rsi => &["period", "oversold", "overbought"],
            Self::Macd => &["fast_period", "slow_period", "signal_period"],
            Self::Combined => &[
                "bollinger_period",
                "bollinger_std",
                "rsi_period",
                "oversold",
                "overbought",
                "fast_period",
                "slow_period",
                "signal_period",
            ],
            Self::AiEnhanced => &[
                "bollinger_period",
                "bollinger_std",
                "rsi_period",
                "oversold",
                "overbought",
                "fast_period",
                "slow_period",
                "signal_period",
                "veto_threshold",
                "window_bars",
            ],
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                CoreError::param(
                    "strategy",
                    format!("unknown strategy '{s}', expected one of {}", known.join(", ")),
                )
            })
    }
}

// ─── Spec and decoded params ─────────────────────────────────────────

/// A strategy name with its raw parameter map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub kind: StrategyKind,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    /// Distinguishes two specs of the same kind in a comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl StrategySpec {
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
            label: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label if set, otherwise the strategy kind.
    pub fn display_name(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.kind.as_str().to_string())
    }

    /// Apply defaults, reject unknown keys and validate every value.
    pub fn decode(&self) -> CoreResult<StrategyParams> {
        let mut decoded = StrategyParams::default();
        for (key, &value) in &self.params {
            if !self.kind.param_keys().contains(&key.as_str()) {
                return Err(CoreError::param(
                    key.as_str(),
                    format!(
                        "not a parameter of '{}' (accepted: {})",
                        self.kind,
                        self.kind.param_keys().join(", ")
                    ),
                ));
            }
            if !value.is_finite() {
                return Err(CoreError::param(key.as_str(), format!("must be finite, got {value}")));
            }
            decoded.assign(self.kind, key, value)?;
        }
        decoded.validate()?;
        Ok(decoded)
    }
}

/// Validated, typed strategy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    pub indicators: IndicatorParams,
    pub oversold: f64,
    pub overbought: f64,
    pub veto_threshold: f64,
    pub window_bars: usize,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            indicators: IndicatorParams::default(),
            oversold: 30.0,
            overbought: 70.0,
            veto_threshold: AiEnhancedStrategy::DEFAULT_VETO_THRESHOLD,
            window_bars: AiEnhancedStrategy::DEFAULT_WINDOW_BARS,
        }
    }
}

impl StrategyParams {
    /// Key names are already checked against the kind.
    fn assign(&mut self, kind: StrategyKind, key: &str, value: f64) -> CoreResult<()> {
        let ind = &mut self.indicators;
        match key {
            "period" if kind == StrategyKind::Rsi => ind.rsi_period = whole(key, value)?,
            "period" | "bollinger_period" => ind.bollinger_period = whole(key, value)?,
            "std" | "bollinger_std" => ind.bollinger_num_std = value,
            "rsi_period" => ind.rsi_period = whole(key, value)?,
            "fast_period" => ind.macd_fast = whole(key, value)?,
            "slow_period" => ind.macd_slow = whole(key, value)?,
            "signal_period" => ind.macd_signal = whole(key, value)?,
            "oversold" => self.oversold = value,
            "overbought" => self.overbought = value,
            "veto_threshold" => self.veto_threshold = value,
            "window_bars" => self.window_bars = whole(key, value)?,
            other => return Err(CoreError::param(other, "unrecognised parameter")),
        }
        Ok(())
    }

    pub fn validate(&self) -> CoreResult<()> {
        self.indicators.validate()?;
        if !(self.oversold > 0.0 && self.oversold < self.overbought && self.overbought < 100.0) {
            return Err(CoreError::param(
                "oversold",
                format!(
                    "thresholds must satisfy 0 < oversold < overbought < 100, got {} and {}",
                    self.oversold, self.overbought
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.veto_threshold) {
            return Err(CoreError::param(
                "veto_threshold",
                format!("must lie in [0, 1], got {}", self.veto_threshold),
            ));
        }
        Ok(())
    }
}

/// Integral value in `1..=MAX_PERIOD`, e.g. a period.
fn whole(key: &str, value: f64) -> CoreResult<usize> {
    if !(1.0..=MAX_PERIOD as f64).contains(&value) || value.fract() != 0.0 {
        return Err(CoreError::param(
            key,
            format!("must be a whole number in 1..={MAX_PERIOD}, got {value}"),
        ));
    }
    Ok(value as usize)
}

// ─── Construction ────────────────────────────────────────────────────

/// Run context a strategy may need beyond its parameters.
#[derive(Clone, Default)]
pub struct StrategyEnv {
    pub symbol: String,
    pub oracle: Option<Arc<dyn SentimentOracle>>,
}

impl StrategyEnv {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            oracle: None,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn SentimentOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }
}

impl fmt::Debug for StrategyEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyEnv")
            .field("symbol", &self.symbol)
            .field("has_oracle", &self.oracle.is_some())
            .finish()
    }
}

/// Build a strategy from its spec.
pub fn build_strategy(spec: &StrategySpec, env: &StrategyEnv) -> CoreResult<Box<dyn SignalStrategy>> {
    let p = spec.decode()?;
    let ind = &p.indicators;
    Ok(match spec.kind {
        StrategyKind::Bollinger => Box::new(BollingerStrategy::new(ind)),
        StrategyKind::Rsi => Box::new(RsiStrategy::new(ind, p.oversold, p.overbought)),
        StrategyKind::Macd => Box::new(MacdStrategy::new(ind)),
        StrategyKind::Combined => Box::new(CombinedStrategy::new(ind, p.oversold, p.overbought)),
        StrategyKind::AiEnhanced => Box::new(
            AiEnhancedStrategy::new(
                ind,
                p.oversold,
                p.overbought,
                env.oracle.clone(),
                env.symbol.clone(),
            )
            .with_veto_threshold(p.veto_threshold)
            .with_window_bars(p.window_bars),
        ),
    })
}
