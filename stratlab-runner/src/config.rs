//! Serializable run configuration, loaded from TOML.
//!
//! ```toml
//! [backtest]
//! symbol = "SPY"
//! csv = "spy.csv"            # or: synthetic_bars = 500
//! initial_capital = 100000
//! ranking = "sharpe_ratio"
//!
//! [engine]
//! execution = "next_open"
//! commission_rate = 0.0003
//! stop_loss_pct = 0.1
//!
//! [[strategies]]
//! kind = "rsi"
//! params = { period = 10, oversold = 25 }
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratlab_core::domain::PriceSeries;
use stratlab_core::engine::EngineConfig;
use stratlab_core::strategy::StrategySpec;

use crate::comparison::{ComparisonConfig, RankingMetric};
use crate::data_loader::{load_csv, synthetic_series, DateRange, LoadError};

/// Unique identifier for a configuration (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// `[backtest]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub symbol: String,
    /// CSV price file, relative to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv: Option<PathBuf>,
    /// Generate this many synthetic bars instead of reading a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic_bars: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    #[serde(default)]
    pub ranking: RankingMetric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
}

fn default_capital() -> f64 {
    EngineConfig::default().initial_capital
}

/// A complete comparison/backtest configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub backtest: BacktestSection,
    /// `initial_capital` here is ignored in favour of `[backtest]`.
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub strategies: Vec<StrategySpec>,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let (Some(csv), Some(dir)) = (config.backtest.csv.as_mut(), path.parent()) {
            if csv.is_relative() {
                *csv = dir.join(&*csv);
            }
        }
        Ok(config)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.backtest;
        match (&b.csv, b.synthetic_bars) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(
                    "set either `csv` or `synthetic_bars`, not both".into(),
                ))
            }
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "no price data: set `csv` or `synthetic_bars`".into(),
                ))
            }
            _ => {}
        }
        if self.strategies.is_empty() {
            return Err(ConfigError::Invalid("no [[strategies]] configured".into()));
        }
        self.engine_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        for spec in &self.strategies {
            spec.decode().map_err(|e| {
                ConfigError::Invalid(format!("strategy '{}': {e}", spec.display_name()))
            })?;
        }
        Ok(())
    }

    /// Engine settings with the capital from `[backtest]`.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_capital: self.backtest.initial_capital,
            ..self.engine.clone()
        }
    }

    pub fn comparison_config(&self) -> ComparisonConfig {
        ComparisonConfig {
            ranking: self.backtest.ranking,
            max_workers: self.backtest.max_workers,
            engine: self.engine_config(),
        }
    }

    pub fn date_range(&self) -> DateRange {
        DateRange {
            start: self.backtest.start_date,
            end: self.backtest.end_date,
        }
    }

    /// Load the configured price series.
    pub fn load_series(&self) -> Result<PriceSeries, LoadError> {
        match (&self.backtest.csv, self.backtest.synthetic_bars) {
            (Some(path), _) => load_csv(path, self.date_range()),
            (None, bars) => {
                let start = self
                    .backtest
                    .start_date
                    .or_else(|| NaiveDate::from_ymd_opt(2020, 1, 1))
                    .unwrap_or_default();
                synthetic_series(&self.backtest.symbol, start, bars.unwrap_or(0))
            }
        }
    }

    /// Computes a deterministic hash ID for this configuration.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
