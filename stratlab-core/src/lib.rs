//! StratLab Core: indicators, strategies and the backtesting state machine.
//!
//! This crate contains the deterministic heart of a backtest:
//! - Domain types (price bars, signals, positions, trades)
//! - IndicatorEngine: RSI, MACD and Bollinger Bands precomputed per series
//! - StrategyEngine: interchangeable signal generators behind one trait,
//!   including the sentiment-vetoed AI-enhanced variant
//! - BacktestEngine: single-pass FLAT/LONG loop with costs and risk exits
//!
//! No I/O happens here. Loading data, scoring results and running many
//! backtests at once live in `stratlab-runner`.

pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod strategy;

pub use error::{CoreError, CoreResult};
