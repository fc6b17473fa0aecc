//! BacktestEngine: single-pass FLAT/LONG state machine over a price series.
//!
//! Per bar, in order:
//!
//! 1. Start-of-bar: fill the order carried over from the previous bar
//!    (next-open timing only)
//! 2. Intrabar: stop-loss / take-profit checks against the bar's range
//! 3. Signal: ask the strategy, fill at the close (signal-close timing) or
//!    queue for the next open
//! 4. Post-bar: mark-to-market and append to the equity curve
//!
//! A position still open after the last bar is closed at the final close.

pub mod cancel;
pub mod loop_runner;
pub mod state;

pub use cancel::CancelToken;
pub use loop_runner::run_backtest;
pub use state::{EngineConfig, EngineRun, ExecutionTiming};
