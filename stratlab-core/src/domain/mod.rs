//! Domain types: bars, signals, positions, trades.

pub mod bar;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{PriceBar, PriceSeries};
pub use position::Position;
pub use signal::{Action, DecisionSource, Signal};
pub use trade::{EquityPoint, ExitReason, TradeRecord};
