//! The unified engine: one tick-driven reconciliation loop shared by
//! backtests and live trading (§4.4).

pub mod tick_loop;
pub mod traits;

pub use tick_loop::{Engine, EngineConfig};
pub use traits::{DesiredOrder, Strategy, StrategyInput};
