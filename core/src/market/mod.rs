//! Tick source (§6.1): produces an ordered stream of `(time, ticker,
//! market_state)` records from historical CSV logs or a live tailed file.

pub mod source;
pub mod tick;

pub use source::{iter_ticks_from_live_log, iter_ticks_from_market_logs, TailHandle};
pub use tick::Tick;
