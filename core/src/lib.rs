//! Core engine crate for the binary-options market-making and directional
//! trading bot.
//!
//! - `core`: domain types (ticker, market state, position, order, fees).
//! - `market`: CSV-backed tick sources, both historical replay and live tail.
//! - `execution`: the `Adapter` trait plus simulated and live broker clients.
//! - `risk`: per-ticker action-rate limiting.
//! - `engine`: the unified tick-driven reconciliation loop.
//! - `config`: runtime configuration and portfolio snapshot loading.

pub mod config;
pub mod core;
pub mod engine;
pub mod execution;
pub mod market;
pub mod risk;
pub mod utils;

pub use crate::core::{
    convex_fee, parse_ticker_expiry, settlement_snap, AdapterError, Action, ConfigError,
    MarketState, OpenOrder, OrderId, OrderStatus, Position, Side, SigningError, Ticker,
    TickSourceError, Wallet,
};
pub use config::{LiveConfig, PortfolioSnapshot, RunMode, RunnerConfig};
pub use engine::{DesiredOrder, Engine, EngineConfig, Strategy, StrategyInput};
pub use execution::{Adapter, ArtifactWriter, LiveAdapter, OrderEvent, OrderRequest, OrderResult, SimAdapter, TradeRecord};
pub use market::Tick;

pub use anyhow::{Error, Result};

/// Convenient re-exports for binaries in the `runner` and `tools` crates.
pub mod prelude {
    pub use crate::core::{Action, MarketState, OpenOrder, OrderId, OrderStatus, Position, Side, Ticker};
    pub use crate::engine::{DesiredOrder, Engine, EngineConfig, Strategy, StrategyInput};
    pub use crate::execution::{Adapter, ArtifactWriter, LiveAdapter, OrderRequest, SimAdapter};
    pub use crate::market::Tick;
    pub use crate::{Error, Result};
}
