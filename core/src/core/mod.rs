//! Core domain types shared across the engine, execution, and risk modules.

pub mod errors;
pub mod fees;
pub mod types;

pub use errors::{AdapterError, ConfigError, SigningError, TickSourceError};
pub use fees::{convex_fee, parse_ticker_expiry, settlement_snap};
pub use types::{
    Action, MarketState, OpenOrder, OrderId, OrderStatus, Position, Side, Ticker, Wallet,
};
