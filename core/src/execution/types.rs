//! Wire-agnostic types shared by the simulated and live broker adapters.

use crate::core::{Action, OrderId, Side, Ticker};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// A request to place an order, as issued by the unified engine.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub ticker: Ticker,
    pub side: Side,
    pub action: Action,
    pub price_cents: u8,
    pub qty: u32,
    /// Order expires this many seconds after placement (§4.3.2 step 12: 15s
    /// for strategy-originated orders).
    pub expires_in_s: Option<f64>,
}

/// Result of `place_order`, matching §4.2's `{ok, filled, status}` contract.
#[derive(Debug, Clone)]
pub struct OrderResult {
    pub ok: bool,
    pub filled: bool,
    pub status: PlaceStatus,
    pub order_id: Option<OrderId>,
}

impl OrderResult {
    pub fn rejected_cash() -> Self {
        Self {
            ok: false,
            filled: false,
            status: PlaceStatus::RejectedCash,
            order_id: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            filled: false,
            status: PlaceStatus::Error(msg.into()),
            order_id: None,
        }
    }
}

/// Outcome of a `place_order` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceStatus {
    Executed,
    Resting,
    RejectedCash,
    Error(String),
    Exception(String),
}

/// One executed fill, ready to be appended to `unified_trades.csv` (§6.3).
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub time: NaiveDateTime,
    pub action: String, // "BUY_YES" | "BUY_NO"
    pub ticker: Ticker,
    pub price_cents: u8,
    pub qty: u32,
    pub fee: Decimal,
    pub cost: Decimal,
    pub source: String,
    pub order_id: OrderId,
    pub order_time: NaiveDateTime,
    pub fill_time: NaiveDateTime,
    pub fill_delay_s: f64,
}

/// One order lifecycle event, ready to be appended to `unified_orders.csv`
/// (§6.3).
#[derive(Debug, Clone)]
pub struct OrderEvent {
    pub time: NaiveDateTime,
    pub ticker: Ticker,
    pub side: Side,
    pub price_cents: u8,
    pub qty: u32,
    pub status: OrderEventStatus,
    pub filled: u32,
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderEventStatus {
    Accepted,
    Resting,
    Executed,
    Rejected,
    Canceled,
    Expired,
}

impl std::fmt::Display for OrderEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderEventStatus::Accepted => "accepted",
            OrderEventStatus::Resting => "resting",
            OrderEventStatus::Executed => "executed",
            OrderEventStatus::Rejected => "rejected",
            OrderEventStatus::Canceled => "canceled",
            OrderEventStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}
