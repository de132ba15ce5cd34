//! The seam between the unified engine and a pluggable strategy (§4.3).

use crate::core::{MarketState, OpenOrder, Position, Side, Ticker};
use crate::market::Tick;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// One order the strategy wants resting right now. The engine reconciles
/// the set of `DesiredOrder`s against what is actually on the book.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredOrder {
    pub side: Side,
    pub price_cents: u8,
    pub qty: u32,
    pub expires_in_s: Option<f64>,
    /// Free-text reason, surfaced in `decision_intents.csv` (§6.3).
    pub reason: String,
}

/// Inputs the strategy needs to decide what to quote this tick.
pub struct StrategyInput<'a> {
    pub ticker: &'a Ticker,
    pub tick: &'a Tick,
    pub market_state: &'a MarketState,
    pub position: Position,
    pub cash: Decimal,
    pub open_orders: &'a [OpenOrder],
    pub now: NaiveDateTime,
}

/// A trading strategy: consumes one tick of market state plus current
/// position/cash/book context and decides what it wants resting.
///
/// Three distinct outcomes exist (§4.3), and they are not interchangeable:
/// - `None` — hold: keep whatever is currently resting untouched.
/// - `Some(vec![])` — cancel: the strategy wants nothing resting right now.
/// - `Some(orders)` — quote: the new desired set to reconcile against.
///
/// Implemented by `binmm_strategies` strategies; the engine is generic
/// over this trait (object-safe, invoked through `Box<dyn Strategy>`) so
/// the same tick loop drives every strategy variant.
pub trait Strategy {
    fn desired_orders(&mut self, input: &StrategyInput) -> Option<Vec<DesiredOrder>>;

    /// Human-readable name, used in logs and the CLI `--strategy` listing.
    fn name(&self) -> &str;
}
