//! Broker adapter abstraction (§4.2): a uniform interface over a
//! deterministic simulator and a signed-HTTP live client.

pub mod journal;
pub mod live;
pub mod sim;
pub mod types;

pub use journal::ArtifactWriter;
pub use live::LiveAdapter;
pub use sim::SimAdapter;
pub use types::{OrderEvent, OrderEventStatus, OrderRequest, OrderResult, PlaceStatus, TradeRecord};

use crate::core::{AdapterError, OpenOrder, OrderId, Position, Ticker};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Broker adapter interface (§4.2). Implemented by [`SimAdapter`] and
/// [`LiveAdapter`]; the unified engine is generic over this trait so the
/// same reconciliation logic drives backtests and live trading.
pub trait Adapter {
    /// Opportunity to fill resting orders and refresh any last-price cache
    /// for this ticker.
    fn process_tick(&mut self, ticker: &Ticker, market_state: &crate::core::MarketState, t: NaiveDateTime);

    /// Open/resting orders for this ticker with remaining qty > 0.
    fn get_open_orders(&mut self, ticker: &Ticker, t: NaiveDateTime) -> Vec<OpenOrder>;

    fn cancel_order(&mut self, order_id: OrderId) -> Result<(), AdapterError>;

    fn place_order(
        &mut self,
        order: OrderRequest,
        market_state: &crate::core::MarketState,
        t: NaiveDateTime,
    ) -> OrderResult;

    /// Atomic amend (reprice/resize) in place. Default: unsupported.
    fn amend_order(
        &mut self,
        _order_id: OrderId,
        _new_price_cents: u8,
        _new_qty: u32,
    ) -> Result<bool, AdapterError> {
        Ok(false)
    }

    fn get_positions(&self) -> HashMap<Ticker, Position>;

    fn get_cash(&self) -> Decimal;

    /// Settle a ticker at `settlement_price_cents`, queuing the payout for
    /// release into cash and removing the position. Idempotent per §8
    /// invariant 4. The payout is not necessarily spendable yet — see
    /// [`Adapter::check_settlements`].
    fn settle_market(
        &mut self,
        _ticker: &Ticker,
        _settlement_price_cents: u8,
        _t: NaiveDateTime,
    ) -> Option<Decimal> {
        None
    }

    /// Release any queued settlement payouts whose time has arrived into
    /// spendable cash. Must be called every tick — a payout queued by
    /// `settle_market` is inert until this runs. Default: no-op, since the
    /// live adapter has no settlement queue of its own (balance refreshes
    /// straight from the broker).
    fn check_settlements(&mut self, _now: NaiveDateTime) {}

    /// Best-effort queue-position hint for a resting order, when the
    /// adapter can report one. Default: unknown.
    fn queue_position(&self, _order_id: OrderId) -> Option<u32> {
        None
    }

    /// Drain fills recorded since the last call (for the trade journal).
    fn take_trades(&mut self) -> Vec<TradeRecord>;

    /// Drain order lifecycle events recorded since the last call (for the
    /// order journal).
    fn take_order_events(&mut self) -> Vec<OrderEvent>;
}
