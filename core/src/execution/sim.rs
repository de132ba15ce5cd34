//! Deterministic simulated broker adapter (§4.2.1).
//!
//! Fills resting orders on every `process_tick`: a marketable cross (filled
//! once the order's `ready_at` latency has elapsed) and a passive-capture
//! rule driven by a fixed-seed RNG so runs are byte-reproducible (§8
//! invariant 9).

use super::{Adapter, OrderEvent, OrderEventStatus, OrderRequest, OrderResult, PlaceStatus, TradeRecord};
use crate::core::fees::convex_fee;
use crate::core::{AdapterError, Action, MarketState, OpenOrder, OrderId, OrderStatus, Position, Side, Ticker};
use chrono::NaiveDateTime;
use rand::Rng;
use rand_pcg::Pcg32;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, warn};

/// Overdraft allowance used to simulate near-real netting (§4.2.1, §8
/// invariant 2): sim cash never falls below `-$10`.
const OVERDRAFT: Decimal = Decimal::from_parts(1000, 0, 0, false, 2); // $10.00

/// Passive-capture fill probability, expressed per minute. Not specified
/// numerically by the source; chosen conservatively and recorded as an
/// open-question resolution in DESIGN.md.
const DEFAULT_PASSIVE_FILL_RATE_PER_MIN: f64 = 2.0;

struct TrackedOrder {
    order: OpenOrder,
    expires_at: Option<NaiveDateTime>,
}

pub struct SimAdapter {
    cash: Decimal,
    unsettled: Vec<(Decimal, NaiveDateTime)>,
    positions: HashMap<Ticker, Position>,
    orders: HashMap<OrderId, TrackedOrder>,
    last_price_cents: HashMap<Ticker, f64>,
    last_tick_time: HashMap<Ticker, NaiveDateTime>,
    settled: std::collections::HashSet<Ticker>,
    rng: Pcg32,
    fill_latency_s: f64,
    passive_fill_rate_per_min: f64,
    trades: Vec<TradeRecord>,
    order_events: Vec<OrderEvent>,
}

impl SimAdapter {
    pub fn new(initial_cash: Decimal, fill_latency_s: f64, seed: u64) -> Self {
        Self {
            cash: initial_cash,
            unsettled: Vec::new(),
            positions: HashMap::new(),
            orders: HashMap::new(),
            last_price_cents: HashMap::new(),
            last_tick_time: HashMap::new(),
            settled: std::collections::HashSet::new(),
            rng: Pcg32::new(seed, 0xa02bdbf7bb3c0a7),
            fill_latency_s,
            passive_fill_rate_per_min: DEFAULT_PASSIVE_FILL_RATE_PER_MIN,
            trades: Vec::new(),
            order_events: Vec::new(),
        }
    }

    pub fn seed_position(&mut self, ticker: Ticker, position: Position) {
        self.positions.insert(ticker, position);
    }

    pub fn seed_cash(&mut self, cash: Decimal) {
        self.cash = cash;
    }

    fn effective_price(ms: &MarketState) -> Option<f64> {
        ms.mid().or_else(|| ms.effective_yes_bid().map(|v| v as f64))
    }

    /// Attempt to fill one order against current market state / last print.
    /// Returns the filled quantity (always equal to remaining_qty — partial
    /// fills are not modeled, matching the source's per-fill-is-complete
    /// behavior).
    fn try_fill(
        &mut self,
        tracked: &mut TrackedOrder,
        ms: &MarketState,
        t: NaiveDateTime,
        dt_s: f64,
    ) -> Option<(u8, u32)> {
        let order = &tracked.order;
        if order.ready_at.map(|r| t < r).unwrap_or(false) {
            return None;
        }

        // 1. Marketable cross.
        let cross = match order.side {
            Side::Yes => ms.yes_ask.filter(|&ask| order.price_cents >= ask),
            Side::No => ms.no_ask.filter(|&ask| order.price_cents >= ask),
        };
        if let Some(fill_price) = cross {
            return Some((fill_price, order.remaining_qty));
        }

        // 2. Passive capture through last trade print.
        if dt_s <= 0.0 {
            return None;
        }
        let last_price = self.last_price_cents.get(&order.ticker).copied()?;
        let crosses_print = match order.side {
            Side::Yes => last_price <= order.price_cents as f64,
            Side::No => (100.0 - last_price) <= order.price_cents as f64,
        };
        if !crosses_print {
            return None;
        }
        let per_second = self.passive_fill_rate_per_min / 60.0;
        let fill_prob = 1.0 - (1.0 - per_second).powf(dt_s);
        if self.rng.gen::<f64>() < fill_prob {
            Some((order.price_cents, order.remaining_qty))
        } else {
            None
        }
    }

    fn settle_fill(
        &mut self,
        mut order: OpenOrder,
        fill_price_cents: u8,
        qty: u32,
        t: NaiveDateTime,
        order_time: NaiveDateTime,
    ) {
        let fee = convex_fee(fill_price_cents, qty);
        let notional = Decimal::from(qty) * Decimal::from(fill_price_cents) / Decimal::from(100);
        let cost = notional + fee;

        let position = self.positions.entry(order.ticker.clone()).or_default();
        let opposite_qty = match order.side {
            Side::Yes => position.no,
            Side::No => position.yes,
        };

        if cost > self.cash + OVERDRAFT {
            if opposite_qty < qty {
                order.status = OrderStatus::Rejected;
                self.order_events.push(OrderEvent {
                    time: t,
                    ticker: order.ticker.clone(),
                    side: order.side,
                    price_cents: order.price_cents,
                    qty: order.remaining_qty,
                    status: OrderEventStatus::Rejected,
                    filled: 0,
                    order_id: order.id,
                });
                warn!(ticker = %order.ticker, %qty, "order rejected: insufficient cash past overdraft");
                return;
            }
            // Netting will immediately restore cash; bypass the overdraft cap.
            self.cash -= cost;
        } else {
            self.cash -= cost;
        }

        match order.side {
            Side::Yes => position.yes += qty,
            Side::No => position.no += qty,
        }
        position.cost += cost;
        let netted = position.net();
        if netted > Decimal::ZERO {
            self.cash += netted;
        }

        let action_label = match order.side {
            Side::Yes => "BUY_YES",
            Side::No => "BUY_NO",
        };
        self.trades.push(TradeRecord {
            time: t,
            action: action_label.to_string(),
            ticker: order.ticker.clone(),
            price_cents: fill_price_cents,
            qty,
            fee,
            cost,
            source: "sim".to_string(),
            order_id: order.id,
            order_time,
            fill_time: t,
            fill_delay_s: (t - order_time).num_milliseconds() as f64 / 1000.0,
        });
        self.order_events.push(OrderEvent {
            time: t,
            ticker: order.ticker.clone(),
            side: order.side,
            price_cents: fill_price_cents,
            qty,
            status: OrderEventStatus::Executed,
            filled: qty,
            order_id: order.id,
        });
    }
}

impl Adapter for SimAdapter {
    fn process_tick(&mut self, ticker: &Ticker, market_state: &MarketState, t: NaiveDateTime) {
        if let Some(price) = Self::effective_price(market_state) {
            self.last_price_cents.insert(ticker.clone(), price);
        }
        let dt_s = self
            .last_tick_time
            .insert(ticker.clone(), t)
            .map(|prev| (t - prev).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        let ids: Vec<OrderId> = self
            .orders
            .iter()
            .filter(|(_, o)| &o.order.ticker == ticker && o.order.is_active())
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            let Some(mut tracked) = self.orders.remove(&id) else { continue };

            if let Some(expires_at) = tracked.expires_at {
                if t >= expires_at {
                    tracked.order.status = OrderStatus::Expired;
                    self.order_events.push(OrderEvent {
                        time: t,
                        ticker: tracked.order.ticker.clone(),
                        side: tracked.order.side,
                        price_cents: tracked.order.price_cents,
                        qty: tracked.order.remaining_qty,
                        status: OrderEventStatus::Expired,
                        filled: 0,
                        order_id: tracked.order.id,
                    });
                    continue;
                }
            }

            if let Some((fill_price, qty)) = self.try_fill(&mut tracked, market_state, t, dt_s) {
                let order_time = tracked.order.created_time;
                let order = tracked.order;
                self.settle_fill(order, fill_price, qty, t, order_time);
            } else {
                if tracked.order.ready_at.map(|r| t >= r).unwrap_or(true) {
                    tracked.order.status = OrderStatus::Resting;
                }
                self.orders.insert(id, tracked);
            }
        }
    }

    fn get_open_orders(&mut self, ticker: &Ticker, _t: NaiveDateTime) -> Vec<OpenOrder> {
        self.orders
            .values()
            .filter(|o| &o.order.ticker == ticker && o.order.is_active())
            .map(|o| o.order.clone())
            .collect()
    }

    fn cancel_order(&mut self, order_id: OrderId) -> Result<(), AdapterError> {
        match self.orders.remove(&order_id) {
            Some(mut tracked) => {
                tracked.order.status = OrderStatus::Cancelled;
                self.order_events.push(OrderEvent {
                    time: tracked.order.created_time,
                    ticker: tracked.order.ticker,
                    side: tracked.order.side,
                    price_cents: tracked.order.price_cents,
                    qty: tracked.order.remaining_qty,
                    status: OrderEventStatus::Canceled,
                    filled: 0,
                    order_id,
                });
                Ok(())
            }
            None => Err(AdapterError::UnknownOrder(order_id.to_string())),
        }
    }

    fn place_order(&mut self, req: OrderRequest, market_state: &MarketState, t: NaiveDateTime) -> OrderResult {
        let id = OrderId::generate();
        let ready_at = if self.fill_latency_s > 0.0 {
            Some(t + chrono::Duration::milliseconds((self.fill_latency_s * 1000.0) as i64))
        } else {
            Some(t)
        };
        let expires_at = req
            .expires_in_s
            .map(|s| t + chrono::Duration::milliseconds((s * 1000.0) as i64));

        let open_order = OpenOrder {
            id,
            ticker: req.ticker.clone(),
            side: req.side,
            action: req.action,
            price_cents: req.price_cents,
            remaining_qty: req.qty,
            status: OrderStatus::Open,
            created_time: t,
            ready_at,
        };

        self.order_events.push(OrderEvent {
            time: t,
            ticker: open_order.ticker.clone(),
            side: open_order.side,
            price_cents: open_order.price_cents,
            qty: open_order.remaining_qty,
            status: OrderEventStatus::Accepted,
            filled: 0,
            order_id: id,
        });

        let mut tracked = TrackedOrder { order: open_order, expires_at };

        // Immediate marketable cross at placement time (latency permitting).
        if let Some((fill_price, qty)) = self.try_fill(&mut tracked, market_state, t, 0.0) {
            let order_time = tracked.order.created_time;
            self.settle_fill(tracked.order, fill_price, qty, t, order_time);
            return OrderResult {
                ok: true,
                filled: true,
                status: PlaceStatus::Executed,
                order_id: Some(id),
            };
        }

        self.orders.insert(id, tracked);
        OrderResult {
            ok: true,
            filled: false,
            status: PlaceStatus::Resting,
            order_id: Some(id),
        }
    }

    fn amend_order(&mut self, order_id: OrderId, new_price_cents: u8, new_qty: u32) -> Result<bool, AdapterError> {
        match self.orders.get_mut(&order_id) {
            Some(tracked) => {
                tracked.order.price_cents = new_price_cents;
                tracked.order.remaining_qty = new_qty;
                Ok(true)
            }
            None => Err(AdapterError::UnknownOrder(order_id.to_string())),
        }
    }

    fn get_positions(&self) -> HashMap<Ticker, Position> {
        self.positions.clone()
    }

    fn get_cash(&self) -> Decimal {
        self.cash
    }

    fn settle_market(&mut self, ticker: &Ticker, settlement_price_cents: u8, t: NaiveDateTime) -> Option<Decimal> {
        if self.settled.contains(ticker) {
            return None; // idempotent (§8 invariant 4)
        }
        let position = self.positions.remove(ticker)?;
        let payout = position.settlement_value(settlement_price_cents);
        self.unsettled.push((payout, t));
        self.settled.insert(ticker.clone());
        info!(%ticker, %payout, "market settled");
        Some(payout)
    }

    /// Release any unsettled payouts whose settle time has passed into
    /// spendable cash. `settle_market` only queues a payout — this is the
    /// only thing that actually credits it.
    fn check_settlements(&mut self, now: NaiveDateTime) {
        let (ready, pending): (Vec<_>, Vec<_>) = self.unsettled.drain(..).partition(|(_, t)| *t <= now);
        for (amount, _) in ready {
            self.cash += amount;
        }
        self.unsettled = pending;
    }

    fn take_trades(&mut self) -> Vec<TradeRecord> {
        std::mem::take(&mut self.trades)
    }

    fn take_order_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.order_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn dt(s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 9).unwrap().and_hms_opt(9, 0, s).unwrap()
    }

    fn req(ticker: &str, side: Side, price: u8, qty: u32) -> OrderRequest {
        OrderRequest {
            ticker: ticker.to_string(),
            side,
            action: Action::Buy,
            price_cents: price,
            qty,
            expires_in_s: Some(15.0),
        }
    }

    #[test]
    fn s1_marketable_buy_yes_fills_immediately() {
        let mut adapter = SimAdapter::new(dec!(100), 0.0, 42);
        let ms = MarketState { yes_bid: Some(48), yes_ask: Some(50), no_bid: Some(50), no_ask: Some(52) };
        adapter.process_tick(&"T".to_string(), &ms, dt(0));

        let result = adapter.place_order(req("T", Side::Yes, 50, 4), &ms, dt(0));
        assert!(result.filled);
        assert_eq!(result.status, PlaceStatus::Executed);

        let trades = adapter.take_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price_cents, 50);
        assert_eq!(trades[0].qty, 4);
    }

    #[test]
    fn s6_netting_credits_cash() {
        let mut adapter = SimAdapter::new(dec!(100), 0.0, 7);
        adapter.seed_position("T".to_string(), Position { yes: 5, no: 0, cost: dec!(0) });
        let ms = MarketState { yes_bid: Some(38), yes_ask: Some(40), no_bid: Some(60), no_ask: Some(62) };
        adapter.process_tick(&"T".to_string(), &ms, dt(0));

        let before_cash = adapter.get_cash();
        let result = adapter.place_order(req("T", Side::No, 40, 3), &ms, dt(0));
        assert!(result.filled);

        let pos = adapter.get_positions().get("T").cloned().unwrap();
        assert_eq!(pos.yes, 2);
        assert_eq!(pos.no, 0);

        let fee = convex_fee(40, 3);
        let expected_cash = before_cash - (dec!(3) * dec!(0.40) + fee) + dec!(3);
        assert_eq!(adapter.get_cash(), expected_cash);
    }

    #[test]
    fn overdraft_rejects_when_not_nettable() {
        let mut adapter = SimAdapter::new(dec!(0), 0.0, 1);
        let ms = MarketState { yes_bid: Some(48), yes_ask: Some(50), no_bid: Some(50), no_ask: Some(52) };
        adapter.process_tick(&"T".to_string(), &ms, dt(0));

        let result = adapter.place_order(req("T", Side::Yes, 50, 100), &ms, dt(0));
        assert!(!result.filled);
        let events = adapter.take_order_events();
        assert!(events.iter().any(|e| e.status == OrderEventStatus::Rejected));
    }

    #[test]
    fn settle_market_is_idempotent() {
        let mut adapter = SimAdapter::new(dec!(0), 0.0, 3);
        adapter.seed_position("T".to_string(), Position { yes: 10, no: 0, cost: dec!(0) });
        let payout = adapter.settle_market(&"T".to_string(), 100, dt(0));
        assert_eq!(payout, Some(dec!(10)));
        let second = adapter.settle_market(&"T".to_string(), 100, dt(0));
        assert_eq!(second, None);
    }

    #[test]
    fn settle_market_alone_does_not_credit_cash_until_check_settlements_runs() {
        let mut adapter = SimAdapter::new(dec!(0), 0.0, 3);
        adapter.seed_position("T".to_string(), Position { yes: 10, no: 0, cost: dec!(0) });
        adapter.settle_market(&"T".to_string(), 100, dt(0));
        assert_eq!(adapter.get_cash(), dec!(0));

        adapter.check_settlements(dt(0));
        assert_eq!(adapter.get_cash(), dec!(10));
    }
}
