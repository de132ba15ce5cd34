//! Inventory-aware market maker (§4.3.2).
//!
//! Maintains a rolling window of observed mids to estimate a fair
//! probability, quotes whichever side has positive fee-and-margin-adjusted
//! edge, sizes it off spendable cash (notional and loss budgets) tempered by
//! an inventory penalty, and never quotes both sides of the same ticker at
//! once (§8 invariant 1) — opening against inventory already held on the
//! other side is left to netting on fill, not to a fresh directional order.
//!
//! Almost every tick has no edge: the common return is `None`, not an empty
//! quote set. An empty `Some(vec![])` is the outer regime's vocabulary
//! (IDLE_CANCEL), not this strategy's.

use binmm_core::core::{convex_fee, Position, Side};
use binmm_core::engine::{DesiredOrder, Strategy, StrategyInput};
use rust_decimal::prelude::ToPrimitive;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct InventoryMmConfig {
    /// How many recent mids feed the rolling fair-probability estimate.
    /// The estimate is never gated on having a full window — the mean of
    /// whatever history exists is used from the first tick on.
    pub mid_window: usize,
    /// Cents of edge demanded on top of the fee before a side is even a
    /// candidate (§4.3.2 steps 5-6).
    pub margin_cents: f64,
    /// Divides `edge_after_fee` to produce the `[0, 1]` size multiplier —
    /// larger values mean edge has to grow further before sizing maxes out.
    pub scaling_factor: f64,
    /// Fraction of cash the position's notional (qty * price) may consume.
    pub max_notional_pct: f64,
    /// Fraction of cash the position's worst-case loss (qty * cost including
    /// fee) may consume.
    pub max_loss_pct: f64,
    /// Inventory cap per side. `None` means unlimited (skip the room check).
    pub max_inventory: Option<u32>,
    pub order_expiry_s: f64,
}

impl Default for InventoryMmConfig {
    fn default() -> Self {
        Self {
            mid_window: 20,
            margin_cents: 4.0,
            scaling_factor: 4.0,
            max_notional_pct: 0.05,
            max_loss_pct: 0.02,
            max_inventory: Some(50),
            order_expiry_s: 15.0,
        }
    }
}

pub struct InventoryMarketMaker {
    config: InventoryMmConfig,
    mids: VecDeque<f64>,
}

impl InventoryMarketMaker {
    pub fn new(config: InventoryMmConfig) -> Self {
        let mids = VecDeque::with_capacity(config.mid_window);
        Self { config, mids }
    }

    fn push_mid(&mut self, mid: f64) {
        if self.mids.len() == self.config.mid_window {
            self.mids.pop_front();
        }
        self.mids.push_back(mid);
    }

    /// Mean of the rolling mid window, as a probability. Non-gating: used
    /// from the first observed mid, not just once the window is full.
    fn fair_prob(&self) -> Option<f64> {
        if self.mids.is_empty() {
            return None;
        }
        let sum: f64 = self.mids.iter().sum();
        Some(sum / self.mids.len() as f64 / 100.0)
    }
}

impl Strategy for InventoryMarketMaker {
    fn desired_orders(&mut self, input: &StrategyInput) -> Option<Vec<DesiredOrder>> {
        let yes_bid = input.market_state.yes_bid?;
        let yes_ask = input.market_state.yes_ask?;
        let mid = (yes_bid as f64 + yes_ask as f64) / 2.0;
        self.push_mid(mid);
        let fair_prob = self.fair_prob()?;

        // Step 3: theoretical prices implied by the rolling fair estimate.
        let price_yes = mid.floor().clamp(0.0, 100.0) as u8;
        let price_no = 100u8.saturating_sub(price_yes);

        // Step 4: edge_yes + edge_no is always exactly 0 here, since
        // price_yes + price_no == 100 and the two fair probabilities sum to
        // 1 — so whichever is non-negative is the only one that can be
        // positive. YES wins ties (both would be exactly zero and get
        // rejected by the edge<=0 check below regardless).
        let edge_yes = fair_prob - price_yes as f64 / 100.0;
        let edge_no = (1.0 - fair_prob) - price_no as f64 / 100.0;

        let (side, theoretical_price, ask) = if edge_yes >= edge_no {
            (Side::Yes, price_yes, yes_ask)
        } else {
            let no_ask = input.market_state.no_ask?;
            (Side::No, price_no, no_ask)
        };
        let edge_cents = edge_yes.max(edge_no) * 100.0;
        if edge_cents <= 0.0 {
            return None;
        }

        // Steps 5-6: reject unless edge clears the continuous fee
        // approximation plus the required margin.
        let p = theoretical_price as f64 / 100.0;
        let fee_cents = 100.0 * 0.07 * p * (1.0 - p);
        if edge_cents < fee_cents + self.config.margin_cents {
            return None;
        }
        let edge_after_fee = edge_cents - fee_cents - self.config.margin_cents;
        if edge_after_fee <= 0.0 {
            return None;
        }

        // Step 11 (checked early): never straddle. Opening against
        // inventory already held on the opposite side is netting's job.
        let (held, opposite_held) = match side {
            Side::Yes => (input.position.yes, input.position.no),
            Side::No => (input.position.no, input.position.yes),
        };
        if opposite_held > 0 {
            return None;
        }

        // Step 7: cash-based sizing.
        let scale = (edge_after_fee / self.config.scaling_factor).clamp(0.0, 1.0);
        let cash = input.cash.to_f64().unwrap_or(0.0);
        let max_notional = cash * self.config.max_notional_pct;
        let max_loss = cash * self.config.max_loss_pct;
        let cost_per_contract = p + fee_cents / 100.0;
        if cost_per_contract <= 0.0 {
            return None;
        }
        let base_qty = (max_notional / cost_per_contract).min(max_loss / cost_per_contract).floor();
        if base_qty < 1.0 {
            return None;
        }

        // Step 8: inventory room and the penalty that shrinks size as held
        // inventory grows toward the cap.
        let room = match self.config.max_inventory {
            Some(max) => {
                let r = max.saturating_sub(held);
                if r == 0 {
                    return None;
                }
                r as f64
            }
            None => f64::INFINITY,
        };
        let penalty = 1.0 / (1.0 + held as f64 / 200.0);

        // Step 9: clamp to [1, room].
        let qty = (base_qty * scale * penalty).floor().clamp(1.0, room) as u32;

        // Step 10: recheck with the real, quantity-aware ceiled fee — the
        // continuous approximation above can understate it enough to flip
        // the trade unprofitable once size is known. This recheck is
        // required, not optional (§9).
        let real_fee = convex_fee(ask, qty).to_f64().unwrap_or(0.0);
        let real_fee_per_contract_cents = real_fee / qty as f64 * 100.0;
        let real_edge_after_fee = edge_cents - real_fee_per_contract_cents - self.config.margin_cents;
        if real_edge_after_fee <= 0.0 {
            return None;
        }

        // Step 12: emit the single order.
        Some(vec![DesiredOrder {
            side,
            price_cents: ask,
            qty,
            expires_in_s: Some(self.config.order_expiry_s),
            reason: format!("fair={fair_prob:.3} edge={edge_cents:.2} qty={qty}"),
        }])
    }

    fn name(&self) -> &str {
        "inventory_mm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binmm_core::core::MarketState;
    use binmm_core::market::Tick;
    use chrono::NaiveDate;

    fn with_input<R>(ms: MarketState, position: Position, f: impl FnOnce(&StrategyInput) -> R) -> R {
        let now = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let tick = Tick::new(now, "T".to_string(), ms);
        let ticker = "T".to_string();
        let open_orders = Vec::new();
        let input = StrategyInput {
            ticker: &ticker,
            tick: &tick,
            market_state: &tick.market_state,
            position,
            cash: rust_decimal::Decimal::from(1000),
            open_orders: &open_orders,
            now,
        };
        f(&input)
    }

    fn generous_config(overrides: impl FnOnce(&mut InventoryMmConfig)) -> InventoryMmConfig {
        let mut cfg = InventoryMmConfig {
            margin_cents: 0.0,
            scaling_factor: 4.0,
            max_notional_pct: 1.0,
            max_loss_pct: 1.0,
            ..Default::default()
        };
        overrides(&mut cfg);
        cfg
    }

    #[test]
    fn first_tick_has_no_edge_against_its_own_rolling_mid() {
        let mut strat = InventoryMarketMaker::new(InventoryMmConfig { mid_window: 1, ..Default::default() });
        let ms = MarketState { yes_bid: Some(60), yes_ask: Some(62), no_bid: Some(38), no_ask: Some(40) };
        let desired = with_input(ms, Position::default(), |input| strat.desired_orders(input));
        // With a flat rolling window the fair mid equals the market mid, so
        // no edge exists yet on the first tick.
        assert!(desired.is_none());
    }

    #[test]
    fn never_quotes_both_sides_at_once() {
        let mut strat = InventoryMarketMaker::new(generous_config(|c| c.mid_window = 3));
        let ms = MarketState { yes_bid: Some(48), yes_ask: Some(50), no_bid: Some(50), no_ask: Some(52) };
        for _ in 0..3 {
            let desired = with_input(ms, Position::default(), |input| strat.desired_orders(input));
            assert!(desired.map(|v| v.len()).unwrap_or(0) <= 1);
        }
    }

    #[test]
    fn stops_quoting_a_side_once_inventory_room_is_exhausted() {
        let mut strat = InventoryMarketMaker::new(generous_config(|c| {
            c.mid_window = 20;
            c.max_inventory = Some(3);
        }));
        // Warm the rolling mean up high so the cheap ask below carries real edge.
        for _ in 0..20 {
            let _ = with_input(
                MarketState { yes_bid: Some(70), yes_ask: Some(72), no_bid: Some(28), no_ask: Some(30) },
                Position::default(),
                |input| strat.desired_orders(input),
            );
        }
        let ms = MarketState { yes_bid: Some(48), yes_ask: Some(50), no_bid: Some(50), no_ask: Some(52) };

        let desired = with_input(ms, Position::default(), |input| strat.desired_orders(input)).unwrap();
        assert_eq!(desired[0].side, Side::Yes);

        let full_position = Position { yes: 3, no: 0, cost: rust_decimal::Decimal::ZERO };
        let desired = with_input(ms, full_position, |input| strat.desired_orders(input));
        assert!(desired.is_none());
    }

    #[test]
    fn holding_the_opposite_side_blocks_opening_further_exposure() {
        // Spec scenario S2: a juicy YES edge is on offer, but we already
        // hold NO, so the strategy must stay out rather than open YES.
        let mut strat = InventoryMarketMaker::new(generous_config(|c| c.mid_window = 20));
        for _ in 0..20 {
            let _ = with_input(
                MarketState { yes_bid: Some(70), yes_ask: Some(72), no_bid: Some(28), no_ask: Some(30) },
                Position { yes: 0, no: 10, cost: rust_decimal::Decimal::ZERO },
                |input| strat.desired_orders(input),
            );
        }
        // Rolling fair mid is now ~71, so a YES ask of 50 is a large edge —
        // without the opposite-inventory block this would quote BUY_YES.
        let ms = MarketState { yes_bid: Some(48), yes_ask: Some(50), no_bid: Some(50), no_ask: Some(52) };
        let position = Position { yes: 0, no: 10, cost: rust_decimal::Decimal::ZERO };
        let desired = with_input(ms, position, |input| strat.desired_orders(input));
        assert!(desired.is_none());
    }
}

#[cfg(test)]
mod inventory_mm_proptest;
