//! The unified tick-driven engine (§4.4): a single cooperative loop that
//! reconciles desired vs. active orders on every tick, for both backtests
//! and live trading, against whichever [`Adapter`] is wired in.

use super::traits::{DesiredOrder, Strategy, StrategyInput};
use crate::core::fees::{convex_fee, parse_ticker_expiry, settlement_snap};
use crate::core::{MarketState, OpenOrder, Position, Side, Ticker};
use crate::execution::journal::{ArtifactWriter, DecisionIntent};
use crate::execution::{Adapter, OrderRequest};
use crate::market::Tick;
use crate::risk::ActionRateLimiter;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

pub struct EngineConfig {
    pub max_actions_per_minute: u32,
    pub max_order_age_s: f64,
    /// Minimum tick-time gap between two strategy/reconciliation passes for
    /// the same ticker (§4.4 step 6, §8 invariant 5).
    pub min_requote_interval_s: f64,
    pub record_decision_intents: bool,
    /// Reconciliation (§4.4 step 10): a resting order within this many cents
    /// and this much qty of what's desired is left alone entirely.
    pub amend_price_tolerance_cents: u8,
    pub amend_qty_tolerance: u32,
    /// Below this price delta (and within the resize floor), a mismatch is
    /// still just kept rather than repriced — churn isn't worth it for a
    /// marginal difference.
    pub reprice_min_cents: u8,
    pub resize_min_abs: u32,
    pub resize_min_rel: f64,
    /// Orders younger than this are never cancelled for being unmatched
    /// (churn guard); close-only orders are protected separately regardless
    /// of age (§4.4 step 11).
    pub min_quote_lifetime_s: f64,
    /// After an opening order is rejected for insufficient cash, wait this
    /// long before trying to open on this ticker again (§7).
    pub open_reject_cooldown_s: f64,
    /// Cash buffer required above `qty * (price + fee)` before an opening
    /// order is placed (§4.4 step 13).
    pub preflight_cash_buffer: Decimal,
    /// If > 0, a tick whose processing lags real time by more than this is
    /// logged as `STALE_TICK` and dropped before reconciliation (§4.4 step
    /// 2). `0.0` disables the gate (the default, and the only sane choice
    /// for a backtest replaying historical ticks far from wall-clock now).
    pub trade_live_window_s: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_actions_per_minute: 20,
            max_order_age_s: 30.0,
            min_requote_interval_s: 0.0,
            record_decision_intents: false,
            amend_price_tolerance_cents: 0,
            amend_qty_tolerance: 0,
            reprice_min_cents: 2,
            resize_min_abs: 1,
            resize_min_rel: 0.1,
            min_quote_lifetime_s: 0.0,
            open_reject_cooldown_s: 5.0,
            preflight_cash_buffer: dec!(0.50),
            trade_live_window_s: 0.0,
        }
    }
}

/// Drives one strategy against one adapter, tick by tick (§4.4).
pub struct Engine {
    adapter: Box<dyn Adapter>,
    strategy: Box<dyn Strategy>,
    rate_limiter: ActionRateLimiter,
    artifacts: ArtifactWriter,
    config: EngineConfig,
    /// Tickers already settled, so a repeated payout-time crossing is a
    /// no-op (§8 invariant 4).
    settled: HashSet<Ticker>,
    /// Cached (market_end, payout_time) per ticker, parsed once.
    expiry_cache: HashMap<Ticker, (NaiveDateTime, NaiveDateTime)>,
    /// Last observed mid per ticker, used to snap a settlement price once
    /// payout time passes (the tick stream carries no explicit payout).
    last_mid: HashMap<Ticker, f64>,
    /// Last tick time a strategy/reconciliation pass ran for this ticker
    /// (§4.4 step 9, only advances past the throttle gate).
    last_requote_time: HashMap<Ticker, NaiveDateTime>,
    /// Last time an opening order was rejected for insufficient cash, per
    /// ticker — gates the open-reject cooldown (§7).
    last_open_reject: HashMap<Ticker, NaiveDateTime>,
    /// Last time a `METRIC` line was emitted, per ticker (§4.4 step 7).
    last_metric_time: HashMap<Ticker, NaiveDateTime>,
}

impl Engine {
    pub fn new(
        adapter: Box<dyn Adapter>,
        strategy: Box<dyn Strategy>,
        artifacts: ArtifactWriter,
        config: EngineConfig,
    ) -> Self {
        let rate_limiter = ActionRateLimiter::new(config.max_actions_per_minute);
        Self {
            adapter,
            strategy,
            rate_limiter,
            artifacts,
            config,
            settled: HashSet::new(),
            expiry_cache: HashMap::new(),
            last_mid: HashMap::new(),
            last_requote_time: HashMap::new(),
            last_open_reject: HashMap::new(),
            last_metric_time: HashMap::new(),
        }
    }

    /// Run one tick's reconciliation (§4.4):
    /// 1. feed the tick to the adapter so it can fill resting orders,
    /// 2. staleness gate: drop the tick if processing has fallen too far
    ///    behind real time,
    /// 3. pull current open orders / position / cash, cancelling aged ones,
    /// 4. (open orders are already strategy-normalized by the adapter),
    /// 5. build the position/pending-qty picture the strategy sees,
    /// 6. throttle: skip the rest if too soon since the last requote,
    /// 7. ask the strategy what it wants resting, emitting a periodic
    ///    `METRIC` line,
    /// 8. if the strategy returned `None`, keep everything as-is and return,
    /// 9. otherwise advance the requote clock,
    /// 10. reconcile desired vs. active with tolerance-based amend-in-place,
    /// 11. keep a close-only order alive even if nothing was desired for it,
    /// 12. cancel unmatched non-protected orders (rate-limited),
    /// 13. place unsatisfied desired orders, skipping on reject-cooldown or
    ///     insufficient pre-flight cash,
    /// and finally drain/journal fills and settle the market if due.
    pub fn on_tick(&mut self, tick: &Tick) -> anyhow::Result<()> {
        let ticker = &tick.ticker;
        let now = tick.time;

        self.adapter.process_tick(ticker, &tick.market_state, now);
        self.adapter.check_settlements(now);
        if let Some(mid) = tick.market_state.mid() {
            self.last_mid.insert(ticker.clone(), mid);
        }

        if self.config.trade_live_window_s > 0.0 {
            let wall_now = chrono::Utc::now().naive_utc();
            let lag_s = (wall_now - now).num_milliseconds() as f64 / 1000.0;
            if lag_s > self.config.trade_live_window_s {
                warn!(%ticker, lag_s, "STALE_TICK");
                return Ok(());
            }
        }

        let mut open_orders = self.adapter.get_open_orders(ticker, now);
        self.cancel_aged_orders(ticker, &mut open_orders, now)?;

        let position = self.adapter.get_positions().get(ticker).copied().unwrap_or_default();
        let cash = self.adapter.get_cash();

        // Throttle (§4.4 step 6, §8 invariant 5): too soon since the last
        // requote on this ticker, skip asking the strategy entirely. Fills
        // and settlement above/below this point still run every tick.
        let throttled = self
            .last_requote_time
            .get(ticker)
            .map(|last| (now - *last).num_milliseconds() as f64 / 1000.0 < self.config.min_requote_interval_s)
            .unwrap_or(false);

        if !throttled {
            let input = StrategyInput {
                ticker,
                tick,
                market_state: &tick.market_state,
                position,
                cash,
                open_orders: &open_orders,
                now,
            };
            let desired = self.strategy.desired_orders(&input);
            self.maybe_log_metric(ticker, now, cash, position, &open_orders);

            let Some(desired) = desired else {
                info!(%ticker, "keep: strategy returned no decision, leaving resting orders untouched");
                self.drain_and_journal()?;
                self.maybe_settle(ticker, now)?;
                self.write_positions_snapshot()?;
                return Ok(());
            };

            self.assert_mutual_exclusion(&desired, ticker);

            if self.config.record_decision_intents {
                self.log_decision_intents(ticker, &desired, now)?;
            }

            self.reconcile(ticker, &open_orders, desired, position, &tick.market_state, cash, now)?;
            self.last_requote_time.insert(ticker.clone(), now);
        }

        self.drain_and_journal()?;
        self.maybe_settle(ticker, now)?;
        self.write_positions_snapshot()?;

        Ok(())
    }

    /// Emit a `{cash, pos, pending, net_inv, actions_last_60s, open_orders}`
    /// line at most once every 30 seconds per ticker (§4.4 step 7).
    fn maybe_log_metric(
        &mut self,
        ticker: &Ticker,
        now: NaiveDateTime,
        cash: Decimal,
        position: Position,
        open_orders: &[OpenOrder],
    ) {
        let due = self
            .last_metric_time
            .get(ticker)
            .map(|last| (now - *last).num_milliseconds() as f64 / 1000.0 >= 30.0)
            .unwrap_or(true);
        if !due {
            return;
        }
        self.last_metric_time.insert(ticker.clone(), now);
        let pending: u32 = open_orders.iter().map(|o| o.remaining_qty).sum();
        let net_inv = position.yes as i64 - position.no as i64;
        let actions_last_60s = self.rate_limiter.action_count(ticker, now);
        info!(
            %ticker,
            %cash,
            pos_yes = position.yes,
            pos_no = position.no,
            pending,
            net_inv,
            actions_last_60s,
            open_orders = open_orders.len(),
            "METRIC"
        );
    }

    fn cancel_aged_orders(&mut self, ticker: &Ticker, open_orders: &mut Vec<OpenOrder>, now: NaiveDateTime) -> anyhow::Result<()> {
        let max_age = chrono::Duration::milliseconds((self.config.max_order_age_s * 1000.0) as i64);
        let mut still_open = Vec::with_capacity(open_orders.len());
        for order in open_orders.drain(..) {
            if now - order.created_time > max_age && self.rate_limiter.can_take_action(ticker, now) {
                self.rate_limiter.record_action(ticker, now);
                if let Err(e) = self.adapter.cancel_order(order.id) {
                    warn!(%ticker, order_id = %order.id, error = %e, "failed to cancel aged order");
                    still_open.push(order);
                }
            } else {
                still_open.push(order);
            }
        }
        *open_orders = still_open;
        Ok(())
    }

    /// Invariant: the engine never knowingly desires YES and NO exposure on
    /// the same ticker simultaneously (§4.3.2 step 11, §8 invariant 1).
    fn assert_mutual_exclusion(&self, desired: &[DesiredOrder], ticker: &Ticker) {
        let has_yes = desired.iter().any(|d| d.side == Side::Yes);
        let has_no = desired.iter().any(|d| d.side == Side::No);
        if has_yes && has_no {
            warn!(%ticker, "strategy desired both YES and NO orders in the same tick; dropping NO side");
        }
    }

    /// True if `order` is within the tight tolerance of `d` and should be
    /// left alone entirely (§4.4 step 10, first bullet).
    fn within_tolerance(d: &DesiredOrder, order: &OpenOrder, cfg: &EngineConfig) -> bool {
        let price_delta = (d.price_cents as i16 - order.price_cents as i16).unsigned_abs();
        let qty_delta = (d.qty as i64 - order.remaining_qty as i64).unsigned_abs();
        price_delta as u8 <= cfg.amend_price_tolerance_cents && qty_delta as u32 <= cfg.amend_qty_tolerance
    }

    /// True if the mismatch is small enough that churning the order (via
    /// amend or cancel+place) isn't worth it — still just kept (§4.4 step
    /// 10, second bullet).
    fn within_reprice_floor(d: &DesiredOrder, order: &OpenOrder, cfg: &EngineConfig) -> bool {
        let price_delta = (d.price_cents as i16 - order.price_cents as i16).unsigned_abs() as u8;
        let qty_delta = (d.qty as i64 - order.remaining_qty as i64).unsigned_abs() as u32;
        let resize_floor = (cfg.resize_min_abs as f64).max(cfg.resize_min_rel * order.remaining_qty as f64) as u32;
        price_delta < cfg.reprice_min_cents && qty_delta <= resize_floor
    }

    fn reconcile(
        &mut self,
        ticker: &Ticker,
        open_orders: &[OpenOrder],
        mut desired: Vec<DesiredOrder>,
        position: Position,
        market_state: &MarketState,
        cash: Decimal,
        now: NaiveDateTime,
    ) -> anyhow::Result<()> {
        // Mutual exclusion: if both sides were desired, keep only the first
        // side encountered (matches `assert_mutual_exclusion`'s warning).
        if let Some(first_side) = desired.first().map(|d| d.side) {
            desired.retain(|d| d.side == first_side);
        }

        // A close-only side is a pure reduction of inventory already held;
        // it's protected from cancellation even if the strategy asked for
        // nothing on it this tick (§4.4 step 11).
        let close_side = if position.yes > 0 && position.no == 0 {
            Some(Side::No)
        } else if position.no > 0 && position.yes == 0 {
            Some(Side::Yes)
        } else {
            None
        };

        let mut matched_desired = vec![false; desired.len()];
        let mut to_cancel: Vec<OpenOrder> = Vec::new();

        for order in open_orders {
            if !order.is_active() {
                continue;
            }
            let is_close_only = close_side == Some(order.side);
            let age_s = (now - order.created_time).num_milliseconds() as f64 / 1000.0;

            let tight_match = desired
                .iter()
                .enumerate()
                .find(|(i, d)| !matched_desired[*i] && d.side == order.side && Self::within_tolerance(d, order, &self.config));
            if let Some((i, _)) = tight_match {
                matched_desired[i] = true;
                continue;
            }

            let near_match = desired.iter().enumerate().find(|(i, d)| {
                !matched_desired[*i] && d.side == order.side && Self::within_reprice_floor(d, order, &self.config)
            });
            if let Some((i, _)) = near_match {
                matched_desired[i] = true;
                continue;
            }

            let amend_candidate = desired.iter().enumerate().find(|(i, d)| !matched_desired[*i] && d.side == order.side);
            if let Some((i, d)) = amend_candidate {
                // Never churn a front-of-queue order for a marginal reprice
                // — losing queue priority costs more than a small edge gain.
                let price_delta = (d.price_cents as i16 - order.price_cents as i16).unsigned_abs() as u8;
                let front_of_queue = self.adapter.queue_position(order.id) == Some(0);
                if front_of_queue && price_delta <= self.config.reprice_min_cents.saturating_mul(2) {
                    matched_desired[i] = true;
                    continue;
                }
                if self.rate_limiter.can_take_action(ticker, now) {
                    self.rate_limiter.record_action(ticker, now);
                    match self.adapter.amend_order(order.id, d.price_cents, d.qty) {
                        Ok(true) => {
                            matched_desired[i] = true;
                            continue;
                        }
                        Ok(false) | Err(_) => {}
                    }
                }
            }

            if age_s < self.config.min_quote_lifetime_s && !is_close_only {
                continue; // churn guard: too young to cancel yet
            }
            if is_close_only {
                continue; // close protection: always kept regardless of age
            }
            to_cancel.push(order.clone());
        }

        for order in to_cancel {
            if self.rate_limiter.can_take_action(ticker, now) {
                self.rate_limiter.record_action(ticker, now);
                if let Err(e) = self.adapter.cancel_order(order.id) {
                    warn!(%ticker, order_id = %order.id, error = %e, "cancel failed during reconciliation");
                }
            }
        }

        for (i, d) in desired.into_iter().enumerate() {
            if matched_desired[i] {
                continue;
            }
            if !self.rate_limiter.can_take_action(ticker, now) {
                continue;
            }

            let is_open = close_side != Some(d.side);
            if is_open {
                if let Some(last_reject) = self.last_open_reject.get(ticker) {
                    let since_s = (now - *last_reject).num_milliseconds() as f64 / 1000.0;
                    if since_s < self.config.open_reject_cooldown_s {
                        info!(%ticker, reason = "open_reject_cooldown", "ORDER_SKIP");
                        continue;
                    }
                }
                let fee = convex_fee(d.price_cents, d.qty);
                let notional = Decimal::from(d.qty) * Decimal::from(d.price_cents) / Decimal::from(100);
                if notional + fee + self.config.preflight_cash_buffer > cash {
                    info!(%ticker, reason = "insufficient_cash_preflight", "ORDER_SKIP");
                    continue;
                }
            }

            self.rate_limiter.record_action(ticker, now);
            let result = self.adapter.place_order(
                OrderRequest {
                    ticker: ticker.clone(),
                    side: d.side,
                    action: crate::core::Action::Buy,
                    price_cents: d.price_cents,
                    qty: d.qty,
                    expires_in_s: d.expires_in_s,
                },
                market_state,
                now,
            );
            if !result.ok {
                info!(%ticker, status = ?result.status, reason = %d.reason, "order not placed");
                if is_open {
                    self.last_open_reject.insert(ticker.clone(), now);
                }
            }
        }
        Ok(())
    }

    fn log_decision_intents(&mut self, ticker: &Ticker, desired: &[DesiredOrder], now: NaiveDateTime) -> anyhow::Result<()> {
        if desired.is_empty() {
            self.artifacts.write_decision_intent(&DecisionIntent {
                time: now,
                ticker: ticker.clone(),
                side: "none".to_string(),
                price_cents: None,
                qty: None,
                fair_prob: 0.0,
                edge: 0.0,
                reason: "no desired orders".to_string(),
            })?;
        }
        for d in desired {
            self.artifacts.write_decision_intent(&DecisionIntent {
                time: now,
                ticker: ticker.clone(),
                side: d.side.to_string(),
                price_cents: Some(d.price_cents),
                qty: Some(d.qty),
                fair_prob: 0.0,
                edge: 0.0,
                reason: d.reason.clone(),
            })?;
        }
        Ok(())
    }

    fn drain_and_journal(&mut self) -> anyhow::Result<()> {
        for trade in self.adapter.take_trades() {
            self.artifacts.write_trade(&trade)?;
        }
        for event in self.adapter.take_order_events() {
            self.artifacts.write_order_event(&event)?;
        }
        Ok(())
    }

    fn maybe_settle(&mut self, ticker: &Ticker, now: NaiveDateTime) -> anyhow::Result<()> {
        if self.settled.contains(ticker) {
            return Ok(());
        }
        let (_, payout_time) = *self
            .expiry_cache
            .entry(ticker.clone())
            .or_insert_with(|| parse_ticker_expiry(ticker).unwrap_or((now, now)));

        if now >= payout_time {
            self.settled.insert(ticker.clone());
            let last_mid = self.last_mid.get(ticker).copied().unwrap_or(50.0);
            let settlement_cents = settlement_snap(last_mid).round() as u8;
            self.adapter.settle_market(ticker, settlement_cents, now);
        }
        Ok(())
    }

    /// Snapshot current positions/cash to the journal every tick, not just
    /// on settlement — a run that never crosses payout time still needs a
    /// positions file.
    fn write_positions_snapshot(&mut self) -> anyhow::Result<()> {
        let positions = self.adapter.get_positions();
        let cash = self.adapter.get_cash();
        self.artifacts.write_positions(&positions, cash)
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.artifacts.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::SimAdapter;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    struct AlwaysQuoteYes;
    impl Strategy for AlwaysQuoteYes {
        fn desired_orders(&mut self, _input: &StrategyInput) -> Option<Vec<DesiredOrder>> {
            Some(vec![DesiredOrder {
                side: Side::Yes,
                price_cents: 45,
                qty: 2,
                expires_in_s: Some(15.0),
                reason: "test".to_string(),
            }])
        }
        fn name(&self) -> &str {
            "always_quote_yes"
        }
    }

    fn dt() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 9).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn places_a_desired_order_when_book_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Box::new(SimAdapter::new(dec!(100), 0.0, 1));
        let artifacts = ArtifactWriter::create(dir.path(), false).unwrap();
        let mut engine = Engine::new(adapter, Box::new(AlwaysQuoteYes), artifacts, EngineConfig::default());

        let tick = Tick::new(
            dt(),
            "T".to_string(),
            MarketState { yes_bid: Some(40), yes_ask: Some(50), no_bid: Some(50), no_ask: Some(60) },
        );
        engine.on_tick(&tick).unwrap();
        engine.flush().unwrap();

        let orders_csv = std::fs::read_to_string(dir.path().join("unified_orders.csv")).unwrap();
        assert!(orders_csv.contains("accepted") || orders_csv.contains("executed"));
    }
}
