//! Regime gating (§4.3.1): wraps an inner strategy and only forwards its
//! desired orders during active trading hours and while the market is
//! tight enough, judged against a rolling percentile of recent spreads.

use binmm_core::engine::{DesiredOrder, Strategy, StrategyInput};
use chrono::Timelike;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RegimeConfig {
    /// Trading is only active within `[active_start_hour, active_end_hour)`
    /// local-to-the-tick-stream hour-of-day.
    pub active_start_hour: u32,
    pub active_end_hour: u32,
    /// How many recent spread samples feed the rolling percentile.
    pub spread_window: usize,
    /// Only trade while the current spread is at or below this percentile
    /// of recent spreads (0.0-1.0); a lower percentile means a stricter,
    /// tighter-market-only gate.
    pub spread_percentile: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            active_start_hour: 9,
            active_end_hour: 16,
            spread_window: 30,
            spread_percentile: 0.5,
        }
    }
}

/// Gates an inner [`Strategy`] by active hours and spread regime.
pub struct RegimeSwitcher<S: Strategy> {
    config: RegimeConfig,
    inner: S,
    spreads: VecDeque<f64>,
}

impl<S: Strategy> RegimeSwitcher<S> {
    pub fn new(config: RegimeConfig, inner: S) -> Self {
        let spreads = VecDeque::with_capacity(config.spread_window);
        Self { config, inner, spreads }
    }

    fn within_active_hours(&self, hour: u32) -> bool {
        if self.config.active_start_hour <= self.config.active_end_hour {
            hour >= self.config.active_start_hour && hour < self.config.active_end_hour
        } else {
            // Wraps past midnight.
            hour >= self.config.active_start_hour || hour < self.config.active_end_hour
        }
    }

    fn push_spread(&mut self, spread: f64) {
        if self.spreads.len() == self.config.spread_window {
            self.spreads.pop_front();
        }
        self.spreads.push_back(spread);
    }

    /// The current spread percentile threshold: true once we have enough
    /// history and the live spread sits at or below it.
    fn spread_is_tight(&self, current: f64) -> bool {
        if self.spreads.len() < self.config.spread_window {
            return false; // not enough history yet; stay gated closed
        }
        let mut sorted: Vec<f64> = self.spreads.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let idx = ((sorted.len() - 1) as f64 * self.config.spread_percentile).round() as usize;
        current <= sorted[idx]
    }
}

impl<S: Strategy> Strategy for RegimeSwitcher<S> {
    fn desired_orders(&mut self, input: &StrategyInput) -> Option<Vec<DesiredOrder>> {
        // No spread data at all: nothing to gate on, hold whatever is resting.
        let spread = input.market_state.spread()?;
        self.push_spread(spread);

        if !self.within_active_hours(input.now.hour()) {
            return None; // IDLE_HOLD: keep resting orders untouched
        }
        if !self.spread_is_tight(spread) {
            return Some(Vec::new()); // IDLE_CANCEL: market too wide, want nothing resting
        }
        self.inner.desired_orders(input) // QUOTING: delegate (or inner's own None/[]/orders)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Side the regime is currently willing to trade, exposed for diagnostics.
pub fn regime_label(active: bool, tight: bool) -> &'static str {
    match (active, tight) {
        (true, true) => "active:tight",
        (true, false) => "active:wide",
        (false, _) => "inactive",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binmm_core::core::{MarketState, Side};
    use binmm_core::engine::DesiredOrder;
    use binmm_core::market::Tick;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    struct AlwaysQuote;
    impl Strategy for AlwaysQuote {
        fn desired_orders(&mut self, _input: &StrategyInput) -> Option<Vec<DesiredOrder>> {
            Some(vec![DesiredOrder {
                side: Side::Yes,
                price_cents: 50,
                qty: 1,
                expires_in_s: Some(15.0),
                reason: "always".to_string(),
            }])
        }
        fn name(&self) -> &str {
            "always_quote"
        }
    }

    fn tick_at(hour: u32, spread: u8) -> Tick {
        let time = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap().and_hms_opt(hour, 0, 0).unwrap();
        Tick::new(
            time,
            "T".to_string(),
            MarketState { yes_bid: Some(50 - spread / 2), yes_ask: Some(50 + spread / 2), no_bid: Some(50), no_ask: Some(52) },
        )
    }

    fn run(switcher: &mut RegimeSwitcher<AlwaysQuote>, tick: &Tick) -> Option<Vec<DesiredOrder>> {
        let ticker = "T".to_string();
        let open_orders = Vec::new();
        let input = StrategyInput {
            ticker: &ticker,
            tick,
            market_state: &tick.market_state,
            position: Default::default(),
            cash: Decimal::from(1000),
            open_orders: &open_orders,
            now: tick.time,
        };
        switcher.desired_orders(&input)
    }

    #[test]
    fn blocks_outside_active_hours() {
        // IDLE_HOLD: outside active hours returns None, not an empty cancel set.
        let mut switcher = RegimeSwitcher::new(
            RegimeConfig { active_start_hour: 9, active_end_hour: 16, spread_window: 1, spread_percentile: 1.0 },
            AlwaysQuote,
        );
        let tick = tick_at(20, 2);
        assert_eq!(run(&mut switcher, &tick), None);
    }

    #[test]
    fn requires_enough_spread_history_before_trading() {
        // IDLE_CANCEL: active hour but regime not tight enough yet returns Some([]).
        let mut switcher = RegimeSwitcher::new(
            RegimeConfig { active_start_hour: 9, active_end_hour: 16, spread_window: 5, spread_percentile: 1.0 },
            AlwaysQuote,
        );
        let tick = tick_at(10, 2);
        assert_eq!(run(&mut switcher, &tick), Some(Vec::new()));
    }

    #[test]
    fn trades_once_active_and_tight_with_enough_history() {
        let mut switcher = RegimeSwitcher::new(
            RegimeConfig { active_start_hour: 9, active_end_hour: 16, spread_window: 2, spread_percentile: 1.0 },
            AlwaysQuote,
        );
        let tick = tick_at(10, 2);
        assert_eq!(run(&mut switcher, &tick), Some(Vec::new()));
        assert!(run(&mut switcher, &tick).unwrap().len() > 0);
    }
}
