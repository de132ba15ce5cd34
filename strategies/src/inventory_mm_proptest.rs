//! Property tests for the cash-based sizing algorithm (§4.3.2 steps 7-9):
//! whatever quantity the strategy settles on must respect the inventory
//! room it was clamped against and never be zero.

use super::*;
use binmm_core::core::MarketState;
use binmm_core::market::Tick;
use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn quote(cash: f64, max_inventory: u32, held: u32) -> Option<Vec<DesiredOrder>> {
    let mut strat = InventoryMarketMaker::new(InventoryMmConfig {
        mid_window: 20,
        margin_cents: 0.0,
        scaling_factor: 4.0,
        max_notional_pct: 0.5,
        max_loss_pct: 0.5,
        max_inventory: Some(max_inventory),
        order_expiry_s: 15.0,
    });
    let now = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap().and_hms_opt(9, 0, 0).unwrap();
    let warm = MarketState { yes_bid: Some(70), yes_ask: Some(72), no_bid: Some(28), no_ask: Some(30) };
    let position = Position { yes: held, no: 0, cost: Decimal::ZERO };
    for _ in 0..20 {
        let tick = Tick::new(now, "T".to_string(), warm);
        let input = StrategyInput {
            ticker: &"T".to_string(),
            tick: &tick,
            market_state: &tick.market_state,
            position,
            cash: Decimal::from_f64_retain(cash).unwrap_or_default(),
            open_orders: &[],
            now,
        };
        let _ = strat.desired_orders(&input);
    }
    let ms = MarketState { yes_bid: Some(48), yes_ask: Some(50), no_bid: Some(50), no_ask: Some(52) };
    let tick = Tick::new(now, "T".to_string(), ms);
    let input = StrategyInput {
        ticker: &"T".to_string(),
        tick: &tick,
        market_state: &tick.market_state,
        position,
        cash: Decimal::from_f64_retain(cash).unwrap_or_default(),
        open_orders: &[],
        now,
    };
    strat.desired_orders(&input)
}

proptest! {
    #[test]
    fn prop_quoted_qty_never_exceeds_room(cash in 100.0f64..1_000_000.0, max_inventory in 1u32..100, held in 0u32..100) {
        let room = max_inventory.saturating_sub(held.min(max_inventory));
        let held = held.min(max_inventory);
        if let Some(orders) = quote(cash, max_inventory, held) {
            prop_assert_eq!(orders.len(), 1);
            prop_assert!(orders[0].qty >= 1);
            prop_assert!(orders[0].qty <= room.max(1));
        }
    }

    #[test]
    fn prop_zero_room_never_quotes(cash in 100.0f64..1_000_000.0, max_inventory in 1u32..100) {
        let orders = quote(cash, max_inventory, max_inventory);
        prop_assert!(orders.is_none());
    }
}
