//! Core data model for the trading engine.
//!
//! `Ticker`, `MarketState`, `Position`, `OpenOrder` and `Wallet` are the
//! concrete types behind the data model described in the specification:
//! a market is identified by an opaque ticker, quoted in whole cents on
//! each of a YES and a NO leg, and a position nets YES/NO inventory against
//! a dollar cost basis.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque market identifier, e.g. `"INXD-26JAN09-B5000"`.
pub type Ticker = String;

/// Which leg of a binary-options market an order or position refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "yes"),
            Side::No => write!(f, "no"),
        }
    }
}

/// Broker-level order action: adds to or reduces a resting book position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
        }
    }
}

/// Order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Resting,
    Executed,
    Cancelled,
    Expired,
    Rejected,
}

impl OrderStatus {
    /// Terminal statuses no longer occupy book or rate-limit accounting.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Executed
                | OrderStatus::Cancelled
                | OrderStatus::Expired
                | OrderStatus::Rejected
        )
    }
}

/// Unique identifier for an order.
///
/// Composed of a millisecond timestamp and a per-process counter; unique
/// within a single run, which is all the engine requires (no cross-process
/// order id coordination is in scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(u64, u32);

impl OrderId {
    pub const fn new(timestamp_ms: u64, counter: u32) -> Self {
        Self(timestamp_ms, counter)
    }

    /// Generate using the process-wide monotonic counter. Not cryptographically
    /// random; uniqueness only needs to hold within one run.
    pub fn generate() -> Self {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::time::{SystemTime, UNIX_EPOCH};

        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(timestamp_ms, counter)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}-{:x}", self.0, self.1)
    }
}

/// Best bid/ask on each leg of a market, in cents (0-100), at one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketState {
    pub yes_bid: Option<u8>,
    pub yes_ask: Option<u8>,
    pub no_bid: Option<u8>,
    pub no_ask: Option<u8>,
}

impl MarketState {
    /// YES bid, falling back to `100 - no_ask` when YES bid is unknown.
    pub fn effective_yes_bid(&self) -> Option<u8> {
        self.yes_bid.or_else(|| self.no_ask.map(|a| 100u8.saturating_sub(a)))
    }

    /// `(yes_bid + yes_ask) / 2`, using the effective YES bid.
    pub fn mid(&self) -> Option<f64> {
        let bid = self.effective_yes_bid()? as f64;
        let ask = self.yes_ask? as f64;
        Some((bid + ask) / 2.0)
    }

    /// `yes_ask - yes_bid`, using the effective YES bid.
    pub fn spread(&self) -> Option<f64> {
        let bid = self.effective_yes_bid()? as f64;
        let ask = self.yes_ask? as f64;
        Some(ask - bid)
    }
}

/// Per-ticker YES/NO inventory and dollar cost basis.
///
/// Invariant: the engine never knowingly increases one side while the other
/// is held (see strategy mutual exclusion, §4.3.2 step 11); this type itself
/// does not enforce that — it only records state and performs the 1:1
/// netting rule on request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub yes: u32,
    pub no: u32,
    pub cost: Decimal,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.yes == 0 && self.no == 0
    }

    /// Net YES and NO 1:1, crediting `$1` per netted pair to the returned
    /// cash amount. Mutates `self` in place.
    pub fn net(&mut self) -> Decimal {
        let netted = self.yes.min(self.no);
        if netted == 0 {
            return Decimal::ZERO;
        }
        self.yes -= netted;
        self.no -= netted;
        Decimal::from(netted)
    }

    /// Value this position at a settlement price (cents, 0-100), in dollars.
    pub fn settlement_value(&self, settlement_price_cents: u8) -> Decimal {
        let sp = Decimal::from(settlement_price_cents) / Decimal::from(100);
        let one_minus_sp = Decimal::from(1) - sp;
        Decimal::from(self.yes) * sp + Decimal::from(self.no) * one_minus_sp
    }
}

/// A resting or working order as tracked by a broker adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub id: OrderId,
    pub ticker: Ticker,
    pub side: Side,
    pub action: Action,
    pub price_cents: u8,
    pub remaining_qty: u32,
    pub status: OrderStatus,
    pub created_time: NaiveDateTime,
    pub ready_at: Option<NaiveDateTime>,
}

impl OpenOrder {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal() && self.remaining_qty > 0
    }
}

/// Available cash plus a queue of pending settlements not yet spendable.
#[derive(Debug, Clone, Default)]
pub struct Wallet {
    pub available_cash: Decimal,
    unsettled: Vec<(Decimal, NaiveDateTime)>,
}

impl Wallet {
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            available_cash: initial_cash,
            unsettled: Vec::new(),
        }
    }

    pub fn total_equity(&self) -> Decimal {
        self.available_cash + self.unsettled.iter().map(|(amt, _)| *amt).sum::<Decimal>()
    }

    /// Release any unsettled amounts whose settle time has passed into
    /// available cash.
    pub fn check_settlements(&mut self, now: NaiveDateTime) {
        let (ready, pending): (Vec<_>, Vec<_>) =
            self.unsettled.drain(..).partition(|(_, t)| *t <= now);
        for (amount, _) in ready {
            self.available_cash += amount;
        }
        self.unsettled = pending;
    }

    /// Deduct `amount`, allowing up to `overdraft` below zero. Returns false
    /// (and leaves cash untouched) if even the overdraft can't cover it.
    pub fn spend(&mut self, amount: Decimal, overdraft: Decimal) -> bool {
        if amount > self.available_cash + overdraft {
            return false;
        }
        self.available_cash -= amount;
        true
    }

    pub fn add_cash(&mut self, amount: Decimal) {
        self.available_cash += amount;
    }

    pub fn add_unsettled(&mut self, amount: Decimal, settle_time: NaiveDateTime) {
        self.unsettled.push((amount, settle_time));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn dt(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 9)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn market_state_mid_and_spread() {
        let ms = MarketState {
            yes_bid: Some(48),
            yes_ask: Some(50),
            no_bid: Some(50),
            no_ask: Some(52),
        };
        assert_eq!(ms.mid(), Some(49.0));
        assert_eq!(ms.spread(), Some(2.0));
    }

    #[test]
    fn market_state_derives_yes_bid_from_no_ask() {
        let ms = MarketState {
            yes_bid: None,
            yes_ask: Some(50),
            no_bid: None,
            no_ask: Some(52),
        };
        assert_eq!(ms.effective_yes_bid(), Some(48));
    }

    #[test]
    fn position_nets_1_to_1() {
        let mut pos = Position { yes: 5, no: 3, cost: dec!(0) };
        let credited = pos.net();
        assert_eq!(credited, dec!(3));
        assert_eq!(pos.yes, 2);
        assert_eq!(pos.no, 0);
    }

    #[test]
    fn position_settlement_value() {
        let pos = Position { yes: 10, no: 0, cost: dec!(0) };
        assert_eq!(pos.settlement_value(100), dec!(10));
        let pos = Position { yes: 0, no: 10, cost: dec!(0) };
        assert_eq!(pos.settlement_value(0), dec!(10));
    }

    #[test]
    fn wallet_settlement_release() {
        let mut wallet = Wallet::new(dec!(100));
        wallet.add_unsettled(dec!(10), dt(1));
        assert_eq!(wallet.total_equity(), dec!(110));
        wallet.check_settlements(dt(0));
        assert_eq!(wallet.available_cash, dec!(100));
        wallet.check_settlements(dt(1));
        assert_eq!(wallet.available_cash, dec!(110));
    }

    #[test]
    fn wallet_spend_allows_overdraft() {
        let mut wallet = Wallet::new(dec!(5));
        assert!(wallet.spend(dec!(10), dec!(10)));
        assert_eq!(wallet.available_cash, dec!(-5));
        assert!(!wallet.spend(dec!(10), dec!(10)));
    }
}
