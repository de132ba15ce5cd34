//! Sliding-window action-rate limiter (§4.4 step 6, §8 invariant 6).
//!
//! Each ticker gets its own 60-second window of action timestamps. An
//! action (order placement, cancel, or amend) is allowed only while fewer
//! than `max_actions_per_minute` have landed in the trailing 60 seconds —
//! a direct port of the source's `_can_take_action`/`_record_action`
//! timestamp-deque approach, not a token bucket.

use crate::core::Ticker;
use chrono::{Duration, NaiveDateTime};
use std::collections::{HashMap, VecDeque};

pub struct ActionRateLimiter {
    max_actions_per_minute: u32,
    window: Duration,
    history: HashMap<Ticker, VecDeque<NaiveDateTime>>,
}

impl ActionRateLimiter {
    pub fn new(max_actions_per_minute: u32) -> Self {
        Self {
            max_actions_per_minute,
            window: Duration::seconds(60),
            history: HashMap::new(),
        }
    }

    fn prune(&mut self, ticker: &Ticker, now: NaiveDateTime) {
        if let Some(deque) = self.history.get_mut(ticker) {
            while deque.front().map(|t| now - *t > self.window).unwrap_or(false) {
                deque.pop_front();
            }
        }
    }

    /// True if another action may be taken for `ticker` without exceeding
    /// the per-minute budget. Does not itself record the action.
    pub fn can_take_action(&mut self, ticker: &Ticker, now: NaiveDateTime) -> bool {
        self.prune(ticker, now);
        let count = self.history.get(ticker).map(VecDeque::len).unwrap_or(0);
        (count as u32) < self.max_actions_per_minute
    }

    /// Record that an action was taken for `ticker` at `now`.
    pub fn record_action(&mut self, ticker: &Ticker, now: NaiveDateTime) {
        self.history.entry(ticker.clone()).or_default().push_back(now);
    }

    /// Actions taken for `ticker` in the trailing 60 seconds, for the
    /// `METRIC` log line (§4.4 step 7).
    pub fn action_count(&mut self, ticker: &Ticker, now: NaiveDateTime) -> u32 {
        self.prune(ticker, now);
        self.history.get(ticker).map(VecDeque::len).unwrap_or(0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(s: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 9).unwrap().and_hms_opt(9, 0, 0).unwrap() + Duration::seconds(s)
    }

    #[test]
    fn allows_up_to_the_configured_budget_then_blocks() {
        let mut limiter = ActionRateLimiter::new(3);
        let ticker = "T".to_string();
        for i in 0..3 {
            assert!(limiter.can_take_action(&ticker, dt(i)));
            limiter.record_action(&ticker, dt(i));
        }
        assert!(!limiter.can_take_action(&ticker, dt(3)));
    }

    #[test]
    fn window_slides_out_old_actions() {
        let mut limiter = ActionRateLimiter::new(1);
        let ticker = "T".to_string();
        limiter.record_action(&ticker, dt(0));
        assert!(!limiter.can_take_action(&ticker, dt(30)));
        assert!(limiter.can_take_action(&ticker, dt(61)));
    }

    #[test]
    fn action_count_reflects_the_trailing_window() {
        let mut limiter = ActionRateLimiter::new(10);
        let ticker = "T".to_string();
        limiter.record_action(&ticker, dt(0));
        limiter.record_action(&ticker, dt(1));
        assert_eq!(limiter.action_count(&ticker, dt(2)), 2);
        assert_eq!(limiter.action_count(&ticker, dt(61)), 1);
        assert_eq!(limiter.action_count(&ticker, dt(62)), 0);
    }

    #[test]
    fn tickers_are_independent() {
        let mut limiter = ActionRateLimiter::new(1);
        limiter.record_action(&"A".to_string(), dt(0));
        assert!(!limiter.can_take_action(&"A".to_string(), dt(1)));
        assert!(limiter.can_take_action(&"B".to_string(), dt(1)));
    }
}
