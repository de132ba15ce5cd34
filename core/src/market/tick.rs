use crate::core::{MarketState, Ticker};
use chrono::NaiveDateTime;

/// One ordered `(time, ticker, market_state)` record, with optional
/// provenance fields for diagnostics (§6.1).
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub time: NaiveDateTime,
    pub ticker: Ticker,
    pub market_state: MarketState,
    pub seq: Option<u64>,
    pub source_file: Option<String>,
    pub source_row: Option<u64>,
}

impl Tick {
    pub fn new(time: NaiveDateTime, ticker: Ticker, market_state: MarketState) -> Self {
        Self {
            time,
            ticker,
            market_state,
            seq: None,
            source_file: None,
            source_row: None,
        }
    }
}
