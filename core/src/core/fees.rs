//! Fee and settlement primitives (§4.1): the convex per-contract fee,
//! settlement-price snapping, and ticker-to-expiry parsing.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// `fee = ceil(0.07 * qty * p * (1-p) * 100) / 100`, where `p = price_cents / 100`.
///
/// This is the exact per-fill fee charged by the broker. The continuous
/// approximation `0.07 * p * (1-p)` (no ceiling, no quantity) is used
/// separately for gating and sizing (see `binmm_strategies`).
pub fn convex_fee(price_cents: u8, qty: u32) -> Decimal {
    let p = price_cents as f64 / 100.0;
    let raw = 0.07 * qty as f64 * p * (1.0 - p);
    let cents = (raw * 100.0).ceil();
    Decimal::from_f64_retain(cents).unwrap_or_default() / Decimal::from(100)
}

/// Snap a last-known mid (0-100 cents) to a settlement price: 100 if the mid
/// was at or above 99, 0 if at or below 1, otherwise the mid unchanged.
pub fn settlement_snap(last_mid_cents: f64) -> f64 {
    if last_mid_cents >= 99.0 {
        100.0
    } else if last_mid_cents <= 1.0 {
        0.0
    } else {
        last_mid_cents
    }
}

fn month_from_abbrev(abbrev: &str) -> Option<u32> {
    match abbrev.to_ascii_uppercase().as_str() {
        "JAN" => Some(1),
        "FEB" => Some(2),
        "MAR" => Some(3),
        "APR" => Some(4),
        "MAY" => Some(5),
        "JUN" => Some(6),
        "JUL" => Some(7),
        "AUG" => Some(8),
        "SEP" => Some(9),
        "OCT" => Some(10),
        "NOV" => Some(11),
        "DEC" => Some(12),
        _ => None,
    }
}

/// Parse a ticker's embedded expiry date, encoded `YYMONDD` (e.g. `26JAN09`)
/// inside one `-`-delimited token. Returns `(market_end, payout_time)`:
/// market end is `00:00` the day after the encoded date, payout is `01:00`
/// the day after.
///
/// Returns `None` if no token matches the `YYMONDD` shape (7 chars, first
/// two digits) — callers should treat that ticker as "never settles".
pub fn parse_ticker_expiry(ticker: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let token = ticker.split('-').find(|tok| {
        tok.len() == 7 && tok.as_bytes()[0].is_ascii_digit() && tok.as_bytes()[1].is_ascii_digit()
    })?;

    let yy: u32 = token[0..2].parse().ok()?;
    let month = month_from_abbrev(&token[2..5])?;
    let dd: u32 = token[5..7].parse().ok()?;

    let date = NaiveDate::from_ymd_opt(2000 + yy as i32, month, dd)?;
    let next_day = date.succ_opt()?;

    let market_end = next_day.and_hms_opt(0, 0, 0)?;
    let payout_time = next_day.and_hms_opt(1, 0, 0)?;
    Some((market_end, payout_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fee_matches_invariant_3() {
        // fee = ceil(100 * 0.07 * q * p * (1-p)) / 100 exactly
        let fee = convex_fee(50, 10);
        assert_eq!(fee, dec!(1.75));
    }

    #[test]
    fn fee_is_never_negative() {
        assert!(convex_fee(0, 5) >= Decimal::ZERO);
        assert!(convex_fee(100, 5) >= Decimal::ZERO);
    }

    #[test]
    fn settlement_snap_rounds_near_bounds() {
        assert_eq!(settlement_snap(99.4), 100.0);
        assert_eq!(settlement_snap(0.5), 0.0);
        assert_eq!(settlement_snap(55.0), 55.0);
    }

    #[test]
    fn parses_embedded_expiry() {
        let (end, payout) = parse_ticker_expiry("INXD-26JAN09-B5000").unwrap();
        assert_eq!(end.to_string(), "2026-01-10 00:00:00");
        assert_eq!(payout.to_string(), "2026-01-10 01:00:00");
    }

    #[test]
    fn returns_none_for_unparseable_ticker() {
        assert!(parse_ticker_expiry("NOEXPIRY-TOKEN").is_none());
    }
}

#[cfg(test)]
mod fees_proptest;
