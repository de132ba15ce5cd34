//! Output artifact writer (§6.3): `unified_trades.csv`, `unified_orders.csv`,
//! `unified_positions.json`, and an optional `decision_intents.csv`.
//!
//! Single-threaded, synchronous CSV/JSON writes — the engine is a
//! cooperative tick loop with no concurrent writers, so there is no need for
//! the teacher's background-thread journal.

use crate::core::{Position, Ticker};
use crate::execution::{OrderEvent, TradeRecord};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

const TRADE_HEADER: &[&str] = &[
    "time", "action", "ticker", "price_cents", "qty", "fee", "cost", "source", "order_id",
    "order_time", "fill_time", "fill_delay_s",
];

const ORDER_HEADER: &[&str] = &["time", "ticker", "side", "price_cents", "qty", "status", "filled", "order_id"];

const DECISION_HEADER: &[&str] = &[
    "time", "ticker", "side", "price_cents", "qty", "fair_prob", "edge", "reason",
];

/// One strategy decision, recorded for diagnostics regardless of whether it
/// resulted in an order (§5 diagnostic logging, §6.3 optional artifact).
#[derive(Debug, Clone)]
pub struct DecisionIntent {
    pub time: NaiveDateTime,
    pub ticker: Ticker,
    pub side: String,
    pub price_cents: Option<u8>,
    pub qty: Option<u32>,
    pub fair_prob: f64,
    pub edge: f64,
    pub reason: String,
}

#[derive(Serialize)]
struct PositionsSnapshot {
    cash: Decimal,
    positions: HashMap<Ticker, Position>,
}

pub struct ArtifactWriter {
    trades: csv::Writer<File>,
    orders: csv::Writer<File>,
    decision_intents: Option<csv::Writer<File>>,
    positions_path: PathBuf,
}

impl ArtifactWriter {
    pub fn create(output_dir: &Path, record_decision_intents: bool) -> Result<Self> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("creating output dir {}", output_dir.display()))?;

        let trades_path = output_dir.join("unified_trades.csv");
        let mut trades = csv::Writer::from_path(&trades_path)
            .with_context(|| format!("creating {}", trades_path.display()))?;
        trades.write_record(TRADE_HEADER)?;

        let orders_path = output_dir.join("unified_orders.csv");
        let mut orders = csv::Writer::from_path(&orders_path)
            .with_context(|| format!("creating {}", orders_path.display()))?;
        orders.write_record(ORDER_HEADER)?;

        let decision_intents = if record_decision_intents {
            let path = output_dir.join("decision_intents.csv");
            let mut w = csv::Writer::from_path(&path).with_context(|| format!("creating {}", path.display()))?;
            w.write_record(DECISION_HEADER)?;
            Some(w)
        } else {
            None
        };

        Ok(Self {
            trades,
            orders,
            decision_intents,
            positions_path: output_dir.join("unified_positions.json"),
        })
    }

    pub fn write_trade(&mut self, t: &TradeRecord) -> Result<()> {
        self.trades.write_record(&[
            t.time.to_string(),
            t.action.clone(),
            t.ticker.clone(),
            t.price_cents.to_string(),
            t.qty.to_string(),
            t.fee.to_string(),
            t.cost.to_string(),
            t.source.clone(),
            t.order_id.to_string(),
            t.order_time.to_string(),
            t.fill_time.to_string(),
            format!("{:.3}", t.fill_delay_s),
        ])?;
        Ok(())
    }

    pub fn write_order_event(&mut self, e: &OrderEvent) -> Result<()> {
        self.orders.write_record(&[
            e.time.to_string(),
            e.ticker.clone(),
            e.side.to_string(),
            e.price_cents.to_string(),
            e.qty.to_string(),
            e.status.to_string(),
            e.filled.to_string(),
            e.order_id.to_string(),
        ])?;
        Ok(())
    }

    pub fn write_decision_intent(&mut self, d: &DecisionIntent) -> Result<()> {
        let Some(w) = self.decision_intents.as_mut() else { return Ok(()) };
        w.write_record(&[
            d.time.to_string(),
            d.ticker.clone(),
            d.side.clone(),
            d.price_cents.map(|p| p.to_string()).unwrap_or_default(),
            d.qty.map(|q| q.to_string()).unwrap_or_default(),
            format!("{:.4}", d.fair_prob),
            format!("{:.4}", d.edge),
            d.reason.clone(),
        ])?;
        Ok(())
    }

    /// Overwrite `unified_positions.json` with the current snapshot. Called
    /// at the end of a run, and optionally at a periodic checkpoint cadence.
    pub fn write_positions(&self, positions: &HashMap<Ticker, Position>, cash: Decimal) -> Result<()> {
        let snapshot = PositionsSnapshot { cash, positions: positions.clone() };
        let file = File::create(&self.positions_path)
            .with_context(|| format!("creating {}", self.positions_path.display()))?;
        serde_json::to_writer_pretty(file, &snapshot)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.trades.flush()?;
        self.orders.flush()?;
        if let Some(w) = self.decision_intents.as_mut() {
            w.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OrderId, Side};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn dt() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 9).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn writes_trade_and_position_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ArtifactWriter::create(dir.path(), true).unwrap();

        writer
            .write_trade(&TradeRecord {
                time: dt(),
                action: "BUY_YES".to_string(),
                ticker: "T".to_string(),
                price_cents: 50,
                qty: 4,
                fee: dec!(0.07),
                cost: dec!(2.07),
                source: "sim".to_string(),
                order_id: OrderId::new(1, 0),
                order_time: dt(),
                fill_time: dt(),
                fill_delay_s: 0.0,
            })
            .unwrap();

        writer
            .write_order_event(&OrderEvent {
                time: dt(),
                ticker: "T".to_string(),
                side: Side::Yes,
                price_cents: 50,
                qty: 4,
                status: crate::execution::OrderEventStatus::Executed,
                filled: 4,
                order_id: OrderId::new(1, 0),
            })
            .unwrap();

        writer
            .write_decision_intent(&DecisionIntent {
                time: dt(),
                ticker: "T".to_string(),
                side: "yes".to_string(),
                price_cents: Some(50),
                qty: Some(4),
                fair_prob: 0.5,
                edge: 0.02,
                reason: "gated:active".to_string(),
            })
            .unwrap();

        let mut positions = HashMap::new();
        positions.insert("T".to_string(), Position { yes: 4, no: 0, cost: dec!(2.07) });
        writer.write_positions(&positions, dec!(97.93)).unwrap();
        writer.flush().unwrap();

        let trades_csv = std::fs::read_to_string(dir.path().join("unified_trades.csv")).unwrap();
        assert!(trades_csv.contains("BUY_YES"));
        let orders_csv = std::fs::read_to_string(dir.path().join("unified_orders.csv")).unwrap();
        assert!(orders_csv.contains("executed"));
        let decisions_csv = std::fs::read_to_string(dir.path().join("decision_intents.csv")).unwrap();
        assert!(decisions_csv.contains("gated:active"));
        let positions_json = std::fs::read_to_string(dir.path().join("unified_positions.json")).unwrap();
        assert!(positions_json.contains("97.93"));
    }
}
