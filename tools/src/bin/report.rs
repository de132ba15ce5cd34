//! Operator-facing inspection tool for a run's output directory: prints a
//! portfolio summary from `unified_positions.json` and trade/order counts
//! from `unified_trades.csv` / `unified_orders.csv` (§6.3).

use anyhow::{Context, Result};
use binmm_core::config::PortfolioSnapshot;
use clap::Parser;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect a binmm run's output artifacts")]
struct Args {
    /// Output directory written by a `binmm-backtest` or `binmm-live` run.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TradeRow {
    #[allow(dead_code)]
    time: String,
    action: String,
    ticker: String,
    #[allow(dead_code)]
    price_cents: u8,
    qty: u32,
    fee: Decimal,
    cost: Decimal,
    #[allow(dead_code)]
    source: String,
    #[allow(dead_code)]
    order_id: String,
    #[allow(dead_code)]
    order_time: String,
    #[allow(dead_code)]
    fill_time: String,
    #[allow(dead_code)]
    fill_delay_s: f64,
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    #[allow(dead_code)]
    time: String,
    #[allow(dead_code)]
    ticker: String,
    #[allow(dead_code)]
    side: String,
    #[allow(dead_code)]
    price_cents: u8,
    #[allow(dead_code)]
    qty: u32,
    status: String,
    #[allow(dead_code)]
    filled: u32,
    #[allow(dead_code)]
    order_id: String,
}

#[derive(Default)]
struct TickerSummary {
    trades: u32,
    qty: u32,
    fees: Decimal,
    net_cost: Decimal,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let positions_path = args.out_dir.join("unified_positions.json");
    if positions_path.exists() {
        let snapshot = PortfolioSnapshot::load(&positions_path).context("reading unified_positions.json")?;
        println!("cash: {}", snapshot.cash);
        println!("positions:");
        let mut tickers: Vec<_> = snapshot.positions.keys().collect();
        tickers.sort();
        for ticker in tickers {
            let p = &snapshot.positions[ticker];
            println!("  {ticker}: yes={} no={} cost={}", p.yes, p.no, p.cost);
        }
    } else {
        println!("(no unified_positions.json found in {})", args.out_dir.display());
    }

    let trades_path = args.out_dir.join("unified_trades.csv");
    if trades_path.exists() {
        let mut reader = csv::Reader::from_path(&trades_path).context("reading unified_trades.csv")?;
        let mut by_ticker: HashMap<String, TickerSummary> = HashMap::new();
        let mut total_fees = Decimal::ZERO;
        let mut total_trades = 0u32;
        for row in reader.deserialize::<TradeRow>() {
            let row = row.context("malformed row in unified_trades.csv")?;
            total_trades += 1;
            total_fees += row.fee;
            let summary = by_ticker.entry(row.ticker.clone()).or_default();
            summary.trades += 1;
            summary.qty += row.qty;
            summary.fees += row.fee;
            let signed = if row.action.starts_with("BUY") { row.cost } else { -row.cost };
            summary.net_cost += signed;
        }
        println!("\ntrades: {total_trades} total, {total_fees} in fees");
        let mut tickers: Vec<_> = by_ticker.keys().cloned().collect();
        tickers.sort();
        for ticker in tickers {
            let s = &by_ticker[&ticker];
            println!("  {ticker}: {} trades, {} contracts, {} fees, {} net cost", s.trades, s.qty, s.fees, s.net_cost);
        }
    } else {
        println!("(no unified_trades.csv found in {})", args.out_dir.display());
    }

    let orders_path = args.out_dir.join("unified_orders.csv");
    if orders_path.exists() {
        let mut reader = csv::Reader::from_path(&orders_path).context("reading unified_orders.csv")?;
        let mut by_status: HashMap<String, u32> = HashMap::new();
        for row in reader.deserialize::<OrderRow>() {
            let row = row.context("malformed row in unified_orders.csv")?;
            *by_status.entry(row.status).or_default() += 1;
        }
        println!("\norder events by status:");
        let mut statuses: Vec<_> = by_status.keys().cloned().collect();
        statuses.sort();
        for status in statuses {
            println!("  {status}: {}", by_status[&status]);
        }
    }

    Ok(())
}
