//! Historical replay runner (§6.5): reads a directory of `market_data_*.csv`
//! files or a single tick-log CSV, drives the unified engine tick by tick
//! against a [`SimAdapter`], and writes the output artifacts (§6.3).

use anyhow::{bail, Context, Result};
use binmm_core::market::{iter_ticks_from_live_log, iter_ticks_from_market_logs};
use binmm_core::prelude::*;
use binmm_core::config::RunMode;
use binmm_runner::common::{init_logging, maybe_diag_tick, resolve_strategy, seed_from_snapshot, CommonArgs};
use chrono::NaiveDateTime;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay historical ticks through the unified engine")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Directory of `market_data_*.csv` files to replay.
    #[arg(long, conflicts_with = "tick_log")]
    log_dir: Option<std::path::PathBuf>,

    /// Single tick-log CSV to replay instead of a log directory.
    #[arg(long)]
    tick_log: Option<std::path::PathBuf>,

    /// Only replay ticks at or after this timestamp (`%Y-%m-%d %H:%M:%S`).
    #[arg(long)]
    start_ts: Option<String>,

    /// Only replay ticks strictly before this timestamp.
    #[arg(long)]
    end_ts: Option<String>,

    /// Simulated fill latency in seconds (§4.4 determinism).
    #[arg(long, default_value_t = 0.0)]
    fill_latency_s: f64,

    /// RNG seed driving fill-latency / passive-fill sampling.
    #[arg(long, default_value_t = 1)]
    fill_latency_seed: u64,
}

fn parse_ts(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("invalid timestamp '{raw}', expected %Y-%m-%d %H:%M:%S"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_level)?;

    let ticks = match (&args.log_dir, &args.tick_log) {
        (Some(dir), None) => iter_ticks_from_market_logs(dir)?,
        (None, Some(file)) => iter_ticks_from_live_log(file)?,
        _ => bail!("exactly one of --log-dir or --tick-log must be given"),
    };

    let start_ts = args.start_ts.as_deref().map(parse_ts).transpose()?;
    let end_ts = args.end_ts.as_deref().map(parse_ts).transpose()?;
    let ticks: Vec<_> = ticks
        .into_iter()
        .filter(|t| start_ts.map_or(true, |s| t.time >= s))
        .filter(|t| end_ts.map_or(true, |e| t.time < e))
        .collect();

    tracing::info!(count = ticks.len(), "loaded ticks for backtest");

    let snapshot_path = args.common.snapshot.clone();
    let strategy_name = args.common.strategy.clone();
    let runner_cfg = args.common.into_runner_config(RunMode::Backtest, None)?;

    let mut adapter = SimAdapter::new(runner_cfg.initial_cash, args.fill_latency_s, args.fill_latency_seed);
    seed_from_snapshot(&mut adapter, snapshot_path.as_deref())?;

    let strategy = resolve_strategy(&strategy_name)?;
    let artifacts = ArtifactWriter::create(&runner_cfg.output_dir, runner_cfg.record_decision_intents)?;
    let config = EngineConfig {
        max_actions_per_minute: runner_cfg.max_actions_per_minute,
        max_order_age_s: runner_cfg.max_order_age_s,
        min_requote_interval_s: runner_cfg.min_requote_interval_s,
        record_decision_intents: runner_cfg.record_decision_intents,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(Box::new(adapter), strategy, artifacts, config);

    for (i, tick) in ticks.iter().enumerate() {
        maybe_diag_tick(args.common.diag_log, args.common.diag_every, i as u64, tick);
        engine.on_tick(tick)?;
    }
    engine.flush()?;

    tracing::info!("backtest complete");
    Ok(())
}
