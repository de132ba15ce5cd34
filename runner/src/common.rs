//! Shared CLI argument parsing and startup wiring for the `binmm-backtest`
//! and `binmm-live` binaries (§6.5).

use anyhow::{Context, Result};
use binmm_core::config::{PortfolioSnapshot, RunnerConfig};
use binmm_core::prelude::*;
use binmm_strategies::by_name;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// CLI options common to both binaries, matching §6.5's flag names.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Strategy preset name (factory lookup, §6.5 `--strategy`).
    #[arg(long, default_value = "baseline_v3")]
    pub strategy: String,

    /// Directory to write `unified_trades.csv` / `unified_orders.csv` /
    /// `unified_positions.json` into.
    #[arg(long, default_value = "out")]
    pub out_dir: std::path::PathBuf,

    /// Seed cash/positions from a prior run's snapshot JSON.
    #[arg(long)]
    pub snapshot: Option<std::path::PathBuf>,

    #[arg(long, default_value_t = 1000.0)]
    pub initial_cash: f64,

    #[arg(long, default_value_t = 20)]
    pub max_actions_per_minute: u32,

    #[arg(long, default_value_t = 30.0)]
    pub min_requote_interval: f64,

    /// Emit `decision_intents.csv` alongside trades/orders.
    #[arg(long)]
    pub decision_log: bool,

    /// Emit a `debug!` diagnostic line while processing ticks, mirroring the
    /// Python runner's `diag_log` callback (§6.5, "Diagnostic heartbeat /
    /// per-tick diag logging").
    #[arg(long)]
    pub diag_log: bool,

    /// While replaying, emit a diag line every Nth tick rather than every
    /// tick. Ignored unless `--diag-log` is set.
    #[arg(long, default_value_t = 100)]
    pub diag_every: u64,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl CommonArgs {
    pub fn into_runner_config(self, mode: RunMode, live: Option<binmm_core::config::LiveConfig>) -> Result<RunnerConfig> {
        let cfg = RunnerConfig {
            mode,
            strategy_preset: self.strategy,
            output_dir: self.out_dir,
            initial_cash: rust_decimal::Decimal::try_from(self.initial_cash)
                .context("--initial-cash must be a finite number")?,
            max_actions_per_minute: self.max_actions_per_minute,
            max_order_age_s: 30.0,
            min_requote_interval_s: self.min_requote_interval,
            record_decision_intents: self.decision_log,
            fill_latency_s: 0.0,
            rng_seed: 1,
            snapshot_path: self.snapshot,
            live,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Install a `tracing` subscriber driven by `RUST_LOG`, falling back to
/// `level` (§AMBIENT STACK B).
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
    Ok(())
}

/// Resolve `--strategy name` into a boxed [`Strategy`], matching the
/// original runner's `module:symbol` factory lookup semantics.
pub fn resolve_strategy(name: &str) -> Result<Box<dyn Strategy>> {
    by_name(name).with_context(|| format!("unknown --strategy preset '{name}'"))
}

/// Seed an adapter's cash/positions from a snapshot file, if one was given.
pub fn seed_from_snapshot(adapter: &mut SimAdapter, path: Option<&std::path::Path>) -> Result<()> {
    let Some(path) = path else { return Ok(()) };
    let snapshot = PortfolioSnapshot::load(path).context("failed to load --snapshot")?;
    adapter.seed_cash(snapshot.cash);
    for (ticker, position) in snapshot.positions {
        adapter.seed_position(ticker, position);
    }
    Ok(())
}

/// Per-tick diagnostic line mirroring the Python runner's `diag_log`
/// callback: one line every `every` ticks while replaying (§6.5). A no-op
/// unless `enabled`.
pub fn maybe_diag_tick(enabled: bool, every: u64, index: u64, tick: &binmm_core::market::Tick) {
    if !enabled || every == 0 || index % every != 0 {
        return;
    }
    tracing::debug!(
        tick_index = index,
        ticker = %tick.ticker,
        time = %tick.time,
        yes_bid = ?tick.market_state.yes_bid,
        yes_ask = ?tick.market_state.yes_ask,
        "diag_log"
    );
}

/// Install a Ctrl-C handler that flushes and exits cleanly rather than
/// aborting mid-write.
pub fn install_shutdown_hook() -> Result<std::sync::Arc<std::sync::atomic::AtomicBool>> {
    let running = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("shutdown signal received, finishing current tick and flushing artifacts");
        flag.store(false, std::sync::atomic::Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(running)
}
