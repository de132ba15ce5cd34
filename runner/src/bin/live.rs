//! Live trading runner (§6.5): tails an append-only tick-log CSV (`--follow`)
//! and drives the unified engine against a signed [`LiveAdapter`].

use anyhow::{Context, Result};
use binmm_core::config::{LiveConfig, RunMode};
use binmm_core::execution::live::LiveAdapterConfig;
use binmm_core::market::TailHandle;
use binmm_core::prelude::*;
use binmm_runner::common::{init_logging, install_shutdown_hook, maybe_diag_tick, resolve_strategy, CommonArgs};
use clap::Parser;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tail a live tick log and trade through the unified engine")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Live tick-log CSV to tail (`--follow` is implicit for this binary).
    #[arg(long)]
    tick_log: std::path::PathBuf,

    /// Broker REST base URL.
    #[arg(long)]
    base_url: String,

    /// API key id for request signing.
    #[arg(long)]
    key_id: String,

    /// Path to the PEM-encoded RSA private key used for PSS signing.
    #[arg(long)]
    private_key_path: std::path::PathBuf,

    /// Balance/positions/orders cache TTL in milliseconds.
    #[arg(long, default_value_t = 500)]
    cache_ttl_ms: u64,

    /// Emit a heartbeat log line at this cadence while idle (§6.5
    /// `--diag-heartbeat-s`).
    #[arg(long, default_value_t = 5.0)]
    diag_heartbeat_s: f64,

    /// Poll interval while waiting for new rows to land in the tick log.
    #[arg(long, default_value_t = 200)]
    poll_interval_ms: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_level)?;

    let live_config = LiveConfig {
        base_url: args.base_url.clone(),
        key_id: args.key_id.clone(),
        private_key_path: args.private_key_path.clone(),
        cache_ttl_ms: args.cache_ttl_ms,
        diag_heartbeat_s: args.diag_heartbeat_s,
    };
    let strategy_name = args.common.strategy.clone();
    let runner_cfg = args.common.into_runner_config(RunMode::Live, Some(live_config))?;
    let live = runner_cfg.live.as_ref().expect("validated above");

    let adapter = LiveAdapter::connect(LiveAdapterConfig {
        base_url: live.base_url.clone(),
        key_id: live.key_id.clone(),
        private_key_path: live.private_key_path.clone(),
        cache_ttl: Duration::from_millis(live.cache_ttl_ms),
    })
    .context("failed to connect live adapter")?;

    let strategy = resolve_strategy(&strategy_name)?;
    let artifacts = ArtifactWriter::create(&runner_cfg.output_dir, runner_cfg.record_decision_intents)?;
    let config = EngineConfig {
        max_actions_per_minute: runner_cfg.max_actions_per_minute,
        max_order_age_s: runner_cfg.max_order_age_s,
        min_requote_interval_s: runner_cfg.min_requote_interval_s,
        record_decision_intents: runner_cfg.record_decision_intents,
        trade_live_window_s: 60.0,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(Box::new(adapter), strategy, artifacts, config);

    let mut tail = TailHandle::open(&args.tick_log).context("failed to open --tick-log for tailing")?;
    let running = install_shutdown_hook()?;
    let heartbeat = Duration::from_secs_f64(live.diag_heartbeat_s.max(0.1));

    tracing::info!(path = %args.tick_log.display(), "live runner started, tailing tick log");

    let mut tick_index: u64 = 0;
    while running.load(Ordering::SeqCst) {
        let ticks = tail.poll_new_ticks()?;
        if ticks.is_empty() {
            if tail.should_heartbeat(heartbeat) {
                tracing::info!("heartbeat: no new ticks");
            }
            std::thread::sleep(Duration::from_millis(args.poll_interval_ms));
            continue;
        }
        for tick in &ticks {
            maybe_diag_tick(args.common.diag_log, args.common.diag_every, tick_index, tick);
            tick_index += 1;
            engine.on_tick(tick)?;
        }
        engine.flush()?;
    }

    engine.flush()?;
    tracing::info!("live runner shut down cleanly");
    Ok(())
}
