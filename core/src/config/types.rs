//! Runtime configuration (§6.2, §6.5): everything the `binmm-backtest` and
//! `binmm-live` binaries accept, whether from CLI flags or a config file.
//! Unlike the teacher's compile-time Cargo-feature tiers, every limit here
//! is a runtime value — there is no build-time variant of this engine.

use crate::core::ConfigError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Backtest,
    Live,
}

/// Fully resolved configuration for one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub mode: RunMode,
    pub strategy_preset: String,
    pub output_dir: PathBuf,
    pub initial_cash: Decimal,
    pub max_actions_per_minute: u32,
    pub max_order_age_s: f64,
    pub min_requote_interval_s: f64,
    pub record_decision_intents: bool,
    pub fill_latency_s: f64,
    pub rng_seed: u64,
    pub snapshot_path: Option<PathBuf>,
    pub live: Option<LiveConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    pub base_url: String,
    pub key_id: String,
    pub private_key_path: PathBuf,
    pub cache_ttl_ms: u64,
    pub diag_heartbeat_s: f64,
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == RunMode::Live && self.live.is_none() {
            return Err(ConfigError::InvalidArgs(
                "live mode requires --base-url, --key-id and --private-key-path".to_string(),
            ));
        }
        if self.max_actions_per_minute == 0 {
            return Err(ConfigError::InvalidArgs("max-actions-per-minute must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base() -> RunnerConfig {
        RunnerConfig {
            mode: RunMode::Backtest,
            strategy_preset: "baseline_v3".to_string(),
            output_dir: PathBuf::from("out"),
            initial_cash: dec!(1000),
            max_actions_per_minute: 20,
            max_order_age_s: 30.0,
            min_requote_interval_s: 0.0,
            record_decision_intents: false,
            fill_latency_s: 0.0,
            rng_seed: 1,
            snapshot_path: None,
            live: None,
        }
    }

    #[test]
    fn live_mode_requires_live_config() {
        let mut cfg = base();
        cfg.mode = RunMode::Live;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn backtest_mode_with_defaults_is_valid() {
        assert!(base().validate().is_ok());
    }
}
