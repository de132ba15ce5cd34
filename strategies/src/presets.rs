//! Named strategy-variant presets (supplemented from the original's
//! `v3_variants.py` `RegimeSwitcher` factories). Each preset tunes the
//! regime gate and/or the inventory market maker's edge and sizing
//! parameters around the same baseline shape.

use crate::inventory_mm::{InventoryMarketMaker, InventoryMmConfig};
use crate::regime::{RegimeConfig, RegimeSwitcher};
use binmm_core::engine::Strategy;

pub type Preset = RegimeSwitcher<InventoryMarketMaker>;

fn build(regime: RegimeConfig, mm: InventoryMmConfig) -> Preset {
    RegimeSwitcher::new(regime, InventoryMarketMaker::new(mm))
}

/// The default, unremarkable configuration every other preset is a
/// variation on.
pub fn baseline_v3() -> Preset {
    build(RegimeConfig::default(), InventoryMmConfig::default())
}

/// Wider active hours and a looser spread percentile: trades more often at
/// the cost of average edge quality.
pub fn looser_gates_more_trades() -> Preset {
    build(
        RegimeConfig { active_start_hour: 7, active_end_hour: 20, spread_percentile: 0.8, ..Default::default() },
        InventoryMmConfig::default(),
    )
}

/// Narrower hours and a strict spread percentile: trades rarely, only in
/// the tightest regime.
pub fn tighter_gates_fewer_trades() -> Preset {
    build(
        RegimeConfig { active_start_hour: 10, active_end_hour: 15, spread_percentile: 0.2, ..Default::default() },
        InventoryMmConfig::default(),
    )
}

/// Same edge/gating thresholds as baseline, a larger cash budget per quote.
pub fn higher_budget_same_edges() -> Preset {
    build(
        RegimeConfig::default(),
        InventoryMmConfig { max_notional_pct: 0.10, max_loss_pct: 0.04, max_inventory: Some(150), ..Default::default() },
    )
}

/// Demands a large edge before quoting, compensating with tight (near-ask)
/// pricing once it does — takes fewer, more confident shots.
pub fn sniper_v3() -> Preset {
    build(
        RegimeConfig { spread_percentile: 0.15, ..Default::default() },
        InventoryMmConfig { margin_cents: 8.0, scaling_factor: 2.0, ..Default::default() },
    )
}

/// Opposite of sniper: quotes on thin edges, expecting volume to make up
/// for it.
pub fn bargain_hunter_v3() -> Preset {
    build(
        RegimeConfig::default(),
        InventoryMmConfig { margin_cents: 1.0, scaling_factor: 8.0, ..Default::default() },
    )
}

/// Active only in the last active hours before market close, when
/// expiring-contract mispricings tend to sharpen.
pub fn closer_v3() -> Preset {
    build(
        RegimeConfig { active_start_hour: 14, active_end_hour: 16, ..Default::default() },
        InventoryMmConfig { order_expiry_s: 5.0, ..Default::default() },
    )
}

/// A blend of looser gating with sniper-grade edge requirements.
pub fn hybrid_v3() -> Preset {
    build(
        RegimeConfig { active_start_hour: 8, active_end_hour: 18, spread_percentile: 0.6, ..Default::default() },
        InventoryMmConfig { margin_cents: 6.0, ..Default::default() },
    )
}

/// Wider rolling windows on both the regime and the fair-price estimate,
/// trading off responsiveness for a smoother signal.
pub fn smooth_v3() -> Preset {
    build(
        RegimeConfig { spread_window: 60, ..Default::default() },
        InventoryMmConfig { mid_window: 60, ..Default::default() },
    )
}

/// Resolve a preset by name, as passed to `--strategy` (§6.5).
pub fn by_name(name: &str) -> Option<Box<dyn Strategy>> {
    let preset: Box<dyn Strategy> = match name {
        "baseline_v3" => Box::new(baseline_v3()),
        "looser_gates_more_trades" => Box::new(looser_gates_more_trades()),
        "tighter_gates_fewer_trades" => Box::new(tighter_gates_fewer_trades()),
        "higher_budget_same_edges" => Box::new(higher_budget_same_edges()),
        "sniper_v3" => Box::new(sniper_v3()),
        "bargain_hunter_v3" => Box::new(bargain_hunter_v3()),
        "closer_v3" => Box::new(closer_v3()),
        "hybrid_v3" => Box::new(hybrid_v3()),
        "smooth_v3" => Box::new(smooth_v3()),
        _ => return None,
    };
    Some(preset)
}

pub const PRESET_NAMES: &[&str] = &[
    "baseline_v3",
    "looser_gates_more_trades",
    "tighter_gates_fewer_trades",
    "higher_budget_same_edges",
    "sniper_v3",
    "bargain_hunter_v3",
    "closer_v3",
    "hybrid_v3",
    "smooth_v3",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_name_resolves() {
        for name in PRESET_NAMES {
            assert!(by_name(name).is_some(), "preset {name} failed to build");
        }
    }

    #[test]
    fn unknown_preset_name_is_none() {
        assert!(by_name("does_not_exist").is_none());
    }
}
