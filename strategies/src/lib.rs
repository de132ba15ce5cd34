//! Concrete `Strategy` implementations for the binary-options bot.
//!
//! - `inventory_mm`: rolling-mid fair-probability market maker.
//! - `regime`: active-hours / spread-percentile gate wrapping an inner
//!   strategy.
//! - `presets`: named parameter combinations selectable from the CLI.

pub mod inventory_mm;
pub mod presets;
pub mod regime;

pub use inventory_mm::{InventoryMarketMaker, InventoryMmConfig};
pub use presets::{by_name, Preset, PRESET_NAMES};
pub use regime::{regime_label, RegimeConfig, RegimeSwitcher};
