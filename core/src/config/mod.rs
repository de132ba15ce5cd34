//! Runtime configuration: CLI-resolved run settings plus portfolio
//! snapshot loading (§6.2, §6.5).

pub mod snapshot;
pub mod types;

pub use snapshot::PortfolioSnapshot;
pub use types::{LiveConfig, RunMode, RunnerConfig};
