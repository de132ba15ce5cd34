//! Portfolio snapshot loading (§6.2): seeds a run's starting cash and
//! per-ticker positions from a previous run's `unified_positions.json`, so a
//! live session can resume instead of starting flat.

use crate::core::{ConfigError, Position, Ticker};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub cash: Decimal,
    pub positions: HashMap<Ticker, Position>,
}

impl PortfolioSnapshot {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::MalformedSnapshot {
            path: path.display().to_string(),
            source: serde_json::Error::io(e),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::MalformedSnapshot {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unified_positions.json");
        let mut positions = HashMap::new();
        positions.insert("T".to_string(), Position { yes: 3, no: 0, cost: dec!(1.5) });
        let snapshot = PortfolioSnapshot { cash: dec!(98.5), positions };
        std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        let loaded = PortfolioSnapshot::load(&path).unwrap();
        assert_eq!(loaded.cash, dec!(98.5));
        assert_eq!(loaded.positions.get("T").unwrap().yes, 3);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result = PortfolioSnapshot::load(Path::new("/nonexistent/path.json"));
        assert!(result.is_err());
    }
}
