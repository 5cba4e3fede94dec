use crate::error::{Result, ViewerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "viewer_config.json";

/// Dashboard settings, read from `viewer_config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Directory holding `price_data_*.csv` snapshots
    pub data_dir: PathBuf,

    /// Directory for `preset_*.json` and temporary preset files
    pub presets_dir: PathBuf,

    /// SQLite file for presets kept on this machine only
    pub local_presets_db: PathBuf,

    /// How many of the newest snapshots get a tab
    pub recent_limit: usize,

    pub search_debounce_ms: u64,

    /// Wait after the script reports completion before re-listing snapshots
    pub refresh_settle_ms: u64,

    /// Substring that marks an item as special
    pub special_marker: String,

    pub script: ScriptConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    pub program: String,
    pub script: String,
    /// Directory the scraper runs in; `.` when unset
    pub working_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("market_data"),
            presets_dir: PathBuf::from("presets"),
            local_presets_db: PathBuf::from("local_presets.db"),
            recent_limit: 5,
            search_debounce_ms: 300,
            refresh_settle_ms: 3000,
            special_marker: crate::metrics::SPECIAL_MARKER.to_string(),
            script: ScriptConfig::default(),
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            program: "py".to_string(),
            script: "ModernWarshipMarket.py".to_string(),
            working_dir: PathBuf::from("."),
        }
    }
}

impl ViewerConfig {
    /// Reads the config file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let config: ViewerConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.recent_limit == 0 {
            return Err(ViewerError::InvalidConfig(
                "recent_limit must be at least 1".to_string(),
            ));
        }
        if self.special_marker.is_empty() {
            return Err(ViewerError::InvalidConfig(
                "special_marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn refresh_settle(&self) -> Duration {
        Duration::from_millis(self.refresh_settle_ms)
    }
}
