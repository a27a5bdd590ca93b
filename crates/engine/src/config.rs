//! Engine settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FileError;

/// Tunables for input, persistence and object defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period before a commit is written, per object
    pub debounce_ms: u64,
    /// Position changes at or below this (degrees) are not written
    pub position_epsilon_deg: f64,
    /// Heading changes at or below this (degrees) are not written
    pub heading_epsilon_deg: f64,
    /// Distance moved per frame while a forward/backward key is held (degrees)
    pub move_step_deg: f64,
    /// Rotation per frame while a rotate key is held (degrees)
    pub rotate_step_deg: f64,
    /// Undo entries kept per object
    pub undo_capacity: usize,
    /// Revert drags that end outside every zone
    pub reject_drops_outside_zones: bool,
    /// Upper bound on the final flush at shutdown
    pub teardown_timeout_ms: u64,
    /// Catalog id for newly added objects
    pub default_aircraft_type: String,
    /// Initial map bearing
    pub frame_rotation_deg: f64,
    /// Airport code stamped on new records
    pub airport: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1500,
            position_epsilon_deg: 0.000_001,
            heading_epsilon_deg: 0.01,
            move_step_deg: 0.000_005,
            rotate_step_deg: 4.0,
            undo_capacity: 20,
            reject_drops_outside_zones: true,
            teardown_timeout_ms: 3000,
            default_aircraft_type: shared::catalog::DEFAULT_AIRCRAFT_TYPE.to_string(),
            frame_rotation_deg: 40.0,
            airport: Some("MSO".to_string()),
        }
    }
}

impl EngineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "ramp", "ramp")
            .map(|dirs| dirs.config_dir().join("engine.json"))
    }

    /// Load from the default location, or return defaults if missing or unreadable
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, FileError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), FileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
