//! Saved map view: where the map opens and how it is rotated.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shared::catalog::MAX_MERCATOR_LAT;
use shared::LatLng;

use crate::config::EngineConfig;
use crate::error::FileError;
use crate::fixtures::RAMP_CENTER;

const VIEW_FILE_VERSION: u32 = 1;

pub const DEFAULT_ZOOM: f64 = 17.975_762_404_618_87;
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 22.0;

/// Map center, zoom and bearing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub center: LatLng,
    pub zoom: f64,
    /// Map bearing in degrees, also the frame rotation for headings
    pub bearing_deg: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            center: RAMP_CENTER,
            zoom: DEFAULT_ZOOM,
            bearing_deg: 40.0,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ViewDocument {
    version: u32,
    #[serde(flatten)]
    view: ViewState,
}

impl ViewState {
    /// Default view with the configured initial bearing
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            bearing_deg: config.frame_rotation_deg,
            ..Default::default()
        }
        .sanitized()
    }

    /// Clamp to what the map can show. Non-finite fields fall back to defaults.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let finite = |v: f64, fallback: f64| if v.is_finite() { v } else { fallback };
        let mut lng = finite(self.center.lng, defaults.center.lng);
        if !(-180.0..=180.0).contains(&lng) {
            lng = shared::heading::normalize(lng + 180.0) - 180.0;
        }
        Self {
            center: LatLng::new(
                finite(self.center.lat, defaults.center.lat).clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT),
                lng,
            ),
            zoom: finite(self.zoom, defaults.zoom).clamp(MIN_ZOOM, MAX_ZOOM),
            bearing_deg: shared::heading::normalize(finite(self.bearing_deg, defaults.bearing_deg)),
        }
    }

    /// Default location of the saved view
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "ramp", "ramp")
            .map(|dirs| dirs.data_dir().join("view_v1.json"))
    }

    pub fn to_json(&self) -> Result<String, FileError> {
        let doc = ViewDocument {
            version: VIEW_FILE_VERSION,
            view: *self,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    pub fn from_json(json: &str) -> Result<Self, FileError> {
        let doc: ViewDocument = serde_json::from_str(json)?;
        if doc.version != VIEW_FILE_VERSION {
            return Err(FileError::UnsupportedVersion(doc.version));
        }
        Ok(doc.view.sanitized())
    }

    pub fn save(&self, path: &Path) -> Result<(), FileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, FileError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_file() {
        let path = std::env::temp_dir().join(format!("ramp-view-{}.json", uuid::Uuid::new_v4()));
        let view = ViewState {
            center: LatLng::new(46.92, -114.09),
            zoom: 19.5,
            bearing_deg: 12.5,
        };
        view.save(&path).unwrap();
        assert_eq!(ViewState::load(&path).unwrap(), view);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_document_shape() {
        let json = ViewState::default().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["bearing_deg"], 40.0);
        assert!(value["center"]["lat"].is_number());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let json = r#"{"version": 2, "center": {"lat": 0.0, "lng": 0.0}, "zoom": 3.0, "bearing_deg": 0.0}"#;
        assert!(matches!(
            ViewState::from_json(json),
            Err(FileError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_loaded_values_are_clamped() {
        let json = r#"{"version": 1, "center": {"lat": 90.0, "lng": 190.0}, "zoom": 40.0, "bearing_deg": -30.0}"#;
        let view = ViewState::from_json(json).unwrap();
        assert_eq!(view.center.lat, MAX_MERCATOR_LAT);
        assert!((view.center.lng + 170.0).abs() < 1e-9);
        assert_eq!(view.zoom, MAX_ZOOM);
        assert_eq!(view.bearing_deg, 330.0);
    }

    #[test]
    fn test_from_config_uses_frame_rotation() {
        let config = EngineConfig {
            frame_rotation_deg: 15.0,
            ..Default::default()
        };
        let view = ViewState::from_config(&config);
        assert_eq!(view.bearing_deg, 15.0);
        assert_eq!(view.center, RAMP_CENTER);
    }
}
