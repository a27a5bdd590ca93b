pub mod catalog;
pub mod geofence;
pub mod heading;
pub mod record;

use serde::{Deserialize, Serialize};

pub use geofence::{locate, Boundary, BoundaryError, Zone};
pub use record::{Entity, LocationPatch, LocationRecord, NewLocation, Page, PayloadError, Polygon};

/// Identifier of a movable object, assigned by the remote store
pub type ObjectId = i64;

/// Identifier of a zone, assigned by the remote store
pub type ZoneId = i64;

/// Geodetic coordinate pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both components within `eps` degrees
    pub fn approx_eq(&self, other: &LatLng, eps: f64) -> bool {
        (self.lat - other.lat).abs() <= eps && (self.lng - other.lng).abs() <= eps
    }
}

/// Position + true heading of an object
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectTransform {
    pub position: LatLng,
    /// True heading in `[0, 360)`
    pub heading: f64,
}

impl ObjectTransform {
    pub fn new(position: LatLng, heading: f64) -> Self {
        Self {
            position,
            heading: heading::normalize(heading),
        }
    }

    /// Apply a partial update; the heading stays normalized.
    pub fn patched(&self, patch: &TransformPatch) -> Self {
        Self::new(
            patch.position.unwrap_or(self.position),
            patch.heading.unwrap_or(self.heading),
        )
    }
}

/// Partial transform update
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<LatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl TransformPatch {
    pub fn position(position: LatLng) -> Self {
        Self {
            position: Some(position),
            heading: None,
        }
    }

    pub fn heading(heading: f64) -> Self {
        Self {
            position: None,
            heading: Some(heading),
        }
    }

    pub fn full(transform: ObjectTransform) -> Self {
        Self {
            position: Some(transform.position),
            heading: Some(transform.heading),
        }
    }

    /// Later fields win
    pub fn merge(&mut self, other: &TransformPatch) {
        if other.position.is_some() {
            self.position = other.position;
        }
        if other.heading.is_some() {
            self.heading = other.heading;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.heading.is_none()
    }
}

pub const DEFAULT_COLOR: &str = "#ffffff";

/// What the marker looks like
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    /// Tail number shown on the marker
    pub label: String,
    /// Catalog id, selects size and shape
    pub aircraft_type: String,
    pub color: String,
}

impl Default for DisplayMetadata {
    fn default() -> Self {
        Self {
            label: String::new(),
            aircraft_type: catalog::DEFAULT_AIRCRAFT_TYPE.to_string(),
            color: DEFAULT_COLOR.to_string(),
        }
    }
}

impl DisplayMetadata {
    pub fn patched(&self, patch: &DisplayPatch) -> Self {
        let mut next = self.clone();
        if let Some(label) = &patch.label {
            next.label = label.clone();
        }
        if let Some(aircraft_type) = &patch.aircraft_type {
            next.aircraft_type = aircraft_type.clone();
        }
        if let Some(color) = &patch.color {
            next.color = color.clone();
        }
        next
    }
}

/// Partial display update
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aircraft_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl DisplayPatch {
    pub fn merge(&mut self, other: &DisplayPatch) {
        if other.label.is_some() {
            self.label = other.label.clone();
        }
        if other.aircraft_type.is_some() {
            self.aircraft_type = other.aircraft_type.clone();
        }
        if other.color.is_some() {
            self.color = other.color.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.aircraft_type.is_none() && self.color.is_none()
    }
}

/// Positionable, orientable entity on the ramp map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovableObject {
    pub id: ObjectId,
    pub transform: ObjectTransform,
    pub display: DisplayMetadata,
    /// Enclosing zone, derived from position on drop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
}
