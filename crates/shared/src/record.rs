//! Remote location records and the payload codec.
//!
//! The remote store keeps zones and movable objects in one record shape. This
//! module is the only place that tells them apart: a record whose
//! `description` holds a `generic_aircraft` JSON payload is a movable object,
//! everything else is a zone.

use serde::{Deserialize, Serialize};

use crate::{
    Boundary, BoundaryError, DisplayMetadata, LatLng, MovableObject, ObjectTransform, Zone, ZoneId,
    DEFAULT_COLOR,
};

/// Fractional digits kept for coordinates in the remote store
pub const COORDINATE_PRECISION: usize = 6;

/// Format a coordinate the way the remote store keeps it.
pub fn format_coordinate(value: f64) -> String {
    format!("{:.*}", COORDINATE_PRECISION, value)
}

/// Zone outline as stored remotely: `[lng, lat]` pairs, either bare or GeoJSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Polygon {
    Ring(Vec<[f64; 2]>),
    GeoJson { coordinates: Vec<Vec<[f64; 2]>> },
}

impl Polygon {
    /// Outer ring as coordinates
    pub fn outer_ring(&self) -> Vec<LatLng> {
        let pairs: &[[f64; 2]] = match self {
            Polygon::Ring(pairs) => pairs,
            Polygon::GeoJson { coordinates } => {
                coordinates.first().map(|r| r.as_slice()).unwrap_or(&[])
            }
        };
        pairs.iter().map(|&[lng, lat]| LatLng::new(lat, lng)).collect()
    }

    pub fn from_boundary(boundary: &Boundary) -> Self {
        Polygon::Ring(boundary.vertices().iter().map(|v| [v.lng, v.lat]).collect())
    }
}

/// Opaque record held by the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: i64,
    pub location_code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    #[serde(default)]
    pub polygon: Option<Polygon>,
    #[serde(default)]
    pub airport: Option<String>,
    #[serde(default)]
    pub display_order: Option<i32>,
}

/// Fields for creating a record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewLocation {
    pub location_code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    #[serde(default)]
    pub polygon: Option<Polygon>,
    #[serde(default)]
    pub airport: Option<String>,
    #[serde(default)]
    pub display_order: Option<i32>,
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Polygon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
}

/// JSON payload kept in `description` for movable objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectPayload {
    #[serde(rename_all = "camelCase")]
    GenericAircraft {
        #[serde(default)]
        rotation: f64,
        #[serde(default = "default_aircraft_type")]
        aircraft_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tail_number: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zone_id: Option<ZoneId>,
    },
}

fn default_aircraft_type() -> String {
    crate::catalog::DEFAULT_AIRCRAFT_TYPE.to_string()
}

const OBJECT_PAYLOAD_TAG: &str = "generic_aircraft";

impl ObjectPayload {
    pub fn from_object(transform: &ObjectTransform, display: &DisplayMetadata, zone_id: Option<ZoneId>) -> Self {
        ObjectPayload::GenericAircraft {
            rotation: transform.heading,
            aircraft_type: display.aircraft_type.clone(),
            tail_number: Some(display.label.clone()),
            color: Some(display.color.clone()),
            zone_id,
        }
    }

    pub fn to_json(&self) -> String {
        // Plain data with string keys: serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Why a record could not be decoded
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadError {
    /// Coordinate field absent on a movable object
    MissingCoordinate(&'static str),
    /// Coordinate field present but not a finite number
    InvalidCoordinate { field: &'static str, value: String },
    /// Description is tagged as an object but does not decode
    MalformedDescription(String),
    /// Zone outline is not a valid ring
    InvalidBoundary(BoundaryError),
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadError::MissingCoordinate(field) => write!(f, "Missing coordinate '{}'", field),
            PayloadError::InvalidCoordinate { field, value } => {
                write!(f, "Invalid coordinate '{}': {:?}", field, value)
            }
            PayloadError::MalformedDescription(msg) => write!(f, "Malformed payload: {}", msg),
            PayloadError::InvalidBoundary(e) => write!(f, "Invalid boundary: {}", e),
        }
    }
}

impl std::error::Error for PayloadError {}

/// A decoded record
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Object(MovableObject),
    Zone(Zone),
}

fn parse_coordinate(field: &'static str, raw: Option<&str>) -> Result<f64, PayloadError> {
    let raw = raw.ok_or(PayloadError::MissingCoordinate(field))?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PayloadError::InvalidCoordinate {
            field,
            value: raw.to_string(),
        }),
    }
}

fn is_object_description(description: &str) -> Option<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(description).ok()?;
    (value.get("type").and_then(|t| t.as_str()) == Some(OBJECT_PAYLOAD_TAG)).then_some(value)
}

impl LocationRecord {
    pub fn from_new(id: i64, new: NewLocation) -> Self {
        Self {
            id,
            location_code: new.location_code,
            description: new.description,
            latitude: new.latitude,
            longitude: new.longitude,
            polygon: new.polygon,
            airport: new.airport,
            display_order: new.display_order,
        }
    }

    pub fn apply_patch(&mut self, patch: &LocationPatch) {
        if let Some(code) = &patch.location_code {
            self.location_code = code.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(lat) = &patch.latitude {
            self.latitude = Some(lat.clone());
        }
        if let Some(lng) = &patch.longitude {
            self.longitude = Some(lng.clone());
        }
        if let Some(polygon) = &patch.polygon {
            self.polygon = Some(polygon.clone());
        }
        if let Some(airport) = &patch.airport {
            self.airport = Some(airport.clone());
        }
        if let Some(order) = patch.display_order {
            self.display_order = Some(order);
        }
    }

    /// Resolve the record into a zone or a movable object.
    pub fn decode(&self) -> Result<Entity, PayloadError> {
        match self.description.as_deref().and_then(is_object_description) {
            Some(value) => self.decode_object(value).map(Entity::Object),
            None => self.decode_zone().map(Entity::Zone),
        }
    }

    fn decode_object(&self, value: serde_json::Value) -> Result<MovableObject, PayloadError> {
        let payload: ObjectPayload = serde_json::from_value(value)
            .map_err(|e| PayloadError::MalformedDescription(e.to_string()))?;
        let lat = parse_coordinate("latitude", self.latitude.as_deref())?;
        let lng = parse_coordinate("longitude", self.longitude.as_deref())?;

        let ObjectPayload::GenericAircraft {
            rotation,
            aircraft_type,
            tail_number,
            color,
            zone_id,
        } = payload;

        if !rotation.is_finite() {
            return Err(PayloadError::MalformedDescription(format!(
                "rotation is not finite: {}",
                rotation
            )));
        }

        Ok(MovableObject {
            id: self.id,
            transform: ObjectTransform::new(LatLng::new(lat, lng), rotation),
            display: DisplayMetadata {
                label: tail_number.unwrap_or_else(|| self.location_code.clone()),
                aircraft_type,
                color: color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            },
            zone_id,
        })
    }

    fn decode_zone(&self) -> Result<Zone, PayloadError> {
        let boundary = match &self.polygon {
            Some(polygon) => {
                let ring = polygon.outer_ring();
                if ring.is_empty() {
                    None
                } else {
                    Some(Boundary::new(ring).map_err(PayloadError::InvalidBoundary)?)
                }
            }
            None => None,
        };
        Ok(Zone {
            id: self.id,
            code: self.location_code.clone(),
            boundary,
        })
    }
}

impl NewLocation {
    /// Creation fields for a new movable object
    pub fn object(transform: &ObjectTransform, display: &DisplayMetadata, airport: Option<String>) -> Self {
        Self {
            location_code: display.label.clone(),
            description: Some(ObjectPayload::from_object(transform, display, None).to_json()),
            latitude: Some(format_coordinate(transform.position.lat)),
            longitude: Some(format_coordinate(transform.position.lng)),
            polygon: None,
            airport,
            display_order: Some(1),
        }
    }

    /// Creation fields for a zone
    pub fn zone(code: &str, boundary: Option<&Boundary>) -> Self {
        Self {
            location_code: code.to_string(),
            polygon: boundary.map(Polygon::from_boundary),
            ..Default::default()
        }
    }
}

impl LocationPatch {
    /// Full object write: payload plus coordinates
    pub fn object(
        transform: &ObjectTransform,
        display: &DisplayMetadata,
        zone_id: Option<ZoneId>,
    ) -> Self {
        Self {
            description: Some(ObjectPayload::from_object(transform, display, zone_id).to_json()),
            latitude: Some(format_coordinate(transform.position.lat)),
            longitude: Some(format_coordinate(transform.position.lng)),
            ..Default::default()
        }
    }
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    /// Absolute URL of the next page
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aircraft_record(id: i64, description: &str) -> LocationRecord {
        LocationRecord {
            id,
            location_code: "AC-1234".to_string(),
            description: Some(description.to_string()),
            latitude: Some("46.921840".to_string()),
            longitude: Some("-114.085875".to_string()),
            polygon: None,
            airport: Some("MSO".to_string()),
            display_order: Some(1),
        }
    }

    #[test]
    fn test_decode_object() {
        let rec = aircraft_record(
            4,
            r##"{"type":"generic_aircraft","rotation":310,"aircraftType":"turboprop","tailNumber":"N123","color":"#ff0000"}"##,
        );
        let Entity::Object(obj) = rec.decode().unwrap() else {
            panic!("Expected object");
        };
        assert_eq!(obj.id, 4);
        assert_eq!(obj.transform.heading, 310.0);
        assert_eq!(obj.transform.position, LatLng::new(46.92184, -114.085875));
        assert_eq!(obj.display.label, "N123");
        assert_eq!(obj.display.aircraft_type, "turboprop");
        assert_eq!(obj.display.color, "#ff0000");
        assert_eq!(obj.zone_id, None);
    }

    #[test]
    fn test_decode_object_defaults() {
        let rec = aircraft_record(5, r#"{"type":"generic_aircraft"}"#);
        let Entity::Object(obj) = rec.decode().unwrap() else {
            panic!("Expected object");
        };
        assert_eq!(obj.transform.heading, 0.0);
        assert_eq!(obj.display.label, "AC-1234");
        assert_eq!(obj.display.color, DEFAULT_COLOR);
    }

    #[test]
    fn test_decode_object_normalizes_heading() {
        let rec = aircraft_record(5, r#"{"type":"generic_aircraft","rotation":365}"#);
        let Entity::Object(obj) = rec.decode().unwrap() else {
            panic!("Expected object");
        };
        assert_eq!(obj.transform.heading, 5.0);
    }

    #[test]
    fn test_malformed_object_payload() {
        let rec = aircraft_record(6, r#"{"type":"generic_aircraft","rotation":"north"}"#);
        assert!(matches!(rec.decode(), Err(PayloadError::MalformedDescription(_))));
    }

    #[test]
    fn test_object_missing_coordinates() {
        let mut rec = aircraft_record(6, r#"{"type":"generic_aircraft"}"#);
        rec.latitude = None;
        assert_eq!(rec.decode(), Err(PayloadError::MissingCoordinate("latitude")));

        rec.latitude = Some("abc".to_string());
        assert!(matches!(
            rec.decode(),
            Err(PayloadError::InvalidCoordinate { field: "latitude", .. })
        ));
    }

    #[test]
    fn test_plain_description_is_zone() {
        let rec = LocationRecord {
            id: 9,
            location_code: "T-1".to_string(),
            description: Some("North ramp tie-downs".to_string()),
            latitude: None,
            longitude: None,
            polygon: Some(Polygon::Ring(vec![
                [0.0, 0.0],
                [10.0, 0.0],
                [10.0, 10.0],
                [0.0, 10.0],
                [0.0, 0.0],
            ])),
            airport: None,
            display_order: None,
        };
        let Entity::Zone(zone) = rec.decode().unwrap() else {
            panic!("Expected zone");
        };
        assert_eq!(zone.code, "T-1");
        assert!(zone.contains(LatLng::new(5.0, 5.0)));
    }

    #[test]
    fn test_geojson_polygon() {
        let json = r#"{"id":2,"location_code":"Z","polygon":{"type":"Polygon","coordinates":[[[0,0],[4,0],[4,4],[0,4]]]}}"#;
        let rec: LocationRecord = serde_json::from_str(json).unwrap();
        let Entity::Zone(zone) = rec.decode().unwrap() else {
            panic!("Expected zone");
        };
        assert_eq!(zone.boundary.unwrap().vertices().len(), 4);
    }

    #[test]
    fn test_empty_polygon_is_position_only_zone() {
        let json = r#"{"id":3,"location_code":"P","polygon":[]}"#;
        let rec: LocationRecord = serde_json::from_str(json).unwrap();
        let Entity::Zone(zone) = rec.decode().unwrap() else {
            panic!("Expected zone");
        };
        assert!(zone.boundary.is_none());
    }

    #[test]
    fn test_invalid_zone_boundary() {
        let json = r#"{"id":3,"location_code":"P","polygon":[[0,0],[1,1]]}"#;
        let rec: LocationRecord = serde_json::from_str(json).unwrap();
        assert!(matches!(rec.decode(), Err(PayloadError::InvalidBoundary(_))));
    }

    #[test]
    fn test_patch_object_roundtrip_through_record() {
        let transform = ObjectTransform::new(LatLng::new(46.123_456_7, -114.0), 42.0);
        let display = DisplayMetadata {
            label: "N42".to_string(),
            aircraft_type: "light_jet".to_string(),
            color: "#00ff00".to_string(),
        };
        let mut rec = aircraft_record(11, r#"{"type":"generic_aircraft"}"#);
        rec.apply_patch(&LocationPatch::object(&transform, &display, Some(3)));

        assert_eq!(rec.latitude.as_deref(), Some("46.123457"));
        let Entity::Object(obj) = rec.decode().unwrap() else {
            panic!("Expected object");
        };
        assert_eq!(obj.display, display);
        assert_eq!(obj.transform.heading, 42.0);
        assert_eq!(obj.zone_id, Some(3));
        assert_eq!(obj.id, 11);
    }

    #[test]
    fn test_new_location_object() {
        let transform = ObjectTransform::new(LatLng::new(46.0, -114.0), 310.0);
        let display = DisplayMetadata {
            label: "AC-0001".to_string(),
            ..Default::default()
        };
        let new = NewLocation::object(&transform, &display, Some("MSO".to_string()));
        assert_eq!(new.location_code, "AC-0001");
        let rec = LocationRecord::from_new(1, new);
        assert!(matches!(rec.decode(), Ok(Entity::Object(_))));
    }

    #[test]
    fn test_page_without_links() {
        let page: Page<LocationRecord> =
            serde_json::from_str(r#"{"count":1,"results":[{"id":1,"location_code":"A"}]}"#).unwrap();
        assert_eq!(page.count, 1);
        assert!(page.next.is_none());
        assert_eq!(page.results[0].location_code, "A");
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = LocationPatch {
            latitude: Some(format_coordinate(1.5)),
            ..Default::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"latitude":"1.500000"}"#);
    }
}
