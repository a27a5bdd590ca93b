//! Factory functions for test data and scripted sessions.

use shared::*;

use crate::config::EngineConfig;
use crate::harness::TestHarness;

// ── Geometry ────────────────────────────────────────────────────

/// Centre of the reference ramp
pub const RAMP_CENTER: LatLng = LatLng {
    lat: 46.921_839_630_082_56,
    lng: -114.085_874_715_836_14,
};

/// Unit square `[0, 10] x [0, 10]` in degrees
pub fn square_ring() -> Vec<LatLng> {
    vec![
        LatLng::new(0.0, 0.0),
        LatLng::new(0.0, 10.0),
        LatLng::new(10.0, 10.0),
        LatLng::new(10.0, 0.0),
    ]
}

/// Axis-aligned box of half-size `half` (degrees) around `center`
pub fn box_ring(center: LatLng, half: f64) -> Vec<LatLng> {
    vec![
        LatLng::new(center.lat - half, center.lng - half),
        LatLng::new(center.lat - half, center.lng + half),
        LatLng::new(center.lat + half, center.lng + half),
        LatLng::new(center.lat + half, center.lng - half),
    ]
}

/// Zone with a validated boundary
pub fn zone(id: ZoneId, code: &str, ring: Vec<LatLng>) -> Result<Zone, BoundaryError> {
    Ok(Zone {
        id,
        code: code.to_string(),
        boundary: Some(Boundary::new(ring)?),
    })
}

// ── Records ─────────────────────────────────────────────────────

/// Remote record for an object
pub fn object_record(id: i64, lat: f64, lng: f64, heading: f64) -> LocationRecord {
    let transform = ObjectTransform::new(LatLng::new(lat, lng), heading);
    let display = DisplayMetadata {
        label: format!("N{}", id),
        ..Default::default()
    };
    LocationRecord::from_new(id, NewLocation::object(&transform, &display, None))
}

/// Remote record for a zone; `ring` is `[lng, lat]` pairs
pub fn zone_record(id: i64, code: &str, ring: Vec<[f64; 2]>) -> LocationRecord {
    LocationRecord::from_new(
        id,
        NewLocation {
            location_code: code.to_string(),
            polygon: Some(Polygon::Ring(ring)),
            ..Default::default()
        },
    )
}

// ── Harnesses ───────────────────────────────────────────────────

/// Harness with one tie-down zone of ±0.001° around the ramp centre.
/// Returns the harness and the zone id.
pub fn ramp_harness(config: EngineConfig) -> Result<(TestHarness, ZoneId), String> {
    let mut h = TestHarness::with_config(config);
    let zone = h.add_zone("T-1", box_ring(RAMP_CENTER, 0.001))?;
    Ok((h, zone))
}
