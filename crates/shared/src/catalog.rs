//! Aircraft type catalog used to size markers on the map.

/// Marker shape definition. Dimensions are in feet, exaggerated
/// (~2.2x real size) so small aircraft stay visible at ramp zoom levels.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftType {
    pub id: &'static str,
    pub name: &'static str,
    pub wingspan_ft: f64,
    pub length_ft: f64,
    pub description: &'static str,
}

pub const DEFAULT_AIRCRAFT_TYPE: &str = "light_single";

pub const AIRCRAFT_TYPES: &[AircraftType] = &[
    AircraftType {
        id: "light_single",
        name: "Light Single-Engine",
        wingspan_ft: 79.0,
        length_ft: 62.0,
        description: "Cessna 172, Piper Cherokee",
    },
    AircraftType {
        id: "light_twin",
        name: "Light Twin-Engine",
        wingspan_ft: 84.0,
        length_ft: 68.0,
        description: "Cessna 310, Beechcraft Baron",
    },
    AircraftType {
        id: "turboprop",
        name: "Turboprop",
        wingspan_ft: 123.0,
        length_ft: 110.0,
        description: "King Air 350, Pilatus PC-12",
    },
    AircraftType {
        id: "light_jet",
        name: "Light Jet",
        wingspan_ft: 114.0,
        length_ft: 114.0,
        description: "Citation CJ3, Phenom 300",
    },
    AircraftType {
        id: "mid_size_jet",
        name: "Mid-Size Jet",
        wingspan_ft: 132.0,
        length_ft: 152.0,
        description: "Citation X, Learjet 60",
    },
    AircraftType {
        id: "regional_jet",
        name: "Regional Jet",
        wingspan_ft: 180.0,
        length_ft: 231.0,
        description: "CRJ-700, Embraer E175",
    },
    AircraftType {
        id: "narrow_body",
        name: "Narrow-Body Airliner",
        wingspan_ft: 280.0,
        length_ft: 300.0,
        description: "Boeing 737, Airbus A320",
    },
    AircraftType {
        id: "ultra_long_range",
        name: "Ultra-Long Range Jet",
        wingspan_ft: 310.0,
        length_ft: 320.0,
        description: "Gulfstream G650, Global 7500",
    },
];

/// Look up a type by id, falling back to the default type.
pub fn aircraft_type(id: &str) -> &'static AircraftType {
    AIRCRAFT_TYPES
        .iter()
        .find(|t| t.id == id)
        .unwrap_or(&AIRCRAFT_TYPES[0])
}

pub fn is_known_type(id: &str) -> bool {
    AIRCRAFT_TYPES.iter().any(|t| t.id == id)
}

const METERS_PER_PIXEL_AT_ZOOM_0: f64 = 156_543.033_92;
const FEET_PER_METER: f64 = 3.280_84;

/// Latitude limit of the Web Mercator projection
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Web Mercator ground resolution at `lat` for a zoom level, in feet per pixel.
/// Latitudes past the projection limit are clamped to it.
pub fn feet_per_pixel(lat: f64, zoom: f64) -> f64 {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let meters = METERS_PER_PIXEL_AT_ZOOM_0 * lat.to_radians().cos() / 2f64.powf(zoom);
    meters * FEET_PER_METER
}

/// On-screen marker size `(width, height)` in pixels.
pub fn marker_size_px(type_id: &str, lat: f64, zoom: f64) -> (f64, f64) {
    let def = aircraft_type(type_id);
    let scale = 1.0 / feet_per_pixel(lat, zoom);
    (def.wingspan_ft * scale, def.length_ft * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_falls_back() {
        assert_eq!(aircraft_type("zeppelin").id, DEFAULT_AIRCRAFT_TYPE);
        assert_eq!(aircraft_type("turboprop").name, "Turboprop");
        assert!(is_known_type("narrow_body"));
        assert!(!is_known_type("zeppelin"));
    }

    #[test]
    fn test_feet_per_pixel_halves_per_zoom_level() {
        let a = feet_per_pixel(46.9, 17.0);
        let b = feet_per_pixel(46.9, 18.0);
        assert!((a / b - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_feet_per_pixel_at_poles_is_finite() {
        for lat in [90.0, -90.0, 89.999] {
            let fpp = feet_per_pixel(lat, 18.0);
            assert!(fpp.is_finite() && fpp > 0.0);
            assert_eq!(fpp, feet_per_pixel(MAX_MERCATOR_LAT.copysign(lat), 18.0));
        }
        let (w, h) = marker_size_px("light_single", 90.0, 18.0);
        assert!(w.is_finite() && h.is_finite());
    }

    #[test]
    fn test_marker_size_grows_with_zoom() {
        let (w17, h17) = marker_size_px("light_single", 46.9, 17.0);
        let (w18, h18) = marker_size_px("light_single", 46.9, 18.0);
        assert!(w18 > w17 && h18 > h17);
        assert!(w17 > h17);
    }
}
