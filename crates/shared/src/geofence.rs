//! Zone boundaries and point-in-polygon containment.
//!
//! Containment uses the crossing-number (ray casting) test with a half-open
//! edge rule: a vertex is counted for an edge only when exactly one endpoint
//! lies strictly above the point. Points lying on a left or bottom edge come
//! out inside, points on a right or top edge come out outside. The answer for
//! a given ring and point never changes between calls.

use serde::{Deserialize, Serialize};

use crate::{LatLng, ZoneId};

/// Errors when building a zone boundary
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryError {
    /// Fewer than three distinct vertices
    TooFewVertices(usize),
    /// A coordinate is NaN or infinite
    NonFinite,
    /// Two non-adjacent edges touch or cross
    SelfIntersecting,
}

impl std::fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundaryError::TooFewVertices(n) => {
                write!(f, "Boundary needs at least 3 distinct vertices, got {}", n)
            }
            BoundaryError::NonFinite => write!(f, "Boundary contains a non-finite coordinate"),
            BoundaryError::SelfIntersecting => write!(f, "Boundary ring intersects itself"),
        }
    }
}

impl std::error::Error for BoundaryError {}

/// Closed, simple ring of coordinates. The closing vertex is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LatLng>", into = "Vec<LatLng>")]
pub struct Boundary {
    vertices: Vec<LatLng>,
}

impl Boundary {
    /// Validate a ring. A trailing vertex equal to the first (GeoJSON style) is dropped.
    pub fn new(mut vertices: Vec<LatLng>) -> Result<Self, BoundaryError> {
        if vertices
            .iter()
            .any(|v| !v.lat.is_finite() || !v.lng.is_finite())
        {
            return Err(BoundaryError::NonFinite);
        }

        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        // Consecutive duplicates add nothing to the ring
        vertices.dedup();

        let mut distinct: Vec<LatLng> = Vec::with_capacity(vertices.len());
        for v in &vertices {
            if !distinct.contains(v) {
                distinct.push(*v);
            }
        }
        if distinct.len() < 3 {
            return Err(BoundaryError::TooFewVertices(distinct.len()));
        }

        let boundary = Self { vertices };
        if boundary.self_intersects() {
            return Err(BoundaryError::SelfIntersecting);
        }
        Ok(boundary)
    }

    pub fn vertices(&self) -> &[LatLng] {
        &self.vertices
    }

    /// Crossing-number containment, x = longitude, y = latitude.
    pub fn contains(&self, point: LatLng) -> bool {
        let (x, y) = (point.lng, point.lat);
        let n = self.vertices.len();
        let mut inside = false;

        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = (self.vertices[i].lng, self.vertices[i].lat);
            let (xj, yj) = (self.vertices[j].lng, self.vertices[j].lat);

            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }

        inside
    }

    /// South-west and north-east corners of the bounding box
    pub fn bounds(&self) -> (LatLng, LatLng) {
        let mut min = self.vertices[0];
        let mut max = self.vertices[0];
        for v in &self.vertices[1..] {
            min.lat = min.lat.min(v.lat);
            min.lng = min.lng.min(v.lng);
            max.lat = max.lat.max(v.lat);
            max.lng = max.lng.max(v.lng);
        }
        (min, max)
    }

    fn edge(&self, i: usize) -> (LatLng, LatLng) {
        let n = self.vertices.len();
        (self.vertices[i], self.vertices[(i + 1) % n])
    }

    fn self_intersects(&self) -> bool {
        let n = self.vertices.len();
        for i in 0..n {
            for j in (i + 1)..n {
                // Adjacent edges share a vertex
                if j == i + 1 || (i == 0 && j == n - 1) {
                    continue;
                }
                let (a, b) = self.edge(i);
                let (c, d) = self.edge(j);
                if segments_intersect(a, b, c, d) {
                    return true;
                }
            }
        }
        false
    }
}

impl TryFrom<Vec<LatLng>> for Boundary {
    type Error = BoundaryError;

    fn try_from(vertices: Vec<LatLng>) -> Result<Self, Self::Error> {
        Boundary::new(vertices)
    }
}

impl From<Boundary> for Vec<LatLng> {
    fn from(boundary: Boundary) -> Self {
        boundary.vertices
    }
}

fn orientation(a: LatLng, b: LatLng, c: LatLng) -> f64 {
    (b.lng - a.lng) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lng - a.lng)
}

fn on_segment(a: LatLng, b: LatLng, p: LatLng) -> bool {
    p.lng >= a.lng.min(b.lng)
        && p.lng <= a.lng.max(b.lng)
        && p.lat >= a.lat.min(b.lat)
        && p.lat <= a.lat.max(b.lat)
}

fn segments_intersect(a: LatLng, b: LatLng, c: LatLng, d: LatLng) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);

    if ((o1 > 0.0 && o2 < 0.0) || (o1 < 0.0 && o2 > 0.0))
        && ((o3 > 0.0 && o4 < 0.0) || (o3 < 0.0 && o4 > 0.0))
    {
        return true;
    }

    (o1 == 0.0 && on_segment(a, b, c))
        || (o2 == 0.0 && on_segment(a, b, d))
        || (o3 == 0.0 && on_segment(c, d, a))
        || (o4 == 0.0 && on_segment(c, d, b))
}

/// Ground area objects can be assigned to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub code: String,
    /// `None` for position-only zones without a drawn boundary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<Boundary>,
}

impl Zone {
    pub fn contains(&self, point: LatLng) -> bool {
        self.boundary
            .as_ref()
            .is_some_and(|boundary| boundary.contains(point))
    }
}

/// First zone, in the order given, whose boundary contains `point`.
///
/// Overlapping zones are resolved by that order. Zones without a boundary
/// never match.
pub fn locate(point: LatLng, zones: &[Zone]) -> Option<&Zone> {
    zones.iter().find(|zone| zone.contains(point))
}
