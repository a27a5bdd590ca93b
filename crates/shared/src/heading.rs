//! Heading math between the two reference frames of the ramp map.
//!
//! A *true heading* is measured clockwise from geodetic north. A *visual
//! angle* is measured clockwise from "up" on the rendered viewport, which is
//! itself rotated by the *frame rotation* (the map bearing).

/// Degrees in a full turn
pub const FULL_TURN: f64 = 360.0;

/// Map any real angle into `[0, 360)`.
pub fn normalize(deg: f64) -> f64 {
    let r = deg.rem_euclid(FULL_TURN);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if r >= FULL_TURN {
        0.0
    } else {
        r
    }
}

/// Convert a viewport-relative angle into a true heading.
pub fn to_true_heading(visual_angle: f64, frame_rotation: f64) -> f64 {
    normalize(visual_angle + frame_rotation)
}

/// Convert a true heading into a viewport-relative angle.
pub fn to_visual_angle(true_heading: f64, frame_rotation: f64) -> f64 {
    normalize(true_heading - frame_rotation)
}

/// Signed delta in `(-180, 180]` such that `from + delta ≡ to (mod 360)`.
pub fn shortest_delta(from: f64, to: f64) -> f64 {
    let d = normalize(to - from);
    if d > FULL_TURN / 2.0 {
        d - FULL_TURN
    } else {
        d
    }
}

/// Interpolate between two headings along the short arc. `t` is clamped to `[0, 1]`.
pub fn interpolate(from: f64, to: f64, t: f64) -> f64 {
    normalize(from + shortest_delta(from, to) * t.clamp(0.0, 1.0))
}

/// Navigation heading (0 = north, clockwise) to math angle (0 = east,
/// counter-clockwise), in radians.
pub fn math_angle_rad(true_heading: f64) -> f64 {
    (90.0 - true_heading).to_radians()
}

/// Continuous (unwrapped) angle for a rotating needle.
///
/// Each update moves by the shortest delta, so going from 359° to 1° turns
/// the needle 2° forward instead of 358° back.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UnwrappedAngle {
    value: f64,
}

impl UnwrappedAngle {
    pub fn new(initial: f64) -> Self {
        Self {
            value: normalize(initial),
        }
    }

    /// Cumulative value, not normalized
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Advance toward `target` along the short arc and return the new cumulative value.
    pub fn advance_to(&mut self, target: f64) -> f64 {
        self.value += shortest_delta(normalize(self.value), target);
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn samples() -> Vec<f64> {
        vec![
            -1080.5, -720.0, -361.0, -360.0, -180.0, -90.25, -1e-12, 0.0, 1e-12, 45.0, 179.999,
            180.0, 270.0, 359.999, 360.0, 365.0, 725.75, 1e6 + 0.5,
        ]
    }

    fn congruent(a: f64, b: f64) -> bool {
        let d = (a - b).rem_euclid(FULL_TURN);
        d < 1e-6 || FULL_TURN - d < 1e-6
    }

    #[test]
    fn test_normalize_range_and_congruence() {
        for d in samples() {
            let n = normalize(d);
            assert!((0.0..FULL_TURN).contains(&n), "normalize({d}) = {n}");
            assert!(congruent(n, d), "normalize({d}) = {n} not congruent");
        }
    }

    #[test]
    fn test_normalize_known_values() {
        assert_eq!(normalize(365.0), 5.0);
        assert_eq!(normalize(-90.0), 270.0);
        assert_eq!(normalize(360.0), 0.0);
        assert_eq!(normalize(720.0), 0.0);
        assert_eq!(normalize(-1e-20), 0.0);
    }

    #[test]
    fn test_shortest_delta_range_and_law() {
        let angles: Vec<f64> = (0..72).map(|i| i as f64 * 5.0 + 0.5).chain([0.0, 180.0]).collect();
        for &a in &angles {
            for &b in &angles {
                let d = shortest_delta(a, b);
                assert!(d > -180.0 && d <= 180.0, "delta({a},{b}) = {d}");
                assert!((normalize(a + d) - b).abs() < EPS || congruent(normalize(a + d), b));
            }
        }
    }

    #[test]
    fn test_shortest_delta_wraps() {
        assert_eq!(shortest_delta(350.0, 10.0), 20.0);
        assert_eq!(shortest_delta(10.0, 350.0), -20.0);
        assert_eq!(shortest_delta(0.0, 180.0), 180.0);
        assert_eq!(shortest_delta(180.0, 0.0), 180.0);
        assert_eq!(shortest_delta(90.0, 90.0), 0.0);
    }

    #[test]
    fn test_frame_round_trip() {
        for h in [0.0, 5.0, 90.0, 179.5, 310.0, 359.0] {
            for r in [-400.0, -40.0, 0.0, 40.0, 320.0, 721.0] {
                let back = to_true_heading(to_visual_angle(h, r), r);
                assert!((back - h).abs() < EPS, "h={h} r={r} back={back}");
            }
        }
    }

    #[test]
    fn test_face_left_on_rotated_map() {
        // Nose pointing screen-left on a map with bearing 40
        assert_eq!(to_true_heading(270.0, 40.0), 310.0);
        assert_eq!(to_visual_angle(310.0, 40.0), 270.0);
    }

    #[test]
    fn test_interpolate_short_arc() {
        assert!((interpolate(350.0, 10.0, 0.5) - 0.0).abs() < EPS);
        assert!((interpolate(10.0, 350.0, 0.25) - 5.0).abs() < EPS);
        assert_eq!(interpolate(10.0, 20.0, 2.0), 20.0);
    }

    #[test]
    fn test_math_angle() {
        assert!((math_angle_rad(0.0) - std::f64::consts::FRAC_PI_2).abs() < EPS);
        assert!(math_angle_rad(90.0).abs() < EPS);
    }

    #[test]
    fn test_unwrapped_angle_crosses_north_forward() {
        let mut needle = UnwrappedAngle::new(358.0);
        assert_eq!(needle.advance_to(2.0), 362.0);
        assert_eq!(needle.advance_to(350.0), 350.0);
    }
}
