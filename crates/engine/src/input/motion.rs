use std::collections::VecDeque;

use shared::heading::math_angle_rad;
use shared::{LatLng, ObjectId, ObjectTransform, TransformPatch};

use crate::state::MarkerRegistry;
use crate::surface::RenderSurface;

/// One frame's worth of key-driven motion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionCommand {
    Rotate { id: ObjectId, delta_deg: f64 },
    /// Move along the heading current at apply time. Negative goes backward.
    Translate { id: ObjectId, distance_deg: f64 },
}

/// Offset `position` by `distance_deg` along the true `heading`.
///
/// The longitude step is divided by cos(latitude) to correct for meridian
/// convergence.
pub fn forward_offset(position: LatLng, heading: f64, distance_deg: f64) -> LatLng {
    let math = math_angle_rad(heading);
    let lat_scale = position.lat.to_radians().cos().abs().max(1e-9);
    LatLng::new(
        position.lat + distance_deg * math.sin(),
        position.lng + distance_deg * math.cos() / lat_scale,
    )
}

/// Motion queued by input handlers and applied once per frame tick
#[derive(Debug, Default)]
pub struct MotionQueue {
    commands: VecDeque<MotionCommand>,
}

impl MotionQueue {
    pub fn push(&mut self, command: MotionCommand) {
        self.commands.push_back(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Apply every queued command in order. Returns the final transform of
    /// each object touched, in first-touched order.
    pub fn drain_into<S: RenderSurface>(
        &mut self,
        registry: &mut MarkerRegistry<S>,
    ) -> Vec<(ObjectId, ObjectTransform)> {
        let mut touched: Vec<ObjectId> = Vec::new();
        while let Some(command) = self.commands.pop_front() {
            let id = match command {
                MotionCommand::Rotate { id, .. } | MotionCommand::Translate { id, .. } => id,
            };
            let Some(current) = registry.transform(id) else {
                continue;
            };
            let patch = match command {
                MotionCommand::Rotate { delta_deg, .. } => {
                    TransformPatch::heading(current.heading + delta_deg)
                }
                MotionCommand::Translate { distance_deg, .. } => TransformPatch::position(
                    forward_offset(current.position, current.heading, distance_deg),
                ),
            };
            registry.set_transform(id, patch);
            if !touched.contains(&id) {
                touched.push(id);
            }
        }
        touched
            .into_iter()
            .filter_map(|id| registry.transform(id).map(|t| (id, t)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use shared::{DisplayMetadata, MovableObject};

    fn registry_with(heading: f64) -> MarkerRegistry<MemorySurface> {
        let mut reg = MarkerRegistry::new(MemorySurface::new());
        reg.insert(&MovableObject {
            id: 1,
            transform: ObjectTransform::new(LatLng::new(0.0, 0.0), heading),
            display: DisplayMetadata::default(),
            zone_id: None,
        });
        reg
    }

    #[test]
    fn test_forward_offset_north_and_east() {
        let p = forward_offset(LatLng::new(0.0, 0.0), 0.0, 1.0);
        assert!((p.lat - 1.0).abs() < 1e-12);
        assert!(p.lng.abs() < 1e-12);

        let p = forward_offset(LatLng::new(0.0, 0.0), 90.0, 1.0);
        assert!(p.lat.abs() < 1e-12);
        assert!((p.lng - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_longitude_scaled_by_latitude() {
        let p = forward_offset(LatLng::new(60.0, 0.0), 90.0, 1.0);
        assert!((p.lng - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_translate_uses_heading_after_rotation() {
        let mut reg = registry_with(0.0);
        let mut queue = MotionQueue::default();
        queue.push(MotionCommand::Rotate { id: 1, delta_deg: 90.0 });
        queue.push(MotionCommand::Translate { id: 1, distance_deg: 1.0 });

        let out = queue.drain_into(&mut reg);
        assert!(queue.is_empty());
        assert_eq!(out.len(), 1);
        let (_, t) = out[0];
        assert_eq!(t.heading, 90.0);
        assert!((t.position.lng - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_object_skipped() {
        let mut reg = registry_with(0.0);
        let mut queue = MotionQueue::default();
        queue.push(MotionCommand::Rotate { id: 42, delta_deg: 5.0 });
        assert!(queue.drain_into(&mut reg).is_empty());
    }
}
