use std::collections::HashMap;

use serde::Serialize;
use shared::{DisplayPatch, MovableObject, ObjectId, TransformPatch};

/// Locally-authoritative values for one object
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PreviewOverride {
    pub transform: TransformPatch,
    pub display: DisplayPatch,
}

impl PreviewOverride {
    pub fn is_empty(&self) -> bool {
        self.transform.is_empty() && self.display.is_empty()
    }
}

/// Per-object overrides that mask stale snapshot values.
///
/// An override exists from the first local edit of an object until the
/// object is explicitly deselected. While it exists, reconciliation leaves
/// the object alone.
#[derive(Debug, Default)]
pub struct PreviewOverlay {
    overrides: HashMap<ObjectId, PreviewOverride>,
}

impl PreviewOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transform(&mut self, id: ObjectId, patch: TransformPatch) {
        self.overrides.entry(id).or_default().transform.merge(&patch);
    }

    pub fn record_display(&mut self, id: ObjectId, patch: &DisplayPatch) {
        self.overrides.entry(id).or_default().display.merge(patch);
    }

    pub fn get(&self, id: ObjectId) -> Option<&PreviewOverride> {
        self.overrides.get(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.overrides.contains_key(&id)
    }

    /// Put back a previously taken override (or none)
    pub fn restore(&mut self, id: ObjectId, previous: Option<PreviewOverride>) {
        match previous {
            Some(o) => {
                self.overrides.insert(id, o);
            }
            None => {
                self.overrides.remove(&id);
            }
        }
    }

    pub fn clear(&mut self, id: ObjectId) -> Option<PreviewOverride> {
        self.overrides.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// `object` with any override applied on top
    pub fn apply(&self, object: &MovableObject) -> MovableObject {
        let Some(o) = self.overrides.get(&object.id) else {
            return object.clone();
        };
        MovableObject {
            id: object.id,
            transform: object.transform.patched(&o.transform),
            display: object.display.patched(&o.display),
            zone_id: object.zone_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{DisplayMetadata, LatLng, ObjectTransform};

    fn stale() -> MovableObject {
        MovableObject {
            id: 1,
            transform: ObjectTransform::new(LatLng::new(0.0, 0.0), 0.0),
            display: DisplayMetadata::default(),
            zone_id: None,
        }
    }

    #[test]
    fn test_override_masks_snapshot() {
        let mut overlay = PreviewOverlay::new();
        overlay.record_transform(1, TransformPatch::heading(90.0));
        overlay.record_display(
            1,
            &DisplayPatch {
                label: Some("N9".to_string()),
                ..Default::default()
            },
        );

        let seen = overlay.apply(&stale());
        assert_eq!(seen.transform.heading, 90.0);
        assert_eq!(seen.transform.position, LatLng::new(0.0, 0.0));
        assert_eq!(seen.display.label, "N9");
    }

    #[test]
    fn test_patches_merge() {
        let mut overlay = PreviewOverlay::new();
        overlay.record_transform(1, TransformPatch::heading(90.0));
        overlay.record_transform(1, TransformPatch::position(LatLng::new(1.0, 1.0)));
        let o = overlay.get(1).unwrap();
        assert_eq!(o.transform.heading, Some(90.0));
        assert_eq!(o.transform.position, Some(LatLng::new(1.0, 1.0)));
    }

    #[test]
    fn test_clear_and_restore() {
        let mut overlay = PreviewOverlay::new();
        overlay.record_transform(1, TransformPatch::heading(10.0));
        let taken = overlay.clear(1);
        assert!(!overlay.contains(1));
        assert_eq!(overlay.apply(&stale()), stale());

        overlay.restore(1, taken);
        assert!(overlay.contains(1));
        overlay.restore(1, None);
        assert!(overlay.is_empty());
    }
}
