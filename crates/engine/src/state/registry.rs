use std::collections::{HashMap, HashSet};

use shared::{DisplayMetadata, MovableObject, ObjectId, ObjectTransform, TransformPatch, ZoneId};

use crate::surface::{HandleId, RenderSurface};

#[derive(Debug, Clone)]
struct Marker {
    handle: HandleId,
    display: DisplayMetadata,
    zone_id: Option<ZoneId>,
}

/// Counts from one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    /// Objects left alone because they are locked
    pub skipped: usize,
    pub removed: usize,
}

/// Canonical in-session state of every object, one rendered marker each.
///
/// The marker on the surface is the single source of truth for position and
/// heading. Nothing else caches a transform.
pub struct MarkerRegistry<S: RenderSurface> {
    surface: S,
    markers: HashMap<ObjectId, Marker>,
}

impl<S: RenderSurface> MarkerRegistry<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            markers: HashMap::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Create the marker for `object`. Returns false if it already exists.
    pub fn insert(&mut self, object: &MovableObject) -> bool {
        if self.markers.contains_key(&object.id) {
            return false;
        }
        let handle = self.surface.create_handle(
            object.transform.position,
            object.transform.heading,
            &object.display,
        );
        self.markers.insert(
            object.id,
            Marker {
                handle,
                display: object.display.clone(),
                zone_id: object.zone_id,
            },
        );
        true
    }

    pub fn remove(&mut self, id: ObjectId) -> bool {
        match self.markers.remove(&id) {
            Some(marker) => {
                self.surface.remove(marker.handle);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.markers.contains_key(&id)
    }

    /// Ids in ascending order
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.markers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn handle(&self, id: ObjectId) -> Option<HandleId> {
        self.markers.get(&id).map(|m| m.handle)
    }

    pub fn transform(&self, id: ObjectId) -> Option<ObjectTransform> {
        let marker = self.markers.get(&id)?;
        self.surface.get_transform(marker.handle)
    }

    /// Write through to the surface. Returns false for unknown ids.
    pub fn set_transform(&mut self, id: ObjectId, patch: TransformPatch) -> bool {
        let Some(marker) = self.markers.get(&id) else {
            return false;
        };
        let patch = TransformPatch {
            position: patch.position,
            heading: patch.heading.map(shared::heading::normalize),
        };
        self.surface.set_transform(marker.handle, patch);
        true
    }

    pub fn display(&self, id: ObjectId) -> Option<&DisplayMetadata> {
        self.markers.get(&id).map(|m| &m.display)
    }

    pub fn set_display(&mut self, id: ObjectId, display: DisplayMetadata) -> bool {
        let Some(marker) = self.markers.get_mut(&id) else {
            return false;
        };
        if marker.display != display {
            self.surface.set_visual(marker.handle, &display);
            marker.display = display;
        }
        true
    }

    pub fn zone_id(&self, id: ObjectId) -> Option<ZoneId> {
        self.markers.get(&id).and_then(|m| m.zone_id)
    }

    pub fn set_zone_id(&mut self, id: ObjectId, zone_id: Option<ZoneId>) {
        if let Some(marker) = self.markers.get_mut(&id) {
            marker.zone_id = zone_id;
        }
    }

    /// Current state of one object as the session sees it
    pub fn object(&self, id: ObjectId) -> Option<MovableObject> {
        let marker = self.markers.get(&id)?;
        Some(MovableObject {
            id,
            transform: self.surface.get_transform(marker.handle)?,
            display: marker.display.clone(),
            zone_id: marker.zone_id,
        })
    }

    /// Bring the markers in line with a remote snapshot.
    ///
    /// Unknown objects get a marker and known ones are overwritten, except
    /// where `is_locked` says the session is editing them. Markers missing
    /// from the snapshot are removed unless locked.
    pub fn reconcile<F>(&mut self, snapshot: &[MovableObject], is_locked: F) -> ReconcileReport
    where
        F: Fn(ObjectId) -> bool,
    {
        let mut report = ReconcileReport::default();
        let mut seen = HashSet::with_capacity(snapshot.len());

        for object in snapshot {
            seen.insert(object.id);
            if !self.contains(object.id) {
                self.insert(object);
                report.created += 1;
            } else if is_locked(object.id) {
                report.skipped += 1;
            } else {
                self.set_transform(object.id, TransformPatch::full(object.transform));
                self.set_display(object.id, object.display.clone());
                self.set_zone_id(object.id, object.zone_id);
                report.updated += 1;
            }
        }

        let stale: Vec<ObjectId> = self
            .markers
            .keys()
            .copied()
            .filter(|id| !seen.contains(id) && !is_locked(*id))
            .collect();
        for id in stale {
            self.remove(id);
            report.removed += 1;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use shared::LatLng;

    fn object(id: ObjectId, lat: f64, heading: f64) -> MovableObject {
        MovableObject {
            id,
            transform: ObjectTransform::new(LatLng::new(lat, 0.0), heading),
            display: DisplayMetadata::default(),
            zone_id: None,
        }
    }

    #[test]
    fn test_insert_and_query() {
        let mut reg = MarkerRegistry::new(MemorySurface::new());
        assert!(reg.insert(&object(1, 10.0, 90.0)));
        assert!(!reg.insert(&object(1, 20.0, 0.0)));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.transform(1).unwrap().position.lat, 10.0);
        assert!(reg.transform(2).is_none());
    }

    #[test]
    fn test_set_transform_normalizes() {
        let mut reg = MarkerRegistry::new(MemorySurface::new());
        reg.insert(&object(1, 0.0, 0.0));
        assert!(reg.set_transform(1, TransformPatch::heading(725.0)));
        assert_eq!(reg.transform(1).unwrap().heading, 5.0);
        assert!(!reg.set_transform(9, TransformPatch::heading(1.0)));
    }

    #[test]
    fn test_set_display_skips_identical() {
        let mut reg = MarkerRegistry::new(MemorySurface::new());
        reg.insert(&object(1, 0.0, 0.0));
        reg.set_display(1, DisplayMetadata::default());
        assert_eq!(reg.surface().visual_writes(), 0);

        let red = DisplayMetadata {
            color: "#ff0000".to_string(),
            ..Default::default()
        };
        reg.set_display(1, red.clone());
        assert_eq!(reg.surface().visual_writes(), 1);
        assert_eq!(reg.display(1), Some(&red));
    }

    #[test]
    fn test_reconcile_creates_updates_removes() {
        let mut reg = MarkerRegistry::new(MemorySurface::new());
        reg.insert(&object(1, 0.0, 0.0));
        reg.insert(&object(2, 0.0, 0.0));

        let report = reg.reconcile(&[object(1, 5.0, 45.0), object(3, 1.0, 0.0)], |_| false);
        assert_eq!(
            report,
            ReconcileReport {
                created: 1,
                updated: 1,
                skipped: 0,
                removed: 1
            }
        );
        assert_eq!(reg.ids(), vec![1, 3]);
        assert_eq!(reg.transform(1).unwrap().heading, 45.0);
    }

    #[test]
    fn test_reconcile_skips_locked() {
        let mut reg = MarkerRegistry::new(MemorySurface::new());
        reg.insert(&object(1, 0.0, 0.0));
        reg.insert(&object(2, 0.0, 0.0));
        reg.set_transform(1, TransformPatch::heading(90.0));

        let report = reg.reconcile(&[object(1, 0.0, 0.0)], |id| id == 1 || id == 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.removed, 0);
        assert_eq!(reg.transform(1).unwrap().heading, 90.0);
        assert!(reg.contains(2));
    }

    #[test]
    fn test_remove_drops_surface_marker() {
        let mut reg = MarkerRegistry::new(MemorySurface::new());
        reg.insert(&object(1, 0.0, 0.0));
        assert!(reg.remove(1));
        assert!(!reg.remove(1));
        assert_eq!(reg.surface().marker_count(), 0);
        assert!(reg.object(1).is_none());
    }
}
