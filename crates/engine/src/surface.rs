//! Rendering surface seam.
//!
//! The map widget that actually draws markers lives outside the engine. It is
//! reached through [`RenderSurface`]; handles are plain ids into the surface.

use std::collections::HashMap;

use shared::{DisplayMetadata, LatLng, ObjectTransform, TransformPatch};

/// Id of a marker on the rendering surface
pub type HandleId = u64;

/// Marker primitives provided by the map widget
pub trait RenderSurface {
    fn create_handle(
        &mut self,
        position: LatLng,
        heading: f64,
        visual: &DisplayMetadata,
    ) -> HandleId;

    fn set_transform(&mut self, handle: HandleId, patch: TransformPatch);

    /// `None` once the handle has been removed
    fn get_transform(&self, handle: HandleId) -> Option<ObjectTransform>;

    fn set_visual(&mut self, handle: HandleId, visual: &DisplayMetadata);

    fn remove(&mut self, handle: HandleId);
}

/// Marker held by [`MemorySurface`]
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryMarker {
    pub transform: ObjectTransform,
    pub visual: DisplayMetadata,
}

/// Headless surface: keeps markers in a map and counts writes
#[derive(Debug, Default)]
pub struct MemorySurface {
    markers: HashMap<HandleId, MemoryMarker>,
    next_handle: HandleId,
    transform_writes: u64,
    visual_writes: u64,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(&self, handle: HandleId) -> Option<&MemoryMarker> {
        self.markers.get(&handle)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn transform_writes(&self) -> u64 {
        self.transform_writes
    }

    pub fn visual_writes(&self) -> u64 {
        self.visual_writes
    }
}

impl RenderSurface for MemorySurface {
    fn create_handle(
        &mut self,
        position: LatLng,
        heading: f64,
        visual: &DisplayMetadata,
    ) -> HandleId {
        self.next_handle += 1;
        self.markers.insert(
            self.next_handle,
            MemoryMarker {
                transform: ObjectTransform::new(position, heading),
                visual: visual.clone(),
            },
        );
        self.next_handle
    }

    fn set_transform(&mut self, handle: HandleId, patch: TransformPatch) {
        if let Some(marker) = self.markers.get_mut(&handle) {
            marker.transform = marker.transform.patched(&patch);
            self.transform_writes += 1;
        }
    }

    fn get_transform(&self, handle: HandleId) -> Option<ObjectTransform> {
        self.markers.get(&handle).map(|m| m.transform)
    }

    fn set_visual(&mut self, handle: HandleId, visual: &DisplayMetadata) {
        if let Some(marker) = self.markers.get_mut(&handle) {
            marker.visual = visual.clone();
            self.visual_writes += 1;
        }
    }

    fn remove(&mut self, handle: HandleId) {
        self.markers.remove(&handle);
    }
}
