//! Headless test harness driving a full session on a virtual clock.
//!
//! Remote calls run on a private single-threaded runtime, so callers stay
//! synchronous. Time only moves through [`TestHarness::advance`].

use std::time::{Duration, Instant};

use shared::{
    Boundary, DisplayMetadata, DisplayPatch, Entity, LatLng, MovableObject, NewLocation, ObjectId,
    ObjectTransform, ZoneId,
};

use crate::config::EngineConfig;
use crate::input::{DirectionalKey, InputOutcome};
use crate::persistence::{MemoryStore, RemoteStore};
use crate::session::{FlushReport, Session};
use crate::state::{Engine, SnapshotReport};
use crate::surface::MemorySurface;

/// Session + runtime + clock
pub struct TestHarness<R: RemoteStore = MemoryStore> {
    runtime: tokio::runtime::Runtime,
    session: Session<MemorySurface, R>,
    start: Instant,
    now: Instant,
}

impl TestHarness<MemoryStore> {
    /// Empty in-memory session with default settings
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }

    // ── Remote seeding ───────────────────────────────────────

    /// Add a zone record remotely and refetch
    pub fn add_zone(&mut self, code: &str, ring: Vec<LatLng>) -> Result<ZoneId, String> {
        let boundary = Boundary::new(ring).map_err(|e| e.to_string())?;
        let id = self
            .store()
            .insert(NewLocation::zone(code, Some(&boundary)))
            .id;
        self.refresh()?;
        Ok(id)
    }

    /// Add an object record remotely and refetch
    pub fn add_object(&mut self, lat: f64, lng: f64, heading: f64) -> Result<ObjectId, String> {
        let transform = ObjectTransform::new(LatLng::new(lat, lng), heading);
        let display = DisplayMetadata {
            label: crate::state::generate_label(),
            ..Default::default()
        };
        let id = self
            .store()
            .insert(NewLocation::object(&transform, &display, None))
            .id;
        self.refresh()?;
        Ok(id)
    }

    /// Simulate another writer changing an object's transform remotely
    pub fn remote_overwrite(&mut self, id: ObjectId, transform: ObjectTransform) -> bool {
        let Some(current) = self.remote_object(id) else {
            return false;
        };
        let patch = shared::LocationPatch::object(&transform, &current.display, current.zone_id);
        self.store().patch_silently(id, &patch).is_some()
    }

    /// Object as currently stored remotely
    pub fn remote_object(&self, id: ObjectId) -> Option<MovableObject> {
        match self.store().record(id)?.decode() {
            Ok(Entity::Object(object)) => Some(object),
            _ => None,
        }
    }

    /// Number of updates the store has accepted
    pub fn remote_writes(&self) -> usize {
        self.store().update_count()
    }

    pub fn set_remote_failing(&self, fail: bool) {
        self.store().set_fail_writes(fail);
    }
}

impl Default for TestHarness<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RemoteStore> TestHarness<R> {
    pub fn with_store(store: R, config: EngineConfig) -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build tokio runtime");
        let engine = Engine::new(MemorySurface::new(), config);
        let now = Instant::now();
        Self {
            runtime,
            session: Session::new(engine, store),
            start: now,
            now,
        }
    }

    pub fn engine(&self) -> &Engine<MemorySurface> {
        self.session.engine()
    }

    pub fn engine_mut(&mut self) -> &mut Engine<MemorySurface> {
        self.session.engine_mut()
    }

    pub fn session(&self) -> &Session<MemorySurface, R> {
        &self.session
    }

    pub fn store(&self) -> &R {
        self.session.store()
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Virtual milliseconds since the harness was created
    pub fn elapsed_ms(&self) -> u64 {
        self.now.duration_since(self.start).as_millis() as u64
    }

    // ── Remote I/O ───────────────────────────────────────────

    pub fn refresh(&mut self) -> Result<SnapshotReport, String> {
        self.runtime
            .block_on(self.session.refresh())
            .map_err(|e| e.to_string())
    }

    pub fn create_object(&mut self, lat: f64, lng: f64) -> Result<ObjectId, String> {
        let now = self.now;
        self.runtime
            .block_on(self.session.create_object(LatLng::new(lat, lng), now))
            .map_err(|e| e.to_string())
    }

    pub fn delete_object(&mut self, id: ObjectId) -> Result<(), String> {
        self.runtime
            .block_on(self.session.delete_object(id))
            .map_err(|e| e.to_string())
    }

    /// Move the clock forward and send whatever came due
    pub fn advance(&mut self, ms: u64) -> FlushReport {
        self.now += Duration::from_millis(ms);
        let now = self.now;
        self.runtime.block_on(self.session.flush_due(now))
    }

    /// Advance past every pending deadline
    pub fn settle(&mut self) -> FlushReport {
        let mut report = FlushReport::default();
        while let Some(deadline) = self.engine().next_deadline() {
            let wait = deadline.saturating_duration_since(self.now).as_millis() as u64;
            let step = self.advance(wait);
            report.written += step.written;
            report.failed += step.failed;
        }
        report
    }

    /// Final flush, as on session teardown
    pub fn teardown(&mut self) -> FlushReport {
        self.runtime.block_on(self.session.shutdown())
    }

    // ── Selection & gestures ─────────────────────────────────

    pub fn select(&mut self, id: ObjectId) -> InputOutcome {
        let now = self.now;
        self.engine_mut().select(id, now)
    }

    pub fn deselect(&mut self) -> InputOutcome {
        let now = self.now;
        self.engine_mut().deselect(now)
    }

    pub fn pointer_down(&mut self, id: ObjectId) -> InputOutcome {
        let now = self.now;
        self.engine_mut().pointer_down(id, now)
    }

    pub fn pointer_move(&mut self, id: ObjectId, dlat: f64, dlng: f64) -> InputOutcome {
        let now = self.now;
        self.engine_mut()
            .pointer_move(id, LatLng::new(dlat, dlng), now)
    }

    pub fn pointer_up(&mut self, id: ObjectId) -> InputOutcome {
        let now = self.now;
        self.engine_mut().pointer_up(id, now)
    }

    /// Full drag gesture by `(dlat, dlng)`
    pub fn drag(&mut self, id: ObjectId, dlat: f64, dlng: f64) -> InputOutcome {
        self.pointer_down(id);
        self.pointer_move(id, dlat, dlng);
        self.pointer_up(id)
    }

    pub fn key_down(&mut self, key: DirectionalKey) -> InputOutcome {
        let now = self.now;
        self.engine_mut().key_down(key, now)
    }

    pub fn key_up(&mut self, key: DirectionalKey) -> InputOutcome {
        let now = self.now;
        self.engine_mut().key_up(key, now)
    }

    /// Run `frames` frame ticks; returns the last moved transform
    pub fn tick(&mut self, frames: u32) -> Option<ObjectTransform> {
        let mut last = None;
        for _ in 0..frames {
            if let Some(t) = self.engine_mut().tick() {
                last = Some(t);
            }
        }
        last
    }

    /// Press `keys`, hold them for `frames` ticks, release them
    pub fn hold_keys(&mut self, keys: &[DirectionalKey], frames: u32) -> InputOutcome {
        for key in keys {
            self.key_down(*key);
        }
        self.tick(frames);
        let mut outcome = InputOutcome::Ignored;
        for key in keys {
            outcome = self.key_up(*key);
        }
        outcome
    }

    pub fn undo(&mut self) -> InputOutcome {
        let now = self.now;
        self.engine_mut().undo(now)
    }

    pub fn preview_heading(&mut self, id: ObjectId, visual_angle: f64) -> InputOutcome {
        let now = self.now;
        self.engine_mut()
            .preview_heading_from_visual(id, visual_angle, now)
    }

    pub fn commit_heading(&mut self, id: ObjectId, visual_angle: f64) -> InputOutcome {
        let now = self.now;
        self.engine_mut()
            .commit_heading_from_visual(id, visual_angle, now)
    }

    pub fn face_screen_left(&mut self, id: ObjectId) -> InputOutcome {
        let now = self.now;
        self.engine_mut().face_screen_left(id, now)
    }

    pub fn update_display(&mut self, id: ObjectId, patch: &DisplayPatch) -> bool {
        let now = self.now;
        self.engine_mut().update_display(id, patch, now)
    }

    // ── Queries ──────────────────────────────────────────────

    pub fn transform(&self, id: ObjectId) -> Option<ObjectTransform> {
        self.engine().transform(id)
    }

    pub fn object(&self, id: ObjectId) -> Option<MovableObject> {
        self.engine().object(id)
    }

    pub fn object_count(&self) -> usize {
        self.engine().registry().len()
    }

    /// Summary of the session state as JSON
    pub fn inspect(&self) -> serde_json::Value {
        let engine = self.engine();
        let objects: Vec<serde_json::Value> = engine
            .registry()
            .ids()
            .into_iter()
            .filter_map(|id| engine.object(id))
            .map(|o| {
                serde_json::json!({
                    "id": o.id,
                    "lat": o.transform.position.lat,
                    "lng": o.transform.position.lng,
                    "heading": o.transform.heading,
                    "label": o.display.label,
                    "aircraft_type": o.display.aircraft_type,
                    "color": o.display.color,
                    "zone_id": o.zone_id,
                    "locked": engine.is_locked(o.id),
                    "undo_depth": engine.input().undo_stack().depth(o.id),
                })
            })
            .collect();
        let zones: Vec<serde_json::Value> = engine
            .zones()
            .iter()
            .map(|z| {
                serde_json::json!({
                    "id": z.id,
                    "code": z.code,
                    "vertices": z.boundary.as_ref().map_or(0, |b| b.vertices().len()),
                })
            })
            .collect();
        serde_json::json!({
            "elapsed_ms": self.elapsed_ms(),
            "frame_rotation": engine.frame_rotation(),
            "view": engine.view(),
            "selected": engine.selected(),
            "input": engine.input().state(),
            "pending_writes": engine.scheduler().pending_count(),
            "compass_needle": engine.compass_needle(),
            "object_count": objects.len(),
            "objects": objects,
            "zones": zones,
            "totals": self.session.totals(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<LatLng> {
        vec![
            LatLng::new(46.0, -115.0),
            LatLng::new(46.0, -113.0),
            LatLng::new(47.0, -113.0),
            LatLng::new(47.0, -115.0),
        ]
    }

    #[test]
    fn test_harness_new() {
        let h = TestHarness::new();
        assert_eq!(h.object_count(), 0);
        assert_eq!(h.elapsed_ms(), 0);
    }

    #[test]
    fn test_create_object_selects_it() {
        let mut h = TestHarness::new();
        let id = h.create_object(46.5, -114.0).unwrap();
        assert_eq!(h.engine().selected(), Some(id));
        assert_eq!(h.transform(id).unwrap().heading, 310.0);
        assert_eq!(h.store().len(), 1);
    }

    #[test]
    fn test_drag_then_settle_writes_once() {
        let mut h = TestHarness::new();
        h.add_zone("A", square()).unwrap();
        let id = h.add_object(46.5, -114.0, 0.0).unwrap();
        assert_eq!(h.drag(id, 0.1, 0.1), InputOutcome::Commit(id));

        assert_eq!(h.advance(1000).written, 0);
        assert_eq!(h.advance(500).written, 1);
        let remote = h.remote_object(id).unwrap();
        assert!((remote.transform.position.lat - 46.6).abs() < 1e-6);
        assert!(remote.zone_id.is_some());
    }

    #[test]
    fn test_inspect_shape() {
        let mut h = TestHarness::new();
        let id = h.add_object(46.5, -114.0, 90.0).unwrap();
        h.select(id);
        let v = h.inspect();
        assert_eq!(v["object_count"], 1);
        assert_eq!(v["selected"], id);
        assert_eq!(v["input"]["state"], "idle");
    }

    #[test]
    fn test_delete_object() {
        let mut h = TestHarness::new();
        let id = h.add_object(46.5, -114.0, 90.0).unwrap();
        h.delete_object(id).unwrap();
        assert_eq!(h.object_count(), 0);
        assert!(h.store().is_empty());
        assert!(h.delete_object(id).is_err());
    }
}
