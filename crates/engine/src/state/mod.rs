mod preview;
mod registry;
mod undo;

use std::time::Instant;

use serde::Serialize;
use shared::heading::{to_true_heading, to_visual_angle, UnwrappedAngle};
use shared::{
    DisplayMetadata, DisplayPatch, Entity, LatLng, LocationRecord, MovableObject, NewLocation,
    ObjectId, ObjectTransform, Zone,
};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::input::{DirectionalKey, EditContext, InputController, InputOutcome, FACE_SCREEN_LEFT};
use crate::persistence::{PersistenceScheduler, WriteRequest};
use crate::surface::RenderSurface;
use crate::view::ViewState;

pub use preview::{PreviewOverlay, PreviewOverride};
pub use registry::{MarkerRegistry, ReconcileReport};
pub use undo::{UndoEntry, UndoStack};

/// Result of applying a remote snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SnapshotReport {
    pub objects: usize,
    pub zones: usize,
    /// Records that failed to decode
    pub malformed: usize,
    pub created: usize,
    pub updated: usize,
    pub locked: usize,
    pub removed: usize,
}

/// Borrow the gesture context from disjoint engine fields
macro_rules! edit_ctx {
    ($engine:ident) => {
        &mut EditContext {
            registry: &mut $engine.registry,
            overlay: &mut $engine.overlay,
            zones: &$engine.zones,
            frame_rotation: $engine.frame_rotation,
        }
    };
}

/// Everything one editing session holds, wired together.
///
/// All methods are synchronous and never block; remote I/O is left to the
/// caller (see [`crate::session::Session`]).
pub struct Engine<S: RenderSurface> {
    config: EngineConfig,
    registry: MarkerRegistry<S>,
    overlay: PreviewOverlay,
    input: InputController,
    scheduler: PersistenceScheduler,
    zones: Vec<Zone>,
    frame_rotation: f64,
    center: LatLng,
    zoom: f64,
    needle: Option<(ObjectId, UnwrappedAngle)>,
}

impl<S: RenderSurface> Engine<S> {
    pub fn new(surface: S, config: EngineConfig) -> Self {
        let view = ViewState::from_config(&config);
        Self {
            registry: MarkerRegistry::new(surface),
            overlay: PreviewOverlay::new(),
            input: InputController::new(&config),
            scheduler: PersistenceScheduler::new(&config),
            zones: Vec::new(),
            frame_rotation: view.bearing_deg,
            center: view.center,
            zoom: view.zoom,
            needle: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &MarkerRegistry<S> {
        &self.registry
    }

    pub fn surface(&self) -> &S {
        self.registry.surface()
    }

    pub fn overlay(&self) -> &PreviewOverlay {
        &self.overlay
    }

    pub fn input(&self) -> &InputController {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputController {
        &mut self.input
    }

    pub fn scheduler(&self) -> &PersistenceScheduler {
        &self.scheduler
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn selected(&self) -> Option<ObjectId> {
        self.input.selected()
    }

    pub fn frame_rotation(&self) -> f64 {
        self.frame_rotation
    }

    pub fn set_frame_rotation(&mut self, degrees: f64) {
        self.frame_rotation = shared::heading::normalize(degrees);
    }

    /// Current map view; the bearing is the frame rotation
    pub fn view(&self) -> ViewState {
        ViewState {
            center: self.center,
            zoom: self.zoom,
            bearing_deg: self.frame_rotation,
        }
    }

    pub fn apply_view(&mut self, view: &ViewState) {
        let view = view.sanitized();
        self.center = view.center;
        self.zoom = view.zoom;
        self.frame_rotation = view.bearing_deg;
    }

    /// Live state of one object
    pub fn object(&self, id: ObjectId) -> Option<MovableObject> {
        self.registry.object(id)
    }

    pub fn transform(&self, id: ObjectId) -> Option<ObjectTransform> {
        self.registry.transform(id)
    }

    /// Heading of `id` relative to the rotated viewport
    pub fn visual_heading(&self, id: ObjectId) -> Option<f64> {
        self.transform(id)
            .map(|t| to_visual_angle(t.heading, self.frame_rotation))
    }

    /// On-screen marker size of `id` at a map zoom level, in pixels
    pub fn marker_size(&self, id: ObjectId, zoom: f64) -> Option<(f64, f64)> {
        let object = self.registry.object(id)?;
        Some(shared::catalog::marker_size_px(
            &object.display.aircraft_type,
            object.transform.position.lat,
            zoom,
        ))
    }

    /// Whether reconciliation must leave `id` alone
    pub fn is_locked(&self, id: ObjectId) -> bool {
        self.overlay.contains(id) || self.input.is_mid_gesture(id) || self.scheduler.is_busy(id)
    }

    fn handle(&mut self, outcome: InputOutcome, now: Instant) -> InputOutcome {
        for id in self.input.take_finished() {
            self.scheduler.commit(id, now);
        }
        match outcome {
            InputOutcome::Commit(id) => self.scheduler.commit(id, now),
            InputOutcome::Reverted(id) => warn!(object_id = id, "Drop rejected outside all zones"),
            InputOutcome::Ignored | InputOutcome::Updated => {}
        }
        self.sync_needle();
        outcome
    }

    // ── Remote snapshot ──────────────────────────────────────

    /// Apply a full listing from the remote store.
    ///
    /// Zones are replaced wholesale, in record order; that order is the
    /// tie-break when zone boundaries overlap.
    pub fn apply_snapshot(&mut self, records: &[LocationRecord]) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        let mut objects = Vec::new();
        let mut zones = Vec::new();
        for record in records {
            match record.decode() {
                Ok(Entity::Object(object)) => objects.push(object),
                Ok(Entity::Zone(zone)) => zones.push(zone),
                Err(e) => {
                    warn!(record_id = record.id, "Skipping record: {e}");
                    report.malformed += 1;
                }
            }
        }
        report.objects = objects.len();
        report.zones = zones.len();
        self.zones = zones;

        for object in &objects {
            self.scheduler.observe_remote(object);
        }
        let before: Vec<ObjectId> = self.registry.ids();
        let reconciled = {
            let overlay = &self.overlay;
            let input = &self.input;
            let scheduler = &self.scheduler;
            self.registry.reconcile(&objects, |id| {
                overlay.contains(id) || input.is_mid_gesture(id) || scheduler.is_busy(id)
            })
        };
        for id in before {
            if !self.registry.contains(id) {
                self.forget(id);
            }
        }

        report.created = reconciled.created;
        report.updated = reconciled.updated;
        report.locked = reconciled.skipped;
        report.removed = reconciled.removed;
        debug!(?report, "Snapshot applied");
        self.sync_needle();
        report
    }

    // ── Create / delete ──────────────────────────────────────

    /// Creation fields for a new object at `center`, facing screen-left
    pub fn new_object_fields(&self, center: LatLng) -> NewLocation {
        let transform = ObjectTransform::new(
            center,
            to_true_heading(FACE_SCREEN_LEFT, self.frame_rotation),
        );
        let display = DisplayMetadata {
            label: generate_label(),
            aircraft_type: self.config.default_aircraft_type.clone(),
            ..Default::default()
        };
        NewLocation::object(&transform, &display, self.config.airport.clone())
    }

    /// Register an object the remote store just created
    pub fn insert_object(&mut self, object: &MovableObject) -> bool {
        self.scheduler.observe_remote(object);
        let inserted = self.registry.insert(object);
        if inserted {
            info!(object_id = object.id, label = %object.display.label, "Object added");
        }
        inserted
    }

    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        let removed = self.registry.remove(id);
        self.forget(id);
        if removed {
            info!(object_id = id, "Object removed");
        }
        removed
    }

    fn forget(&mut self, id: ObjectId) {
        self.overlay.clear(id);
        self.input.forget(id);
        self.scheduler.forget(id);
        if matches!(self.needle, Some((n, _)) if n == id) {
            self.needle = None;
        }
    }

    // ── Selection ────────────────────────────────────────────

    pub fn select(&mut self, id: ObjectId, now: Instant) -> InputOutcome {
        if !self.registry.contains(id) {
            return InputOutcome::Ignored;
        }
        let outcome = self.input.select(id, edit_ctx!(self));
        self.handle(outcome, now)
    }

    pub fn deselect(&mut self, now: Instant) -> InputOutcome {
        let outcome = self.input.deselect(edit_ctx!(self));
        self.handle(outcome, now)
    }

    // ── Pointer ──────────────────────────────────────────────

    pub fn pointer_down(&mut self, id: ObjectId, now: Instant) -> InputOutcome {
        let outcome = self.input.pointer_down(id, edit_ctx!(self));
        self.handle(outcome, now)
    }

    pub fn pointer_move(&mut self, id: ObjectId, delta: LatLng, now: Instant) -> InputOutcome {
        let outcome = self.input.pointer_move(id, delta, edit_ctx!(self));
        self.handle(outcome, now)
    }

    pub fn pointer_up(&mut self, id: ObjectId, now: Instant) -> InputOutcome {
        let outcome = self.input.pointer_up(id, edit_ctx!(self));
        self.handle(outcome, now)
    }

    // ── Keyboard ─────────────────────────────────────────────

    pub fn key_down(&mut self, key: DirectionalKey, now: Instant) -> InputOutcome {
        let outcome = self.input.key_down(key, edit_ctx!(self));
        self.handle(outcome, now)
    }

    pub fn key_up(&mut self, key: DirectionalKey, now: Instant) -> InputOutcome {
        let outcome = self.input.key_up(key, edit_ctx!(self));
        self.handle(outcome, now)
    }

    /// Frame tick. Applies held-key motion; never does I/O.
    pub fn tick(&mut self) -> Option<ObjectTransform> {
        let moved = self.input.tick(edit_ctx!(self));
        if moved.is_some() {
            self.sync_needle();
        }
        moved
    }

    pub fn undo(&mut self, now: Instant) -> InputOutcome {
        let outcome = self.input.undo(edit_ctx!(self));
        self.handle(outcome, now)
    }

    // ── Compass ──────────────────────────────────────────────

    pub fn preview_heading_from_visual(
        &mut self,
        id: ObjectId,
        visual_angle: f64,
        now: Instant,
    ) -> InputOutcome {
        let outcome = self.input.preview_heading(id, visual_angle, edit_ctx!(self));
        self.handle(outcome, now)
    }

    pub fn commit_heading_from_visual(
        &mut self,
        id: ObjectId,
        visual_angle: f64,
        now: Instant,
    ) -> InputOutcome {
        let outcome = self.input.commit_heading(id, visual_angle, edit_ctx!(self));
        self.handle(outcome, now)
    }

    pub fn face_screen_left(&mut self, id: ObjectId, now: Instant) -> InputOutcome {
        let outcome = self.input.face_screen_left(id, edit_ctx!(self));
        self.handle(outcome, now)
    }

    /// Cumulative needle angle for the selected object, relative to the
    /// viewport. Never jumps by more than 180° between updates.
    pub fn compass_needle(&self) -> Option<f64> {
        self.needle
            .map(|(_, angle)| angle.value() - self.frame_rotation)
    }

    fn sync_needle(&mut self) {
        let Some(id) = self.input.selected() else {
            self.needle = None;
            return;
        };
        let Some(transform) = self.registry.transform(id) else {
            self.needle = None;
            return;
        };
        match &mut self.needle {
            Some((needle_id, angle)) if *needle_id == id => {
                angle.advance_to(transform.heading);
            }
            _ => self.needle = Some((id, UnwrappedAngle::new(transform.heading))),
        }
    }

    // ── Display metadata ─────────────────────────────────────

    /// Show a display edit immediately without scheduling a write
    pub fn preview_display(&mut self, id: ObjectId, patch: &DisplayPatch) -> bool {
        let Some(current) = self.registry.display(id) else {
            return false;
        };
        let next = current.patched(patch);
        if !shared::catalog::is_known_type(&next.aircraft_type) {
            warn!(object_id = id, aircraft_type = %next.aircraft_type, "Unknown aircraft type, drawn as default");
        }
        self.registry.set_display(id, next);
        self.overlay.record_display(id, patch);
        true
    }

    /// Apply a display edit and commit it
    pub fn update_display(&mut self, id: ObjectId, patch: &DisplayPatch, now: Instant) -> bool {
        if !self.preview_display(id, patch) {
            return false;
        }
        self.scheduler.commit(id, now);
        true
    }

    // ── Persistence hand-off ─────────────────────────────────

    /// Writes whose debounce has elapsed
    pub fn poll_writes(&mut self, now: Instant) -> Vec<WriteRequest> {
        self.scheduler.fire_due(now, &self.registry)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn write_succeeded(&mut self, write: &WriteRequest) {
        self.scheduler.write_succeeded(write);
    }

    pub fn write_failed(&mut self, id: ObjectId) {
        self.scheduler.write_failed(id);
    }

    pub fn write_abandoned(&mut self, id: ObjectId) {
        self.scheduler.write_abandoned(id);
    }

    /// Every object with unsaved changes, for the final flush
    pub fn teardown_writes(&mut self) -> Vec<WriteRequest> {
        self.scheduler.teardown(&self.registry)
    }
}

/// Random `AC-NNNN` label for a new object
pub fn generate_label() -> String {
    // The low 62 bits of a v4 id are random, so the residue is uniform
    let n = uuid::Uuid::new_v4().as_u128() % 10_000;
    format!("AC-{:04}", n)
}
