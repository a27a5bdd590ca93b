//! Pointer and keyboard gestures.
//!
//! The controller is a small state machine (`Idle`, `Dragging`, `KeyMoving`).
//! It writes transforms straight into the registry and reports finished
//! gestures back to the caller as [`InputOutcome::Commit`]; it never talks to
//! the persistence layer itself.

pub mod keys;
pub mod motion;

use serde::Serialize;
use shared::heading::{normalize, to_true_heading};
use shared::{locate, LatLng, ObjectId, ObjectTransform, TransformPatch, Zone};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::state::{MarkerRegistry, PreviewOverlay, PreviewOverride, UndoEntry, UndoStack};
use crate::surface::RenderSurface;

pub use keys::{DirectionalKey, HeldKeys};
pub use motion::{forward_offset, MotionCommand, MotionQueue};

/// Visual angle that points the object at the left edge of the viewport
pub const FACE_SCREEN_LEFT: f64 = 270.0;

/// Gesture state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InputState {
    Idle,
    Dragging {
        object_id: ObjectId,
        #[serde(skip)]
        origin: ObjectTransform,
        #[serde(skip)]
        prior_override: Option<PreviewOverride>,
    },
    KeyMoving {
        object_id: ObjectId,
    },
}

impl InputState {
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            InputState::Idle => None,
            InputState::Dragging { object_id, .. } | InputState::KeyMoving { object_id } => {
                Some(*object_id)
            }
        }
    }
}

/// What a handler did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Event did not apply in the current state
    Ignored,
    /// Local state changed; nothing to persist yet
    Updated,
    /// Gesture finished; the object should be committed
    Commit(ObjectId),
    /// Drop landed outside every zone and was reverted
    Reverted(ObjectId),
}

/// Mutable session state a gesture needs
pub struct EditContext<'a, S: RenderSurface> {
    pub registry: &'a mut MarkerRegistry<S>,
    pub overlay: &'a mut PreviewOverlay,
    pub zones: &'a [Zone],
    pub frame_rotation: f64,
}

/// Turns pointer and key events into transform updates
#[derive(Debug)]
pub struct InputController {
    state: InputState,
    selected: Option<ObjectId>,
    held: HeldKeys,
    queue: MotionQueue,
    undo: UndoStack,
    /// Object whose compass gesture has an undo entry pushed but no commit yet
    compass: Option<ObjectId>,
    /// Gestures finished as a side effect of starting another one
    finished: Vec<ObjectId>,
    move_step_deg: f64,
    rotate_step_deg: f64,
    reject_outside_zones: bool,
}

impl InputController {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            state: InputState::Idle,
            selected: None,
            held: HeldKeys::default(),
            queue: MotionQueue::default(),
            undo: UndoStack::new(config.undo_capacity),
            compass: None,
            finished: Vec::new(),
            move_step_deg: config.move_step_deg,
            rotate_step_deg: config.rotate_step_deg,
            reject_outside_zones: config.reject_drops_outside_zones,
        }
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn selected(&self) -> Option<ObjectId> {
        self.selected
    }

    pub fn held_keys(&self) -> &HeldKeys {
        &self.held
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    /// Swap in a stack loaded from disk
    pub fn replace_undo_stack(&mut self, undo: UndoStack) {
        self.undo = undo;
    }

    /// Objects whose gesture ended without an outcome of their own; each
    /// needs a commit.
    pub fn take_finished(&mut self) -> Vec<ObjectId> {
        std::mem::take(&mut self.finished)
    }

    /// True while a drag or key gesture is in progress on `id`
    pub fn is_mid_gesture(&self, id: ObjectId) -> bool {
        self.state.object_id() == Some(id) || self.compass == Some(id)
    }

    // ── Selection ────────────────────────────────────────────

    /// Select `id`. A key gesture on the previous selection is finished first
    /// and its override dropped.
    pub fn select<S: RenderSurface>(
        &mut self,
        id: ObjectId,
        ctx: &mut EditContext<'_, S>,
    ) -> InputOutcome {
        if self.selected == Some(id) {
            return InputOutcome::Ignored;
        }
        if matches!(self.state, InputState::Dragging { .. }) {
            return InputOutcome::Ignored;
        }
        let outcome = self.release_selection(ctx);
        self.selected = Some(id);
        match outcome {
            InputOutcome::Ignored => InputOutcome::Updated,
            other => other,
        }
    }

    pub fn deselect<S: RenderSurface>(&mut self, ctx: &mut EditContext<'_, S>) -> InputOutcome {
        if matches!(self.state, InputState::Dragging { .. }) {
            return InputOutcome::Ignored;
        }
        self.release_selection(ctx)
    }

    fn release_selection<S: RenderSurface>(
        &mut self,
        ctx: &mut EditContext<'_, S>,
    ) -> InputOutcome {
        let Some(prev) = self.selected.take() else {
            return InputOutcome::Ignored;
        };
        let mut outcome = InputOutcome::Updated;
        if let InputState::KeyMoving { object_id } = self.state {
            self.held.clear();
            outcome = self.finish_key_gesture(object_id, ctx);
        }
        if self.compass.take() == Some(prev) {
            outcome = InputOutcome::Commit(prev);
        }
        ctx.overlay.clear(prev);
        outcome
    }

    // ── Pointer ──────────────────────────────────────────────

    pub fn pointer_down<S: RenderSurface>(
        &mut self,
        id: ObjectId,
        ctx: &mut EditContext<'_, S>,
    ) -> InputOutcome {
        if self.state != InputState::Idle {
            return InputOutcome::Ignored;
        }
        let Some(origin) = ctx.registry.transform(id) else {
            return InputOutcome::Ignored;
        };
        self.undo.push(UndoEntry::capture(id, origin));
        self.state = InputState::Dragging {
            object_id: id,
            origin,
            prior_override: ctx.overlay.get(id).cloned(),
        };
        debug!(object_id = id, "Drag started");
        InputOutcome::Updated
    }

    /// Move the dragged object by `delta` degrees
    pub fn pointer_move<S: RenderSurface>(
        &mut self,
        id: ObjectId,
        delta: LatLng,
        ctx: &mut EditContext<'_, S>,
    ) -> InputOutcome {
        if !matches!(self.state, InputState::Dragging { object_id, .. } if object_id == id) {
            return InputOutcome::Ignored;
        }
        let Some(current) = ctx.registry.transform(id) else {
            return InputOutcome::Ignored;
        };
        let position = LatLng::new(
            current.position.lat + delta.lat,
            current.position.lng + delta.lng,
        );
        ctx.registry.set_transform(id, TransformPatch::position(position));
        ctx.overlay.record_transform(id, TransformPatch::position(position));
        InputOutcome::Updated
    }

    pub fn pointer_up<S: RenderSurface>(
        &mut self,
        id: ObjectId,
        ctx: &mut EditContext<'_, S>,
    ) -> InputOutcome {
        if !matches!(self.state, InputState::Dragging { object_id, .. } if object_id == id) {
            return InputOutcome::Ignored;
        }
        let InputState::Dragging {
            origin,
            prior_override,
            ..
        } = std::mem::replace(&mut self.state, InputState::Idle)
        else {
            return InputOutcome::Ignored;
        };
        let Some(drop) = ctx.registry.transform(id) else {
            return InputOutcome::Ignored;
        };

        match locate(drop.position, ctx.zones) {
            Some(zone) => {
                debug!(object_id = id, zone = %zone.code, "Dropped in zone");
                ctx.registry.set_zone_id(id, Some(zone.id));
            }
            None if self.reject_outside_zones => {
                debug!(object_id = id, "Drop outside all zones, reverting");
                ctx.registry.set_transform(id, TransformPatch::full(origin));
                ctx.overlay.restore(id, prior_override);
                self.undo.pop(id);
                return InputOutcome::Reverted(id);
            }
            None => ctx.registry.set_zone_id(id, None),
        }
        ctx.overlay.record_transform(id, TransformPatch::full(drop));
        InputOutcome::Commit(id)
    }

    // ── Keyboard ─────────────────────────────────────────────

    pub fn key_down<S: RenderSurface>(
        &mut self,
        key: DirectionalKey,
        ctx: &mut EditContext<'_, S>,
    ) -> InputOutcome {
        let Some(id) = self.selected else {
            return InputOutcome::Ignored;
        };
        match self.state {
            InputState::Dragging { .. } => InputOutcome::Ignored,
            InputState::KeyMoving { .. } => {
                self.held.press(key);
                InputOutcome::Updated
            }
            InputState::Idle => {
                let Some(origin) = ctx.registry.transform(id) else {
                    return InputOutcome::Ignored;
                };
                self.held.press(key);
                self.undo.push(UndoEntry::capture(id, origin));
                self.state = InputState::KeyMoving { object_id: id };
                InputOutcome::Updated
            }
        }
    }

    pub fn key_up<S: RenderSurface>(
        &mut self,
        key: DirectionalKey,
        ctx: &mut EditContext<'_, S>,
    ) -> InputOutcome {
        self.held.release(key);
        match self.state {
            InputState::KeyMoving { object_id } if self.held.is_empty() => {
                self.finish_key_gesture(object_id, ctx)
            }
            InputState::KeyMoving { .. } => InputOutcome::Updated,
            _ => InputOutcome::Ignored,
        }
    }

    fn finish_key_gesture<S: RenderSurface>(
        &mut self,
        id: ObjectId,
        ctx: &mut EditContext<'_, S>,
    ) -> InputOutcome {
        self.state = InputState::Idle;
        self.queue.clear();
        let Some(last) = ctx.registry.transform(id) else {
            return InputOutcome::Ignored;
        };
        ctx.overlay.record_transform(id, TransformPatch::full(last));
        // Keyboard moves are never reverted; the zone just follows
        let zone_id = locate(last.position, ctx.zones).map(|z| z.id);
        ctx.registry.set_zone_id(id, zone_id);
        InputOutcome::Commit(id)
    }

    /// Frame tick: queue this frame's motion and apply it.
    pub fn tick<S: RenderSurface>(
        &mut self,
        ctx: &mut EditContext<'_, S>,
    ) -> Option<ObjectTransform> {
        let InputState::KeyMoving { object_id } = self.state else {
            return None;
        };
        if self.held.is_empty() {
            return None;
        }
        let rotation = self.held.rotation_sign();
        if rotation != 0.0 {
            self.queue.push(MotionCommand::Rotate {
                id: object_id,
                delta_deg: rotation * self.rotate_step_deg,
            });
        }
        let travel = self.held.travel_sign();
        if travel != 0.0 {
            self.queue.push(MotionCommand::Translate {
                id: object_id,
                distance_deg: travel * self.move_step_deg,
            });
        }
        trace!(object_id, rotation, travel, "Key tick");
        self.queue
            .drain_into(ctx.registry)
            .into_iter()
            .find(|(id, _)| *id == object_id)
            .map(|(_, t)| t)
    }

    // ── Compass ──────────────────────────────────────────────

    /// Live heading preview from a viewport-relative angle
    pub fn preview_heading<S: RenderSurface>(
        &mut self,
        id: ObjectId,
        visual_angle: f64,
        ctx: &mut EditContext<'_, S>,
    ) -> InputOutcome {
        match self.state.object_id() {
            Some(active) if active != id => return InputOutcome::Ignored,
            Some(_) => {}
            None => {
                if self.compass != Some(id) {
                    let Some(origin) = ctx.registry.transform(id) else {
                        return InputOutcome::Ignored;
                    };
                    // Another object's compass gesture ends here and still needs its commit
                    if let Some(other) = self.compass.take() {
                        debug!(object_id = other, "Compass gesture finished by switch");
                        self.finished.push(other);
                    }
                    self.undo.push(UndoEntry::capture(id, origin));
                    self.compass = Some(id);
                }
            }
        }
        let heading = normalize(to_true_heading(visual_angle, ctx.frame_rotation).round());
        if !ctx.registry.set_transform(id, TransformPatch::heading(heading)) {
            return InputOutcome::Ignored;
        }
        ctx.overlay.record_transform(id, TransformPatch::heading(heading));
        InputOutcome::Updated
    }

    /// Set the heading from a viewport-relative angle and finish the compass gesture
    pub fn commit_heading<S: RenderSurface>(
        &mut self,
        id: ObjectId,
        visual_angle: f64,
        ctx: &mut EditContext<'_, S>,
    ) -> InputOutcome {
        match self.preview_heading(id, visual_angle, ctx) {
            InputOutcome::Updated => {}
            other => return other,
        }
        if self.compass == Some(id) {
            self.compass = None;
            InputOutcome::Commit(id)
        } else {
            // Part of a drag or key gesture; that gesture commits
            InputOutcome::Updated
        }
    }

    pub fn face_screen_left<S: RenderSurface>(
        &mut self,
        id: ObjectId,
        ctx: &mut EditContext<'_, S>,
    ) -> InputOutcome {
        self.commit_heading(id, FACE_SCREEN_LEFT, ctx)
    }

    // ── Undo ─────────────────────────────────────────────────

    /// Restore the selected object's last pre-gesture snapshot
    pub fn undo<S: RenderSurface>(&mut self, ctx: &mut EditContext<'_, S>) -> InputOutcome {
        if self.state != InputState::Idle {
            return InputOutcome::Ignored;
        }
        let Some(id) = self.selected else {
            return InputOutcome::Ignored;
        };
        if self.compass == Some(id) {
            self.compass = None;
        }
        let Some(entry) = self.undo.pop(id) else {
            return InputOutcome::Ignored;
        };
        let restored = entry.transform();
        if !ctx.registry.set_transform(id, TransformPatch::full(restored)) {
            return InputOutcome::Ignored;
        }
        ctx.overlay.record_transform(id, TransformPatch::full(restored));
        let zone_id = locate(restored.position, ctx.zones).map(|z| z.id);
        ctx.registry.set_zone_id(id, zone_id);
        InputOutcome::Commit(id)
    }

    /// Drop all gesture and undo state for a deleted object
    pub fn forget(&mut self, id: ObjectId) {
        if self.state.object_id() == Some(id) {
            self.state = InputState::Idle;
            self.held.clear();
            self.queue.clear();
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
        if self.compass == Some(id) {
            self.compass = None;
        }
        self.undo.clear(id);
        self.finished.retain(|other| *other != id);
    }
}
