//! Debounced, per-object write scheduling.
//!
//! The scheduler never touches markers. It reads the registry when a commit
//! fires and hands back [`WriteRequest`]s for the session driver to send.

pub mod http;
pub mod store;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use shared::heading::shortest_delta;
use shared::{DisplayMetadata, LocationPatch, MovableObject, ObjectId, ObjectTransform, ZoneId};
use tracing::debug;

use crate::config::EngineConfig;
use crate::state::MarkerRegistry;
use crate::surface::RenderSurface;

pub use http::HttpStore;
pub use store::{MemoryStore, RemoteStore};

/// Last state known to be held remotely for one object
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub transform: ObjectTransform,
    pub display: DisplayMetadata,
    pub zone_id: Option<ZoneId>,
}

impl From<&MovableObject> for PersistedState {
    fn from(object: &MovableObject) -> Self {
        Self {
            transform: object.transform,
            display: object.display.clone(),
            zone_id: object.zone_id,
        }
    }
}

/// A write that should be sent to the remote store
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub object_id: ObjectId,
    pub state: PersistedState,
    pub patch: LocationPatch,
}

impl WriteRequest {
    fn new(object_id: ObjectId, state: PersistedState) -> Self {
        let patch = LocationPatch::object(&state.transform, &state.display, state.zone_id);
        Self {
            object_id,
            state,
            patch,
        }
    }
}

/// Trailing-edge debounce keyed by object id
#[derive(Debug)]
pub struct PersistenceScheduler {
    debounce: Duration,
    position_epsilon: f64,
    heading_epsilon: f64,
    /// Fire deadline per object
    pending: HashMap<ObjectId, Instant>,
    /// Outstanding writes per object; several may overlap
    in_flight: HashMap<ObjectId, usize>,
    persisted: HashMap<ObjectId, PersistedState>,
}

impl PersistenceScheduler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            debounce: config.debounce(),
            position_epsilon: config.position_epsilon_deg,
            heading_epsilon: config.heading_epsilon_deg,
            pending: HashMap::new(),
            in_flight: HashMap::new(),
            persisted: HashMap::new(),
        }
    }

    /// Schedule a write for `id`, pushing back any pending deadline
    pub fn commit(&mut self, id: ObjectId, now: Instant) {
        self.pending.insert(id, now + self.debounce);
    }

    pub fn is_pending(&self, id: ObjectId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn is_in_flight(&self, id: ObjectId) -> bool {
        self.in_flight.get(&id).is_some_and(|n| *n > 0)
    }

    /// Pending or in flight
    pub fn is_busy(&self, id: ObjectId) -> bool {
        self.is_pending(id) || self.is_in_flight(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    pub fn persisted(&self, id: ObjectId) -> Option<&PersistedState> {
        self.persisted.get(&id)
    }

    /// Record what the remote store holds, as seen in a snapshot.
    ///
    /// Ignored while a write for the object is in flight: the snapshot may
    /// predate it.
    pub fn observe_remote(&mut self, object: &MovableObject) {
        if self.is_in_flight(object.id) {
            return;
        }
        self.persisted.insert(object.id, PersistedState::from(object));
    }

    /// Whether `current` differs from the persisted baseline beyond epsilon
    pub fn exceeds_threshold(&self, id: ObjectId, current: &PersistedState) -> bool {
        let Some(base) = self.persisted.get(&id) else {
            return true;
        };
        let moved = !current
            .transform
            .position
            .approx_eq(&base.transform.position, self.position_epsilon);
        let turned =
            shortest_delta(base.transform.heading, current.transform.heading).abs() > self.heading_epsilon;
        moved || turned || current.display != base.display || current.zone_id != base.zone_id
    }

    fn prepare<S: RenderSurface>(
        &mut self,
        id: ObjectId,
        registry: &MarkerRegistry<S>,
    ) -> Option<WriteRequest> {
        // The marker at fire time is authoritative
        let object = registry.object(id)?;
        let current = PersistedState::from(&object);
        if !self.exceeds_threshold(id, &current) {
            debug!(object_id = id, "Change within threshold, skipping write");
            return None;
        }
        *self.in_flight.entry(id).or_insert(0) += 1;
        Some(WriteRequest::new(id, current))
    }

    /// Fire every commit whose quiet period has elapsed.
    pub fn fire_due<S: RenderSurface>(
        &mut self,
        now: Instant,
        registry: &MarkerRegistry<S>,
    ) -> Vec<WriteRequest> {
        let mut due: Vec<(Instant, ObjectId)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (*deadline, *id))
            .collect();
        due.sort_unstable();

        let mut writes = Vec::with_capacity(due.len());
        for (_, id) in due {
            self.pending.remove(&id);
            if let Some(write) = self.prepare(id, registry) {
                writes.push(write);
            }
        }
        writes
    }

    /// Final flush: every object whose state differs from the baseline,
    /// pending or not. Clears all pending deadlines.
    pub fn teardown<S: RenderSurface>(&mut self, registry: &MarkerRegistry<S>) -> Vec<WriteRequest> {
        self.pending.clear();
        registry
            .ids()
            .into_iter()
            .filter_map(|id| self.prepare(id, registry))
            .collect()
    }

    /// The remote store accepted `write`
    pub fn write_succeeded(&mut self, write: &WriteRequest) {
        self.settle(write.object_id);
        self.persisted.insert(write.object_id, write.state.clone());
    }

    /// The write failed. The baseline is kept, so the object stays dirty and
    /// the next commit or teardown retries it.
    pub fn write_failed(&mut self, id: ObjectId) {
        self.settle(id);
    }

    /// The write was given up on without an answer. Treated like a failure:
    /// the object stays dirty.
    pub fn write_abandoned(&mut self, id: ObjectId) {
        debug!(object_id = id, "Write abandoned");
        self.settle(id);
    }

    fn settle(&mut self, id: ObjectId) {
        if let Some(count) = self.in_flight.get_mut(&id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.in_flight.remove(&id);
            }
        }
    }

    pub fn forget(&mut self, id: ObjectId) {
        self.pending.remove(&id);
        self.in_flight.remove(&id);
        self.persisted.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use shared::{LatLng, TransformPatch};

    fn setup() -> (PersistenceScheduler, MarkerRegistry<MemorySurface>, Instant) {
        let object = MovableObject {
            id: 1,
            transform: ObjectTransform::new(LatLng::new(46.0, -114.0), 310.0),
            display: DisplayMetadata::default(),
            zone_id: None,
        };
        let mut registry = MarkerRegistry::new(MemorySurface::new());
        registry.insert(&object);
        let mut scheduler = PersistenceScheduler::new(&EngineConfig::default());
        scheduler.observe_remote(&object);
        (scheduler, registry, Instant::now())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_debounce_coalesces_commits() {
        let (mut sched, mut reg, t0) = setup();
        for i in 0..5u64 {
            reg.set_transform(1, TransformPatch::heading(310.0 + (i + 1) as f64));
            sched.commit(1, t0 + ms(i * 100));
        }
        assert!(sched.fire_due(t0 + ms(1500), &reg).is_empty());
        let writes = sched.fire_due(t0 + ms(1900), &reg);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].state.transform.heading, 315.0);
        assert!(sched.is_in_flight(1));
        assert!(!sched.is_pending(1));
    }

    #[test]
    fn test_within_epsilon_skips_write() {
        let (mut sched, mut reg, t0) = setup();
        reg.set_transform(1, TransformPatch::position(LatLng::new(46.000_000_5, -114.0)));
        sched.commit(1, t0);
        assert!(sched.fire_due(t0 + ms(1500), &reg).is_empty());
        assert!(!sched.is_busy(1));
    }

    #[test]
    fn test_heading_wrap_is_small_delta() {
        let (mut sched, mut reg, t0) = setup();
        sched.observe_remote(&MovableObject {
            id: 1,
            transform: ObjectTransform::new(LatLng::new(46.0, -114.0), 359.999),
            display: DisplayMetadata::default(),
            zone_id: None,
        });
        reg.set_transform(1, TransformPatch::full(ObjectTransform::new(LatLng::new(46.0, -114.0), 0.0)));
        sched.commit(1, t0);
        assert!(sched.fire_due(t0 + ms(1500), &reg).is_empty());
    }

    #[test]
    fn test_display_change_is_written() {
        let (mut sched, mut reg, t0) = setup();
        reg.set_display(
            1,
            DisplayMetadata {
                label: "N77".to_string(),
                ..Default::default()
            },
        );
        sched.commit(1, t0);
        let writes = sched.fire_due(t0 + ms(1500), &reg);
        assert_eq!(writes.len(), 1);
        assert!(writes[0].patch.description.as_deref().unwrap().contains("N77"));
    }

    #[test]
    fn test_failed_write_stays_dirty_for_teardown() {
        let (mut sched, mut reg, t0) = setup();
        reg.set_transform(1, TransformPatch::heading(90.0));
        sched.commit(1, t0);
        let writes = sched.fire_due(t0 + ms(1500), &reg);
        sched.write_failed(writes[0].object_id);

        let retry = sched.teardown(&reg);
        assert_eq!(retry.len(), 1);
        sched.write_succeeded(&retry[0]);
        assert!(sched.teardown(&reg).is_empty());
    }

    #[test]
    fn test_objects_debounce_independently() {
        let (mut sched, mut reg, t0) = setup();
        reg.insert(&MovableObject {
            id: 2,
            transform: ObjectTransform::new(LatLng::new(0.0, 0.0), 0.0),
            display: DisplayMetadata::default(),
            zone_id: None,
        });
        reg.set_transform(1, TransformPatch::heading(1.0));
        sched.commit(1, t0);
        sched.commit(2, t0 + ms(1000));
        assert_eq!(sched.next_deadline(), Some(t0 + ms(1500)));

        let first = sched.fire_due(t0 + ms(1500), &reg);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].object_id, 1);
        // No baseline for 2: always written
        let second = sched.fire_due(t0 + ms(2500), &reg);
        assert_eq!(second[0].object_id, 2);
    }

    #[test]
    fn test_snapshot_during_flight_does_not_move_baseline() {
        let (mut sched, mut reg, t0) = setup();
        reg.set_transform(1, TransformPatch::heading(90.0));
        sched.commit(1, t0);
        let writes = sched.fire_due(t0 + ms(1500), &reg);

        let stale = MovableObject {
            id: 1,
            transform: ObjectTransform::new(LatLng::new(0.0, 0.0), 0.0),
            display: DisplayMetadata::default(),
            zone_id: None,
        };
        sched.observe_remote(&stale);
        sched.write_succeeded(&writes[0]);
        assert_eq!(sched.persisted(1).unwrap().transform.heading, 90.0);
    }

    #[test]
    fn test_overlapping_writes_stay_in_flight_until_both_settle() {
        let (mut sched, mut reg, t0) = setup();
        reg.set_transform(1, TransformPatch::heading(90.0));
        sched.commit(1, t0);
        let first = sched.fire_due(t0 + ms(1500), &reg);

        reg.set_transform(1, TransformPatch::heading(120.0));
        sched.commit(1, t0 + ms(1600));
        let second = sched.fire_due(t0 + ms(3100), &reg);
        assert_eq!(second.len(), 1);

        sched.write_succeeded(&first[0]);
        assert!(sched.is_in_flight(1));
        sched.write_succeeded(&second[0]);
        assert!(!sched.is_in_flight(1));
        assert_eq!(sched.persisted(1).unwrap().transform.heading, 120.0);
    }

    #[test]
    fn test_abandoned_write_leaves_object_dirty() {
        let (mut sched, mut reg, _) = setup();
        reg.set_transform(1, TransformPatch::heading(45.0));
        let writes = sched.teardown(&reg);
        assert!(sched.is_in_flight(1));

        sched.write_abandoned(writes[0].object_id);
        assert!(!sched.is_busy(1));
        assert_eq!(sched.teardown(&reg).len(), 1);
    }
}
