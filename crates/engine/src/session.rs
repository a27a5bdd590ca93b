//! Async driver: moves data between an [`Engine`] and a [`RemoteStore`].

use std::time::Instant;

use serde::Serialize;
use shared::{Entity, LatLng, ObjectId};
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::persistence::{RemoteStore, WriteRequest};
use crate::state::{Engine, SnapshotReport};
use crate::surface::RenderSurface;

/// Outcome of sending a batch of writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlushReport {
    pub written: usize,
    pub failed: usize,
    /// Writes not attempted before the teardown deadline
    pub abandoned: usize,
}

impl FlushReport {
    fn absorb(&mut self, other: FlushReport) {
        self.written += other.written;
        self.failed += other.failed;
        self.abandoned += other.abandoned;
    }
}

/// One editing session against a remote store
pub struct Session<S: RenderSurface, R: RemoteStore> {
    engine: Engine<S>,
    store: R,
    totals: FlushReport,
}

impl<S: RenderSurface, R: RemoteStore> Session<S, R> {
    pub fn new(engine: Engine<S>, store: R) -> Self {
        Self {
            engine,
            store,
            totals: FlushReport::default(),
        }
    }

    pub fn engine(&self) -> &Engine<S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<S> {
        &mut self.engine
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Totals over every flush so far
    pub fn totals(&self) -> FlushReport {
        self.totals
    }

    /// Refetch everything and reconcile
    pub async fn refresh(&mut self) -> Result<SnapshotReport, StoreError> {
        let records = self.store.list_records().await?;
        let report = self.engine.apply_snapshot(&records);
        info!(
            objects = report.objects,
            zones = report.zones,
            locked = report.locked,
            "Refreshed"
        );
        Ok(report)
    }

    /// Create a new object at `center` and select it
    pub async fn create_object(
        &mut self,
        center: LatLng,
        now: Instant,
    ) -> Result<ObjectId, StoreError> {
        let fields = self.engine.new_object_fields(center);
        let record = self.store.create_record(fields).await?;
        match record.decode() {
            Ok(Entity::Object(object)) => {
                self.engine.insert_object(&object);
                self.engine.select(object.id, now);
                Ok(object.id)
            }
            Ok(Entity::Zone(_)) => Err(StoreError::Rejected(format!(
                "record {} came back without an object payload",
                record.id
            ))),
            Err(e) => Err(StoreError::Rejected(e.to_string())),
        }
    }

    /// Delete an object locally, then remotely
    pub async fn delete_object(&mut self, id: ObjectId) -> Result<(), StoreError> {
        self.engine.remove_object(id);
        self.store.delete_record(id).await.inspect_err(|e| {
            error!(object_id = id, "Failed to delete object: {e}");
        })
    }

    async fn send(&mut self, writes: Vec<WriteRequest>) -> FlushReport {
        let mut report = FlushReport::default();
        for write in writes {
            match self.store.update_record(write.object_id, write.patch.clone()).await {
                Ok(_) => {
                    self.engine.write_succeeded(&write);
                    report.written += 1;
                }
                Err(e) => {
                    // Local state is kept; the object stays dirty
                    error!(object_id = write.object_id, "Failed to save object: {e}");
                    self.engine.write_failed(write.object_id);
                    report.failed += 1;
                }
            }
        }
        self.totals.absorb(report);
        report
    }

    /// Send every write whose debounce has elapsed by `now`
    pub async fn flush_due(&mut self, now: Instant) -> FlushReport {
        let writes = self.engine.poll_writes(now);
        if writes.is_empty() {
            return FlushReport::default();
        }
        self.send(writes).await
    }

    /// Best-effort final write of everything unsaved, bounded by the
    /// configured teardown timeout.
    pub async fn shutdown(&mut self) -> FlushReport {
        let writes = self.engine.teardown_writes();
        let ids: Vec<ObjectId> = writes.iter().map(|w| w.object_id).collect();
        let timeout = self.engine.config().teardown_timeout();
        let mut report = FlushReport::default();

        let sent = tokio::time::timeout(timeout, async {
            for write in writes {
                let one = self.send(vec![write]).await;
                report.absorb(one);
            }
        })
        .await;

        if sent.is_err() {
            // Writes run in order, so everything past the answered ones is unresolved
            let unresolved = &ids[report.written + report.failed..];
            for id in unresolved {
                self.engine.write_abandoned(*id);
            }
            report.abandoned = unresolved.len();
            self.totals.abandoned += report.abandoned;
            warn!(abandoned = report.abandoned, "Teardown flush timed out");
        }
        info!(written = report.written, failed = report.failed, "Session closed");
        report
    }
}
