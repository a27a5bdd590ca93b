use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use shared::{LocationPatch, LocationRecord, NewLocation};

use crate::error::StoreError;

/// CRUD over opaque location records
pub trait RemoteStore {
    fn list_records(&self) -> impl Future<Output = Result<Vec<LocationRecord>, StoreError>>;

    fn create_record(
        &self,
        fields: NewLocation,
    ) -> impl Future<Output = Result<LocationRecord, StoreError>>;

    fn update_record(
        &self,
        id: i64,
        patch: LocationPatch,
    ) -> impl Future<Output = Result<LocationRecord, StoreError>>;

    fn delete_record(&self, id: i64) -> impl Future<Output = Result<(), StoreError>>;
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<i64, LocationRecord>,
    next_id: i64,
    updates: Vec<(i64, LocationPatch)>,
    fail_writes: bool,
}

/// In-process store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves plain data behind
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every update fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Successful updates, in order
    pub fn updates(&self) -> Vec<(i64, LocationPatch)> {
        self.state().updates.clone()
    }

    pub fn update_count(&self) -> usize {
        self.state().updates.len()
    }

    pub fn record(&self, id: i64) -> Option<LocationRecord> {
        self.state().records.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().records.is_empty()
    }

    pub fn insert(&self, fields: NewLocation) -> LocationRecord {
        let mut state = self.state();
        state.next_id += 1;
        let record = LocationRecord::from_new(state.next_id, fields);
        state.records.insert(record.id, record.clone());
        record
    }

    /// Overwrite a record without counting it as a session write
    pub fn patch_silently(&self, id: i64, patch: &LocationPatch) -> Option<LocationRecord> {
        let mut state = self.state();
        let record = state.records.get_mut(&id)?;
        record.apply_patch(patch);
        Some(record.clone())
    }
}

impl RemoteStore for MemoryStore {
    async fn list_records(&self) -> Result<Vec<LocationRecord>, StoreError> {
        // Newest first, like the HTTP listing
        Ok(self.state().records.values().rev().cloned().collect())
    }

    async fn create_record(&self, fields: NewLocation) -> Result<LocationRecord, StoreError> {
        if fields.location_code.trim().is_empty() {
            return Err(StoreError::Rejected("location_code is required".to_string()));
        }
        Ok(self.insert(fields))
    }

    async fn update_record(
        &self,
        id: i64,
        patch: LocationPatch,
    ) -> Result<LocationRecord, StoreError> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(StoreError::Status {
                status: 503,
                body: "store unavailable".to_string(),
            });
        }
        let record = state.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.apply_patch(&patch);
        let updated = record.clone();
        state.updates.push((id, patch));
        Ok(updated)
    }

    async fn delete_record(&self, id: i64) -> Result<(), StoreError> {
        self.state()
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(code: &str) -> NewLocation {
        NewLocation {
            location_code: code.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_crud() {
        let store = MemoryStore::new();
        let a = store.create_record(zone("A")).await.unwrap();
        let b = store.create_record(zone("B")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let listed = store.list_records().await.unwrap();
        assert_eq!(listed[0].id, 2);

        let patch = LocationPatch {
            location_code: Some("A2".to_string()),
            ..Default::default()
        };
        let updated = store.update_record(1, patch).await.unwrap();
        assert_eq!(updated.location_code, "A2");
        assert_eq!(store.update_count(), 1);

        store.delete_record(1).await.unwrap();
        assert!(matches!(store.delete_record(1).await, Err(StoreError::NotFound(1))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_requires_code() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.create_record(zone("  ")).await,
            Err(StoreError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let store = MemoryStore::new();
        store.insert(zone("A"));
        store.set_fail_writes(true);
        let err = store.update_record(1, LocationPatch::default()).await;
        assert!(matches!(err, Err(StoreError::Status { status: 503, .. })));
        assert_eq!(store.update_count(), 0);

        // Clones share state
        let other = store.clone();
        other.set_fail_writes(false);
        assert!(store.update_record(1, LocationPatch::default()).await.is_ok());
    }
}
