//! Location records held in memory, optionally mirrored to a JSON file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use shared::{LocationPatch, LocationRecord, NewLocation};
use tokio::sync::RwLock;

#[derive(Debug)]
pub enum StorageError {
    NotFound(i64),
    Invalid(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(id) => write!(f, "Location {} not found", id),
            StorageError::Invalid(msg) => write!(f, "Invalid location: {}", msg),
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Json(e)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    next_id: i64,
    records: Vec<LocationRecord>,
}

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<i64, LocationRecord>,
    next_id: i64,
}

pub struct LocationStore {
    state: RwLock<StoreState>,
    data_file: Option<PathBuf>,
}

impl LocationStore {
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            data_file: None,
        }
    }

    /// Open a store mirrored to `path`; a missing file starts empty
    pub async fn open(path: PathBuf) -> Result<Self, StorageError> {
        let mut state = StoreState::default();
        if tokio::fs::try_exists(&path).await? {
            let json = tokio::fs::read_to_string(&path).await?;
            let file: StoreFile = serde_json::from_str(&json)?;
            let max_id = file.records.iter().map(|r| r.id).max().unwrap_or(0);
            state.next_id = file.next_id.max(max_id);
            state.records = file.records.into_iter().map(|r| (r.id, r)).collect();
            tracing::info!("Loaded {} locations from {}", state.records.len(), path.display());
        }
        Ok(Self {
            state: RwLock::new(state),
            data_file: Some(path),
        })
    }

    async fn persist(&self, state: &StoreState) -> Result<(), StorageError> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };
        let file = StoreFile {
            next_id: state.next_id,
            records: state.records.values().cloned().collect(),
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_string_pretty(&file)?).await?;
        Ok(())
    }

    /// One page (1-based) in descending id order, plus the total count
    pub async fn list(&self, page: usize, page_size: usize) -> (usize, Vec<LocationRecord>) {
        let state = self.state.read().await;
        let skip = page.saturating_sub(1).saturating_mul(page_size);
        let results = state
            .records
            .values()
            .rev()
            .skip(skip)
            .take(page_size)
            .cloned()
            .collect();
        (state.records.len(), results)
    }

    pub async fn get(&self, id: i64) -> Result<LocationRecord, StorageError> {
        self.state
            .read()
            .await
            .records
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    /// Changes are only kept once the mirror file has been written;
    /// a failed write rolls the in-memory state back.
    pub async fn create(&self, fields: NewLocation) -> Result<LocationRecord, StorageError> {
        if fields.location_code.trim().is_empty() {
            return Err(StorageError::Invalid("location_code is required".to_string()));
        }
        let mut state = self.state.write().await;
        let id = state.next_id + 1;
        let record = LocationRecord::from_new(id, fields);
        state.records.insert(id, record.clone());
        state.next_id = id;
        if let Err(e) = self.persist(&state).await {
            state.records.remove(&id);
            state.next_id = id - 1;
            return Err(e);
        }
        Ok(record)
    }

    pub async fn update(&self, id: i64, patch: LocationPatch) -> Result<LocationRecord, StorageError> {
        if patch
            .location_code
            .as_deref()
            .is_some_and(|code| code.trim().is_empty())
        {
            return Err(StorageError::Invalid("location_code must not be empty".to_string()));
        }
        let mut state = self.state.write().await;
        let previous = state.records.get(&id).cloned().ok_or(StorageError::NotFound(id))?;
        let mut updated = previous.clone();
        updated.apply_patch(&patch);
        state.records.insert(id, updated.clone());
        if let Err(e) = self.persist(&state).await {
            state.records.insert(id, previous);
            return Err(e);
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let removed = state.records.remove(&id).ok_or(StorageError::NotFound(id))?;
        if let Err(e) = self.persist(&state).await {
            state.records.insert(id, removed);
            return Err(e);
        }
        Ok(())
    }
}
