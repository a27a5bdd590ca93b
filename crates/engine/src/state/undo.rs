use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shared::{LatLng, ObjectId, ObjectTransform};

use crate::error::FileError;

const UNDO_FILE_VERSION: u32 = 1;

/// Pre-gesture snapshot of one object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UndoEntry {
    pub object_id: ObjectId,
    pub position: LatLng,
    pub heading: f64,
}

impl UndoEntry {
    pub fn capture(object_id: ObjectId, transform: ObjectTransform) -> Self {
        Self {
            object_id,
            position: transform.position,
            heading: transform.heading,
        }
    }

    pub fn transform(&self) -> ObjectTransform {
        ObjectTransform::new(self.position, self.heading)
    }
}

#[derive(Serialize, Deserialize)]
struct UndoDocument {
    version: u32,
    stacks: BTreeMap<ObjectId, Vec<UndoEntry>>,
}

/// Bounded LIFO of pre-gesture snapshots, one stack per object
#[derive(Debug, Clone)]
pub struct UndoStack {
    capacity: usize,
    stacks: HashMap<ObjectId, VecDeque<UndoEntry>>,
}

impl UndoStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            stacks: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push a snapshot, evicting the oldest entry for that object at capacity
    pub fn push(&mut self, entry: UndoEntry) {
        let stack = self.stacks.entry(entry.object_id).or_default();
        if stack.len() >= self.capacity {
            stack.pop_front();
        }
        stack.push_back(entry);
    }

    pub fn pop(&mut self, id: ObjectId) -> Option<UndoEntry> {
        let stack = self.stacks.get_mut(&id)?;
        let entry = stack.pop_back();
        if stack.is_empty() {
            self.stacks.remove(&id);
        }
        entry
    }

    pub fn peek(&self, id: ObjectId) -> Option<&UndoEntry> {
        self.stacks.get(&id).and_then(|s| s.back())
    }

    pub fn depth(&self, id: ObjectId) -> usize {
        self.stacks.get(&id).map_or(0, |s| s.len())
    }

    pub fn clear(&mut self, id: ObjectId) {
        self.stacks.remove(&id);
    }

    pub fn clear_all(&mut self) {
        self.stacks.clear();
    }

    // ── Persistence ──────────────────────────────────────────

    /// Default location of the saved stack
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "ramp", "ramp")
            .map(|dirs| dirs.data_dir().join("undo_v1.json"))
    }

    pub fn to_json(&self) -> Result<String, FileError> {
        let doc = UndoDocument {
            version: UNDO_FILE_VERSION,
            stacks: self
                .stacks
                .iter()
                .map(|(id, s)| (*id, s.iter().copied().collect()))
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Parse a saved stack. Entries beyond `capacity` are dropped oldest first.
    pub fn from_json(json: &str, capacity: usize) -> Result<Self, FileError> {
        let doc: UndoDocument = serde_json::from_str(json)?;
        if doc.version != UNDO_FILE_VERSION {
            return Err(FileError::UnsupportedVersion(doc.version));
        }
        let mut stack = Self::new(capacity);
        for (id, entries) in doc.stacks {
            for entry in entries {
                stack.push(UndoEntry {
                    object_id: id,
                    ..entry
                });
            }
        }
        Ok(stack)
    }

    pub fn save(&self, path: &Path) -> Result<(), FileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path, capacity: usize) -> Result<Self, FileError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json, capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: ObjectId, heading: f64) -> UndoEntry {
        UndoEntry {
            object_id: id,
            position: LatLng::new(0.0, 0.0),
            heading,
        }
    }

    #[test]
    fn test_push_pop_lifo() {
        let mut undo = UndoStack::new(20);
        undo.push(entry(1, 10.0));
        undo.push(entry(1, 20.0));
        assert_eq!(undo.pop(1).unwrap().heading, 20.0);
        assert_eq!(undo.pop(1).unwrap().heading, 10.0);
        assert!(undo.pop(1).is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut undo = UndoStack::new(20);
        for i in 0..25 {
            undo.push(entry(1, i as f64));
        }
        assert_eq!(undo.depth(1), 20);
        let mut last = None;
        while let Some(e) = undo.pop(1) {
            last = Some(e);
        }
        assert_eq!(last.unwrap().heading, 5.0);
    }

    #[test]
    fn test_stacks_are_per_object() {
        let mut undo = UndoStack::new(2);
        undo.push(entry(1, 1.0));
        undo.push(entry(2, 2.0));
        undo.push(entry(2, 3.0));
        undo.push(entry(2, 4.0));
        assert_eq!(undo.depth(1), 1);
        assert_eq!(undo.depth(2), 2);
        undo.clear(2);
        assert_eq!(undo.depth(2), 0);
        assert_eq!(undo.peek(1).unwrap().heading, 1.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut undo = UndoStack::new(20);
        undo.push(entry(3, 10.0));
        undo.push(entry(3, 20.0));
        undo.push(entry(7, 30.0));
        let json = undo.to_json().unwrap();

        let mut back = UndoStack::from_json(&json, 20).unwrap();
        assert_eq!(back.depth(3), 2);
        assert_eq!(back.pop(3).unwrap().heading, 20.0);
        assert_eq!(back.pop(7).unwrap().heading, 30.0);
    }

    #[test]
    fn test_load_truncates_to_capacity() {
        let mut undo = UndoStack::new(5);
        for i in 0..5 {
            undo.push(entry(1, i as f64));
        }
        let back = UndoStack::from_json(&undo.to_json().unwrap(), 2).unwrap();
        assert_eq!(back.depth(1), 2);
        assert_eq!(back.peek(1).unwrap().heading, 4.0);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let json = r#"{"version": 9, "stacks": {}}"#;
        assert!(matches!(
            UndoStack::from_json(json, 20),
            Err(FileError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_save_load_file() {
        let path = std::env::temp_dir().join(format!("ramp-undo-{}.json", uuid::Uuid::new_v4()));
        let mut undo = UndoStack::new(20);
        undo.push(entry(1, 45.0));
        undo.save(&path).unwrap();
        let loaded = UndoStack::load(&path, 20).unwrap();
        assert_eq!(loaded.peek(1).unwrap().heading, 45.0);
        let _ = std::fs::remove_file(&path);
    }
}
