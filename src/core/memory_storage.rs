// src/core/memory_storage.rs

//! A [`Storage`] kept entirely in memory. Used by tests and by callers that want
//! to resolve or validate entities without touching a base directory.

use crate::{
    core::storage::{Storage, StorageResult},
    models::{EntityIndex, EntityKind},
};

use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// A [`Storage`] that keeps indexes and records in memory. Records still go
/// through JSON, so serialization problems surface as they would on disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    indices: RefCell<HashMap<EntityKind, EntityIndex>>,
    records: RefCell<BTreeMap<(EntityKind, Uuid), Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of raw records currently held, across all kinds.
    pub fn record_count(&self) -> usize {
        self.records.borrow().len()
    }
}

impl Storage for MemoryStorage {
    fn load_index(&self, kind: EntityKind) -> StorageResult<EntityIndex> {
        Ok(self
            .indices
            .borrow()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    fn save_index(&self, kind: EntityKind, index: &EntityIndex) -> StorageResult<()> {
        self.indices.borrow_mut().insert(kind, index.clone());
        Ok(())
    }

    fn read_record(&self, kind: EntityKind, id: Uuid) -> StorageResult<Option<Value>> {
        Ok(self.records.borrow().get(&(kind, id)).cloned())
    }

    fn write_record(&self, kind: EntityKind, id: Uuid, record: &Value) -> StorageResult<()> {
        self.records.borrow_mut().insert((kind, id), record.clone());
        Ok(())
    }

    fn remove_record(&self, kind: EntityKind, id: Uuid) -> StorageResult<bool> {
        Ok(self.records.borrow_mut().remove(&(kind, id)).is_some())
    }

    fn list_record_keys(&self, kind: EntityKind) -> StorageResult<Vec<String>> {
        Ok(self
            .records
            .borrow()
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.to_string())
            .collect())
    }
}
