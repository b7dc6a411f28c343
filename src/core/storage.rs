// src/core/storage.rs

//! The storage seam every other layer talks through.
//!
//! [`Storage`] has a handful of required primitives (index and raw record I/O)
//! and provides the typed operations on top of them: per-kind load and save,
//! deletion, listing and the integrity pass. [`FileStorage`] is the on-disk
//! implementation; `MemoryStorage` lives in its own module.

use crate::{
    constants::{ENTITY_FILE_EXTENSION, INDEX_FILENAME, LOCAL_REF_PREFIX, REMOTE_REF_PREFIX},
    core::index_manager::{self, IndexError},
    models::{ConfigSheet, EntityIndex, EntityKind, EntitySummary, Project, Record, Schema},
};

use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

/// Represents errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A name or UUID did not resolve in the index of its kind.
    #[error("{kind} '{reference}' not found")]
    NotFound { kind: EntityKind, reference: String },

    /// A `remote://` reference was given. Only local entities can be loaded.
    #[error("'{reference}' is a remote reference and cannot be resolved locally")]
    RemoteReference { reference: String },

    /// The index knows the UUID but its record file is gone.
    #[error("{kind} {id} is indexed but its record is missing")]
    MissingRecord { kind: EntityKind, id: Uuid },

    /// A record exists but could not be decoded into its type.
    #[error("Failed to decode {kind} {id}: {source}")]
    Decode {
        kind: EntityKind,
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded for writing.
    #[error("Failed to encode {kind} {id}: {source}")]
    Encode {
        kind: EntityKind,
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    /// A filesystem error outside of the index helpers.
    #[error("Filesystem error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A convenience alias for storage results.
pub type StorageResult<T> = Result<T, StorageError>;

// --- Integrity report ---

/// One mismatch between an index and the records on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// A summary without a backing record. Loading this entity will fail.
    MissingFile {
        kind: EntityKind,
        id: Uuid,
        name: String,
    },
    /// A record that no summary points to. Harmless but unreachable by name.
    OrphanFile { kind: EntityKind, key: String },
    /// A name mapping whose UUID has no summary.
    DanglingName {
        kind: EntityKind,
        name: String,
        id: Uuid,
    },
}

impl IntegrityIssue {
    /// Whether this issue makes an indexed entity unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::OrphanFile { .. })
    }
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFile { kind, id, name } => {
                write!(f, "{kind} '{name}' ({id}) is indexed but has no record file")
            }
            Self::OrphanFile { kind, key } => {
                write!(f, "{kind} record '{key}' is not in the index")
            }
            Self::DanglingName { kind, name, id } => {
                write!(f, "{kind} name '{name}' points to unknown id {id}")
            }
        }
    }
}

/// Every problem found by [`Storage::validate`], across all kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// In the order found: schemas, then projects, then config sheets.
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    /// No issues at all, orphans included.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Whether any issue other than an orphan file was found.
    pub fn has_fatal(&self) -> bool {
        self.issues.iter().any(IntegrityIssue::is_fatal)
    }
}

/// Entity counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub schemas: usize,
    pub projects: usize,
    pub config_sheets: usize,
}

impl StorageStats {
    pub fn total(&self) -> usize {
        self.schemas + self.projects + self.config_sheets
    }
}

// --- The trait ---

/// An entity store with one index per [`EntityKind`].
///
/// Implementors supply index and raw record primitives. Records are exchanged
/// as JSON values keyed by UUID; the typed methods are provided.
pub trait Storage {
    /// Loads the index for `kind`. A store with no index yet returns an empty one.
    fn load_index(&self, kind: EntityKind) -> StorageResult<EntityIndex>;

    /// Replaces the index for `kind`.
    fn save_index(&self, kind: EntityKind, index: &EntityIndex) -> StorageResult<()>;

    /// Reads one raw record. `Ok(None)` if it does not exist.
    fn read_record(&self, kind: EntityKind, id: Uuid) -> StorageResult<Option<Value>>;

    /// Durably writes one raw record, replacing any previous version.
    fn write_record(&self, kind: EntityKind, id: Uuid, record: &Value) -> StorageResult<()>;

    /// Removes one raw record. Returns `false` if it was already gone.
    fn remove_record(&self, kind: EntityKind, id: Uuid) -> StorageResult<bool>;

    /// Lists the keys of every stored record of `kind`. Well-formed keys are
    /// UUID strings; anything else is reported as an orphan by [`Storage::validate`].
    fn list_record_keys(&self, kind: EntityKind) -> StorageResult<Vec<String>>;

    /// Resolves a name or UUID, optionally prefixed with `local://`, to a UUID.
    fn resolve_uuid(&self, kind: EntityKind, reference: &str) -> StorageResult<Uuid> {
        let name_or_uuid = strip_reference(reference)?;
        let index = self.load_index(kind)?;
        index_manager::resolve(&index, name_or_uuid).ok_or_else(|| StorageError::NotFound {
            kind,
            reference: reference.to_string(),
        })
    }

    fn load_schema(&self, reference: &str) -> StorageResult<Schema> {
        load_record(self, reference)
    }

    fn save_schema(&self, schema: &Schema) -> StorageResult<()> {
        save_record(self, schema)
    }

    fn load_project(&self, reference: &str) -> StorageResult<Project> {
        load_record(self, reference)
    }

    fn save_project(&self, project: &Project) -> StorageResult<()> {
        save_record(self, project)
    }

    fn load_config_sheet(&self, reference: &str) -> StorageResult<ConfigSheet> {
        load_record(self, reference)
    }

    fn save_config_sheet(&self, sheet: &ConfigSheet) -> StorageResult<()> {
        save_record(self, sheet)
    }

    /// Deletes an entity: its record first, then every index entry pointing at it.
    ///
    /// # Returns
    /// The UUID of the deleted entity.
    fn delete_entity(&self, kind: EntityKind, reference: &str) -> StorageResult<Uuid> {
        let id = self.resolve_uuid(kind, reference)?;
        if !self.remove_record(kind, id)? {
            log::warn!("Record for {} {} was already missing.", kind, id);
        }

        let mut index = self.load_index(kind)?;
        index_manager::remove_entity(&mut index, &id.to_string());
        self.save_index(kind, &index)?;

        log::info!("Deleted {} '{}' ({}).", kind, reference, id);
        Ok(id)
    }

    /// Returns every summary of `kind` with its UUID, in no particular order.
    fn list_summaries(&self, kind: EntityKind) -> StorageResult<Vec<(Uuid, EntitySummary)>> {
        Ok(index_manager::list_summaries(&self.load_index(kind)?))
    }

    fn entity_exists(&self, kind: EntityKind, reference: &str) -> StorageResult<bool> {
        match self.resolve_uuid(kind, reference) {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn summary(&self, kind: EntityKind, reference: &str) -> StorageResult<EntitySummary> {
        let name_or_uuid = strip_reference(reference)?;
        let index = self.load_index(kind)?;
        index_manager::get_summary(&index, name_or_uuid)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind,
                reference: reference.to_string(),
            })
    }

    fn stats(&self) -> StorageResult<StorageStats> {
        Ok(StorageStats {
            schemas: self.load_index(EntityKind::Schema)?.summaries.len(),
            projects: self.load_index(EntityKind::Project)?.summaries.len(),
            config_sheets: self.load_index(EntityKind::ConfigSheet)?.summaries.len(),
        })
    }

    /// Walks every kind and reports all index and record mismatches at once.
    fn validate(&self) -> StorageResult<IntegrityReport> {
        let mut report = IntegrityReport::default();

        for kind in EntityKind::ALL {
            let index = self.load_index(kind)?;
            let keys = self.list_record_keys(kind)?;
            let on_disk: HashSet<Uuid> = keys
                .iter()
                .filter_map(|key| Uuid::parse_str(key).ok())
                .collect();

            let mut missing: Vec<(&Uuid, &EntitySummary)> = index
                .summaries
                .iter()
                .filter(|(id, _)| !on_disk.contains(id))
                .collect();
            missing.sort_by(|a, b| a.1.name.cmp(&b.1.name).then(a.0.cmp(b.0)));
            for (id, summary) in missing {
                report.issues.push(IntegrityIssue::MissingFile {
                    kind,
                    id: *id,
                    name: summary.name.clone(),
                });
            }

            let mut orphans: Vec<&String> = keys
                .iter()
                .filter(|key| {
                    Uuid::parse_str(key).map_or(true, |id| !index.summaries.contains_key(&id))
                })
                .collect();
            orphans.sort();
            for key in orphans {
                report.issues.push(IntegrityIssue::OrphanFile {
                    kind,
                    key: key.clone(),
                });
            }

            for (name, id) in index_manager::find_dangling_names(&index) {
                report
                    .issues
                    .push(IntegrityIssue::DanglingName { kind, name, id });
            }
        }

        log::debug!("Integrity pass found {} issue(s).", report.issues.len());
        Ok(report)
    }
}

/// Strips `local://`; rejects `remote://`.
pub fn strip_reference(reference: &str) -> StorageResult<&str> {
    if reference.starts_with(REMOTE_REF_PREFIX) {
        return Err(StorageError::RemoteReference {
            reference: reference.to_string(),
        });
    }
    Ok(reference
        .strip_prefix(LOCAL_REF_PREFIX)
        .unwrap_or(reference))
}

/// Loads and decodes any record type by name or UUID.
pub fn load_record<R: Record, S: Storage + ?Sized>(
    storage: &S,
    reference: &str,
) -> StorageResult<R> {
    let kind = R::KIND;
    let id = storage.resolve_uuid(kind, reference)?;
    let raw = storage
        .read_record(kind, id)?
        .ok_or(StorageError::MissingRecord { kind, id })?;
    log::trace!("Loaded {} {}.", kind, id);
    serde_json::from_value(raw).map_err(|source| StorageError::Decode { kind, id, source })
}

/// Saves any record type: the record is written durably first, then the index
/// is updated and persisted. A crash in between leaves an orphan record, never
/// an index entry without a file.
pub fn save_record<R: Record, S: Storage + ?Sized>(storage: &S, record: &R) -> StorageResult<()> {
    let kind = R::KIND;
    let entity = record.entity();
    let raw =
        serde_json::to_value(record).map_err(|source| StorageError::Encode {
            kind,
            id: entity.id,
            source,
        })?;
    storage.write_record(kind, entity.id, &raw)?;

    let mut index = storage.load_index(kind)?;
    index_manager::add_entity(&mut index, entity);
    storage.save_index(kind, &index)?;

    log::debug!("Saved {} '{}' ({}).", kind, entity.name, entity.id);
    Ok(())
}

// --- File storage ---

/// Stores each kind in its own directory as `<uuid>.json` files next to an `index.json`.
#[derive(Debug)]
pub struct FileStorage {
    base_dir: PathBuf,
    index_cache: RefCell<HashMap<EntityKind, EntityIndex>>,
}

impl FileStorage {
    /// Opens a store rooted at `base_dir`, creating the kind directories if needed.
    pub fn open(base_dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_dir = base_dir.into();
        for kind in EntityKind::ALL {
            let dir = base_dir.join(kind.dir_name());
            fs::create_dir_all(&dir).map_err(|source| StorageError::Io { path: dir, source })?;
        }
        log::debug!("Opened file storage at '{}'.", base_dir.display());
        Ok(Self {
            base_dir,
            index_cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn kind_dir(&self, kind: EntityKind) -> PathBuf {
        self.base_dir.join(kind.dir_name())
    }

    pub fn index_path(&self, kind: EntityKind) -> PathBuf {
        self.kind_dir(kind).join(INDEX_FILENAME)
    }

    pub fn record_path(&self, kind: EntityKind, id: Uuid) -> PathBuf {
        self.kind_dir(kind)
            .join(format!("{}.{}", id, ENTITY_FILE_EXTENSION))
    }

    fn invalidate(&self, kind: EntityKind) {
        if self.index_cache.borrow_mut().remove(&kind).is_some() {
            log::trace!("Dropped cached {} index.", kind);
        }
    }
}

impl Storage for FileStorage {
    fn load_index(&self, kind: EntityKind) -> StorageResult<EntityIndex> {
        if let Some(index) = self.index_cache.borrow().get(&kind) {
            return Ok(index.clone());
        }
        let index = index_manager::load_index(&self.index_path(kind))?;
        self.index_cache.borrow_mut().insert(kind, index.clone());
        Ok(index)
    }

    fn save_index(&self, kind: EntityKind, index: &EntityIndex) -> StorageResult<()> {
        self.invalidate(kind);
        index_manager::save_index(&self.index_path(kind), index)?;
        Ok(())
    }

    fn read_record(&self, kind: EntityKind, id: Uuid) -> StorageResult<Option<Value>> {
        match index_manager::read_json(&self.record_path(kind, id)) {
            Ok(value) => Ok(Some(value)),
            Err(IndexError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(IndexError::Json { source, .. }) => Err(StorageError::Decode { kind, id, source }),
            Err(e) => Err(e.into()),
        }
    }

    fn write_record(&self, kind: EntityKind, id: Uuid, record: &Value) -> StorageResult<()> {
        index_manager::write_json_atomic(&self.record_path(kind, id), record)?;
        Ok(())
    }

    fn remove_record(&self, kind: EntityKind, id: Uuid) -> StorageResult<bool> {
        let path = self.record_path(kind, id);
        let removed = match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        // The index is about to change too; never serve the old one.
        self.invalidate(kind);
        Ok(removed)
    }

    fn list_record_keys(&self, kind: EntityKind) -> StorageResult<Vec<String>> {
        let dir = self.kind_dir(kind);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StorageError::Io {
                path: dir.clone(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy();
            if file_name == INDEX_FILENAME || file_name.starts_with('.') {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(ENTITY_FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }
}
