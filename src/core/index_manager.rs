// src/core/index_manager.rs

//! In-memory operations on an [`EntityIndex`] plus the JSON file helpers used to
//! persist indices and entity records.
//!
//! The index functions are pure: they never touch the filesystem. Persisting an
//! index is a separate, explicit step ([`save_index`]) so that callers control the
//! ordering of writes.

use crate::models::{Entity, EntityIndex, EntitySummary};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

/// Represents errors that can occur while reading or writing index and record files.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A filesystem I/O error occurred on a specific path.
    #[error("Filesystem error on '{path}': {source}")]
    Io {
        /// The file or directory being accessed.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A file could not be parsed or serialized as JSON.
    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        /// The file being read or written.
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The temporary file could not be renamed over its target.
    #[error("Failed to replace '{path}': {source}")]
    Persist {
        /// The target path of the atomic write.
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

type IndexResult<T> = Result<T, IndexError>;

// --- In-memory index operations ---

/// Adds or refreshes an entity in the index.
///
/// The name mapping is written unconditionally: if another entity already uses
/// the same name, the name now points at this one (last writer wins).
pub fn add_entity(index: &mut EntityIndex, entity: &Entity) {
    index.name_to_id.insert(entity.name.clone(), entity.id);
    index.summaries.insert(entity.id, entity.summary());
}

/// Removes an entity, given by name or UUID, and every name that maps to it.
///
/// # Returns
/// The UUID that was removed, or `None` if nothing matched.
pub fn remove_entity(index: &mut EntityIndex, name_or_uuid: &str) -> Option<Uuid> {
    let uuid = resolve(index, name_or_uuid)?;
    index.summaries.remove(&uuid);
    // Also drops stale aliases left behind by renames.
    index.name_to_id.retain(|_, id| *id != uuid);
    Some(uuid)
}

/// Resolves a name or UUID string to a UUID.
///
/// A string that parses as a UUID *and* has a summary is returned as-is, so
/// resolving a resolved value is idempotent. Otherwise the string is looked up
/// as a name.
pub fn resolve(index: &EntityIndex, name_or_uuid: &str) -> Option<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(name_or_uuid)
        && index.summaries.contains_key(&uuid)
    {
        return Some(uuid);
    }
    index.name_to_id.get(name_or_uuid).copied()
}

/// Gets the summary for an entity by name or UUID.
pub fn get_summary<'a>(index: &'a EntityIndex, name_or_uuid: &str) -> Option<&'a EntitySummary> {
    resolve(index, name_or_uuid).and_then(|uuid| index.summaries.get(&uuid))
}

/// Returns every summary with its UUID. The order is unspecified.
pub fn list_summaries(index: &EntityIndex) -> Vec<(Uuid, EntitySummary)> {
    index
        .summaries
        .iter()
        .map(|(uuid, summary)| (*uuid, summary.clone()))
        .collect()
}

/// Finds name mappings whose UUID has no summary.
pub fn find_dangling_names(index: &EntityIndex) -> Vec<(String, Uuid)> {
    let mut dangling: Vec<(String, Uuid)> = index
        .name_to_id
        .iter()
        .filter(|(_, uuid)| !index.summaries.contains_key(uuid))
        .map(|(name, uuid)| (name.clone(), *uuid))
        .collect();
    dangling.sort();
    dangling
}

/// Removes a single name mapping if it still points at `uuid`.
///
/// # Returns
/// `true` if the alias existed and was removed.
pub fn remove_alias(index: &mut EntityIndex, name: &str, uuid: Uuid) -> bool {
    if index.name_to_id.get(name) == Some(&uuid) {
        index.name_to_id.remove(name);
        return true;
    }
    false
}

// --- Persistence ---

/// Loads an index file. A missing file is an empty index.
pub fn load_index(path: &Path) -> IndexResult<EntityIndex> {
    match read_json(path) {
        Ok(index) => Ok(index),
        Err(IndexError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            log::debug!("No index at '{}'. Starting empty.", path.display());
            Ok(EntityIndex::default())
        }
        Err(e) => Err(e),
    }
}

/// Saves an index file atomically.
pub fn save_index(path: &Path, index: &EntityIndex) -> IndexResult<()> {
    write_json_atomic(path, index)?;
    log::debug!(
        "Saved index '{}' ({} entries).",
        path.display(),
        index.summaries.len()
    );
    Ok(())
}

/// Reads and deserializes a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> IndexResult<T> {
    let bytes = fs::read(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| IndexError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serializes `value` as pretty JSON and writes it to `path` atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> IndexResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| IndexError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_bytes_atomic(path, &bytes)
}

/// Writes `bytes` to `path` atomically.
///
/// The bytes go to a temporary file in the same directory, are synced to disk,
/// and the temporary file is then renamed over the target. A reader therefore
/// sees either the old file or the complete new one.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> IndexResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|source| IndexError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let io_err = |source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut temp = NamedTempFile::new_in(dir).map_err(io_err)?;
    temp.write_all(bytes).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|source| IndexError::Persist {
        path: path.to_path_buf(),
        source,
    })?;

    log::trace!("Wrote {} bytes to '{}'.", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn index_with(names: &[&str]) -> (EntityIndex, Vec<Entity>) {
        let mut index = EntityIndex::default();
        let entities: Vec<Entity> = names.iter().map(|n| Entity::new(*n, "")).collect();
        for entity in &entities {
            add_entity(&mut index, entity);
        }
        (index, entities)
    }

    #[test]
    fn test_resolve_by_name_and_uuid() {
        let (index, entities) = index_with(&["base", "api"]);
        let api = &entities[1];
        assert_eq!(resolve(&index, "api"), Some(api.id));
        assert_eq!(resolve(&index, &api.id.to_string()), Some(api.id));
        assert_eq!(resolve(&index, "missing"), None);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let (index, _) = index_with(&["base"]);
        let first = resolve(&index, "base").unwrap();
        let second = resolve(&index, &first.to_string()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_uuid_string_is_not_found() {
        let (index, _) = index_with(&["base"]);
        assert_eq!(resolve(&index, &Uuid::new_v4().to_string()), None);
    }

    #[test]
    fn test_duplicate_name_last_writer_wins() {
        let (index, entities) = index_with(&["dup", "dup"]);
        assert_eq!(resolve(&index, "dup"), Some(entities[1].id));
        // Both summaries are still present.
        assert_eq!(index.summaries.len(), 2);
    }

    #[test]
    fn test_remove_entity_drops_all_aliases() {
        let (mut index, mut entities) = index_with(&["old-name"]);
        let entity = &mut entities[0];
        entity.name = "new-name".to_string();
        add_entity(&mut index, entity);
        assert_eq!(index.name_to_id.len(), 2);

        let removed = remove_entity(&mut index, "new-name");
        assert_eq!(removed, Some(entity.id));
        assert!(index.name_to_id.is_empty());
        assert!(index.summaries.is_empty());
        assert_eq!(resolve(&index, "old-name"), None);
    }

    #[test]
    fn test_remove_alias_only_when_pointing_at_uuid() {
        let (mut index, entities) = index_with(&["a"]);
        assert!(!remove_alias(&mut index, "a", Uuid::new_v4()));
        assert!(remove_alias(&mut index, "a", entities[0].id));
        assert!(index.name_to_id.is_empty());
    }

    #[test]
    fn test_find_dangling_names() {
        let (mut index, _) = index_with(&["ok"]);
        let ghost = Uuid::new_v4();
        index.name_to_id.insert("ghost".to_string(), ghost);
        assert_eq!(find_dangling_names(&index), vec![("ghost".to_string(), ghost)]);
    }

    #[test]
    fn test_index_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        assert_eq!(load_index(&path).unwrap(), EntityIndex::default());

        let (index, _) = index_with(&["base", "api"]);
        save_index(&path, &index).unwrap();
        assert_eq!(load_index(&path).unwrap(), index);

        let raw: serde_json::Value = read_json(&path).unwrap();
        assert!(raw.get("name_to_id").is_some());
        assert!(raw.get("summaries").is_some());
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("record.json");
        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4]).unwrap();

        let files: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .collect();
        assert_eq!(files.len(), 1);
        let back: Vec<i32> = read_json(&path).unwrap();
        assert_eq!(back, vec![4]);
    }

    #[test]
    fn test_corrupt_index_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_index(&path), Err(IndexError::Json { .. })));
    }
}
