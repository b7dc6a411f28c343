// tests/file_store.rs

// End-to-end checks of the on-disk store: everything goes through a real
// directory and a freshly opened `FileStorage` reads it back.

use ee::{
    FileStorage, Storage,
    core::storage::{IntegrityIssue, StorageError},
    models::{ConfigSheet, EntityKind, Project, Schema, SchemaReference, Variable},
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_every_kind_survives_a_reopen() {
    let dir = TempDir::new().unwrap();
    let schema = Schema::new(
        "web",
        "web services",
        vec![
            Variable::new("PORT", "number").with_default("8080"),
            Variable::new("TOKEN", "string").required().with_title("API token"),
        ],
        vec![],
    );
    let mut project = Project::new("shop", "", "web");
    project.add_environment("dev");
    let mut sheet = ConfigSheet::new(
        "shop-dev",
        "",
        SchemaReference::reference("web"),
        values(&[("TOKEN", "abc")]),
    );
    sheet.project = Some(project.entity.id);
    sheet.environment = Some("dev".to_string());

    {
        let storage = FileStorage::open(dir.path()).unwrap();
        storage.save_schema(&schema).unwrap();
        storage.save_project(&project).unwrap();
        storage.save_config_sheet(&sheet).unwrap();
    }

    let storage = FileStorage::open(dir.path()).unwrap();
    assert_eq!(storage.load_schema("web").unwrap(), schema);
    assert_eq!(storage.load_project(&project.entity.id.to_string()).unwrap(), project);
    assert_eq!(storage.load_config_sheet("local://shop-dev").unwrap(), sheet);
    assert!(storage.record_path(EntityKind::Schema, schema.entity.id).is_file());
    assert!(storage.index_path(EntityKind::ConfigSheet).is_file());
}

#[test]
fn test_name_and_uuid_resolve_to_the_same_record() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::open(dir.path()).unwrap();
    let schema = Schema::new("base", "", vec![], vec![]);
    storage.save_schema(&schema).unwrap();

    let by_name = storage.resolve_uuid(EntityKind::Schema, "base").unwrap();
    let by_id = storage
        .resolve_uuid(EntityKind::Schema, &schema.entity.id.to_string())
        .unwrap();
    assert_eq!(by_name, schema.entity.id);
    assert_eq!(by_id, by_name);
    assert_eq!(storage.resolve_uuid(EntityKind::Schema, "base").unwrap(), by_name);
}

#[test]
fn test_delete_removes_the_file_and_every_alias() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::open(dir.path()).unwrap();
    let schema = Schema::new("gone", "", vec![], vec![]);
    storage.save_schema(&schema).unwrap();
    let path = storage.record_path(EntityKind::Schema, schema.entity.id);

    storage.delete_entity(EntityKind::Schema, "gone").unwrap();

    assert!(!path.exists());
    for reference in ["gone".to_string(), schema.entity.id.to_string()] {
        let err = storage.load_schema(&reference).unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }), "{reference}: {err}");
    }
    assert!(storage.validate().unwrap().is_clean());
}

#[test]
fn test_remote_references_are_not_resolved_locally() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::open(dir.path()).unwrap();
    let err = storage.load_schema("remote://team/base").unwrap_err();
    assert!(matches!(err, StorageError::RemoteReference { .. }));
}

#[test]
fn test_validate_reports_missing_and_orphan_files() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::open(dir.path()).unwrap();
    let kept = Schema::new("kept", "", vec![], vec![]);
    let lost = Schema::new("lost", "", vec![], vec![]);
    storage.save_schema(&kept).unwrap();
    storage.save_schema(&lost).unwrap();

    fs::remove_file(storage.record_path(EntityKind::Schema, lost.entity.id)).unwrap();
    let stray = uuid::Uuid::new_v4();
    fs::write(storage.record_path(EntityKind::ConfigSheet, stray), "{}").unwrap();

    let report = storage.validate().unwrap();
    assert_eq!(
        report.issues,
        vec![
            IntegrityIssue::MissingFile {
                kind: EntityKind::Schema,
                id: lost.entity.id,
                name: "lost".to_string(),
            },
            IntegrityIssue::OrphanFile {
                kind: EntityKind::ConfigSheet,
                key: stray.to_string(),
            },
        ]
    );
    assert!(report.has_fatal());
    assert!(storage.load_schema("lost").is_err());
    assert!(storage.load_schema("kept").is_ok());
}

#[test]
fn test_stats_count_every_kind() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::open(dir.path()).unwrap();
    storage
        .save_schema(&Schema::new("s", "", vec![], vec![]))
        .unwrap();
    storage.save_project(&Project::new("p", "", "s")).unwrap();
    for name in ["a", "b"] {
        storage
            .save_config_sheet(&ConfigSheet::new(
                name,
                "",
                SchemaReference::reference("s"),
                BTreeMap::new(),
            ))
            .unwrap();
    }

    let stats = storage.stats().unwrap();
    assert_eq!((stats.schemas, stats.projects, stats.config_sheets), (1, 1, 2));
    assert_eq!(stats.total(), 4);
}
