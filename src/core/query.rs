// src/core/query.rs

//! Read-only listings over a [`Storage`], sorted for display.

use crate::{
    core::storage::{Storage, StorageResult},
    models::{ConfigSheetSummary, EntityKind, EntitySummary},
};

use uuid::Uuid;

/// Predicates for [`list_config_sheets`]. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSheetFilter {
    /// Only sheets with no project.
    pub standalone_only: bool,
    pub project: Option<Uuid>,
    pub environment: Option<String>,
}

impl ConfigSheetFilter {
    fn matches(&self, project: Option<Uuid>, environment: Option<&str>) -> bool {
        if self.standalone_only && project.is_some() {
            return false;
        }
        if let Some(wanted) = self.project
            && project != Some(wanted)
        {
            return false;
        }
        if let Some(wanted) = self.environment.as_deref()
            && environment != Some(wanted)
        {
            return false;
        }
        true
    }
}

/// One row of [`project_environments`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentRow {
    pub environment: String,
    pub sheet_name: String,
    /// Whether a sheet with that name exists.
    pub sheet_exists: bool,
}

/// Lists every summary of `kind`, sorted by name and then by UUID.
pub fn list_summaries<S: Storage + ?Sized>(
    storage: &S,
    kind: EntityKind,
) -> StorageResult<Vec<(Uuid, EntitySummary)>> {
    let mut summaries = storage.list_summaries(kind)?;
    summaries.sort_by(|a, b| a.1.name.cmp(&b.1.name).then(a.0.cmp(&b.0)));
    Ok(summaries)
}

/// Lists config sheets matching `filter`, sorted by name.
///
/// Each sheet is loaded to read its project binding. Sheets that fail to load
/// are skipped with a warning.
pub fn list_config_sheets<S: Storage + ?Sized>(
    storage: &S,
    filter: &ConfigSheetFilter,
) -> StorageResult<Vec<ConfigSheetSummary>> {
    let summaries = list_summaries(storage, EntityKind::ConfigSheet)?;
    let mut rows = Vec::with_capacity(summaries.len());

    for (id, summary) in summaries {
        let sheet = match storage.load_config_sheet(&id.to_string()) {
            Ok(sheet) => sheet,
            Err(e) => {
                log::warn!("Skipping config sheet '{}': {}", summary.name, e);
                continue;
            }
        };
        if filter.matches(sheet.project, sheet.environment.as_deref()) {
            rows.push(ConfigSheetSummary {
                id,
                summary,
                project: sheet.project,
                environment: sheet.environment,
            });
        }
    }

    Ok(rows)
}

/// Lists a project's environments with the sheet each one maps to.
pub fn project_environments<S: Storage + ?Sized>(
    storage: &S,
    project_ref: &str,
) -> StorageResult<Vec<EnvironmentRow>> {
    let project = storage.load_project(project_ref)?;
    project
        .environments
        .keys()
        .map(|environment| {
            let sheet_name = project.sheet_name(environment);
            let sheet_exists = storage.entity_exists(EntityKind::ConfigSheet, &sheet_name)?;
            Ok(EnvironmentRow {
                environment: environment.clone(),
                sheet_name,
                sheet_exists,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory_storage::MemoryStorage;
    use crate::models::{ConfigSheet, Project, SchemaReference};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn save_sheet(
        storage: &MemoryStorage,
        name: &str,
        project: Option<Uuid>,
        environment: Option<&str>,
    ) -> ConfigSheet {
        let mut sheet =
            ConfigSheet::new(name, "", SchemaReference::reference("s"), BTreeMap::new());
        sheet.project = project;
        sheet.environment = environment.map(str::to_string);
        storage.save_config_sheet(&sheet).unwrap();
        sheet
    }

    fn names(rows: &[ConfigSheetSummary]) -> Vec<&str> {
        rows.iter().map(|r| r.summary.name.as_str()).collect()
    }

    #[test]
    fn test_list_summaries_is_sorted() {
        let storage = MemoryStorage::new();
        for name in ["zeta", "alpha", "mid"] {
            save_sheet(&storage, name, None, None);
        }
        let listed: Vec<String> = list_summaries(&storage, EntityKind::ConfigSheet)
            .unwrap()
            .into_iter()
            .map(|(_, s)| s.name)
            .collect();
        assert_eq!(listed, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_config_sheet_filters() {
        let storage = MemoryStorage::new();
        let shop = Uuid::new_v4();
        let blog = Uuid::new_v4();
        save_sheet(&storage, "shared", None, None);
        save_sheet(&storage, "shop-dev", Some(shop), Some("dev"));
        save_sheet(&storage, "shop-prod", Some(shop), Some("prod"));
        save_sheet(&storage, "blog-dev", Some(blog), Some("dev"));

        let all = list_config_sheets(&storage, &ConfigSheetFilter::default()).unwrap();
        assert_eq!(names(&all), vec!["blog-dev", "shared", "shop-dev", "shop-prod"]);

        let standalone = ConfigSheetFilter {
            standalone_only: true,
            ..Default::default()
        };
        assert_eq!(names(&list_config_sheets(&storage, &standalone).unwrap()), vec!["shared"]);

        let by_project = ConfigSheetFilter {
            project: Some(shop),
            ..Default::default()
        };
        assert_eq!(
            names(&list_config_sheets(&storage, &by_project).unwrap()),
            vec!["shop-dev", "shop-prod"]
        );

        let dev = ConfigSheetFilter {
            environment: Some("dev".to_string()),
            ..Default::default()
        };
        let rows = list_config_sheets(&storage, &dev).unwrap();
        assert_eq!(names(&rows), vec!["blog-dev", "shop-dev"]);
        assert_eq!(rows[1].project, Some(shop));
    }

    #[test]
    fn test_unloadable_sheets_are_skipped() {
        let storage = MemoryStorage::new();
        let broken = save_sheet(&storage, "broken", None, None);
        save_sheet(&storage, "fine", None, None);
        storage
            .write_record(EntityKind::ConfigSheet, broken.entity.id, &serde_json::json!(42))
            .unwrap();

        let rows = list_config_sheets(&storage, &ConfigSheetFilter::default()).unwrap();
        assert_eq!(names(&rows), vec!["fine"]);
    }

    #[test]
    fn test_project_environments_report_sheet_presence() {
        let storage = MemoryStorage::new();
        let mut project = Project::new("shop", "", "api");
        project.add_environment("dev");
        project.add_environment("prod");
        storage.save_project(&project).unwrap();
        save_sheet(&storage, "shop-dev", Some(project.entity.id), Some("dev"));

        let rows = project_environments(&storage, "shop").unwrap();
        assert_eq!(
            rows,
            vec![
                EnvironmentRow {
                    environment: "dev".to_string(),
                    sheet_name: "shop-dev".to_string(),
                    sheet_exists: true,
                },
                EnvironmentRow {
                    environment: "prod".to_string(),
                    sheet_name: "shop-prod".to_string(),
                    sheet_exists: false,
                },
            ]
        );
    }
}
