// src/core/entity_manager.rs

//! Creation and mutation helpers layered on a [`Storage`].
//!
//! The index itself lets a later entity take over a name. Everything that creates
//! or renames through this module refuses a name already used by another entity
//! of the same kind.

use crate::{
    constants::LOCAL_REF_PREFIX,
    core::{
        index_manager,
        storage::{Storage, StorageError, load_record, save_record},
    },
    models::{
        ConfigSheet, EntityKind, Project, Record, Schema, SchemaReference, Variable,
    },
};

use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Errors from creating, updating or renaming entities.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("{kind} name cannot be empty")]
    EmptyName { kind: EntityKind },

    /// Another entity of the same kind holds the name.
    #[error("A {kind} named '{name}' already exists")]
    NameAlreadyExists { kind: EntityKind, name: String },

    #[error("Config sheet '{sheet}' must reference a schema or define inline variables")]
    InvalidSchemaReference { sheet: String },

    #[error("Project '{project}' has no environment '{environment}'")]
    UnknownEnvironment { project: String, environment: String },

    #[error("Variable name cannot be empty")]
    EmptyKey,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ManagerResult<T> = Result<T, ManagerError>;

/// Write operations that keep names unique and references consistent.
pub struct EntityManager<'a, S: Storage + ?Sized> {
    storage: &'a S,
}

impl<'a, S: Storage + ?Sized> EntityManager<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &'a S {
        self.storage
    }

    // --- Creation ---

    pub fn create_schema(
        &self,
        name: &str,
        description: &str,
        variables: Vec<Variable>,
        extends: Vec<String>,
    ) -> ManagerResult<Schema> {
        self.ensure_name_free(EntityKind::Schema, name, None)?;
        let schema = Schema::new(name, description, variables, extends);
        save_record(self.storage, &schema)?;
        log::info!("Created schema '{}' ({}).", name, schema.entity.id);
        Ok(schema)
    }

    /// Creates a project. The schema must already exist.
    pub fn create_project(
        &self,
        name: &str,
        description: &str,
        schema_ref: &str,
    ) -> ManagerResult<Project> {
        self.ensure_name_free(EntityKind::Project, name, None)?;
        self.storage.resolve_uuid(EntityKind::Schema, schema_ref)?;
        let project = Project::new(name, description, schema_ref);
        save_record(self.storage, &project)?;
        log::info!("Created project '{}' ({}).", name, project.entity.id);
        Ok(project)
    }

    pub fn create_config_sheet(
        &self,
        name: &str,
        description: &str,
        schema: SchemaReference,
        values: BTreeMap<String, String>,
    ) -> ManagerResult<ConfigSheet> {
        self.ensure_name_free(EntityKind::ConfigSheet, name, None)?;
        if !schema.is_valid() {
            return Err(ManagerError::InvalidSchemaReference {
                sheet: name.to_string(),
            });
        }
        let sheet = ConfigSheet::new(name, description, schema, values);
        save_record(self.storage, &sheet)?;
        log::info!("Created config sheet '{}' ({}).", name, sheet.entity.id);
        Ok(sheet)
    }

    /// Creates the sheet backing `environment` of a project.
    ///
    /// The sheet is named `{project}-{environment}`, bound to the project and the
    /// environment, and references the project's schema. The environment is
    /// added to the project if it was not there yet.
    pub fn create_project_sheet(
        &self,
        project_ref: &str,
        environment: &str,
        values: BTreeMap<String, String>,
    ) -> ManagerResult<ConfigSheet> {
        let mut project: Project = load_record(self.storage, project_ref)?;
        let name = project.sheet_name(environment);
        self.ensure_name_free(EntityKind::ConfigSheet, &name, None)?;

        let mut sheet = ConfigSheet::new(
            name.as_str(),
            format!("{} environment of {}", environment, project.entity.name),
            SchemaReference::reference(project.schema.as_str()),
            values,
        );
        sheet.project = Some(project.entity.id);
        sheet.environment = Some(environment.to_string());
        save_record(self.storage, &sheet)?;

        if !project.environments.contains_key(environment) {
            project.add_environment(environment);
            save_record(self.storage, &project)?;
        }

        log::info!("Created config sheet '{}' for project '{}'.", name, project.entity.name);
        Ok(sheet)
    }

    // --- Updates ---

    /// Loads a record, applies `apply`, refreshes `updated_at` and saves it.
    /// Nothing is written if `apply` fails.
    pub fn update<R, F>(&self, reference: &str, apply: F) -> ManagerResult<R>
    where
        R: Record,
        F: FnOnce(&mut R) -> ManagerResult<()>,
    {
        let mut record: R = load_record(self.storage, reference)?;
        apply(&mut record)?;
        record.entity_mut().touch();
        save_record(self.storage, &record)?;
        Ok(record)
    }

    pub fn update_schema<F>(&self, reference: &str, apply: F) -> ManagerResult<Schema>
    where
        F: FnOnce(&mut Schema) -> ManagerResult<()>,
    {
        self.update(reference, apply)
    }

    pub fn update_project<F>(&self, reference: &str, apply: F) -> ManagerResult<Project>
    where
        F: FnOnce(&mut Project) -> ManagerResult<()>,
    {
        self.update(reference, apply)
    }

    pub fn update_config_sheet<F>(&self, reference: &str, apply: F) -> ManagerResult<ConfigSheet>
    where
        F: FnOnce(&mut ConfigSheet) -> ManagerResult<()>,
    {
        self.update(reference, apply)
    }

    /// Renames any entity. The old name stops resolving.
    ///
    /// References held by name are moved to the new name: `extends` entries,
    /// project schemas and sheet schema references. Renaming a project also
    /// renames its `{project}-{environment}` sheets.
    pub fn rename(
        &self,
        kind: EntityKind,
        reference: &str,
        new_name: &str,
    ) -> ManagerResult<Uuid> {
        match kind {
            EntityKind::Schema => {
                let (id, old_name) = self.rename_record::<Schema>(reference, new_name)?;
                self.retarget_schema_references(&old_name, new_name)?;
                Ok(id)
            }
            EntityKind::Project => self.rename_project(reference, new_name),
            EntityKind::ConfigSheet => {
                let (id, old_name) = self.rename_record::<ConfigSheet>(reference, new_name)?;
                self.retarget_sheet_references(&old_name, new_name)?;
                Ok(id)
            }
        }
    }

    /// Renames a record and drops its old alias.
    ///
    /// # Returns
    /// The record's UUID and its previous name.
    fn rename_record<R: Record>(
        &self,
        reference: &str,
        new_name: &str,
    ) -> ManagerResult<(Uuid, String)> {
        let mut record: R = load_record(self.storage, reference)?;
        let id = record.entity().id;
        let old_name = record.entity().name.clone();
        self.ensure_name_free(R::KIND, new_name, Some(id))?;

        let entity = record.entity_mut();
        entity.name = new_name.to_string();
        entity.touch();
        save_record(self.storage, &record)?;

        let mut index = self.storage.load_index(R::KIND)?;
        if old_name != new_name && index_manager::remove_alias(&mut index, &old_name, id) {
            self.storage.save_index(R::KIND, &index)?;
        }

        log::info!("Renamed {} '{}' to '{}'.", R::KIND, old_name, new_name);
        Ok((id, old_name))
    }

    /// Renames a project together with the environment sheets bound to it.
    /// Every target name is checked before anything is written.
    fn rename_project(&self, reference: &str, new_name: &str) -> ManagerResult<Uuid> {
        let project: Project = load_record(self.storage, reference)?;
        let id = project.entity.id;
        self.ensure_name_free(EntityKind::Project, new_name, Some(id))?;

        let mut sheets = Vec::new();
        for environment in project.environments.keys() {
            let old_sheet = project.sheet_name(environment);
            let Ok(sheet_id) = self.storage.resolve_uuid(EntityKind::ConfigSheet, &old_sheet)
            else {
                continue;
            };
            let sheet: ConfigSheet = load_record(self.storage, &sheet_id.to_string())?;
            if sheet.project != Some(id) {
                continue;
            }
            let new_sheet = format!("{new_name}-{environment}");
            self.ensure_name_free(EntityKind::ConfigSheet, &new_sheet, Some(sheet_id))?;
            sheets.push((sheet_id, new_sheet));
        }

        self.rename_record::<Project>(&id.to_string(), new_name)?;
        for (sheet_id, new_sheet) in sheets {
            let (_, old_sheet) =
                self.rename_record::<ConfigSheet>(&sheet_id.to_string(), &new_sheet)?;
            self.retarget_sheet_references(&old_sheet, &new_sheet)?;
        }
        Ok(id)
    }

    /// Points schema `extends`, project schemas and sheet schema references
    /// at a renamed schema.
    fn retarget_schema_references(&self, old_name: &str, new_name: &str) -> ManagerResult<()> {
        if old_name == new_name {
            return Ok(());
        }
        self.rewrite_all::<Schema, _>(|schema| {
            retarget_list(&mut schema.extends, old_name, new_name)
        })?;
        self.rewrite_all::<Project, _>(|project| {
            retarget(&mut project.schema, old_name, new_name)
        })?;
        self.rewrite_all::<ConfigSheet, _>(|sheet| match &mut sheet.schema {
            SchemaReference::Reference { reference } => retarget(reference, old_name, new_name),
            SchemaReference::Inline { .. } => false,
        })
    }

    /// Points sheet `extends` entries at a renamed sheet.
    fn retarget_sheet_references(&self, old_name: &str, new_name: &str) -> ManagerResult<()> {
        if old_name == new_name {
            return Ok(());
        }
        self.rewrite_all::<ConfigSheet, _>(|sheet| {
            retarget_list(&mut sheet.extends, old_name, new_name)
        })
    }

    /// Applies `rewrite` to every record of a kind and saves those it changed.
    /// Records that fail to load are skipped with a warning.
    fn rewrite_all<R, F>(&self, mut rewrite: F) -> ManagerResult<()>
    where
        R: Record,
        F: FnMut(&mut R) -> bool,
    {
        for (id, summary) in self.storage.list_summaries(R::KIND)? {
            let mut record: R = match load_record(self.storage, &id.to_string()) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Not updating references in {} '{}': {}", R::KIND, summary.name, e);
                    continue;
                }
            };
            if rewrite(&mut record) {
                record.entity_mut().touch();
                save_record(self.storage, &record)?;
                log::debug!("Updated references in {} '{}'.", R::KIND, summary.name);
            }
        }
        Ok(())
    }

    pub fn set_value(&self, sheet_ref: &str, key: &str, value: &str) -> ManagerResult<ConfigSheet> {
        if key.trim().is_empty() {
            return Err(ManagerError::EmptyKey);
        }
        self.update_config_sheet(sheet_ref, |sheet| {
            sheet.values.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    /// Removes a value. Removing a key that is not set is not an error.
    pub fn unset_value(&self, sheet_ref: &str, key: &str) -> ManagerResult<ConfigSheet> {
        self.update_config_sheet(sheet_ref, |sheet| {
            if sheet.values.remove(key).is_none() {
                log::debug!("'{}' was not set on '{}'.", key, sheet.entity.name);
            }
            Ok(())
        })
    }

    pub fn add_environment(&self, project_ref: &str, environment: &str) -> ManagerResult<Project> {
        if environment.trim().is_empty() {
            return Err(ManagerError::EmptyName {
                kind: EntityKind::Project,
            });
        }
        self.update_project(project_ref, |project| {
            project.add_environment(environment);
            Ok(())
        })
    }

    pub fn remove_environment(
        &self,
        project_ref: &str,
        environment: &str,
    ) -> ManagerResult<Project> {
        self.update_project(project_ref, |project| {
            if project.remove_environment(environment) {
                Ok(())
            } else {
                Err(ManagerError::UnknownEnvironment {
                    project: project.entity.name.clone(),
                    environment: environment.to_string(),
                })
            }
        })
    }

    /// The sheet name for a project environment, whether or not the sheet exists.
    pub fn project_sheet_name(
        &self,
        project_ref: &str,
        environment: &str,
    ) -> ManagerResult<String> {
        let project: Project = load_record(self.storage, project_ref)?;
        Ok(project.sheet_name(environment))
    }

    /// Deletes an entity. References to it are left as they are and show up
    /// as resolution errors.
    pub fn delete(&self, kind: EntityKind, reference: &str) -> ManagerResult<Uuid> {
        Ok(self.storage.delete_entity(kind, reference)?)
    }

    /// Fails if `name` is empty or taken by an entity other than `owner`.
    fn ensure_name_free(
        &self,
        kind: EntityKind,
        name: &str,
        owner: Option<Uuid>,
    ) -> ManagerResult<()> {
        if name.trim().is_empty() {
            return Err(ManagerError::EmptyName { kind });
        }
        let index = self.storage.load_index(kind)?;
        match index.name_to_id.get(name) {
            Some(existing)
                if Some(*existing) != owner && index.summaries.contains_key(existing) =>
            {
                Err(ManagerError::NameAlreadyExists {
                    kind,
                    name: name.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Replaces a by-name reference to `old_name`, keeping a `local://` prefix.
/// References by UUID are left alone. Returns whether anything changed.
fn retarget(reference: &mut String, old_name: &str, new_name: &str) -> bool {
    let (prefix, name) = match reference.strip_prefix(LOCAL_REF_PREFIX) {
        Some(name) => (LOCAL_REF_PREFIX, name),
        None => ("", reference.as_str()),
    };
    if name != old_name {
        return false;
    }
    *reference = format!("{prefix}{new_name}");
    true
}

fn retarget_list(references: &mut [String], old_name: &str, new_name: &str) -> bool {
    references
        .iter_mut()
        .fold(false, |changed, reference| retarget(reference, old_name, new_name) | changed)
}
