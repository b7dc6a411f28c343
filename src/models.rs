// src/models.rs

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

use crate::constants::{PROJECTS_DIR, SCHEMAS_DIR, SHEETS_DIR};

// --- ENTITY KINDS ---

/// The three kinds of entity the store manages. Each kind has its own
/// directory and its own `index.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Variable schemas.
    Schema,
    /// Projects (a schema plus a set of environments).
    Project,
    /// Config sheets (values checked against a schema).
    ConfigSheet,
}

impl EntityKind {
    /// Every kind, in the order integrity passes walk them.
    pub const ALL: [Self; 3] = [Self::Schema, Self::Project, Self::ConfigSheet];

    /// The directory name used for this kind under the base directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Schema => SCHEMAS_DIR,
            Self::Project => PROJECTS_DIR,
            Self::ConfigSheet => SHEETS_DIR,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Schema => "schema",
            Self::Project => "project",
            Self::ConfigSheet => "config sheet",
        };
        f.write_str(label)
    }
}

// --- ENTITY ENVELOPE ---

/// The identity and metadata envelope shared by every entity.
///
/// It is flattened into each concrete record, so on disk the fields sit at the
/// top level of the entity JSON next to the kind-specific ones.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Origin URL once synced. Never consulted by local resolution.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remote: String,
    #[serde(default)]
    pub local: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Creates a fresh, local-only envelope with a new v4 UUID.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            remote: String::new(),
            local: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refreshes `updated_at`. The timestamp never moves backwards, even if the
    /// wall clock does.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Builds the lightweight index summary for this envelope.
    pub fn summary(&self) -> EntitySummary {
        EntitySummary {
            name: self.name.clone(),
            description: self.description.clone(),
            remote: self.remote.clone(),
            local: self.local,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Implemented by every persisted entity type. Lets the storage layer read and
/// write records generically while keeping per-kind public methods.
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// The kind this record is stored under.
    const KIND: EntityKind;

    /// The shared envelope.
    fn entity(&self) -> &Entity;

    /// Mutable access to the shared envelope.
    fn entity_mut(&mut self) -> &mut Entity;
}

// --- VARIABLES ---

/// The type of a schema variable.
///
/// The supported set is closed. Anything else read from disk is kept as
/// `Unsupported` so that the validator, not the JSON parser, reports it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Url,
    Unsupported(String),
}

impl VariableType {
    /// The wire name of the type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Url => "url",
            Self::Unsupported(other) => other,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl From<String> for VariableType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "url" => Self::Url,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<&str> for VariableType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<VariableType> for String {
    fn from(value: VariableType) -> Self {
        match value {
            VariableType::Unsupported(other) => other,
            supported => supported.as_str().to_string(),
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single variable definition inside a schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    /// Display-only label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl Variable {
    /// Creates an optional variable with no pattern and no default.
    pub fn new(name: impl Into<String>, var_type: impl Into<VariableType>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            var_type: var_type.into(),
            regex: None,
            default: None,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_regex(mut self, pattern: impl Into<String>) -> Self {
        self.regex = Some(pattern.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// The validation pattern, treating an empty string as "no pattern".
    pub fn pattern(&self) -> Option<&str> {
        self.regex.as_deref().filter(|p| !p.is_empty())
    }

    /// The default value, treating an empty string as "no default".
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref().filter(|d| !d.is_empty())
    }
}

// --- SCHEMAS ---

/// A named set of variable definitions that may inherit from other schemas.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    #[serde(flatten)]
    pub entity: Entity,
    /// Ordered; names are unique within one schema.
    #[serde(default)]
    pub variables: Vec<Variable>,
    /// Parent schemas by name or UUID, applied in list order.
    #[serde(default)]
    pub extends: Vec<String>,
}

impl Schema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        variables: Vec<Variable>,
        extends: Vec<String>,
    ) -> Self {
        Self {
            entity: Entity::new(name, description),
            variables,
            extends,
        }
    }

    /// Looks up one of this schema's own variables by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

impl Record for Schema {
    const KIND: EntityKind = EntityKind::Schema;

    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

// --- PROJECTS ---

/// An environment of a project. Its sheet is found by the `{project}-{environment}`
/// naming convention.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Project {
    #[serde(flatten)]
    pub entity: Entity,
    /// The project's schema, by name or UUID.
    pub schema: String,
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            entity: Entity::new(name, description),
            schema: schema.into(),
            environments: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) an environment and refreshes `updated_at`.
    pub fn add_environment(&mut self, name: &str) {
        self.environments.insert(
            name.to_string(),
            Environment {
                name: name.to_string(),
            },
        );
        self.entity.touch();
    }

    /// Removes an environment. Returns `false` if it did not exist.
    pub fn remove_environment(&mut self, name: &str) -> bool {
        let removed = self.environments.remove(name).is_some();
        if removed {
            self.entity.touch();
        }
        removed
    }

    /// The name of the config sheet backing `environment`.
    pub fn sheet_name(&self, environment: &str) -> String {
        format!("{}-{}", self.entity.name, environment)
    }
}

impl Record for Project {
    const KIND: EntityKind = EntityKind::Project;

    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

// --- CONFIG SHEETS ---

/// How a config sheet names its schema: either a reference to a stored schema
/// or a set of variables embedded in the sheet itself.
///
/// On disk this is `{"ref": "..."}` or `{"variables": {...}}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum SchemaReference {
    Reference {
        #[serde(rename = "ref")]
        reference: String,
    },
    Inline {
        variables: BTreeMap<String, Variable>,
    },
}

impl SchemaReference {
    pub fn reference(reference: impl Into<String>) -> Self {
        Self::Reference {
            reference: reference.into(),
        }
    }

    /// Builds an inline reference keyed by variable name.
    pub fn inline(variables: impl IntoIterator<Item = Variable>) -> Self {
        Self::Inline {
            variables: variables
                .into_iter()
                .map(|v| (v.name.clone(), v))
                .collect(),
        }
    }

    /// A reference must name something; an inline schema must define something.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Reference { reference } => !reference.trim().is_empty(),
            Self::Inline { variables } => !variables.is_empty(),
        }
    }
}

/// A set of values checked against a schema, optionally bound to a project environment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConfigSheet {
    #[serde(flatten)]
    pub entity: Entity,
    pub schema: SchemaReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    /// Parent sheets by name or UUID, applied in list order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
}

impl ConfigSheet {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: SchemaReference,
        values: BTreeMap<String, String>,
    ) -> Self {
        Self {
            entity: Entity::new(name, description),
            schema,
            project: None,
            environment: None,
            values,
            extends: Vec::new(),
        }
    }

    /// A sheet not associated with any project.
    pub fn is_standalone(&self) -> bool {
        self.project.is_none()
    }

    /// A sheet bound to both a project and one of its environments.
    pub fn is_project_environment(&self) -> bool {
        self.project.is_some() && self.environment.as_deref().is_some_and(|e| !e.is_empty())
    }
}

impl Record for ConfigSheet {
    const KIND: EntityKind = EntityKind::ConfigSheet;

    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

// --- INDEX MODELS ---

/// The per-entity metadata kept in `index.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EntitySummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remote: String,
    #[serde(default)]
    pub local: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One `index.json`: name lookup plus summaries keyed by UUID.
///
/// Every UUID in `name_to_id` must be a key of `summaries`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityIndex {
    #[serde(default)]
    pub name_to_id: HashMap<String, Uuid>,
    #[serde(default)]
    pub summaries: HashMap<Uuid, EntitySummary>,
}

/// A sheet summary enriched with its project binding, as returned by filtered listings.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ConfigSheetSummary {
    pub id: Uuid,
    #[serde(flatten)]
    pub summary: EntitySummary,
    pub project: Option<Uuid>,
    pub environment: Option<String>,
}
