// src/core/resolver.rs

//! Flattens `extends` chains into effective variable sets and value maps.
//!
//! Resolution is depth-first. Parents are applied in list order, each one fully
//! resolved before it is merged, and the entity's own items are applied last.
//! A variable replaces an inherited one with the same name as a whole; values
//! overwrite key by key.
//!
//! Cycle detection follows the active chain only. An entity reached twice along
//! different branches (a diamond) is fine; an entity that appears inside its own
//! ancestry is not.

use crate::{
    core::storage::{Storage, StorageError, load_record},
    models::{ConfigSheet, EntityKind, Record, Schema, SchemaReference, Variable},
};

use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Failures while flattening an `extends` chain. `chain` renders the path
/// walked so far, e.g. `a -> b -> a`.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// An entity appears in its own ancestry.
    #[error("Circular dependency detected in {kind} inheritance: {chain}")]
    CircularDependency {
        kind: EntityKind,
        /// The entity that closed the loop.
        name: String,
        chain: String,
    },

    /// An `extends` target or schema reference does not exist.
    #[error("{kind} '{reference}' not found (while resolving {chain})")]
    NotFound {
        kind: EntityKind,
        reference: String,
        chain: String,
        #[source]
        source: StorageError,
    },

    /// A parent exists but could not be loaded.
    #[error("Failed to load {kind} '{reference}' (while resolving {chain}): {source}")]
    Load {
        kind: EntityKind,
        reference: String,
        chain: String,
        #[source]
        source: StorageError,
    },

    /// A sheet names neither a schema nor any inline variables.
    #[error("Config sheet '{sheet}' has an empty schema reference")]
    EmptySchemaReference { sheet: String },
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// A config sheet after resolution: the effective schema and the effective values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSheet {
    pub variables: Vec<Variable>,
    pub values: BTreeMap<String, String>,
}

/// One entry of the active resolution chain.
struct ChainLink {
    id: Uuid,
    name: String,
}

fn render_chain(chain: &[ChainLink], tail: &str) -> String {
    chain
        .iter()
        .map(|link| link.name.as_str())
        .chain(std::iter::once(tail))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// The part of a record that takes part in inheritance.
trait Inheritable: Record {
    type Merged: Default;

    fn parents(&self) -> &[String];

    /// Applies a fully resolved parent to the accumulator.
    fn merge_parent(acc: &mut Self::Merged, parent: Self::Merged);

    /// Applies this entity's own items to the accumulator.
    fn merge_own(&self, acc: &mut Self::Merged);
}

impl Inheritable for Schema {
    type Merged = Vec<Variable>;

    fn parents(&self) -> &[String] {
        &self.extends
    }

    fn merge_parent(acc: &mut Self::Merged, parent: Self::Merged) {
        merge_variables(acc, parent);
    }

    fn merge_own(&self, acc: &mut Self::Merged) {
        merge_variables(acc, self.variables.iter().cloned());
    }
}

impl Inheritable for ConfigSheet {
    type Merged = BTreeMap<String, String>;

    fn parents(&self) -> &[String] {
        &self.extends
    }

    fn merge_parent(acc: &mut Self::Merged, parent: Self::Merged) {
        acc.extend(parent);
    }

    fn merge_own(&self, acc: &mut Self::Merged) {
        acc.extend(self.values.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Replaces same-named variables in place and appends new ones, so the first
/// definition of a name fixes its position.
fn merge_variables(acc: &mut Vec<Variable>, incoming: impl IntoIterator<Item = Variable>) {
    for variable in incoming {
        match acc.iter_mut().find(|v| v.name == variable.name) {
            Some(slot) => *slot = variable,
            None => acc.push(variable),
        }
    }
}

/// Resolves schemas and config sheets through a [`Storage`].
/// Flattens schema and sheet inheritance over a [`Storage`].
pub struct Resolver<'a, S: Storage + ?Sized> {
    storage: &'a S,
}

impl<'a, S: Storage + ?Sized> Resolver<'a, S> {
    /// A resolver reading parents from `storage`. It keeps no cache.
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Flattens a schema's inheritance into its effective variables.
    pub fn resolve_schema(&self, schema: &Schema) -> ResolveResult<Vec<Variable>> {
        self.flatten(schema, &mut Vec::new())
    }

    /// Loads a schema by name or UUID and flattens it.
    pub fn resolve_schema_ref(&self, reference: &str) -> ResolveResult<Vec<Variable>> {
        let schema: Schema = self.load(reference, &[])?;
        self.resolve_schema(&schema)
    }

    /// Resolves the schema a sheet points at. An inline schema is treated as a
    /// transient schema with no parents.
    pub fn resolve_schema_reference(
        &self,
        sheet_name: &str,
        reference: &SchemaReference,
    ) -> ResolveResult<Vec<Variable>> {
        if !reference.is_valid() {
            return Err(ResolveError::EmptySchemaReference {
                sheet: sheet_name.to_string(),
            });
        }
        match reference {
            SchemaReference::Reference { reference } => self.resolve_schema_ref(reference),
            SchemaReference::Inline { variables } => {
                let transient = Schema::new(
                    format!("{sheet_name} (inline)"),
                    "",
                    variables.values().cloned().collect(),
                    Vec::new(),
                );
                self.resolve_schema(&transient)
            }
        }
    }

    /// Flattens a sheet's own `extends` chain into its effective values.
    pub fn resolve_values(&self, sheet: &ConfigSheet) -> ResolveResult<BTreeMap<String, String>> {
        self.flatten(sheet, &mut Vec::new())
    }

    /// Resolves both halves of a sheet. The schema pass and the value pass track
    /// their chains separately, so a sheet may share a name with its schema.
    pub fn resolve_config_sheet(&self, sheet: &ConfigSheet) -> ResolveResult<ResolvedSheet> {
        let variables = self.resolve_schema_reference(&sheet.entity.name, &sheet.schema)?;
        let values = self.resolve_values(sheet)?;
        Ok(ResolvedSheet { variables, values })
    }

    /// Resolves several sheets and layers their values in order; later sheets win.
    pub fn merge_sheets(&self, references: &[String]) -> ResolveResult<BTreeMap<String, String>> {
        let mut merged = BTreeMap::new();
        for reference in references {
            let sheet: ConfigSheet = self.load(reference, &[])?;
            merged.extend(self.resolve_values(&sheet)?);
        }
        Ok(merged)
    }

    fn flatten<T: Inheritable>(
        &self,
        entity: &T,
        chain: &mut Vec<ChainLink>,
    ) -> ResolveResult<T::Merged> {
        let envelope = entity.entity();
        if chain.iter().any(|link| link.id == envelope.id) {
            return Err(ResolveError::CircularDependency {
                kind: T::KIND,
                name: envelope.name.clone(),
                chain: render_chain(chain, &envelope.name),
            });
        }
        chain.push(ChainLink {
            id: envelope.id,
            name: envelope.name.clone(),
        });

        let mut acc = T::Merged::default();
        for parent_ref in entity.parents() {
            log::trace!("Resolving {} '{}' via '{}'.", T::KIND, envelope.name, parent_ref);
            let parent: T = self.load(parent_ref, chain)?;
            let resolved = self.flatten(&parent, chain)?;
            T::merge_parent(&mut acc, resolved);
        }
        entity.merge_own(&mut acc);

        chain.pop();
        Ok(acc)
    }

    fn load<T: Record>(&self, reference: &str, chain: &[ChainLink]) -> ResolveResult<T> {
        load_record(self.storage, reference).map_err(|source| {
            let kind = T::KIND;
            let reference = reference.to_string();
            let chain = render_chain(chain, &reference);
            match source {
                StorageError::NotFound { .. } => ResolveError::NotFound {
                    kind,
                    reference,
                    chain,
                    source,
                },
                _ => ResolveError::Load {
                    kind,
                    reference,
                    chain,
                    source,
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory_storage::MemoryStorage;
    use pretty_assertions::assert_eq;

    fn schema(
        storage: &MemoryStorage,
        name: &str,
        vars: Vec<Variable>,
        extends: &[&str],
    ) -> Schema {
        let schema = Schema::new(
            name,
            "",
            vars,
            extends.iter().map(|s| s.to_string()).collect(),
        );
        storage.save_schema(&schema).unwrap();
        schema
    }

    fn sheet(
        storage: &MemoryStorage,
        name: &str,
        values: &[(&str, &str)],
        extends: &[&str],
    ) -> ConfigSheet {
        let mut sheet = ConfigSheet::new(
            name,
            "",
            SchemaReference::reference("base"),
            values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        sheet.extends = extends.iter().map(|s| s.to_string()).collect();
        storage.save_config_sheet(&sheet).unwrap();
        sheet
    }

    fn names(vars: &[Variable]) -> Vec<&str> {
        vars.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn test_schema_without_extends_resolves_to_own_variables() {
        let storage = MemoryStorage::new();
        let vars = vec![Variable::new("A", "string"), Variable::new("B", "number")];
        let base = schema(&storage, "base", vars.clone(), &[]);
        let resolved = Resolver::new(&storage).resolve_schema(&base).unwrap();
        assert_eq!(resolved, vars);
    }

    #[test]
    fn test_own_definition_beats_every_ancestor() {
        let storage = MemoryStorage::new();
        schema(&storage, "c", vec![Variable::new("X", "string")], &[]);
        schema(&storage, "b", vec![Variable::new("X", "number")], &["c"]);
        let a = schema(
            &storage,
            "a",
            vec![Variable::new("X", "boolean").with_default("true")],
            &["b"],
        );

        let resolved = Resolver::new(&storage).resolve_schema(&a).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].var_type, crate::models::VariableType::Boolean);
        assert_eq!(resolved[0].default_value(), Some("true"));
    }

    #[test]
    fn test_later_parent_wins_and_positions_are_stable() {
        let storage = MemoryStorage::new();
        schema(
            &storage,
            "p1",
            vec![Variable::new("A", "string"), Variable::new("SHARED", "string")],
            &[],
        );
        schema(&storage, "p2", vec![Variable::new("SHARED", "url")], &[]);
        let child = schema(&storage, "child", vec![Variable::new("Z", "string")], &["p1", "p2"]);

        let resolved = Resolver::new(&storage).resolve_schema(&child).unwrap();
        assert_eq!(names(&resolved), vec!["A", "SHARED", "Z"]);
        assert_eq!(resolved[1].var_type, crate::models::VariableType::Url);
    }

    #[test]
    fn test_direct_self_reference_is_a_cycle() {
        let storage = MemoryStorage::new();
        let selfish = schema(&storage, "selfish", vec![], &["selfish"]);
        let err = Resolver::new(&storage).resolve_schema(&selfish).unwrap_err();
        match err {
            ResolveError::CircularDependency { name, chain, .. } => {
                assert_eq!(name, "selfish");
                assert_eq!(chain, "selfish -> selfish");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_transitive_cycle_is_detected() {
        let storage = MemoryStorage::new();
        schema(&storage, "a", vec![], &["b"]);
        schema(&storage, "b", vec![], &["c"]);
        schema(&storage, "c", vec![], &["a"]);
        let err = Resolver::new(&storage).resolve_schema_ref("a").unwrap_err();
        assert!(matches!(err, ResolveError::CircularDependency { .. }));
        assert!(err.to_string().contains("a -> b -> c -> a"));
    }

    #[test]
    fn test_diamond_inheritance_resolves() {
        let storage = MemoryStorage::new();
        schema(&storage, "root", vec![Variable::new("R", "string")], &[]);
        schema(&storage, "left", vec![Variable::new("L", "string")], &["root"]);
        schema(&storage, "right", vec![Variable::new("RI", "string")], &["root"]);
        let leaf = schema(&storage, "leaf", vec![], &["left", "right"]);

        let resolved = Resolver::new(&storage).resolve_schema(&leaf).unwrap();
        assert_eq!(names(&resolved), vec!["R", "L", "RI"]);
    }

    #[test]
    fn test_missing_parent_reports_chain() {
        let storage = MemoryStorage::new();
        schema(&storage, "mid", vec![], &["ghost"]);
        let top = schema(&storage, "top", vec![], &["mid"]);
        let err = Resolver::new(&storage).resolve_schema(&top).unwrap_err();
        match err {
            ResolveError::NotFound {
                reference, chain, ..
            } => {
                assert_eq!(reference, "ghost");
                assert_eq!(chain, "top -> mid -> ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sheet_values_follow_extends_order() {
        let storage = MemoryStorage::new();
        sheet(&storage, "defaults", &[("A", "1"), ("B", "1")], &[]);
        sheet(&storage, "overrides", &[("B", "2")], &[]);
        let leaf = sheet(&storage, "leaf", &[("C", "3")], &["defaults", "overrides"]);

        let values = Resolver::new(&storage).resolve_values(&leaf).unwrap();
        let expected: BTreeMap<String, String> = [("A", "1"), ("B", "2"), ("C", "3")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_sheet_may_share_a_name_with_its_schema() {
        let storage = MemoryStorage::new();
        schema(&storage, "base", vec![Variable::new("A", "string")], &[]);
        let same_name = sheet(&storage, "base", &[("A", "x")], &[]);
        let resolved = Resolver::new(&storage)
            .resolve_config_sheet(&same_name)
            .unwrap();
        assert_eq!(names(&resolved.variables), vec!["A"]);
        assert_eq!(resolved.values.get("A").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_inline_schema_is_transient() {
        let storage = MemoryStorage::new();
        let reference = SchemaReference::inline(vec![Variable::new("PORT", "number")]);
        let vars = Resolver::new(&storage)
            .resolve_schema_reference("adhoc", &reference)
            .unwrap();
        assert_eq!(names(&vars), vec!["PORT"]);
        assert_eq!(storage.record_count(), 0);
    }

    #[test]
    fn test_empty_schema_reference_is_rejected() {
        let storage = MemoryStorage::new();
        let err = Resolver::new(&storage)
            .resolve_schema_reference("s", &SchemaReference::reference(""))
            .unwrap_err();
        assert!(matches!(err, ResolveError::EmptySchemaReference { .. }));
    }

    #[test]
    fn test_merge_sheets_layers_in_order() {
        let storage = MemoryStorage::new();
        sheet(&storage, "one", &[("A", "1"), ("B", "1")], &[]);
        sheet(&storage, "two", &[("B", "2")], &[]);
        let merged = Resolver::new(&storage)
            .merge_sheets(&["one".to_string(), "local://two".to_string()])
            .unwrap();
        assert_eq!(merged.get("A").map(String::as_str), Some("1"));
        assert_eq!(merged.get("B").map(String::as_str), Some("2"));
    }
}
