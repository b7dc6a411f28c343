// src/core/validator.rs

//! Checks resolved schemas and config sheet values against variable constraints.

use crate::{
    core::{
        resolver::{ResolveError, Resolver},
        storage::Storage,
    },
    models::{ConfigSheet, EntityKind, Project, Schema, Variable, VariableType},
};

use regex::Regex;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Why a schema, project or config sheet failed validation.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{kind} name cannot be empty")]
    EmptyName { kind: EntityKind },

    #[error("Variable name cannot be empty")]
    EmptyVariableName,

    /// Two effective variables share a name after inheritance.
    #[error("Schema '{schema}' defines variable '{variable}' more than once")]
    DuplicateVariable { schema: String, variable: String },

    /// The type name is not one of the supported variable types.
    #[error("Variable '{variable}' has unsupported type '{var_type}'")]
    UnsupportedType { variable: String, var_type: String },

    #[error("Variable '{variable}' has an invalid regex pattern: {source}")]
    InvalidRegex {
        variable: String,
        #[source]
        source: regex::Error,
    },

    /// The default fails the variable's own type or pattern check.
    #[error("Variable '{variable}' has an invalid default value: {source}")]
    InvalidDefault {
        variable: String,
        #[source]
        source: Box<ValidationError>,
    },

    /// Required, with neither a value nor a default.
    #[error("Required variable '{variable}' is missing")]
    MissingRequired { variable: String },

    /// The value does not parse as the declared type.
    #[error("Value '{value}' for '{variable}' is not a valid {expected}")]
    TypeMismatch {
        variable: String,
        expected: VariableType,
        value: String,
    },

    /// Patterns match anywhere in the value unless they carry `^`/`$`.
    #[error("Value '{value}' for '{variable}' does not match pattern '{pattern}'")]
    PatternMismatch {
        variable: String,
        pattern: String,
        value: String,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl ValidationError {
    /// The variable the error is about, if any.
    pub fn variable(&self) -> Option<&str> {
        match self {
            Self::DuplicateVariable { variable, .. }
            | Self::UnsupportedType { variable, .. }
            | Self::InvalidRegex { variable, .. }
            | Self::InvalidDefault { variable, .. }
            | Self::MissingRequired { variable }
            | Self::TypeMismatch { variable, .. }
            | Self::PatternMismatch { variable, .. } => Some(variable),
            Self::EmptyName { .. } | Self::EmptyVariableName | Self::Resolve(_) => None,
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates entities against their resolved schemas.
///
/// Compiled patterns are cached per validator, so reusing one instance across
/// many sheets compiles each distinct pattern once.
pub struct Validator<'a, S: Storage + ?Sized> {
    resolver: Resolver<'a, S>,
    regex_cache: HashMap<String, Regex>,
}

impl<'a, S: Storage + ?Sized> Validator<'a, S> {
    /// A validator with an empty pattern cache.
    pub fn new(storage: &'a S) -> Self {
        Self {
            resolver: Resolver::new(storage),
            regex_cache: HashMap::new(),
        }
    }

    /// The resolver used for inheritance, for callers that need resolved
    /// variables alongside validation.
    pub fn resolver(&self) -> &Resolver<'a, S> {
        &self.resolver
    }

    /// Resolves a schema's inheritance and checks every effective variable.
    ///
    /// # Returns
    /// The effective variables, in resolution order.
    pub fn validate_schema(&mut self, schema: &Schema) -> ValidationResult<Vec<Variable>> {
        if schema.entity.name.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                kind: EntityKind::Schema,
            });
        }
        check_unique_names(&schema.entity.name, &schema.variables)?;

        let variables = self.resolver.resolve_schema(schema)?;
        for variable in &variables {
            self.validate_variable(variable)?;
        }
        Ok(variables)
    }

    /// Checks that a project is named and that its schema resolves and is valid.
    pub fn validate_project(&mut self, project: &Project) -> ValidationResult<()> {
        if project.entity.name.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                kind: EntityKind::Project,
            });
        }
        let variables = self.resolver.resolve_schema_ref(&project.schema)?;
        for variable in &variables {
            self.validate_variable(variable)?;
        }
        Ok(())
    }

    /// Validates a sheet and, on success, replaces its values with the fully
    /// resolved map: inherited values, its own values and injected defaults.
    ///
    /// On error the sheet is left untouched.
    pub fn validate_config_sheet(&mut self, sheet: &mut ConfigSheet) -> ValidationResult<()> {
        let resolved = self.check_config_sheet(sheet)?;
        sheet.values = resolved;
        Ok(())
    }

    /// Validates a sheet without modifying it.
    ///
    /// # Returns
    /// The resolved value map the sheet would carry after validation.
    pub fn check_config_sheet(
        &mut self,
        sheet: &ConfigSheet,
    ) -> ValidationResult<BTreeMap<String, String>> {
        if sheet.entity.name.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                kind: EntityKind::ConfigSheet,
            });
        }

        let resolved = self.resolver.resolve_config_sheet(sheet)?;
        let mut values = resolved.values;

        for variable in &resolved.variables {
            self.validate_variable(variable)?;

            match values.get(&variable.name) {
                Some(value) => self.validate_value(variable, value)?,
                None if variable.required => {
                    return Err(ValidationError::MissingRequired {
                        variable: variable.name.clone(),
                    });
                }
                None => {
                    if let Some(default) = variable.default_value() {
                        log::trace!("Injecting default for '{}'.", variable.name);
                        values.insert(variable.name.clone(), default.to_string());
                    }
                }
            }
        }

        Ok(values)
    }

    /// Checks a single variable definition: name, type, pattern and default.
    pub fn validate_variable(&mut self, variable: &Variable) -> ValidationResult<()> {
        if variable.name.trim().is_empty() {
            return Err(ValidationError::EmptyVariableName);
        }
        if !variable.var_type.is_supported() {
            return Err(ValidationError::UnsupportedType {
                variable: variable.name.clone(),
                var_type: variable.var_type.to_string(),
            });
        }
        if let Some(pattern) = variable.pattern() {
            self.compiled(&variable.name, pattern)?;
        }
        if let Some(default) = variable.default_value() {
            self.validate_value(variable, default)
                .map_err(|e| ValidationError::InvalidDefault {
                    variable: variable.name.clone(),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }

    /// Checks one value against a variable's type and pattern.
    ///
    /// `string` and `url` only go through the pattern, if any. `number` must
    /// parse as a finite number; `boolean` must be exactly `true` or `false`.
    pub fn validate_value(&mut self, variable: &Variable, value: &str) -> ValidationResult<()> {
        if value.is_empty() && variable.required {
            return Err(ValidationError::MissingRequired {
                variable: variable.name.clone(),
            });
        }

        let type_ok = match &variable.var_type {
            VariableType::Number => value.trim().parse::<f64>().is_ok_and(f64::is_finite),
            VariableType::Boolean => value == "true" || value == "false",
            VariableType::String | VariableType::Url => true,
            VariableType::Unsupported(other) => {
                return Err(ValidationError::UnsupportedType {
                    variable: variable.name.clone(),
                    var_type: other.clone(),
                });
            }
        };
        if !type_ok {
            return Err(ValidationError::TypeMismatch {
                variable: variable.name.clone(),
                expected: variable.var_type.clone(),
                value: value.to_string(),
            });
        }

        if let Some(pattern) = variable.pattern()
            && !self.compiled(&variable.name, pattern)?.is_match(value)
        {
            return Err(ValidationError::PatternMismatch {
                variable: variable.name.clone(),
                pattern: pattern.to_string(),
                value: value.to_string(),
            });
        }
        Ok(())
    }

    fn compiled(&mut self, variable: &str, pattern: &str) -> ValidationResult<&Regex> {
        let regex = match self.regex_cache.entry(pattern.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let regex = Regex::new(pattern).map_err(|source| ValidationError::InvalidRegex {
                    variable: variable.to_string(),
                    source,
                })?;
                entry.insert(regex)
            }
        };
        Ok(regex)
    }
}

fn check_unique_names(schema: &str, variables: &[Variable]) -> ValidationResult<()> {
    let mut seen = HashSet::new();
    for variable in variables {
        if !seen.insert(variable.name.as_str()) {
            return Err(ValidationError::DuplicateVariable {
                schema: schema.to_string(),
                variable: variable.name.clone(),
            });
        }
    }
    Ok(())
}
