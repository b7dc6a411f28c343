// src/cli/handlers/sheet.rs

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::{
    cli::{dispatcher::AppContext, handlers::commons},
    core::{
        dotenv::{self, ExportFormat},
        entity_manager::EntityManager,
        query::{self, ConfigSheetFilter},
        storage::Storage,
        validator::Validator,
    },
    models::{ConfigSheet, EntityKind, SchemaReference},
};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Manages config sheets.")]
struct SheetArgs {
    #[command(subcommand)]
    command: SheetCommand,
}

#[derive(Subcommand, Debug)]
enum SheetCommand {
    /// Lists config sheets, optionally filtered.
    #[command(alias = "ls")]
    List {
        /// Only sheets not bound to a project.
        #[arg(long, conflicts_with = "project")]
        standalone: bool,
        #[arg(long)]
        project: Option<String>,
        #[arg(long = "env")]
        environment: Option<String>,
    },
    /// Shows a sheet and its values. Secrets are masked.
    Show {
        reference: String,
        /// Show inherited values in schema order.
        #[arg(long)]
        resolved: bool,
        /// Print secrets in clear text.
        #[arg(long)]
        reveal: bool,
    },
    /// Checks a sheet against its schema.
    Validate {
        reference: String,
        /// Store the resolved values, defaults included, back into the sheet.
        #[arg(long)]
        apply: bool,
    },
    /// Sets one or more values.
    Set {
        reference: String,
        #[arg(required = true, value_name = "KEY=VALUE")]
        assignments: Vec<String>,
    },
    /// Removes one or more values.
    Unset {
        reference: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Creates a sheet from a .env file.
    Import {
        file: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, short, default_value = "")]
        description: String,
        /// Schema to validate against. Defaults to the file's `# schema:` header.
        #[arg(long)]
        schema: Option<String>,
        /// Bind the sheet to this project's environment (requires --env).
        #[arg(long, requires = "environment")]
        project: Option<String>,
        #[arg(long = "env", requires = "project")]
        environment: Option<String>,
    },
    /// Writes the resolved values of a sheet.
    Export {
        reference: String,
        #[arg(long, short, default_value = "dotenv")]
        format: ExportFormat,
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Annotated .env output that imports back with its schema.
        #[arg(long, conflicts_with = "format")]
        annotated: bool,
    },
    /// Layers several sheets in order and prints the result; later sheets win.
    Merge {
        #[arg(required = true)]
        references: Vec<String>,
        #[arg(long, short, default_value = "dotenv")]
        format: ExportFormat,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    Rename { reference: String, new_name: String },
    #[command(alias = "rm")]
    Delete { reference: String },
}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    let args = SheetArgs::try_parse_from(&args)?;
    let storage = &ctx.storage;
    let manager = EntityManager::new(storage);

    match args.command {
        SheetCommand::List {
            standalone,
            project,
            environment,
        } => {
            let filter = ConfigSheetFilter {
                standalone_only: standalone,
                project: project
                    .map(|p| storage.resolve_uuid(EntityKind::Project, &p))
                    .transpose()?,
                environment,
            };
            list_sheets(storage, &filter)?;
        }
        SheetCommand::Show {
            reference,
            resolved,
            reveal,
        } => {
            let sheet = storage.load_config_sheet(&reference)?;
            print_sheet_header(storage, &sheet);
            println!("\n{}", t!("sheet.show.values").bold());
            if resolved {
                let resolved = Validator::new(storage).resolver().resolve_config_sheet(&sheet)?;
                let pairs = dotenv::ordered_pairs(&resolved.variables, &resolved.values);
                commons::print_values(&pairs, reveal);
            } else {
                let pairs: Vec<(String, String)> =
                    sheet.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                commons::print_values(&pairs, reveal);
            }
        }
        SheetCommand::Validate { reference, apply } => {
            let mut sheet = storage.load_config_sheet(&reference)?;
            let mut validator = Validator::new(storage);
            if apply {
                validator.validate_config_sheet(&mut sheet)?;
                sheet.entity.touch();
                storage.save_config_sheet(&sheet)?;
            } else {
                validator.check_config_sheet(&sheet)?;
            }
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(t!("sheet.validate.ok"), name = sheet.entity.name)
            );
        }
        SheetCommand::Set {
            reference,
            assignments,
        } => {
            let pairs = assignments
                .iter()
                .map(|raw| commons::parse_assignment(raw))
                .collect::<Result<Vec<_>>>()?;
            let sheet = manager.update_config_sheet(&reference, |sheet| {
                sheet.values.extend(pairs.iter().cloned());
                Ok(())
            })?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(t!("sheet.set.ok"), count = pairs.len(), name = sheet.entity.name)
            );
            warn_if_invalid(storage, &sheet);
        }
        SheetCommand::Unset { reference, keys } => {
            let sheet = manager.update_config_sheet(&reference, |sheet| {
                for key in &keys {
                    if sheet.values.remove(key).is_none() {
                        log::debug!("'{}' was not set on '{}'.", key, sheet.entity.name);
                    }
                }
                Ok(())
            })?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(t!("sheet.unset.ok"), count = keys.len(), name = sheet.entity.name)
            );
            warn_if_invalid(storage, &sheet);
        }
        SheetCommand::Import {
            file,
            name,
            description,
            schema,
            project,
            environment,
        } => {
            let parsed = dotenv::parse_annotated(&commons::read_file(&file)?)?;
            let sheet = match (project, environment) {
                (Some(project), Some(environment)) => {
                    manager.create_project_sheet(&project, &environment, parsed.values)?
                }
                _ => {
                    let name = match name {
                        Some(name) => name,
                        None => file
                            .file_stem()
                            .map(|s| s.to_string_lossy().trim_start_matches('.').to_string())
                            .filter(|s| !s.is_empty())
                            .ok_or_else(|| anyhow!(t!("sheet.error.name_required")))?,
                    };
                    let schema_ref = match schema.or(parsed.schema_ref) {
                        Some(reference) => SchemaReference::reference(reference),
                        None if !parsed.variables.is_empty() => {
                            SchemaReference::inline(parsed.variables)
                        }
                        None => return Err(anyhow!(t!("sheet.error.schema_required"))),
                    };
                    manager.create_config_sheet(&name, &description, schema_ref, parsed.values)?
                }
            };
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(
                    t!("sheet.import.ok"),
                    name = sheet.entity.name,
                    count = sheet.values.len()
                )
            );
            warn_if_invalid(storage, &sheet);
        }
        SheetCommand::Export {
            reference,
            format,
            output,
            annotated,
        } => {
            let sheet = storage.load_config_sheet(&reference)?;
            let mut validator = Validator::new(storage);
            let values = validator.check_config_sheet(&sheet)?;
            let variables = validator
                .resolver()
                .resolve_schema_reference(&sheet.entity.name, &sheet.schema)?;

            let content = if annotated {
                let schema_ref = match &sheet.schema {
                    SchemaReference::Reference { reference } => Some(reference.as_str()),
                    SchemaReference::Inline { .. } => None,
                };
                dotenv::render_annotated(schema_ref, &variables, &values)
            } else {
                dotenv::render(&dotenv::ordered_pairs(&variables, &values), format)
            };
            log::debug!("Exporting '{}' as {}.", sheet.entity.name, format);
            commons::write_output(output.as_deref(), &content)?;
        }
        SheetCommand::Merge {
            references,
            format,
            output,
        } => {
            let merged = Validator::new(storage).resolver().merge_sheets(&references)?;
            let pairs: Vec<(String, String)> = merged.into_iter().collect();
            commons::write_output(output.as_deref(), &dotenv::render(&pairs, format))?;
        }
        SheetCommand::Rename { reference, new_name } => {
            manager.rename(EntityKind::ConfigSheet, &reference, &new_name)?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(t!("common.renamed"), from = reference, to = new_name)
            );
        }
        SheetCommand::Delete { reference } => {
            let summary = storage.summary(EntityKind::ConfigSheet, &reference)?;
            let prompt = format!(
                t!("common.confirm_delete"),
                kind = EntityKind::ConfigSheet,
                name = summary.name
            );
            if !commons::confirm(ctx, &prompt)? {
                println!("{}", t!("common.aborted").yellow());
                return Ok(());
            }
            manager.delete(EntityKind::ConfigSheet, &reference)?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(
                    t!("common.deleted"),
                    kind = EntityKind::ConfigSheet,
                    name = summary.name
                )
            );
        }
    }
    Ok(())
}

fn list_sheets<S: Storage + ?Sized>(storage: &S, filter: &ConfigSheetFilter) -> Result<()> {
    let rows = query::list_config_sheets(storage, filter)?;
    let project_names: HashMap<_, _> = storage
        .list_summaries(EntityKind::Project)?
        .into_iter()
        .map(|(id, summary)| (id, summary.name))
        .collect();

    println!("\n{}", t!("sheet.list.header").bold());
    if rows.is_empty() {
        println!("  {}", t!("common.none").dimmed());
        return Ok(());
    }
    for row in rows {
        let binding = match (row.project, row.environment.as_deref()) {
            (Some(id), env) => {
                let project = project_names.get(&id).cloned().unwrap_or_else(|| id.to_string());
                format!("{}/{}", project, env.unwrap_or("-"))
            }
            (None, _) => t!("sheet.list.standalone").to_string(),
        };
        println!(
            "  {:<28} {:<24} {:<32} {}",
            row.summary.name.cyan(),
            binding.yellow(),
            row.summary.description,
            row.id.to_string().dimmed()
        );
    }
    Ok(())
}

fn print_sheet_header<S: Storage + ?Sized>(storage: &S, sheet: &ConfigSheet) {
    println!("\n{} {}", t!("sheet.show.header").bold(), sheet.entity.name.cyan().bold());
    commons::print_metadata(sheet.entity.id, &sheet.entity.summary());

    let schema = match &sheet.schema {
        SchemaReference::Reference { reference } => reference.clone(),
        SchemaReference::Inline { variables } => {
            format!(t!("sheet.show.inline_schema"), count = variables.len())
        }
    };
    println!("  {:<14} {}", t!("sheet.label.schema").blue(), schema);

    if let Some(project_id) = sheet.project {
        let project = storage
            .summary(EntityKind::Project, &project_id.to_string())
            .map(|s| s.name)
            .unwrap_or_else(|_| project_id.to_string());
        println!("  {:<14} {}", t!("sheet.label.project").blue(), project);
    }
    if let Some(environment) = &sheet.environment {
        println!("  {:<14} {}", t!("sheet.label.environment").blue(), environment);
    }
    if !sheet.extends.is_empty() {
        println!("  {:<14} {}", t!("sheet.label.extends").blue(), sheet.extends.join(", "));
    }
}

/// Stored values are not required to be valid; report problems without failing.
fn warn_if_invalid<S: Storage + ?Sized>(storage: &S, sheet: &ConfigSheet) {
    if let Err(e) = Validator::new(storage).check_config_sheet(sheet) {
        println!("{} {}", t!("common.warning").yellow().bold(), e);
    }
}
