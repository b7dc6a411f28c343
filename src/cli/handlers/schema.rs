// src/cli/handlers/schema.rs

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use crate::{
    cli::{dispatcher::AppContext, handlers::commons},
    core::{dotenv, entity_manager::EntityManager, query, storage::Storage, validator::Validator},
    models::EntityKind,
};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Manages schemas.")]
struct SchemaArgs {
    #[command(subcommand)]
    command: SchemaCommand,
}

#[derive(Subcommand, Debug)]
enum SchemaCommand {
    /// Lists every schema.
    #[command(alias = "ls")]
    List,
    /// Shows a schema and its variables.
    Show {
        reference: String,
        /// Show the effective variables after inheritance.
        #[arg(long)]
        resolved: bool,
    },
    /// Resolves a schema and checks every variable definition.
    Validate { reference: String },
    /// Creates a schema from an annotated .env file.
    Import {
        file: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, short, default_value = "")]
        description: String,
        /// Parent schemas, applied in order.
        #[arg(long, value_delimiter = ',')]
        extends: Vec<String>,
    },
    Rename { reference: String, new_name: String },
    /// Deletes a schema.
    #[command(alias = "rm")]
    Delete { reference: String },
}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    let args = SchemaArgs::try_parse_from(&args)?;
    let storage = &ctx.storage;

    match args.command {
        SchemaCommand::List => {
            let summaries = query::list_summaries(storage, EntityKind::Schema)?;
            commons::print_summary_list(t!("schema.list.header"), &summaries);
        }
        SchemaCommand::Show { reference, resolved } => {
            let schema = storage.load_schema(&reference)?;
            println!("\n{} {}", t!("schema.show.header").bold(), schema.entity.name.cyan().bold());
            commons::print_metadata(schema.entity.id, &schema.entity.summary());
            if !schema.extends.is_empty() {
                println!(
                    "  {:<14} {}",
                    t!("schema.label.extends").blue(),
                    schema.extends.join(", ")
                );
            }
            println!();
            if resolved {
                let variables = Validator::new(storage).resolver().resolve_schema(&schema)?;
                commons::print_variables(&variables);
            } else {
                commons::print_variables(&schema.variables);
            }
        }
        SchemaCommand::Validate { reference } => {
            let schema = storage.load_schema(&reference)?;
            let variables = Validator::new(storage).validate_schema(&schema)?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(
                    t!("schema.validate.ok"),
                    name = schema.entity.name,
                    count = variables.len()
                )
            );
        }
        SchemaCommand::Import {
            file,
            name,
            description,
            extends,
        } => {
            let parsed = dotenv::parse_annotated(&commons::read_file(&file)?)?;
            let name = match name {
                Some(name) => name,
                None => file
                    .file_stem()
                    .map(|s| s.to_string_lossy().trim_start_matches('.').to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| anyhow!(t!("schema.error.name_required")))?,
            };
            let schema = EntityManager::new(storage).create_schema(
                &name,
                &description,
                parsed.variables,
                extends,
            )?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(
                    t!("schema.import.ok"),
                    name = schema.entity.name,
                    count = schema.variables.len()
                )
            );
        }
        SchemaCommand::Rename { reference, new_name } => {
            EntityManager::new(storage).rename(EntityKind::Schema, &reference, &new_name)?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(t!("common.renamed"), from = reference, to = new_name)
            );
        }
        SchemaCommand::Delete { reference } => {
            let summary = storage.summary(EntityKind::Schema, &reference)?;
            let prompt = format!(
                t!("common.confirm_delete"),
                kind = EntityKind::Schema,
                name = summary.name
            );
            if !commons::confirm(ctx, &prompt)? {
                println!("{}", t!("common.aborted").yellow());
                return Ok(());
            }
            EntityManager::new(storage).delete(EntityKind::Schema, &reference)?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(t!("common.deleted"), kind = EntityKind::Schema, name = summary.name)
            );
        }
    }
    Ok(())
}
