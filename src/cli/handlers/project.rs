// src/cli/handlers/project.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;

use crate::{
    cli::{dispatcher::AppContext, handlers::commons},
    core::{entity_manager::EntityManager, query, storage::Storage, validator::Validator},
    models::EntityKind,
};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Manages projects and their environments.")]
struct ProjectArgs {
    #[command(subcommand)]
    command: ProjectCommand,
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    /// Lists every project.
    #[command(alias = "ls")]
    List,
    /// Shows a project and its environments.
    Show { reference: String },
    /// Checks that the project's schema resolves and is valid.
    Validate { reference: String },
    /// Creates a project bound to an existing schema.
    Create {
        name: String,
        #[arg(long, short)]
        schema: String,
        #[arg(long, short, default_value = "")]
        description: String,
    },
    /// Renames a project and its `{project}-{environment}` sheets.
    Rename { reference: String, new_name: String },
    /// Deletes a project. Its environment sheets are kept.
    #[command(alias = "rm")]
    Delete { reference: String },
    /// Adds an environment to a project.
    AddEnv {
        project: String,
        environment: String,
        /// Also create the empty `{project}-{environment}` sheet.
        #[arg(long)]
        create_sheet: bool,
    },
    /// Removes an environment from a project. Its sheet is kept.
    RmEnv { project: String, environment: String },
}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    let args = ProjectArgs::try_parse_from(&args)?;
    let storage = &ctx.storage;
    let manager = EntityManager::new(storage);

    match args.command {
        ProjectCommand::List => {
            let summaries = query::list_summaries(storage, EntityKind::Project)?;
            commons::print_summary_list(t!("project.list.header"), &summaries);
        }
        ProjectCommand::Show { reference } => {
            let project = storage.load_project(&reference)?;
            println!(
                "\n{} {}",
                t!("project.show.header").bold(),
                project.entity.name.cyan().bold()
            );
            commons::print_metadata(project.entity.id, &project.entity.summary());
            println!("  {:<14} {}", t!("project.label.schema").blue(), project.schema);

            println!("\n{}", t!("project.show.environments").bold());
            let rows = query::project_environments(storage, &reference)?;
            if rows.is_empty() {
                println!("  {}", t!("common.none").dimmed());
            }
            for row in rows {
                let status = if row.sheet_exists {
                    row.sheet_name.green()
                } else {
                    format!(t!("project.show.sheet_missing"), name = row.sheet_name).yellow()
                };
                println!("  {:<20} {}", row.environment.cyan(), status);
            }
        }
        ProjectCommand::Validate { reference } => {
            let project = storage.load_project(&reference)?;
            Validator::new(storage).validate_project(&project)?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(t!("project.validate.ok"), name = project.entity.name)
            );
        }
        ProjectCommand::Create {
            name,
            schema,
            description,
        } => {
            let project = manager.create_project(&name, &description, &schema)?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(
                    t!("project.create.ok"),
                    name = project.entity.name,
                    id = project.entity.id
                )
            );
        }
        ProjectCommand::Rename { reference, new_name } => {
            manager.rename(EntityKind::Project, &reference, &new_name)?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(t!("common.renamed"), from = reference, to = new_name)
            );
        }
        ProjectCommand::Delete { reference } => {
            let summary = storage.summary(EntityKind::Project, &reference)?;
            let prompt = format!(
                t!("common.confirm_delete"),
                kind = EntityKind::Project,
                name = summary.name
            );
            if !commons::confirm(ctx, &prompt)? {
                println!("{}", t!("common.aborted").yellow());
                return Ok(());
            }
            manager.delete(EntityKind::Project, &reference)?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(t!("common.deleted"), kind = EntityKind::Project, name = summary.name)
            );
        }
        ProjectCommand::AddEnv {
            project,
            environment,
            create_sheet,
        } => {
            if create_sheet {
                let sheet = manager.create_project_sheet(&project, &environment, BTreeMap::new())?;
                println!(
                    "{} {}",
                    t!("common.success").green(),
                    format_args!(
                        t!("project.add_env.with_sheet"),
                        environment = environment,
                        sheet = sheet.entity.name
                    )
                );
            } else {
                let updated = manager.add_environment(&project, &environment)?;
                println!(
                    "{} {}",
                    t!("common.success").green(),
                    format_args!(
                        t!("project.add_env.ok"),
                        environment = environment,
                        name = updated.entity.name
                    )
                );
            }
        }
        ProjectCommand::RmEnv { project, environment } => {
            let updated = manager.remove_environment(&project, &environment)?;
            println!(
                "{} {}",
                t!("common.success").green(),
                format_args!(
                    t!("project.rm_env.ok"),
                    environment = environment,
                    name = updated.entity.name
                )
            );
        }
    }
    Ok(())
}
