// src/cli/handlers/apply.rs

use anyhow::{Context, Result, anyhow};
use clap::Parser;

use crate::{
    cli::dispatcher::AppContext,
    core::{entity_manager::EntityManager, runner, storage::Storage, validator::Validator},
};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Runs a command with a validated config sheet in its environment."
)]
struct ApplyArgs {
    /// The sheet to apply.
    #[arg(conflicts_with = "project", required_unless_present = "project")]
    sheet: Option<String>,
    /// Apply the sheet of this project's environment instead (requires --env).
    #[arg(long, short, requires = "environment")]
    project: Option<String>,
    #[arg(long = "env", short, requires = "project")]
    environment: Option<String>,
    /// The command to run after `--`. Starts an interactive shell when omitted.
    #[arg(last = true)]
    command: Vec<String>,
}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    let args = ApplyArgs::try_parse_from(&args)?;
    let storage = &ctx.storage;

    let reference = match (args.sheet, args.project, args.environment) {
        (Some(sheet), _, _) => sheet,
        (None, Some(project), Some(environment)) => {
            EntityManager::new(storage).project_sheet_name(&project, &environment)?
        }
        _ => return Err(anyhow!(t!("apply.error.sheet_required"))),
    };

    let sheet = storage.load_config_sheet(&reference)?;
    let values = Validator::new(storage)
        .check_config_sheet(&sheet)
        .with_context(|| format!(t!("apply.error.invalid"), name = sheet.entity.name))?;
    let env = runner::child_environment(&values)?;

    let command = if args.command.is_empty() {
        runner::default_shell(|name| std::env::var(name).ok())
    } else {
        args.command
    };
    log::debug!("Applying '{}' ({} values) to {:?}.", sheet.entity.name, env.len(), command);

    let cwd = std::env::current_dir().context(t!("error.current_dir"))?;
    runner::run(&command, &cwd, &env)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_or_project_environment() {
        let args = ApplyArgs::try_parse_from(["api-dev", "--", "cargo", "run", "-q"]).unwrap();
        assert_eq!(args.sheet.as_deref(), Some("api-dev"));
        assert_eq!(args.command, vec!["cargo", "run", "-q"]);

        let args = ApplyArgs::try_parse_from(["-p", "shop", "-e", "dev"]).unwrap();
        assert_eq!(args.project.as_deref(), Some("shop"));
        assert_eq!(args.environment.as_deref(), Some("dev"));
        assert!(args.command.is_empty());

        assert!(ApplyArgs::try_parse_from(["--project", "shop"]).is_err());
        assert!(ApplyArgs::try_parse_from(Vec::<String>::new()).is_err());
    }
}
