// src/cli/handlers/verify.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

use crate::{
    cli::dispatcher::AppContext,
    core::{query, storage::Storage, validator::Validator},
    models::EntityKind,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Checks that indexes match the files on disk, then validates every record."
)]
struct VerifyArgs {
    /// Only check index and file consistency.
    #[arg(long)]
    storage_only: bool,
}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    let args = VerifyArgs::try_parse_from(&args)?;
    let storage = &ctx.storage;

    // 1. Index and file consistency.
    let report = storage.validate()?;
    println!("\n{}", t!("verify.storage.header").bold());
    if report.is_clean() {
        println!("  {}", t!("verify.storage.clean").green());
    }
    for issue in &report.issues {
        if issue.is_fatal() {
            println!("  {} {}", "✗".red(), issue);
        } else {
            println!("  {} {}", "!".yellow(), issue);
        }
    }

    // 2. Every record against its schema.
    let mut failures = 0usize;
    if !args.storage_only {
        let mut validator = Validator::new(storage);

        println!("\n{}", t!("verify.schemas.header").bold());
        for (id, summary) in query::list_summaries(storage, EntityKind::Schema)? {
            let outcome = storage
                .load_schema(&id.to_string())
                .map_err(anyhow::Error::from)
                .and_then(|schema| {
                    validator.validate_schema(&schema).map(|_| ()).map_err(Into::into)
                });
            failures += print_outcome(&summary.name, outcome);
        }

        println!("\n{}", t!("verify.projects.header").bold());
        for (id, summary) in query::list_summaries(storage, EntityKind::Project)? {
            let outcome = storage
                .load_project(&id.to_string())
                .map_err(anyhow::Error::from)
                .and_then(|project| validator.validate_project(&project).map_err(Into::into));
            failures += print_outcome(&summary.name, outcome);
        }

        println!("\n{}", t!("verify.sheets.header").bold());
        for (id, summary) in query::list_summaries(storage, EntityKind::ConfigSheet)? {
            let outcome = storage
                .load_config_sheet(&id.to_string())
                .map_err(anyhow::Error::from)
                .and_then(|sheet| {
                    validator.check_config_sheet(&sheet).map(|_| ()).map_err(Into::into)
                });
            failures += print_outcome(&summary.name, outcome);
        }
    }

    if report.has_fatal() || failures > 0 {
        let fatal = report.issues.iter().filter(|i| i.is_fatal()).count();
        return Err(anyhow!(t!("verify.error.failed"), issues = fatal, invalid = failures));
    }
    println!("\n{} {}", t!("common.success").green(), t!("verify.ok"));
    Ok(())
}

/// Prints one result line and returns 1 on failure.
fn print_outcome(name: &str, outcome: Result<()>) -> usize {
    match outcome {
        Ok(()) => {
            println!("  {} {}", "✓".green(), name);
            0
        }
        Err(e) => {
            println!("  {} {}: {}", "✗".red(), name.bold(), e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_outcome_counts_failures() {
        assert_eq!(print_outcome("ok", Ok(())), 0);
        assert_eq!(print_outcome("bad", Err(anyhow!("boom"))), 1);
    }
}
