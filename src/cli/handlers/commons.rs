// src/cli/handlers/commons.rs

// Shared helpers for the command handlers.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use dialoguer::{Confirm, theme::ColorfulTheme};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::{
    cli::dispatcher::AppContext,
    core::{dotenv, index_manager},
    models::{EntitySummary, Variable},
};

/// Asks for confirmation before a destructive action. `--yes` skips the prompt.
pub fn confirm(ctx: &AppContext, prompt: &str) -> Result<bool> {
    if ctx.assume_yes {
        return Ok(true);
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| anyhow!(t!("error.prompt_failed"), e))
}

/// Splits `KEY=VALUE`.
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!(t!("error.invalid_assignment"), raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!(t!("error.invalid_assignment"), raw));
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!(t!("error.read_file"), path = path.display()))
}

/// Writes text output atomically, or prints it when no path is given.
pub fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            index_manager::write_bytes_atomic(path, content.as_bytes())?;
            println!("{}", format!(t!("common.wrote_file"), path = path.display()).green());
        }
        None => print!("{content}"),
    }
    Ok(())
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Prints one line per summary: name, description, UUID.
pub fn print_summary_list(header: &str, summaries: &[(Uuid, EntitySummary)]) {
    println!("\n{}", header.bold());
    if summaries.is_empty() {
        println!("  {}", t!("common.none").dimmed());
        return;
    }
    for (id, summary) in summaries {
        let origin = if summary.remote.is_empty() {
            String::new()
        } else {
            format!(" [{}]", summary.remote)
        };
        println!(
            "  {:<28} {:<36}{} {}",
            summary.name.cyan(),
            summary.description,
            origin.dimmed(),
            id.to_string().dimmed()
        );
    }
}

pub fn print_metadata(id: Uuid, summary: &EntitySummary) {
    println!("  {:<14} {}", t!("common.label.uuid").blue(), id);
    if !summary.description.is_empty() {
        println!("  {:<14} {}", t!("common.label.description").blue(), summary.description);
    }
    if !summary.remote.is_empty() {
        println!("  {:<14} {}", t!("common.label.remote").blue(), summary.remote);
    }
    println!(
        "  {:<14} {}",
        t!("common.label.created").blue(),
        format_timestamp(&summary.created_at)
    );
    println!(
        "  {:<14} {}",
        t!("common.label.updated").blue(),
        format_timestamp(&summary.updated_at)
    );
}

/// Prints variable definitions as an aligned table.
pub fn print_variables(variables: &[Variable]) {
    if variables.is_empty() {
        println!("  {}", t!("common.none").dimmed());
        return;
    }
    for variable in variables {
        let mut flags = Vec::new();
        if variable.required {
            flags.push("required".red().to_string());
        }
        if let Some(default) = variable.default_value() {
            flags.push(format!("default={}", default));
        }
        if let Some(pattern) = variable.pattern() {
            flags.push(format!("regex={}", pattern));
        }
        println!(
            "  {:<28} {:<8} {}",
            variable.name.cyan(),
            variable.var_type.to_string().yellow(),
            flags.join(" ")
        );
        if !variable.title.is_empty() {
            println!("  {:<28} {}", "", variable.title.dimmed());
        }
    }
}

/// Prints values in the given order, masking secrets unless `reveal` is set.
pub fn print_values(pairs: &[(String, String)], reveal: bool) {
    if pairs.is_empty() {
        println!("  {}", t!("common.none").dimmed());
        return;
    }
    for (key, value) in pairs {
        let shown = if reveal {
            value.clone()
        } else {
            dotenv::mask_if_sensitive(key, value)
        };
        println!("  {:<28} {}", key.cyan(), shown);
    }
}
