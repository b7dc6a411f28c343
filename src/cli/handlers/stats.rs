// src/cli/handlers/stats.rs

use anyhow::Result;
use clap::Parser;
use colored::*;

use crate::{cli::dispatcher::AppContext, core::storage::Storage};

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Prints how many entities of each kind are stored.")]
struct StatsArgs {}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    StatsArgs::try_parse_from(&args)?;
    let stats = ctx.storage.stats()?;

    println!("\n{}", t!("stats.header").bold());
    println!("  {:<16} {}", t!("common.label.base_dir").blue(), ctx.storage.base_dir().display());
    println!("  {:<16} {}", t!("stats.label.schemas").blue(), stats.schemas);
    println!("  {:<16} {}", t!("stats.label.projects").blue(), stats.projects);
    println!("  {:<16} {}", t!("stats.label.config_sheets").blue(), stats.config_sheets);
    println!("  {:<16} {}", t!("stats.label.total").blue(), stats.total().to_string().bold());
    if ctx.settings.api.enabled {
        println!("  {:<16} {}", t!("stats.label.api").blue(), ctx.settings.api.base_url);
    }
    Ok(())
}
