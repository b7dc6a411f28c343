// src/bin/ee.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use ee::cli::{Cli, dispatcher};
use ee::core::runner::RunError;

/// The main entry point of the `ee` application.
/// It sets up logging, parses arguments, dispatches to the correct handler,
/// and performs centralized error handling.
fn main() {
    let cli = Cli::parse();

    // `RUST_LOG` still wins; `--verbose` only raises the default.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run_cli(cli) {
        // A command run by `apply`/`env` already reported its own failure.
        if let Some(RunError::NonZeroExit { code, .. }) = e.downcast_ref::<RunError>() {
            std::process::exit(*code);
        }
        eprintln!("\n{}: {}", "Error".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
        }
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    if cli.args.is_empty() {
        // Nothing to do: show the full help.
        let mut command = <Cli as clap::CommandFactory>::command();
        command.print_help()?;
        println!();
        return Ok(());
    }

    let ctx = dispatcher::AppContext::open(cli.home.as_deref(), cli.yes)?;
    dispatcher::dispatch(cli.args, &ctx)
}
