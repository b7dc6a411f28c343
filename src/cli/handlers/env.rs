// src/cli/handlers/env.rs

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::{
    cli::{dispatcher::AppContext, handlers::commons},
    core::{dotenv, runner},
};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Runs a command with the values of a .env file in its environment."
)]
struct EnvArgs {
    /// The .env file to load. Nothing is validated or stored.
    #[arg(long = "env-file", short = 'e', value_name = "FILE")]
    file: PathBuf,
    /// The command to run after `--`. Starts an interactive shell when omitted.
    #[arg(last = true)]
    command: Vec<String>,
}

pub fn handle(args: Vec<String>, _ctx: &AppContext) -> Result<()> {
    let args = EnvArgs::try_parse_from(&args)?;
    let values = dotenv::parse_dotenv(&commons::read_file(&args.file)?)?;
    let env = runner::child_environment(&values)?;

    let command = if args.command.is_empty() {
        runner::default_shell(|name| std::env::var(name).ok())
    } else {
        args.command
    };

    let cwd = std::env::current_dir().context(t!("error.current_dir"))?;
    runner::run(&command, &cwd, &env)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_follows_separator() {
        let args =
            EnvArgs::try_parse_from(["-e", ".env", "--", "npm", "run", "--port", "3"]).unwrap();
        assert_eq!(args.file, PathBuf::from(".env"));
        assert_eq!(args.command, vec!["npm", "run", "--port", "3"]);

        let shell = EnvArgs::try_parse_from(["--env-file", "prod.env"]).unwrap();
        assert!(shell.command.is_empty());
    }
}
