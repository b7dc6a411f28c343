// src/cli/dispatcher.rs

use anyhow::{Context, Result, anyhow};

use crate::{
    cli::handlers,
    core::{settings::Settings, storage::FileStorage},
};

/// Everything a handler needs, built once per invocation and passed down explicitly.
#[derive(Debug)]
pub struct AppContext {
    pub settings: Settings,
    pub storage: FileStorage,
    /// Skip confirmation prompts (`--yes`).
    pub assume_yes: bool,
}

impl AppContext {
    /// Loads settings and opens the store under the resolved base directory.
    pub fn open(home_override: Option<&str>, assume_yes: bool) -> Result<Self> {
        let settings = Settings::load(home_override).context(t!("error.settings_load"))?;
        let storage = FileStorage::open(&settings.base_dir).with_context(|| {
            format!(t!("error.storage_open"), path = settings.base_dir.display())
        })?;
        Ok(Self {
            settings,
            storage,
            assume_yes,
        })
    }
}

// --- Command Definition and Registry ---

/// Defines a command, its aliases, and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &AppContext) -> Result<()>,
}

/// The single source of truth for all commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "schema",
        aliases: &["schemas"],
        handler: handlers::schema::handle,
    },
    CommandDefinition {
        name: "project",
        aliases: &["projects"],
        handler: handlers::project::handle,
    },
    CommandDefinition {
        name: "sheet",
        aliases: &["sheets"],
        handler: handlers::sheet::handle,
    },
    CommandDefinition {
        name: "apply",
        aliases: &["run"],
        handler: handlers::apply::handle,
    },
    CommandDefinition {
        name: "env",
        aliases: &[],
        handler: handlers::env::handle,
    },
    CommandDefinition {
        name: "verify",
        aliases: &["check"],
        handler: handlers::verify::handle,
    },
    CommandDefinition {
        name: "stats",
        aliases: &[],
        handler: handlers::stats::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Whether `name` is a known command or alias.
pub fn is_command(name: &str) -> bool {
    find_command(name).is_some()
}

/// Routes `ee <command> [args...]` to its handler.
pub fn dispatch(all_args: Vec<String>, ctx: &AppContext) -> Result<()> {
    log::debug!("Dispatching args: {:?}", all_args);

    let mut args = all_args.into_iter();
    let Some(name) = args.next() else {
        return Err(anyhow!(t!("error.no_command")));
    };
    let command = find_command(&name).ok_or_else(|| anyhow!(t!("error.unknown_command"), name))?;
    (command.handler)(args.collect(), ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_and_aliases_resolve() {
        for name in [
            "schema", "schemas", "project", "sheet", "sheets", "apply", "run", "env", "verify",
            "check", "stats",
        ] {
            assert!(is_command(name), "{name} should be a command");
        }
        assert!(!is_command("exec"));
    }
}
