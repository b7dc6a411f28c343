// src/core/runner.rs

//! Runs a command with a config sheet's values in its environment.
//!
//! The child inherits the caller's environment and stdio; sheet values are
//! layered on top and win over inherited variables of the same name.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;

/// Failures while preparing or running a child process.
#[derive(Error, Debug)]
pub enum RunError {
    /// No program was given to run.
    #[error("No command specified to run")]
    EmptyCommand,

    /// The key cannot be passed to a child process.
    #[error("'{key}' cannot be used as an environment variable name")]
    InvalidKey { key: String },

    /// The value of `key` contains a NUL byte.
    #[error("The value of '{key}' contains a NUL byte")]
    InvalidValue { key: String },

    #[error("Command '{program}' could not be started: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The child ran and exited with a non-zero status.
    #[error("Command '{program}' exited with status {code}")]
    NonZeroExit { program: String, code: i32 },

    /// The child was killed before it could report a status.
    #[error("Command '{program}' was terminated by a signal")]
    Terminated { program: String },
}

pub type RunResult<T> = Result<T, RunError>;

/// Checks resolved sheet values and returns the variables to set on the child.
///
/// Keys must be non-empty and free of `=` and NUL; values must be free of NUL.
/// Anything else would be rejected or silently mangled by the OS.
pub fn child_environment(values: &BTreeMap<String, String>) -> RunResult<Vec<(String, String)>> {
    values
        .iter()
        .map(|(key, value)| {
            if key.is_empty() || key.contains(['=', '\0']) {
                return Err(RunError::InvalidKey { key: key.clone() });
            }
            if value.contains('\0') {
                return Err(RunError::InvalidValue { key: key.clone() });
            }
            Ok((key.clone(), value.clone()))
        })
        .collect()
}

/// The interactive shell started when no command is given.
///
/// `lookup` reads an environment variable; `SHELL` (or `COMSPEC` on Windows)
/// is used when set, else `/bin/sh -i` (or `cmd.exe`).
pub fn default_shell<F>(lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
    if cfg!(target_os = "windows") {
        vec![non_empty("COMSPEC").unwrap_or_else(|| "cmd.exe".to_string())]
    } else {
        vec![non_empty("SHELL").unwrap_or_else(|| "/bin/sh".to_string()), "-i".to_string()]
    }
}

/// Runs `command` in `cwd` with `env` added to the inherited environment and
/// waits for it. A non-zero exit is reported as [`RunError::NonZeroExit`] so
/// callers can pass the code on.
pub fn run(command: &[String], cwd: &Path, env: &[(String, String)]) -> RunResult<()> {
    let Some((program, args)) = command.split_first() else {
        return Err(RunError::EmptyCommand);
    };
    let clean_cwd = dunce::simplified(cwd);
    log::info!("Running '{}' with {} variable(s).", command.join(" "), env.len());

    let mut child = Command::new(program);
    child
        .args(args)
        .current_dir(clean_cwd)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    // Windows built-ins like `echo` only exist inside cmd.
    let status = match child.status() {
        Ok(status) => status,
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
            Command::new("cmd")
                .arg("/C")
                .args(command)
                .current_dir(clean_cwd)
                .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .status()
                .map_err(|source| RunError::Spawn {
                    program: program.clone(),
                    source,
                })?
        }
        Err(source) => {
            return Err(RunError::Spawn {
                program: program.clone(),
                source,
            });
        }
    };

    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(RunError::NonZeroExit {
            program: program.clone(),
            code,
        }),
        None => Err(RunError::Terminated {
            program: program.clone(),
        }),
    }
}
