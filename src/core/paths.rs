// src/core/paths.rs

use crate::constants::DEFAULT_HOME_DIRNAME;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find the home directory.")]
    HomeDirNotFound,
    #[error("Failed to expand path '{template}': {message}")]
    Expansion { template: String, message: String },
    #[error("Could not create directory at '{path}': {source}")]
    DirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Returns `~/.ee`. Does not create it.
pub fn default_base_dir() -> Result<PathBuf, PathError> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_HOME_DIRNAME))
        .ok_or(PathError::HomeDirNotFound)
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a path.
pub fn expand_path(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        message: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Creates `path` if needed and returns its absolute form.
///
/// `dunce` keeps Windows paths in their familiar form instead of the `\\?\` prefix.
pub fn prepare_dir(path: &Path) -> Result<PathBuf, PathError> {
    let creation_err = |source| PathError::DirCreation {
        path: path.display().to_string(),
        source,
    };
    fs::create_dir_all(path).map_err(creation_err)?;
    dunce::canonicalize(path).map_err(creation_err)
}
