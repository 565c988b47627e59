//! Core implementation of the pyfab task runner
//!
//! pyfab maps short command names (`analyse`, `autotest`, `develop`, ...) to
//! invocations of the usual Python tooling: pylint, black, pytest, mypy, the
//! `venv` module with pip, and `tree`. Defaults can be overridden per project
//! with a `.pyfab.yaml` (or `.pyfab.json`) file.

use std::path::PathBuf;

use log::{debug, warn};

use crate::config_file::{Config, ConfigError, Settings};

pub mod config_file;
pub mod discovery;
pub mod interrupt;
pub mod invocation;
pub mod logger;
pub mod messages;
pub mod tasks;
pub mod theme;
pub mod watch;

/// Load configuration from a file (or auto-detect), returning the resolved settings and project root.
///
/// Without a config file the defaults apply and the current directory is the root.
///
/// # Errors
///
/// Returns `ConfigError` if an explicit config file is missing, a config file
/// cannot be parsed, or it contains invalid values.
pub fn load_config(config_file: Option<&str>) -> Result<(Settings, PathBuf), ConfigError> {
    let config_path = match config_file {
        Some(file) => {
            let config_path = PathBuf::from(file);
            if !config_path.is_file() {
                return Err(ConfigError::ConfigNotFound(config_path));
            }
            Some(config_path)
        }
        None => Config::find_config()?,
    };

    let Some(config_path) = config_path else {
        let cwd = std::env::current_dir()
            .map_err(|e| ConfigError::UnknownWorkingDirectory(e.to_string()))?;
        debug!("No config file found, using defaults (root: {})", cwd.display());
        return Ok((Settings::defaults()?, cwd));
    };

    let config_path = config_path
        .canonicalize()
        .map_err(|_| ConfigError::ConfigNotFound(config_path.clone()))?;
    let root = config_path
        .parent()
        .ok_or_else(|| ConfigError::ConfigNotFound(config_path.clone()))?
        .to_path_buf();
    debug!(
        "Loading config file: {} (root: {})",
        config_path.display(),
        root.display()
    );

    let parsed = Config::from_file(&config_path)?;
    if let Some(version) = parsed.pyfab_version.as_deref() {
        validate_version(version);
    }
    Ok((parsed.try_into()?, root))
}

/// Warn if the config's `pyfab_version` doesn't match the binary version
fn validate_version(config_version: &str) {
    let binary_version = env!("CARGO_PKG_VERSION");
    if config_version != binary_version {
        warn!(
            "Config pyfab_version '{config_version}' differs from binary version '{binary_version}'"
        );
    }
}
