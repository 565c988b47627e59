//! Configuration file handling for pyfab

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glob::Pattern;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tasks::TaskName;

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),
    #[error("Unknown working directory: {0}")]
    UnknownWorkingDirectory(String),
    #[error("Unable to parse YAML config file {path}: {source}")]
    Yaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("Unable to parse JSON config file {path}: {source}")]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("Invalid glob pattern `{pattern}`: {source}")]
    Pattern {
        source: glob::PatternError,
        pattern: String,
    },
    #[error("Unknown task in config: {0}")]
    UnknownTask(String),
    #[error("Invalid config: {0}")]
    Validation(String),
}

const DEFAULT_PYTHON: &str = "python";
const DEFAULT_ENV_NAME: &str = "env";
const DEFAULT_REQUIREMENTS: &str = "requirements.txt";
const DEFAULT_README: &str = "README.md";
const DEFAULT_PYLINTRC: &str = ".pylintrc";
const DEFAULT_MYPY_CONFIG: &str = "mypy.ini";
const DEFAULT_TESTS_DIR: &str = "tests";
const DEFAULT_TREE_DEPTH: usize = 2;
const DEFAULT_PACKAGES: [&str; 6] = ["coloredlogs", "fabric", "black", "pylint", "pytest", "mypy"];
const DEFAULT_INCLUDE_FILES: [&str; 1] = ["*.py"];
const DEFAULT_EXCLUDE_FILES: [&str; 2] = ["draft.py", "fabfile.py"];
const DEFAULT_EXCLUDE_DIRS: [&str; 2] = ["**/__pycache__/*", "**/_build/*"];

/// Compile a list of glob pattern strings.
///
/// # Errors
///
/// Returns `ConfigError::Pattern` if any pattern fails to compile.
pub fn parse_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p.as_ref()).map_err(|e| ConfigError::Pattern {
                source: e,
                pattern: p.as_ref().to_string(),
            })
        })
        .collect()
}

/// Per-task overrides as written in the config file
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigTask {
    pub args: Option<Vec<String>>,
    pub env: Option<HashMap<String, String>>,
}

/// Root configuration structure for pyfab
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub pyfab_version: Option<String>,
    pub python: Option<String>,
    pub env_name: Option<String>,
    pub requirements: Option<PathBuf>,
    pub readme: Option<PathBuf>,
    pub pylintrc: Option<PathBuf>,
    pub mypy_config: Option<PathBuf>,
    pub tests_dirs: Option<Vec<PathBuf>>,
    pub tree_depth: Option<usize>,
    pub packages: Option<Vec<String>>,
    pub include_files: Option<Vec<String>>,
    pub exclude_files: Option<Vec<String>>,
    pub exclude_dirs: Option<Vec<String>>,
    pub tasks: Option<HashMap<String, ConfigTask>>,
}

/// Fixed arguments and environment layered onto a task's default invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOverride {
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

/// Resolved settings shared by every task
#[derive(Debug, Clone)]
pub struct Settings {
    pub python: String,
    pub env_name: String,
    pub requirements: PathBuf,
    pub readme: PathBuf,
    pub pylintrc: PathBuf,
    pub mypy_config: PathBuf,
    pub tests_dirs: Vec<PathBuf>,
    pub tree_depth: usize,
    pub packages: Vec<String>,
    pub include_files: Vec<Pattern>,
    pub exclude_files: Vec<Pattern>,
    pub exclude_dirs: Vec<Pattern>,
    pub overrides: HashMap<TaskName, TaskOverride>,
}

impl Settings {
    /// Settings with every value at its default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` only if a built-in default pattern is invalid.
    pub fn defaults() -> Result<Self, ConfigError> {
        Config::default().try_into()
    }
}

fn validate_env_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "env_name must not be empty".to_string(),
        ));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "env_name `{name}` must be a plain directory name"
        )));
    }
    Ok(())
}

fn resolve_overrides(
    tasks: HashMap<String, ConfigTask>,
) -> Result<HashMap<TaskName, TaskOverride>, ConfigError> {
    tasks
        .into_iter()
        .map(|(name, task)| {
            let task_name = name
                .parse::<TaskName>()
                .map_err(|_| ConfigError::UnknownTask(name.clone()))?;
            if task_name.is_builtin() {
                return Err(ConfigError::Validation(format!(
                    "task `{task_name}` runs no external tool and takes no args or env"
                )));
            }
            Ok((
                task_name,
                TaskOverride {
                    args: task.args.unwrap_or_default(),
                    env: task.env.unwrap_or_default(),
                },
            ))
        })
        .collect()
}

impl TryFrom<Config> for Settings {
    type Error = ConfigError;

    fn try_from(config: Config) -> Result<Self, Self::Error> {
        let python = config
            .python
            .unwrap_or_else(|| DEFAULT_PYTHON.to_string());
        if python.trim().is_empty() {
            return Err(ConfigError::Validation(
                "python must not be empty".to_string(),
            ));
        }

        let env_name = config
            .env_name
            .unwrap_or_else(|| DEFAULT_ENV_NAME.to_string());
        validate_env_name(&env_name)?;

        let include_files = match config.include_files {
            Some(patterns) => parse_patterns(&patterns)?,
            None => parse_patterns(&DEFAULT_INCLUDE_FILES)?,
        };
        let exclude_files = match config.exclude_files {
            Some(patterns) => parse_patterns(&patterns)?,
            None => parse_patterns(&DEFAULT_EXCLUDE_FILES)?,
        };
        let exclude_dirs = match config.exclude_dirs {
            Some(patterns) => parse_patterns(&patterns)?,
            None => {
                let mut patterns: Vec<String> =
                    DEFAULT_EXCLUDE_DIRS.iter().map(ToString::to_string).collect();
                patterns.push(format!("**/{}/*", Pattern::escape(&env_name)));
                parse_patterns(&patterns)?
            }
        };

        Ok(Settings {
            python,
            requirements: config
                .requirements
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REQUIREMENTS)),
            readme: config
                .readme
                .unwrap_or_else(|| PathBuf::from(DEFAULT_README)),
            pylintrc: config
                .pylintrc
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PYLINTRC)),
            mypy_config: config
                .mypy_config
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MYPY_CONFIG)),
            tests_dirs: config
                .tests_dirs
                .unwrap_or_else(|| vec![PathBuf::from(DEFAULT_TESTS_DIR)]),
            tree_depth: config.tree_depth.unwrap_or(DEFAULT_TREE_DEPTH),
            packages: config
                .packages
                .unwrap_or_else(|| DEFAULT_PACKAGES.iter().map(ToString::to_string).collect()),
            include_files,
            exclude_files,
            exclude_dirs,
            overrides: resolve_overrides(config.tasks.unwrap_or_default())?,
            env_name,
        })
    }
}

/// List of supported configuration file names
const FILENAMES: [&str; 3] = [".pyfab.yaml", ".pyfab.yml", ".pyfab.json"];

impl Config {
    /// Loads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if the file cannot be read, or
    /// `ConfigError::Yaml`/`ConfigError::Json` if parsing fails.
    pub fn from_file(file: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(file)
            .map_err(|_| ConfigError::ConfigNotFound(file.to_path_buf()))?;
        if file.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Json {
                source: e,
                path: file.to_path_buf(),
            })
        } else if contents.trim().is_empty() {
            Ok(Config::default())
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml {
                source: e,
                path: file.to_path_buf(),
            })
        }
    }

    /// Searches `start` and its parents for a configuration file.
    #[must_use]
    pub fn find_config_from(start: &Path) -> Option<PathBuf> {
        let mut path = start.to_path_buf();
        debug!("Searching for config file in {}", start.display());
        loop {
            for file in &FILENAMES {
                let config_path = path.join(file);
                if config_path.is_file() {
                    info!("Found config file: {}", config_path.display());
                    return Some(config_path);
                }
            }
            if !path.pop() {
                return None;
            }
        }
    }

    /// Searches the current directory and its parents for a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownWorkingDirectory` if the cwd cannot be determined.
    pub fn find_config() -> Result<Option<PathBuf>, ConfigError> {
        let cwd = std::env::current_dir()
            .map_err(|e| ConfigError::UnknownWorkingDirectory(e.to_string()))?;
        Ok(Self::find_config_from(&cwd))
    }
}
