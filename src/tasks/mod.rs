//! The command dispatch table
//!
//! Every task maps a short name to one external tool invocation (or, for
//! housekeeping tasks, to filesystem work done in-process). The table is
//! built once from the resolved [`Settings`] and never changes afterwards.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;
use thiserror::Error;

use crate::config_file::Settings;
use crate::discovery::{DiscoveryError, FileFilter};
use crate::invocation::{Invocation, InvocationError};
use crate::watch::WatchError;

mod quality;
mod scaffold;
mod testing;
mod tree;
mod venv;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("`{0}` does not accept extra arguments")]
    UnexpectedArguments(TaskName),
    #[error("`{0}` does not run an external tool")]
    NoTool(TaskName),
    #[error("virtual environment `{0}` does not exist (run `pyfab env` first)")]
    EnvironmentMissing(String),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error("file discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("watch failed: {0}")]
    Watch(#[from] WatchError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TaskError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        TaskError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Process exit code reported when a task fails before or while spawning its tool.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            TaskError::UnknownCommand(_) => 2,
            TaskError::Invocation(InvocationError::ToolNotFound(_)) => 127,
            _ => 1,
        }
    }
}

/// The statically known task names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskName {
    Analyse,
    Autoformat,
    Autotest,
    CheckTypes,
    Clean,
    Develop,
    Env,
    Fixtures,
    GenerateFiles,
    Install,
    Tree,
}

impl TaskName {
    pub const ALL: [TaskName; 11] = [
        TaskName::Analyse,
        TaskName::Autoformat,
        TaskName::Autotest,
        TaskName::CheckTypes,
        TaskName::Clean,
        TaskName::Develop,
        TaskName::Env,
        TaskName::Fixtures,
        TaskName::GenerateFiles,
        TaskName::Install,
        TaskName::Tree,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskName::Analyse => "analyse",
            TaskName::Autoformat => "autoformat",
            TaskName::Autotest => "autotest",
            TaskName::CheckTypes => "check-types",
            TaskName::Clean => "clean",
            TaskName::Develop => "develop",
            TaskName::Env => "env",
            TaskName::Fixtures => "fixtures",
            TaskName::GenerateFiles => "generate-files",
            TaskName::Install => "install",
            TaskName::Tree => "tree",
        }
    }

    /// Tasks done in-process, without an external tool to pass arguments to.
    #[must_use]
    pub fn is_builtin(self) -> bool {
        matches!(
            self,
            TaskName::Clean | TaskName::Develop | TaskName::GenerateFiles
        )
    }

    #[must_use]
    pub fn summary(self) -> &'static str {
        match self {
            TaskName::Analyse => "Analyse coding standards with pylint",
            TaskName::Autoformat => "Format source files with black",
            TaskName::Autotest => "Run the test suite with pytest",
            TaskName::CheckTypes => "Check variable types with mypy",
            TaskName::Clean => "Remove the virtual environment and pylint resource file",
            TaskName::Develop => "Scaffold files, create the virtual environment and install packages",
            TaskName::Env => "Create a bare virtual environment",
            TaskName::Fixtures => "Show the pytest fixtures used by the tests",
            TaskName::GenerateFiles => "Generate the essential files of a Python project",
            TaskName::Install => "Install the requirements file into the virtual environment",
            TaskName::Tree => "Print the directory tree",
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskName {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| TaskError::UnknownCommand(s.to_string()))
    }
}

/// How the program of a task entry is chosen at run time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tool {
    /// The configured interpreter, never the virtual environment's.
    BasePython,
    /// The virtual environment's interpreter when it exists, else the configured one.
    Python,
    /// The virtual environment's interpreter; the environment must exist.
    VenvPython,
    Program(String),
    /// Filesystem work done without spawning anything.
    Builtin,
}

/// One row of the dispatch table
#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub name: TaskName,
    pub tool: Tool,
    pub fixed_args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl TaskEntry {
    fn new(settings: &Settings, name: TaskName, tool: Tool, fixed_args: &[&str]) -> Self {
        let mut fixed_args: Vec<String> = fixed_args.iter().map(ToString::to_string).collect();
        let mut env = HashMap::new();
        if let Some(over) = settings.overrides.get(&name) {
            fixed_args.extend(over.args.iter().cloned());
            env.clone_from(&over.env);
        }
        Self {
            name,
            tool,
            fixed_args,
            env,
        }
    }
}

/// Per-run flags taken from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Show tool output that is hidden by default and log at debug level.
    pub debug: bool,
    /// Keep pytest warnings.
    pub warnings: bool,
    /// List every fixture instead of fixtures per test.
    pub whole: bool,
    /// Re-run tests whenever a source file changes.
    pub watch: bool,
    /// Tree depth; 0 means unlimited.
    pub depth: Option<usize>,
}

/// Everything a task needs besides its table entry
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub settings: Settings,
    /// Directory holding the config file, or the working directory without one.
    pub root: PathBuf,
    /// Directory pyfab was started from.
    pub cwd: PathBuf,
    pub options: RunOptions,
}

impl TaskContext {
    #[must_use]
    pub fn new(settings: Settings, root: PathBuf) -> Self {
        Self {
            settings,
            cwd: root.clone(),
            root,
            options: RunOptions::default(),
        }
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = cwd;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn venv_dir(&self) -> PathBuf {
        self.root.join(&self.settings.env_name)
    }

    #[must_use]
    pub fn venv_python(&self) -> PathBuf {
        let dir = self.venv_dir();
        if cfg!(windows) {
            dir.join("Scripts").join("python.exe")
        } else {
            dir.join("bin").join("python")
        }
    }

    #[must_use]
    pub fn venv_exists(&self) -> bool {
        self.venv_dir().is_dir()
    }

    fn program(&self, entry: &TaskEntry) -> Result<String, TaskError> {
        match &entry.tool {
            Tool::BasePython => Ok(self.settings.python.clone()),
            Tool::Python if self.venv_exists() => {
                Ok(self.venv_python().to_string_lossy().into_owned())
            }
            Tool::Python => Ok(self.settings.python.clone()),
            Tool::VenvPython if self.venv_exists() => {
                Ok(self.venv_python().to_string_lossy().into_owned())
            }
            Tool::VenvPython => Err(TaskError::EnvironmentMissing(
                self.settings.env_name.clone(),
            )),
            Tool::Program(program) => Ok(program.clone()),
            Tool::Builtin => Err(TaskError::NoTool(entry.name)),
        }
    }

    /// The invocation of `entry` with its fixed arguments, rooted at the project root.
    pub(crate) fn invocation(&self, entry: &TaskEntry) -> Result<Invocation, TaskError> {
        Ok(Invocation::new(self.program(entry)?)
            .args(entry.fixed_args.iter().cloned())
            .envs(&entry.env)
            .current_dir(&self.root))
    }

    /// Source filter; `exclude_files` is skipped for tasks that touch every file.
    pub(crate) fn source_filter(&self, with_excluded_files: bool) -> FileFilter {
        FileFilter {
            include_files: self.settings.include_files.clone(),
            exclude_files: if with_excluded_files {
                self.settings.exclude_files.clone()
            } else {
                Vec::new()
            },
            exclude_dirs: self.settings.exclude_dirs.clone(),
        }
    }
}

/// The immutable name to invocation mapping
#[derive(Debug, Clone)]
pub struct TaskTable {
    entries: Vec<TaskEntry>,
}

impl TaskTable {
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let requirements = settings.requirements.to_string_lossy().into_owned();
        let tree_ignore = format!("{}|*pycache*", settings.env_name);
        let entries = TaskName::ALL
            .into_iter()
            .map(|name| match name {
                TaskName::Analyse => TaskEntry::new(settings, name, Tool::Python, &["-m", "pylint"]),
                TaskName::Autoformat => {
                    TaskEntry::new(settings, name, Tool::Python, &["-m", "black"])
                }
                TaskName::Autotest => {
                    TaskEntry::new(settings, name, Tool::Python, &["-m", "pytest", "-v"])
                }
                TaskName::CheckTypes => {
                    TaskEntry::new(settings, name, Tool::Python, &["-m", "mypy"])
                }
                TaskName::Env => TaskEntry::new(settings, name, Tool::BasePython, &["-m", "venv"]),
                TaskName::Fixtures => {
                    TaskEntry::new(settings, name, Tool::Python, &["-m", "pytest"])
                }
                TaskName::Install => TaskEntry::new(
                    settings,
                    name,
                    Tool::VenvPython,
                    &["-m", "pip", "install", "-r", requirements.as_str()],
                ),
                TaskName::Tree => TaskEntry::new(
                    settings,
                    name,
                    Tool::Program("tree".to_string()),
                    &["-v", "-I", tree_ignore.as_str(), "--dirsfirst"],
                ),
                TaskName::Clean | TaskName::Develop | TaskName::GenerateFiles => TaskEntry {
                    name,
                    tool: Tool::Builtin,
                    fixed_args: Vec::new(),
                    env: HashMap::new(),
                },
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[TaskEntry] {
        &self.entries
    }

    /// Look up the entry registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::UnknownCommand` if no task has that name.
    pub fn resolve(&self, name: &str) -> Result<&TaskEntry, TaskError> {
        self.entries
            .iter()
            .find(|entry| entry.name.as_str() == name)
            .ok_or_else(|| TaskError::UnknownCommand(name.to_string()))
    }

    /// Run the task registered under `name`, forwarding `extra_args` to its tool.
    ///
    /// Returns the delegated tool's exit code unchanged.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::UnknownCommand` without spawning anything if `name`
    /// is not in the table. Other variants report why the tool could not run.
    pub fn run(
        &self,
        ctx: &TaskContext,
        name: &str,
        extra_args: &[String],
    ) -> Result<i32, TaskError> {
        let entry = self.resolve(name)?;
        debug!("Dispatching `{}` with {} extra args", entry.name, extra_args.len());

        if entry.tool == Tool::Builtin
            && entry.name != TaskName::Develop
            && !extra_args.is_empty()
        {
            return Err(TaskError::UnexpectedArguments(entry.name));
        }

        match entry.name {
            TaskName::Analyse => quality::analyse(ctx, entry, extra_args),
            TaskName::Autoformat => quality::autoformat(ctx, entry, extra_args),
            TaskName::CheckTypes => quality::check_types(ctx, entry, extra_args),
            TaskName::Autotest => testing::autotest(ctx, entry, extra_args),
            TaskName::Fixtures => testing::fixtures(ctx, entry, extra_args),
            TaskName::Env => venv::env(ctx, entry, extra_args),
            TaskName::Install => venv::install(ctx, entry, extra_args),
            TaskName::Clean => venv::clean(ctx),
            TaskName::Develop => venv::develop(self, ctx, extra_args),
            TaskName::GenerateFiles => scaffold::generate_files(ctx),
            TaskName::Tree => tree::tree(ctx, entry, extra_args),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::config_file::TaskOverride;

    fn table() -> TaskTable {
        TaskTable::new(&Settings::defaults().unwrap())
    }

    #[test]
    fn test_every_name_resolves_to_one_entry() {
        let table = table();
        assert_eq!(table.entries().len(), TaskName::ALL.len());
        let names: HashSet<&str> = table.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names.len(), TaskName::ALL.len());
        for name in TaskName::ALL {
            assert_eq!(table.resolve(name.as_str()).unwrap().name, name);
        }
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let table = table();
        match table.resolve("lint") {
            Err(TaskError::UnknownCommand(name)) => assert_eq!(name, "lint"),
            other => panic!("Expected UnknownCommand, got: {other:?}"),
        }
        assert!(matches!(
            "check_types".parse::<TaskName>(),
            Err(TaskError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_unknown_name_never_spawns() {
        let mut settings = Settings::defaults().unwrap();
        settings.python = "/nonexistent/pyfab/python".to_string();
        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext::new(settings.clone(), dir.path().to_path_buf());
        let result = TaskTable::new(&settings).run(&ctx, "deploy", &[]);
        assert!(matches!(result, Err(TaskError::UnknownCommand(_))));
        assert_eq!(result.unwrap_err().exit_code(), 2);
    }

    #[test]
    fn test_builtin_rejects_extra_args() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::defaults().unwrap();
        let ctx = TaskContext::new(settings.clone(), dir.path().to_path_buf());
        let result = TaskTable::new(&settings).run(&ctx, "clean", &["--force".to_string()]);
        assert!(matches!(
            result,
            Err(TaskError::UnexpectedArguments(TaskName::Clean))
        ));
    }

    #[test]
    fn test_overrides_extend_fixed_args() {
        let mut settings = Settings::defaults().unwrap();
        let mut env = HashMap::new();
        env.insert("PYLINTHOME".to_string(), ".cache/pylint".to_string());
        settings.overrides.insert(
            TaskName::Analyse,
            TaskOverride {
                args: vec!["--disable=C0114".to_string()],
                env,
            },
        );
        let table = TaskTable::new(&settings);
        let entry = table.resolve("analyse").unwrap();
        assert_eq!(entry.fixed_args, vec!["-m", "pylint", "--disable=C0114"]);
        assert_eq!(entry.env.len(), 1);
        assert!(table.resolve("autoformat").unwrap().env.is_empty());
    }

    #[test]
    fn test_python_prefers_virtual_environment() {
        let table = table();
        let analyse = table.resolve("analyse").unwrap();
        let install = table.resolve("install").unwrap();
        let env = table.resolve("env").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext::new(Settings::defaults().unwrap(), dir.path().to_path_buf());
        assert_eq!(ctx.program(analyse).unwrap(), "python");
        assert!(matches!(
            ctx.program(install),
            Err(TaskError::EnvironmentMissing(_))
        ));

        std::fs::create_dir(ctx.venv_dir()).unwrap();
        let venv_python = ctx.venv_python().to_string_lossy().into_owned();
        assert_eq!(ctx.program(analyse).unwrap(), venv_python);
        assert_eq!(ctx.program(env).unwrap(), "python");
    }

    #[test]
    fn test_builtin_has_no_program() {
        let table = table();
        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext::new(Settings::defaults().unwrap(), dir.path().to_path_buf());
        for name in TaskName::ALL.into_iter().filter(|n| n.is_builtin()) {
            let entry = table.resolve(name.as_str()).unwrap();
            assert_eq!(entry.tool, Tool::Builtin);
            assert!(matches!(ctx.invocation(entry), Err(TaskError::NoTool(n)) if n == name));
        }
    }
}
