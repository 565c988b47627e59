use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::{TaskContext, TaskEntry, TaskError};
use crate::discovery;

const MYPY_CONTENT: &str = "\
[mypy]
ignore_missing_imports = True
explicit_package_bases = True
";

fn discover_sources(
    ctx: &TaskContext,
    with_excluded_files: bool,
) -> Result<Vec<PathBuf>, TaskError> {
    let filter = ctx.source_filter(with_excluded_files);
    if with_excluded_files {
        let names: Vec<&str> = filter.exclude_files.iter().map(glob::Pattern::as_str).collect();
        debug!("Excluded files: {}", names.join(", "));
    }
    let dirs: Vec<&str> = filter.exclude_dirs.iter().map(glob::Pattern::as_str).collect();
    debug!("Excluded directories: {}", dirs.join(", "));

    let files = discovery::discover(&ctx.root, &filter)?;
    Ok(files)
}

fn log_files(verb: &str, files: &[PathBuf]) {
    let listing: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
    debug!("Files to {verb}:\n{}", listing.join("\n"));
}

fn run_over_files(
    ctx: &TaskContext,
    entry: &TaskEntry,
    extra_args: &[String],
    files: &[PathBuf],
) -> Result<i32, TaskError> {
    let invocation = ctx
        .invocation(entry)?
        .args(extra_args.iter().cloned())
        .args(files.iter().map(|f| f.to_string_lossy().into_owned()));
    Ok(invocation.run(false)?.exit_code)
}

pub(super) fn analyse(
    ctx: &TaskContext,
    entry: &TaskEntry,
    extra_args: &[String],
) -> Result<i32, TaskError> {
    let files = discover_sources(ctx, true)?;
    if files.is_empty() {
        info!("No files to analyse.");
        return Ok(0);
    }
    log_files("analyse", &files);
    info!("Analyzing {} files...", files.len());
    run_over_files(ctx, entry, extra_args, &files)
}

pub(super) fn autoformat(
    ctx: &TaskContext,
    entry: &TaskEntry,
    extra_args: &[String],
) -> Result<i32, TaskError> {
    let files = discover_sources(ctx, false)?;
    if files.is_empty() {
        info!("No files to format.");
        return Ok(0);
    }
    log_files("format", &files);
    run_over_files(ctx, entry, extra_args, &files)
}

/// Removes the mypy config on drop, but only when this run wrote it.
struct MypyConfig {
    path: PathBuf,
    created: bool,
}

impl MypyConfig {
    fn ensure(path: &Path) -> Result<Self, TaskError> {
        if path.is_file() {
            info!("File mypy config `{}` already exists", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
                created: false,
            });
        }
        std::fs::write(path, MYPY_CONTENT).map_err(|e| TaskError::io(path, e))?;
        info!("Created file mypy config `{}`", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            created: true,
        })
    }
}

impl Drop for MypyConfig {
    fn drop(&mut self) {
        if !self.created {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("Removed file mypy config `{}`", self.path.display()),
            Err(e) => warn!("Could not remove mypy config `{}`: {e}", self.path.display()),
        }
    }
}

pub(super) fn check_types(
    ctx: &TaskContext,
    entry: &TaskEntry,
    extra_args: &[String],
) -> Result<i32, TaskError> {
    let files = discover_sources(ctx, true)?;
    if files.is_empty() {
        info!("No files to check types.");
        return Ok(0);
    }

    let _config = MypyConfig::ensure(&ctx.root.join(&ctx.settings.mypy_config))?;
    log_files("check types", &files);
    info!("Checking {} files...", files.len());
    run_over_files(ctx, entry, extra_args, &files)
}
