use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use log::{debug, info};

use super::{TaskContext, TaskEntry, TaskError};
use crate::invocation::Invocation;
use crate::{interrupt, watch};

const DISABLE_WARNINGS: &str = "--disable-pytest-warnings";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Configured test directories that exist, relative to the root.
fn existing_tests_dirs(ctx: &TaskContext) -> Vec<PathBuf> {
    ctx.settings
        .tests_dirs
        .iter()
        .filter(|dir| {
            let exists = ctx.root.join(dir).is_dir();
            if !exists {
                debug!("Directory {} does not exist.", dir.display());
            }
            exists
        })
        .cloned()
        .collect()
}

fn pytest_invocation(
    ctx: &TaskContext,
    entry: &TaskEntry,
    extra_args: &[String],
    tests_dirs: &[PathBuf],
) -> Result<Invocation, TaskError> {
    let mut invocation = ctx
        .invocation(entry)?
        .args(extra_args.iter().cloned())
        .args(tests_dirs.iter().map(|d| d.to_string_lossy().into_owned()));
    if !ctx.options.warnings {
        invocation = invocation.arg(DISABLE_WARNINGS);
    }
    Ok(invocation)
}

pub(super) fn autotest(
    ctx: &TaskContext,
    entry: &TaskEntry,
    extra_args: &[String],
) -> Result<i32, TaskError> {
    let tests_dirs = existing_tests_dirs(ctx);
    if tests_dirs.is_empty() {
        info!("No test directory.");
        return Ok(0);
    }

    let invocation = pytest_invocation(ctx, entry, extra_args, &tests_dirs)?;
    if !ctx.options.watch {
        return Ok(invocation.run(false)?.exit_code);
    }

    let (changes, _debouncer) = watch::watch_sources(&ctx.root, ctx.source_filter(false))?;
    let mut last = invocation.run(false)?.exit_code;
    info!("Watching {} for changes (Ctrl-C to stop)", ctx.root.display());

    loop {
        if interrupt::take() {
            info!("Stopped watching.");
            break;
        }
        let changed = match changes.recv_timeout(POLL_INTERVAL) {
            Ok(changed) => changed,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let listing: Vec<String> = changed.iter().map(|p| p.display().to_string()).collect();
        debug!("Changed: {}", listing.join(", "));
        if std::io::stdout().is_terminal() {
            print!("\x1b[2J\x1b[H");
            let _ = std::io::stdout().flush();
        }
        last = invocation.run(false)?.exit_code;
    }

    Ok(last)
}

pub(super) fn fixtures(
    ctx: &TaskContext,
    entry: &TaskEntry,
    extra_args: &[String],
) -> Result<i32, TaskError> {
    let scope = if ctx.options.whole {
        "--fixtures"
    } else {
        "--fixtures-per-test"
    };
    let mut invocation = ctx
        .invocation(entry)?
        .arg(scope)
        .args(extra_args.iter().cloned());
    if !ctx.options.warnings {
        invocation = invocation.arg(DISABLE_WARNINGS);
    }
    Ok(invocation.run(false)?.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::Settings;
    use crate::tasks::{RunOptions, TaskTable};

    fn context(options: RunOptions) -> (tempfile::TempDir, TaskContext, TaskTable) {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::defaults().unwrap();
        settings.tests_dirs = vec![PathBuf::from("tests"), PathBuf::from("integration")];
        let table = TaskTable::new(&settings);
        let ctx = TaskContext::new(settings, dir.path().to_path_buf()).with_options(options);
        (dir, ctx, table)
    }

    #[test]
    fn test_autotest_without_tests_dir_is_a_no_op() {
        let (_dir, mut ctx, table) = context(RunOptions::default());
        ctx.settings.python = "/nonexistent/pyfab/python".to_string();
        assert_eq!(table.run(&ctx, "autotest", &[]).unwrap(), 0);
    }

    #[test]
    fn test_pytest_invocation_keeps_existing_dirs_only() {
        let (_dir, ctx, table) = context(RunOptions::default());
        std::fs::create_dir(ctx.root.join("tests")).unwrap();
        let dirs = existing_tests_dirs(&ctx);
        assert_eq!(dirs, vec![PathBuf::from("tests")]);

        let entry = table.resolve("autotest").unwrap();
        let invocation =
            pytest_invocation(&ctx, entry, &["-k".to_string(), "smoke".to_string()], &dirs)
                .unwrap();
        insta::assert_snapshot!(
            invocation.to_string(),
            @"python -m pytest -v -k smoke tests --disable-pytest-warnings"
        );
    }

    #[test]
    fn test_pytest_invocation_with_warnings() {
        let (_dir, ctx, table) = context(RunOptions {
            warnings: true,
            ..Default::default()
        });
        let entry = table.resolve("autotest").unwrap();
        let invocation = pytest_invocation(&ctx, entry, &[], &[PathBuf::from("tests")]).unwrap();
        assert!(!invocation.args.iter().any(|a| a == DISABLE_WARNINGS));
    }

    #[cfg(unix)]
    #[test]
    fn test_fixtures_propagates_exit_code() {
        let (_dir, mut ctx, table) = context(RunOptions {
            whole: true,
            ..Default::default()
        });
        ctx.settings.python = "false".to_string();
        assert_eq!(table.run(&ctx, "fixtures", &[]).unwrap(), 1);
    }
}
