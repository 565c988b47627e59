use log::info;

use super::{TaskContext, TaskEntry, TaskError, TaskName, TaskTable, scaffold};
use crate::invocation::Invocation;

/// Create the virtual environment unless its directory already exists.
pub(super) fn env(
    ctx: &TaskContext,
    entry: &TaskEntry,
    extra_args: &[String],
) -> Result<i32, TaskError> {
    let env_name = &ctx.settings.env_name;
    if ctx.venv_exists() {
        info!("Directory `{env_name}` already exists.");
        return Ok(0);
    }

    let hide = !ctx.options.debug;
    let created = ctx
        .invocation(entry)?
        .arg(env_name.as_str())
        .args(extra_args.iter().cloned())
        .run(hide)?;
    if !created.success() {
        return Ok(created.exit_code);
    }
    info!("Created virtual environment `{env_name}`.");

    let upgrade = Invocation::new(ctx.venv_python().to_string_lossy())
        .args(["-m", "pip", "install", "--upgrade", "pip"])
        .envs(&entry.env)
        .current_dir(&ctx.root)
        .run(hide)?;
    if upgrade.success() {
        info!("Upgraded pip in `{env_name}`.");
    }
    Ok(upgrade.exit_code)
}

pub(super) fn install(
    ctx: &TaskContext,
    entry: &TaskEntry,
    extra_args: &[String],
) -> Result<i32, TaskError> {
    let outcome = ctx
        .invocation(entry)?
        .args(extra_args.iter().cloned())
        .run(!ctx.options.debug)?;
    if outcome.success() {
        info!(
            "Installed packages from file `{}`.",
            ctx.settings.requirements.display()
        );
    }
    Ok(outcome.exit_code)
}

/// Scaffold, create the environment, then install into it; stops at the first failure.
pub(super) fn develop(
    table: &TaskTable,
    ctx: &TaskContext,
    extra_args: &[String],
) -> Result<i32, TaskError> {
    scaffold::generate_files(ctx)?;

    let code = env(ctx, table.resolve(TaskName::Env.as_str())?, &[])?;
    if code != 0 {
        return Ok(code);
    }

    install(ctx, table.resolve(TaskName::Install.as_str())?, extra_args)
}

/// Remove the virtual environment and the pylint resource file. Missing ones are skipped.
pub(super) fn clean(ctx: &TaskContext) -> Result<i32, TaskError> {
    let env_name = &ctx.settings.env_name;
    let env_dir = ctx.venv_dir();
    if env_dir.is_dir() {
        std::fs::remove_dir_all(&env_dir).map_err(|e| TaskError::io(&env_dir, e))?;
        info!("Removed virtual environment `{env_name}`.");
    } else {
        info!("Virtual environment `{env_name}` does not exist.");
    }

    let pylintrc = ctx.root.join(&ctx.settings.pylintrc);
    if pylintrc.is_file() {
        std::fs::remove_file(&pylintrc).map_err(|e| TaskError::io(&pylintrc, e))?;
        info!(
            "Removed file pylint resource control `{}`.",
            ctx.settings.pylintrc.display()
        );
    } else {
        info!(
            "File pylint resource control `{}` does not exist.",
            ctx.settings.pylintrc.display()
        );
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::Settings;

    fn context() -> (tempfile::TempDir, TaskContext, TaskTable) {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::defaults().unwrap();
        settings.python = "/nonexistent/pyfab/python".to_string();
        let table = TaskTable::new(&settings);
        let ctx = TaskContext::new(settings, dir.path().to_path_buf());
        (dir, ctx, table)
    }

    #[test]
    fn test_clean_without_environment_succeeds() {
        let (_dir, ctx, table) = context();
        assert_eq!(table.run(&ctx, "clean", &[]).unwrap(), 0);
        assert_eq!(table.run(&ctx, "clean", &[]).unwrap(), 0);
    }

    #[test]
    fn test_clean_removes_environment_and_pylintrc() {
        let (_dir, ctx, table) = context();
        std::fs::create_dir_all(ctx.venv_dir().join("lib")).unwrap();
        std::fs::write(ctx.root.join(".pylintrc"), "[MAIN]\n").unwrap();
        std::fs::write(ctx.root.join("requirements.txt"), "pytest\n").unwrap();

        assert_eq!(table.run(&ctx, "clean", &[]).unwrap(), 0);
        assert!(!ctx.venv_dir().exists());
        assert!(!ctx.root.join(".pylintrc").exists());
        assert!(ctx.root.join("requirements.txt").exists());
    }

    #[test]
    fn test_env_is_idempotent() {
        let (_dir, ctx, table) = context();
        std::fs::create_dir(ctx.venv_dir()).unwrap();
        assert_eq!(table.run(&ctx, "env", &[]).unwrap(), 0);
    }

    #[test]
    fn test_env_reports_missing_interpreter() {
        let (_dir, ctx, table) = context();
        let err = table.run(&ctx, "env", &[]).unwrap_err();
        assert_eq!(err.exit_code(), 127);
    }

    #[test]
    fn test_install_requires_environment() {
        let (_dir, ctx, table) = context();
        match table.run(&ctx, "install", &[]) {
            Err(TaskError::EnvironmentMissing(name)) => assert_eq!(name, "env"),
            other => panic!("Expected EnvironmentMissing, got: {other:?}"),
        }
    }
}
