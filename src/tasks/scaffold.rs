use std::path::Path;

use log::info;

use super::{TaskContext, TaskError};

/// Title-case a directory name the way Python's `str.title` does, with
/// underscores turned into spaces first.
#[must_use]
pub fn title_case(name: &str) -> String {
    let mut title = String::with_capacity(name.len());
    let mut word_start = true;
    for c in name.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if word_start {
                title.extend(c.to_uppercase());
            } else {
                title.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            title.push(c);
            word_start = true;
        }
    }
    title
}

/// Write `content` to `path` unless the file exists. Returns whether it was written.
fn write_if_missing(path: &Path, content: &str, label: &str) -> Result<bool, TaskError> {
    if path.is_file() {
        info!("File {label} `{}` already exists", path.display());
        return Ok(false);
    }
    std::fs::write(path, format!("{content}\n")).map_err(|e| TaskError::io(path, e))?;
    info!("Created file {label} `{}`", path.display());
    Ok(true)
}

fn pylintrc_content(package_dir: &Path) -> String {
    format!(
        "[MAIN]\ninit-hook='import sys; sys.path.append(\"{}\")'",
        package_dir.display()
    )
}

/// Create the package directory, `__init__.py`, README, requirements and pylintrc.
pub(super) fn generate_files(ctx: &TaskContext) -> Result<i32, TaskError> {
    let project = ctx
        .root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let package_dir = ctx.root.join(&project);

    if package_dir.is_dir() {
        info!("Subdirectory `{project}` already exists");
    } else {
        std::fs::create_dir(&package_dir).map_err(|e| TaskError::io(&package_dir, e))?;
        info!("Created subdirectory `{project}`");
    }

    write_if_missing(&package_dir.join("__init__.py"), "", "__init__.py")?;

    let headers = format!("# {}\n\n## Reference", title_case(&project));
    write_if_missing(&ctx.root.join(&ctx.settings.readme), &headers, "README")?;

    write_if_missing(
        &ctx.root.join(&ctx.settings.requirements),
        &ctx.settings.packages.join("\n"),
        "pip requirements",
    )?;

    write_if_missing(
        &ctx.root.join(&ctx.settings.pylintrc),
        &pylintrc_content(&package_dir),
        "pylint resource control",
    )?;

    Ok(0)
}
