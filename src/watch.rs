use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use log::{error, info};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use thiserror::Error;

use crate::discovery::FileFilter;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Error starting file watcher: {0}")]
    Watch(#[from] notify::Error),
}

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Changed paths accepted by `filter`, relative to `root`.
fn relevant_changes(root: &Path, filter: &FileFilter, paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut changed: Vec<PathBuf> = paths
        .iter()
        .map(|path| path.strip_prefix(root).unwrap_or(path).to_path_buf())
        .filter(|relative| filter.matches(relative))
        .collect();
    changed.sort();
    changed.dedup();
    changed
}

pub type WatchHandle = (
    mpsc::Receiver<Vec<PathBuf>>,
    Debouncer<RecommendedWatcher, RecommendedCache>,
);

/// Watch `root` recursively, returning a receiver of changed source files and
/// the debouncer (must be kept alive).
///
/// # Errors
///
/// Returns `WatchError::Watch` if the file watcher fails to start.
pub fn watch_sources(root: &Path, filter: FileFilter) -> Result<WatchHandle, WatchError> {
    let (sender, receiver) = mpsc::channel();
    let watched_root = root.to_path_buf();

    let mut debouncer = new_debouncer(DEBOUNCE, None, move |res: DebounceEventResult| match res {
        Ok(events) => {
            let paths: Vec<PathBuf> = events
                .iter()
                .filter(|event| {
                    event.event.kind.is_create()
                        || event.event.kind.is_modify()
                        || event.event.kind.is_remove()
                })
                .flat_map(|event| event.paths.clone())
                .collect();

            let changed = relevant_changes(&watched_root, &filter, &paths);
            if !changed.is_empty()
                && let Err(e) = sender.send(changed)
            {
                error!("Failed to send watch event: {e}");
            }
        }
        Err(errors) => {
            for e in errors {
                error!("Watch error: {e}");
            }
        }
    })?;

    info!("Watching path: {}", root.display());
    debouncer.watch(root, RecursiveMode::Recursive)?;

    Ok((receiver, debouncer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::parse_patterns;

    fn python_filter() -> FileFilter {
        FileFilter {
            include_files: parse_patterns(&["*.py"]).unwrap(),
            exclude_files: Vec::new(),
            exclude_dirs: parse_patterns(&["**/env/*", "**/__pycache__/*"]).unwrap(),
        }
    }

    #[test]
    fn test_relevant_changes_filters_and_relativizes() {
        let root = PathBuf::from("/project");
        let paths = vec![
            root.join("pkg/core.py"),
            root.join("pkg/core.py"),
            root.join("README.md"),
            root.join("env/lib/site.py"),
            root.join("tests/test_core.py"),
        ];
        let changed = relevant_changes(&root, &python_filter(), &paths);
        assert_eq!(
            changed,
            vec![PathBuf::from("pkg/core.py"), PathBuf::from("tests/test_core.py")]
        );
    }

    #[test]
    fn test_relevant_changes_ignores_bytecode() {
        let root = PathBuf::from("/project");
        let paths = vec![root.join("pkg/__pycache__/core.cpython-312.pyc")];
        assert!(relevant_changes(&root, &python_filter(), &paths).is_empty());
    }
}
