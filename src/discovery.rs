//! Source file discovery for the tasks that run a tool over the whole tree

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use log::{debug, warn};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Unable to walk the project tree: {0}")]
    Walk(#[from] walkdir::Error),
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Decides which files under the project root a task operates on.
///
/// `include_files` and `exclude_files` match the file name only, while
/// `exclude_dirs` match the path relative to the root.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub include_files: Vec<Pattern>,
    pub exclude_files: Vec<Pattern>,
    pub exclude_dirs: Vec<Pattern>,
}

impl FileFilter {
    #[must_use]
    pub fn matches(&self, relative: &Path) -> bool {
        let Some(file_name) = relative.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !self
            .include_files
            .iter()
            .any(|p| p.matches_with(file_name, MATCH_OPTIONS))
        {
            return false;
        }
        if self
            .exclude_files
            .iter()
            .any(|p| p.matches_with(file_name, MATCH_OPTIONS))
        {
            return false;
        }
        !self
            .exclude_dirs
            .iter()
            .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
    }
}

/// Find every file under `root` accepted by `filter`, as sorted paths relative to `root`.
///
/// Symbolic links are never followed, so linked files and anything under a
/// linked directory are left out.
///
/// # Errors
///
/// Returns `DiscoveryError::Walk` if `root` itself cannot be read.
pub fn discover(root: &Path, filter: &FileFilter) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut found = BTreeSet::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(DiscoveryError::Walk(e)),
            Err(e) => {
                warn!("Skipping unreadable path: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        if filter.matches(&relative) {
            found.insert(relative);
        }
    }

    debug!("Discovered {} files under {}", found.len(), root.display());
    Ok(found.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::parse_patterns;

    fn filter(include: &[&str], exclude_files: &[&str], exclude_dirs: &[&str]) -> FileFilter {
        FileFilter {
            include_files: parse_patterns(include).unwrap(),
            exclude_files: parse_patterns(exclude_files).unwrap(),
            exclude_dirs: parse_patterns(exclude_dirs).unwrap(),
        }
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn test_matches_file_name_patterns() {
        let f = filter(&["*.py"], &["draft.py"], &[]);
        assert!(f.matches(Path::new("pkg/module.py")));
        assert!(!f.matches(Path::new("pkg/draft.py")));
        assert!(!f.matches(Path::new("README.md")));
    }

    #[test]
    fn test_matches_excluded_dirs() {
        let f = filter(&["*.py"], &[], &["**/env/*", "**/__pycache__/*"]);
        assert!(!f.matches(Path::new("env/lib/site.py")));
        assert!(!f.matches(Path::new("pkg/__pycache__/mod.py")));
        assert!(f.matches(Path::new("pkg/environment.py")));
    }

    #[test]
    fn test_discover_applies_filter() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "main.py");
        touch(root, "draft.py");
        touch(root, "pkg/core.py");
        touch(root, "pkg/notes.txt");
        touch(root, "env/lib/site.py");
        touch(root, "pkg/__pycache__/core.py");

        let files = discover(
            root,
            &filter(&["*.py"], &["draft.py"], &["**/env/*", "**/__pycache__/*"]),
        )
        .unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("main.py"), PathBuf::from("pkg/core.py")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_skips_symlinks() {
        use std::os::unix::fs::symlink;

        let outside = tempfile::tempdir().unwrap();
        touch(outside.path(), "foreign.py");
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "app.py");
        symlink(".", root.join("loop")).unwrap();
        symlink(outside.path(), root.join("ext")).unwrap();
        symlink(outside.path().join("foreign.py"), root.join("linked.py")).unwrap();

        let files = discover(root, &filter(&["*.py"], &[], &[])).unwrap();
        assert_eq!(files, vec![PathBuf::from("app.py")]);
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = discover(&dir.path().join("gone"), &filter(&["*.py"], &[], &[]));
        assert!(matches!(result, Err(DiscoveryError::Walk(_))));
    }

    #[test]
    fn test_discover_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let files = discover(dir.path(), &filter(&["*.py"], &[], &[])).unwrap();
        assert!(files.is_empty());
    }
}
