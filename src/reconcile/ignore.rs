//! `.stencilignore` — gitignore-syntax paths the reconciler never writes
//! to or deletes.

use crate::core::StencilError;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Component, Path, PathBuf};

pub struct IgnoreSet {
    matcher: Gitignore,
    project_root: PathBuf,
}

impl IgnoreSet {
    /// Load `.stencilignore` from `project_root`, if present. A missing
    /// file is an empty ignore set, not an error.
    pub fn load(project_root: &Path) -> Result<Self, StencilError> {
        let ignore_file = project_root.join(".stencilignore");
        let mut builder = GitignoreBuilder::new(project_root);
        if ignore_file.exists() {
            if let Some(err) = builder.add(&ignore_file) {
                return Err(StencilError::IoError(std::io::Error::other(err.to_string())));
            }
        }
        let matcher = builder
            .build()
            .map_err(|e| StencilError::IoError(std::io::Error::other(e.to_string())))?;
        Ok(Self {
            matcher,
            project_root: project_root.to_path_buf(),
        })
    }

    /// Absolute and `..`-containing paths normalize first — `./foo/bar`,
    /// `../proj/foo/bar`, and `/abs/proj/foo/bar` all normalize to
    /// `foo/bar` when `project_root` is `/abs/proj` — before matching.
    pub fn is_ignored(&self, output_path: &str) -> bool {
        let normalized = normalize(&self.project_root, output_path);
        self.matcher.matched(&normalized, false).is_ignore()
    }
}

/// Resolve `path` against `project_root` lexically (no filesystem access,
/// so this works for paths that don't exist yet), then strip the
/// project-root prefix — so a `..`-containing or absolute path that
/// ultimately lands back inside the project normalizes to the same
/// project-relative path a plain relative path would.
fn normalize(project_root: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        project_root.join(candidate)
    };
    let resolved = lexically_normalize(&joined);
    let root = lexically_normalize(project_root);
    resolved.strip_prefix(&root).map(Path::to_path_buf).unwrap_or(resolved)
}

/// Collapse `.`/`..` components without touching the filesystem.
fn lexically_normalize(path: &Path) -> PathBuf {
    let mut stack: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    stack.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_plain_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".stencilignore"), "go.mod\n").unwrap();
        let set = IgnoreSet::load(tmp.path()).unwrap();
        assert!(set.is_ignored("go.mod"));
        assert!(!set.is_ignored("go.sum"));
    }

    #[test]
    fn missing_ignore_file_matches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let set = IgnoreSet::load(tmp.path()).unwrap();
        assert!(!set.is_ignored("anything"));
    }

    #[test]
    fn normalizes_dotted_and_absolute_paths() {
        let root = Path::new("/abs/proj");
        assert_eq!(normalize(root, "./foo/bar"), PathBuf::from("foo/bar"));
        assert_eq!(normalize(root, "../proj/foo/bar"), PathBuf::from("foo/bar"));
        assert_eq!(normalize(root, "/abs/proj/foo/bar"), PathBuf::from("foo/bar"));
    }
}
