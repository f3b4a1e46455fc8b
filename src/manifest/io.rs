//! Locating `stencil.yaml` by walking up from the current directory.

use crate::core::StencilError;
use std::path::{Path, PathBuf};

/// Search for `stencil.yaml` starting at the current working directory and
/// walking up to the filesystem root, the same strategy Git uses to find
/// `.git`.
pub fn find_manifest() -> Result<PathBuf, StencilError> {
    let current = std::env::current_dir()?;
    find_manifest_from(&current)
}

pub fn find_manifest_from(start: &Path) -> Result<PathBuf, StencilError> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join("stencil.yaml");
        if candidate.exists() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(StencilError::ManifestNotFound);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_manifest_in_parent_directory() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("stencil.yaml"), "name: demo\n").unwrap();
        let nested = tmp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        let found = find_manifest_from(&nested).unwrap();
        assert_eq!(found, tmp.path().join("stencil.yaml"));
    }

    #[test]
    fn errors_when_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let err = find_manifest_from(tmp.path()).unwrap_err();
        assert!(matches!(err, StencilError::ManifestNotFound));
    }
}
