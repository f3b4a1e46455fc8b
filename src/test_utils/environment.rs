//! A disposable on-disk project used by resolver/driver/reconciler tests
//! that want a real filesystem instead of an in-memory fixture: a temp
//! project dir plus a temp module-source dir, with helpers to read/write
//! project files and to stand up real Git module checkouts via
//! [`super::git_helper::TestGit`].

use super::git_helper::TestGit;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary project directory plus a temporary module-source directory,
/// for tests that drive [`crate::driver::Driver`] or [`crate::resolver::Resolver`]
/// against real `git` checkouts.
pub struct TestProject {
    pub temp_dir: TempDir,
    pub project_dir: PathBuf,
    pub modules_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl TestProject {
    /// Create a new, empty test project: `<tmp>/project`, `<tmp>/modules`,
    /// `<tmp>/cache`.
    pub fn new() -> Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        let project_dir = temp_dir.path().join("project");
        let modules_dir = temp_dir.path().join("modules");
        let cache_dir = temp_dir.path().join("cache");

        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(&modules_dir)?;
        fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            temp_dir,
            project_dir,
            modules_dir,
            cache_dir,
        })
    }

    /// Write `stencil.yaml` with the given raw YAML body.
    pub fn write_manifest(&self, yaml: &str) -> Result<()> {
        self.write_file("stencil.yaml", yaml)
    }

    /// Write `stencil.lock` with the given raw YAML body.
    pub fn write_lockfile(&self, yaml: &str) -> Result<()> {
        self.write_file("stencil.lock", yaml)
    }

    /// Create a real Git repository under `<tmp>/modules/<name>` containing
    /// `manifest.yaml` plus whatever `(relative path, content)` template
    /// files are given, committed and tagged `v1.0.0`.
    ///
    /// Returns the repository's `file://` URL, suitable for a
    /// [`crate::manifest::ModuleReference::name`] in tests that need a
    /// clonable source without network access.
    pub fn create_module(&self, name: &str, manifest_yaml: &str, files: &[(&str, &str)]) -> Result<String> {
        let repo_dir = self.modules_dir.join(name);
        fs::create_dir_all(&repo_dir)?;

        let git = TestGit::new(&repo_dir);
        git.init()?;
        git.config_user()?;

        fs::write(repo_dir.join("manifest.yaml"), manifest_yaml)?;
        for (path, content) in files {
            let full = repo_dir.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&full, content)?;
        }

        git.add_all()?;
        git.commit("initial commit")?;
        git.tag("v1.0.0")?;

        Ok(format!("file://{}", repo_dir.display()))
    }

    #[must_use]
    pub fn project_path(&self) -> &Path {
        &self.project_dir
    }

    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_dir
    }

    /// Create (or overwrite) a file relative to the project directory.
    pub fn write_file(&self, path: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let full_path = self.project_dir.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, content)
            .with_context(|| format!("writing {}", full_path.display()))?;
        Ok(full_path)
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let full_path = self.project_dir.join(path);
        fs::read_to_string(&full_path).with_context(|| format!("reading {}", full_path.display()))
    }

    #[must_use]
    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.project_dir.join(path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read_project_file_round_trips() {
        let project = TestProject::new().unwrap();
        project.write_file("stencil.yaml", "name: demo\n").unwrap();
        assert!(project.file_exists("stencil.yaml"));
        assert_eq!(project.read_file("stencil.yaml").unwrap(), "name: demo\n");
    }

    #[test]
    fn create_module_produces_a_clonable_file_url() {
        let project = TestProject::new().unwrap();
        let url = project
            .create_module(
                "mod-a",
                "name: mod-a\ntype: [templates]\n",
                &[("hello.txt.tpl", "Hello, {{ stencil_manifest_name() }}!")],
            )
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(project.modules_dir.join("mod-a/.git").exists());
    }
}
