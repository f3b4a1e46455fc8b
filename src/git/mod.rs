//! VCS transport: cloning module repositories and listing their refs.
//!
//! [`VcsFetcher`] is the interface the resolver talks to for cloning and
//! listing refs; [`GitRepo`] is the concrete,
//! system-`git`-backed implementation the resolver uses by default, an
//! async wrapper around the `git` CLI chosen over a `git2`/libgit2
//! binding for maximum compatibility with the user's own credential
//! helpers and SSH configuration.

use crate::core::StencilError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Network-facing `git` subcommands get up to 3 attempts with jittered
/// exponential backoff; a repository that genuinely doesn't exist fails on
/// the first attempt regardless, since `git`'s own exit status distinguishes
/// "not found" from "connection reset".
fn retry_strategy() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(10).max_delay(Duration::from_millis(500)).map(jitter).take(3)
}

/// The resolver's view of a VCS: clone, fetch, list tags/branches, checkout
/// a ref, and resolve a ref to a commit SHA. Kept as a trait so tests can
/// substitute an in-memory fetcher without shelling out to `git`.
#[async_trait]
pub trait VcsFetcher: Send + Sync {
    async fn clone(&self, url: &str, target: &Path) -> Result<()>;
    async fn fetch(&self, repo_path: &Path) -> Result<()>;
    async fn list_tags(&self, repo_path: &Path) -> Result<Vec<String>>;
    async fn list_branches(&self, repo_path: &Path) -> Result<Vec<String>>;
    async fn resolve_ref(&self, repo_path: &Path, ref_name: &str) -> Result<String>;
    async fn checkout(&self, repo_path: &Path, ref_name: &str) -> Result<()>;
}

/// A Git repository handle, operated on via the system `git` executable.
#[derive(Debug, Clone)]
pub struct GitRepo {
    tag_cache: Arc<OnceLock<Vec<String>>>,
}

impl Default for GitRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl GitRepo {
    pub fn new() -> Self {
        Self {
            tag_cache: Arc::new(OnceLock::new()),
        }
    }

    async fn run(&self, args: &[&str], current_dir: Option<&Path>) -> Result<String> {
        let mut cmd = Command::new("git");
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = current_dir {
            cmd.current_dir(dir);
        }
        let output = timeout(COMMAND_TIMEOUT, cmd.output())
            .await
            .context("git command timed out")??;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(StencilError::FetchFailed {
                module: current_dir.map(|p| p.display().to_string()).unwrap_or_default(),
                url: String::new(),
                reason: stderr,
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl VcsFetcher for GitRepo {
    async fn clone(&self, url: &str, target: &Path) -> Result<()> {
        let target_str = target.display().to_string();
        Retry::spawn(retry_strategy(), || {
            self.run(&["clone", "--quiet", url, &target_str], None)
        })
        .await?;
        Ok(())
    }

    async fn fetch(&self, repo_path: &Path) -> Result<()> {
        Retry::spawn(retry_strategy(), || {
            self.run(&["fetch", "--quiet", "--tags", "origin"], Some(repo_path))
        })
        .await?;
        Ok(())
    }

    async fn list_tags(&self, repo_path: &Path) -> Result<Vec<String>> {
        if let Some(cached) = self.tag_cache.get() {
            return Ok(cached.clone());
        }
        let stdout = self.run(&["tag", "-l"], Some(repo_path)).await?;
        let tags: Vec<String> =
            stdout.lines().filter(|l| !l.is_empty()).map(str::to_string).collect();
        let _ = self.tag_cache.set(tags.clone());
        Ok(tags)
    }

    async fn list_branches(&self, repo_path: &Path) -> Result<Vec<String>> {
        let stdout = self
            .run(&["branch", "-r", "--format=%(refname:short)"], Some(repo_path))
            .await?;
        Ok(stdout
            .lines()
            .filter_map(|l| l.trim().strip_prefix("origin/"))
            .filter(|b| *b != "HEAD")
            .map(str::to_string)
            .collect())
    }

    async fn resolve_ref(&self, repo_path: &Path, ref_name: &str) -> Result<String> {
        let stdout = self.run(&["rev-parse", ref_name], Some(repo_path)).await?;
        Ok(stdout.trim().to_string())
    }

    async fn checkout(&self, repo_path: &Path, ref_name: &str) -> Result<()> {
        self.run(&["checkout", "--quiet", ref_name], Some(repo_path)).await?;
        Ok(())
    }
}

/// Whether `path` looks like a local filesystem directory rather than a
/// remote URL — used when resolving [`crate::manifest::Replacement`]s and
/// `file://` module sources.
pub fn is_local_path(name_or_url: &str) -> bool {
    !name_or_url.contains("://")
        && !name_or_url.starts_with("git@")
        && (name_or_url.starts_with('.') || name_or_url.starts_with('/') || Path::new(name_or_url).is_absolute())
}

pub fn cache_key_for_url(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_path_detection() {
        assert!(is_local_path("../local/mod-a"));
        assert!(is_local_path("/abs/path"));
        assert!(!is_local_path("https://github.com/org/repo"));
        assert!(!is_local_path("git@github.com:org/repo.git"));
    }

    #[test]
    fn cache_key_is_filesystem_safe() {
        let key = cache_key_for_url("https://github.com/org/repo.git");
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }
}
