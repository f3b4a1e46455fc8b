//! The global module cache (`~/.stencil/cache`).
//!
//! Module fetches run
//! concurrently, but each distinct module URL is serialized through a
//! per-URL lock so two concurrent `stencil run` invocations never clone
//! the same repository into the same directory at once. Stencil checks
//! out one ref per module per run, so there's no need for parallel
//! worktrees of the same source — just a plain "clone once, fetch+checkout
//! thereafter" cache.

pub mod lock;

use crate::git::{cache_key_for_url, VcsFetcher};
use anyhow::{Context, Result};
use lock::CacheLock;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the cache location.
const CACHE_DIR_ENV: &str = "STENCIL_CACHE_DIR";

pub struct Cache {
    root: PathBuf,
}

impl Cache {
    pub fn new() -> Result<Self> {
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            return Ok(Self { root: PathBuf::from(dir) });
        }
        let home = dirs::home_dir().context("could not determine home directory")?;
        Ok(Self {
            root: home.join(".stencil").join("cache"),
        })
    }

    pub fn with_dir(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn source_path(&self, url: &str) -> PathBuf {
        self.root.join("sources").join(cache_key_for_url(url))
    }

    /// Return a local checkout of `url`, cloning it if this is the first
    /// time it's been seen. Does not check out any particular ref — the
    /// resolver does that afterward via [`VcsFetcher::checkout`].
    pub async fn get_or_clone(&self, fetcher: &dyn VcsFetcher, url: &str) -> Result<PathBuf> {
        self.get_or_clone_as(fetcher, url, url).await
    }

    /// Like [`Self::get_or_clone`], but clones/fetches `fetch_url` while
    /// deriving the on-disk cache key from `key_url`. Use this when
    /// `fetch_url` carries injected credentials (`crate::config::GlobalConfig::authenticated_url`)
    /// that must not end up baked into the cache directory name.
    pub async fn get_or_clone_as(
        &self,
        fetcher: &dyn VcsFetcher,
        key_url: &str,
        fetch_url: &str,
    ) -> Result<PathBuf> {
        let key = cache_key_for_url(key_url);
        tokio::fs::create_dir_all(self.root.join("sources")).await?;
        let _lock = CacheLock::acquire(&self.root, &key).await?;

        let path = self.source_path(key_url);
        if path.join(".git").exists() {
            fetcher.fetch(&path).await?;
        } else {
            if path.exists() {
                tokio::fs::remove_dir_all(&path).await?;
            }
            fetcher.clone(fetch_url, &path).await?;
        }
        Ok(path)
    }

    pub async fn clear_all(&self) -> Result<()> {
        if self.root.exists() {
            tokio::fs::remove_dir_all(&self.root).await?;
        }
        Ok(())
    }
}
