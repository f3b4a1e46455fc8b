//! Process-level exclusive locking for a single cache entry: an `fs4`
//! advisory lock taken inside `spawn_blocking`, serializing concurrent
//! fetches of the same module URL across processes.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub struct CacheLock {
    _file: File,
    path: PathBuf,
}

impl CacheLock {
    pub async fn acquire(cache_dir: &Path, key: &str) -> Result<Self> {
        let locks_dir = cache_dir.join(".locks");
        tokio::fs::create_dir_all(&locks_dir)
            .await
            .with_context(|| format!("failed to create {}", locks_dir.display()))?;

        let lock_path = locks_dir.join(format!("{key}.lock"));
        let lock_path_clone = lock_path.clone();
        let key = key.to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path_clone)
                .with_context(|| format!("failed to open lock file {}", lock_path_clone.display()))?;
            file.lock_exclusive()
                .with_context(|| format!("failed to acquire lock for {key}"))?;
            Ok(file)
        })
        .await
        .context("lock task panicked")??;

        Ok(Self {
            _file: file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
