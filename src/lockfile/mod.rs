//! The persisted `stencil.lock` — resolved module versions and the files a
//! prior run emitted.
//!
//! # Format
//!
//! ```yaml
//! version: 1
//! modules:
//!   - name: mod-a
//!     url: https://github.com/stencil-rs/mod-a
//!     version:
//!       tag: v1.0.0
//!       commit: abcdef0123456789abcdef0123456789abcdef01
//! files:
//!   - name: hello.txt
//!     template: hello.txt.tpl
//!     module: mod-a
//! ```
//!
//! Invariants: file entries name a module present in the module list
//! (unless that module was just pruned); the file list is sorted
//! deterministically on write.

use crate::core::StencilError;
use crate::version::ResolvedVersion;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// The engine version this lockfile was written by/for.
pub const LOCKFILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LockfileVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub r#virtual: bool,
}

impl From<&ResolvedVersion> for LockfileVersion {
    fn from(v: &ResolvedVersion) -> Self {
        match v {
            ResolvedVersion::Tag { tag, commit } => Self {
                tag: Some(tag.clone()),
                branch: None,
                commit: Some(commit.clone()),
                r#virtual: false,
            },
            ResolvedVersion::Branch { branch, commit } => Self {
                tag: None,
                branch: Some(branch.clone()),
                commit: Some(commit.clone()),
                r#virtual: false,
            },
            ResolvedVersion::Commit(commit) => Self {
                tag: None,
                branch: None,
                commit: Some(commit.clone()),
                r#virtual: false,
            },
            ResolvedVersion::Virtual => Self {
                tag: None,
                branch: None,
                commit: None,
                r#virtual: true,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LockfileModuleEntry {
    pub name: String,
    pub url: String,
    pub version: LockfileVersion,
    /// `ModuleReference::fingerprint()` of the root manifest's entry for
    /// this module at the time it was locked. Empty for modules with no
    /// root manifest entry (pure transitive dependencies) or lockfiles
    /// written before this field existed. The resolver compares this
    /// against the current manifest's fingerprint to decide whether the
    /// locked version can be reused without re-enumerating tags.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LockfileFileEntry {
    /// Output path relative to the project root.
    pub name: String,
    /// Template path (relative to the module root, `.tpl` included) that
    /// produced this file.
    pub template: String,
    pub module: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Lockfile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub modules: Vec<LockfileModuleEntry>,
    #[serde(default)]
    pub files: Vec<LockfileFileEntry>,
}

fn default_version() -> u32 {
    LOCKFILE_VERSION
}

impl Lockfile {
    pub fn load(path: &Path) -> Result<Self, StencilError> {
        if !path.exists() {
            return Ok(Self {
                version: LOCKFILE_VERSION,
                ..Default::default()
            });
        }
        let content = std::fs::read_to_string(path)?;
        let mut lockfile: Self = serde_yaml::from_str(&content)?;
        lockfile.sort();
        Ok(lockfile)
    }

    /// Sort `files` by output path and `modules` by name — called before
    /// every write and on load so in-memory state is
    /// always canonical.
    pub fn sort(&mut self) {
        self.files.sort_by(|a, b| a.name.cmp(&b.name));
        self.modules.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn save(&mut self, path: &Path) -> Result<(), StencilError> {
        self.sort();
        let yaml = serde_yaml::to_string(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn module(&self, name: &str) -> Option<&LockfileModuleEntry> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn file_entry(&self, output_path: &str) -> Option<&LockfileFileEntry> {
        self.files.iter().find(|f| f.name == output_path)
    }

    /// Remove file entries whose path is missing on disk (relative to
    /// `project_root`). If `filter` is given, only those paths are
    /// considered. Returns the names actually pruned.
    pub fn prune_files(&mut self, project_root: &Path, filter: Option<&[String]>) -> Vec<String> {
        let mut pruned = Vec::new();
        self.files.retain(|entry| {
            if let Some(filter) = filter {
                if !filter.iter().any(|f| f == &entry.name) {
                    return true;
                }
            }
            let exists = project_root.join(&entry.name).exists();
            if !exists {
                pruned.push(entry.name.clone());
            }
            exists
        });
        pruned.sort();
        pruned
    }

    /// Remove module entries not present in `current_manifest_modules`,
    /// subject to `filter`. Returns the names pruned.
    pub fn prune_modules(
        &mut self,
        current_manifest_modules: &[String],
        filter: Option<&[String]>,
    ) -> Vec<String> {
        let keep: HashSet<&str> = current_manifest_modules.iter().map(String::as_str).collect();
        let mut pruned = Vec::new();
        self.modules.retain(|entry| {
            if let Some(filter) = filter {
                if !filter.iter().any(|f| f == &entry.name) {
                    return true;
                }
            }
            let retained = keep.contains(entry.name.as_str());
            if !retained {
                pruned.push(entry.name.clone());
            }
            retained
        });
        pruned.sort();
        pruned
    }
}
