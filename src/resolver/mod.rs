//! The module resolver: turns a [`Manifest`](crate::manifest::Manifest)
//! plus the existing [`Lockfile`] into a concrete, fetched, checked-out
//! set of [`ResolvedModule`]s.
//!
//! The algorithm, in order:
//! 1. Seed a constraint set per module name from the root manifest.
//! 2. Fetch (or reuse the cached clone of) each module, walk its own
//!    `manifest.yaml` `dependencies`, and fold those referrers'
//!    constraints into the same per-module [`ConstraintSet`] — extending
//!    the module graph transitively.
//! 3. For each module: if frozen mode is off, the manifest fingerprint is
//!    unchanged since the lockfile was written, and `--upgrade` wasn't
//!    requested, reuse the lockfile's recorded version outright. Otherwise
//!    pick the highest tag satisfying the conjunction of constraints (or
//!    resolve a pinned branch/exact version directly).
//! 4. Reject a resolution that would cross a major-version boundary from
//!    the locked version unless `allow_major_version_upgrades` is set.
//! 5. Reject anything that would diverge from a frozen lockfile.
//! 6. Detect cycles in the transitive module graph.
//!
//! Local replacements skip all of
//! this and resolve to [`ResolvedVersion::Virtual`] directly from the
//! given directory.

pub mod graph;
pub mod types;

pub use types::{ResolveOptions, ResolvedModule};

use crate::cache::Cache;
use crate::config::GlobalConfig;
use crate::core::StencilError;
use crate::git::VcsFetcher;
use crate::lockfile::Lockfile;
use crate::manifest::{Manifest, TemplateRepositoryManifest};
use crate::version::constraints::{is_major_jump, pick_highest_satisfying, ConstraintSet};
use crate::version::{ResolvedVersion, VersionExpr};
use anyhow::{Context, Result};
use graph::ModuleGraph;
use semver::{Version, VersionReq};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// The running engine's own version, checked against a module's declared
/// `stencilVersion`/`minStencilVersion`.
pub fn engine_version() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or(Version::new(0, 1, 0))
}

/// Fixed on-disk convention for an extension module's executable (see
/// DESIGN.md's resolution of the optional extension entrypoint).
fn extension_entrypoint_for(checkout: &Path, manifest: &TemplateRepositoryManifest) -> Option<PathBuf> {
    if !manifest.is_extension() {
        return None;
    }
    let candidate = checkout.join(format!("stencil-extension{}", std::env::consts::EXE_SUFFIX));
    candidate.exists().then_some(candidate)
}

fn module_url(name: &str) -> String {
    if name.contains("://") {
        name.to_string()
    } else {
        format!("https://{name}")
    }
}

struct QueueEntry {
    name: String,
}

pub struct Resolver<'a> {
    manifest: &'a Manifest,
    lockfile: &'a Lockfile,
    cache: &'a Cache,
    fetcher: &'a dyn VcsFetcher,
    options: ResolveOptions,
    global_config: Option<&'a GlobalConfig>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        manifest: &'a Manifest,
        lockfile: &'a Lockfile,
        cache: &'a Cache,
        fetcher: &'a dyn VcsFetcher,
        options: ResolveOptions,
    ) -> Self {
        Self {
            manifest,
            lockfile,
            cache,
            fetcher,
            options,
            global_config: None,
        }
    }

    /// Attach a global config whose `auth` map is consulted when building
    /// each module's clone URL, so private repositories over HTTPS resolve
    /// without the user embedding a token in `stencil.yaml` itself.
    #[must_use]
    pub fn with_global_config(mut self, config: &'a GlobalConfig) -> Self {
        self.global_config = Some(config);
        self
    }

    pub async fn resolve(&self) -> Result<Vec<ResolvedModule>> {
        let mut graph = ModuleGraph::new();
        let mut constraints: HashMap<String, ConstraintSet> = HashMap::new();
        let mut queue = VecDeque::new();

        for module in &self.manifest.modules {
            graph.add_edge("<root>", &module.name);
            constraints
                .entry(module.name.clone())
                .or_default()
                .add("<root>", module.version_expr());
            queue.push_back(QueueEntry {
                name: module.name.clone(),
            });
        }

        let mut resolved: HashMap<String, ResolvedModule> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        let mut visiting: Vec<String> = Vec::new();

        while let Some(entry) = queue.pop_front() {
            if resolved.contains_key(&entry.name) {
                continue;
            }
            if visiting.contains(&entry.name) {
                continue;
            }
            visiting.push(entry.name.clone());

            let module = self.resolve_one(&entry.name, &constraints).await?;
            self.check_engine_version(&entry.name, &module.manifest)?;

            for dep in &module.manifest.dependencies {
                graph.add_edge(&entry.name, &dep.name);
                let expr = VersionExpr::parse(dep.version.as_deref(), dep.branch.as_deref());
                constraints.entry(dep.name.clone()).or_default().add(&entry.name, expr);
                queue.push_back(QueueEntry {
                    name: dep.name.clone(),
                });
            }

            order.push(entry.name.clone());
            resolved.insert(entry.name.clone(), module);
        }

        // Cycles are permitted in the graph; cycle detection is by
        // visited-set to ensure termination. The
        // `visiting`/`resolved` guards above already make the BFS terminate
        // on a cyclic graph, so a detected cycle is not itself fatal.
        let _ = graph.has_cycle();

        // Order is stable: breadth-first from the root manifest's
        // declared order, dependencies appended in discovery order,
        // duplicates suppressed. `order` already records exactly
        // that traversal, so results are returned in discovery order
        // rather than re-sorted alphabetically.
        let out: Vec<ResolvedModule> = order
            .into_iter()
            .filter_map(|name| resolved.remove(&name))
            .collect();
        Ok(out)
    }

    async fn resolve_one(
        &self,
        name: &str,
        constraints: &HashMap<String, ConstraintSet>,
    ) -> Result<ResolvedModule> {
        if let Some(local) = self.manifest.replacements.get(name) {
            return self.resolve_replacement(name, local).await;
        }

        let empty = ConstraintSet::new();
        let set = constraints.get(name).unwrap_or(&empty);
        let url = module_url(name);
        let fetch_url = match self.global_config {
            Some(config) => config.authenticated_url(&url),
            None => url.clone(),
        };
        let checkout = self.cache.get_or_clone_as(self.fetcher, &url, &fetch_url).await?;

        let locked = self.lockfile.module(name);
        let root_entry_unchanged = locked.is_some()
            && !locked.map(|l| l.fingerprint.as_str()).unwrap_or("").is_empty()
            && self.manifest.module(name).map(|m| m.fingerprint()).as_deref() == locked.map(|l| l.fingerprint.as_str());

        let resolved_version = if self.options.frozen {
            self.resolve_from_lockfile(name, &checkout).await?
        } else if !self.options.upgrade && root_entry_unchanged {
            self.resolve_from_lockfile(name, &checkout).await?
        } else {
            self.resolve_against_constraints(name, &checkout, set).await?
        };

        if let (Some(locked), false) = (locked, self.options.allow_major_version_upgrades) {
            if let (Some(prev), Some(next)) = (
                Version::parse(locked.version.tag.as_deref().unwrap_or("")).ok(),
                resolved_version.semver(),
            ) {
                if is_major_jump(&prev, &next) {
                    return Err(StencilError::DisallowedMajorUpgrade {
                        module: name.to_string(),
                        from: prev.to_string(),
                        to: next.to_string(),
                    }
                    .into());
                }
            }
        }

        self.fetcher.checkout(&checkout, resolved_version.commit().unwrap_or("HEAD")).await?;
        let module_manifest = self.read_module_manifest(&checkout, name)?;

        let extension_entrypoint = extension_entrypoint_for(&checkout, &module_manifest);
        Ok(ResolvedModule {
            name: name.to_string(),
            url,
            version: resolved_version,
            path: checkout,
            manifest: module_manifest,
            extension_entrypoint,
        })
    }

    async fn resolve_replacement(&self, name: &str, local: &str) -> Result<ResolvedModule> {
        let path = PathBuf::from(local);
        if !path.exists() {
            return Err(StencilError::FetchFailed {
                module: name.to_string(),
                url: local.to_string(),
                reason: "replacement directory does not exist".to_string(),
            }
            .into());
        }
        let module_manifest = self.read_module_manifest(&path, name)?;
        let extension_entrypoint = extension_entrypoint_for(&path, &module_manifest);
        Ok(ResolvedModule {
            name: name.to_string(),
            url: "<local>".to_string(),
            version: ResolvedVersion::Virtual,
            path,
            manifest: module_manifest,
            extension_entrypoint,
        })
    }

    /// Reuse the lockfile's recorded version outright, without consulting
    /// constraints or remote tags: resolves the locked tag/branch/commit
    /// back to a commit via `resolve_ref`. Used both when `--frozen-lockfile`
    /// forbids any deviation and, in unfrozen mode, when the root manifest's
    /// entry for this module hasn't changed since the lockfile was written.
    async fn resolve_from_lockfile(&self, name: &str, checkout: &Path) -> Result<ResolvedVersion> {
        let locked = self.lockfile.module(name).ok_or_else(|| StencilError::FrozenLockfileViolation {
            module: name.to_string(),
            locked: "<none>".to_string(),
        })?;
        if let Some(tag) = &locked.version.tag {
            let commit = self.fetcher.resolve_ref(checkout, tag).await?;
            return Ok(ResolvedVersion::Tag {
                tag: tag.clone(),
                commit,
            });
        }
        if let Some(branch) = &locked.version.branch {
            let commit = self.fetcher.resolve_ref(checkout, branch).await?;
            return Ok(ResolvedVersion::Branch {
                branch: branch.clone(),
                commit,
            });
        }
        if let Some(commit) = &locked.version.commit {
            return Ok(ResolvedVersion::Commit(commit.clone()));
        }
        Ok(ResolvedVersion::Virtual)
    }

    async fn resolve_against_constraints(
        &self,
        name: &str,
        checkout: &Path,
        set: &ConstraintSet,
    ) -> Result<ResolvedVersion> {
        if let Some(branch) = set.pinned_ref() {
            let commit = self.fetcher.resolve_ref(checkout, branch).await?;
            return Ok(ResolvedVersion::Branch {
                branch: branch.to_string(),
                commit,
            });
        }

        let tags = self.fetcher.list_tags(checkout).await?;
        let parsed: Vec<(String, Version)> = tags
            .iter()
            .filter_map(|t| Version::parse(t.trim_start_matches('v')).ok().map(|v| (t.clone(), v)))
            .collect();

        if let Some(exact) = set.exact_version() {
            if let Some((tag, _)) = parsed.iter().find(|(_, v)| v == exact) {
                let commit = self.fetcher.resolve_ref(checkout, tag).await?;
                return Ok(ResolvedVersion::Tag {
                    tag: tag.clone(),
                    commit,
                });
            }
            return Err(StencilError::VersionConstraintFailed {
                module: name.to_string(),
                constraint: format!("={exact}"),
            }
            .into());
        }

        let versions: Vec<Version> = parsed.iter().map(|(_, v)| v.clone()).collect();
        let picked = pick_highest_satisfying(set, &versions, self.options.allow_prerelease);

        match picked {
            Some(v) => {
                let tag = parsed.iter().find(|(_, ver)| ver == v).map(|(t, _)| t.clone()).unwrap();
                let commit = self.fetcher.resolve_ref(checkout, &tag).await?;
                Ok(ResolvedVersion::Tag { tag, commit })
            }
            None if set.is_empty() => {
                let default_branch = "main";
                let commit = self.fetcher.resolve_ref(checkout, default_branch).await?;
                Ok(ResolvedVersion::Branch {
                    branch: default_branch.to_string(),
                    commit,
                })
            }
            None => Err(StencilError::VersionConstraintFailed {
                module: name.to_string(),
                constraint: set.describe(),
            }
            .into()),
        }
    }

    fn read_module_manifest(&self, checkout: &Path, name: &str) -> Result<TemplateRepositoryManifest> {
        let manifest_path = checkout.join("manifest.yaml");
        let content = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("module '{name}' is missing manifest.yaml"))?;
        Ok(TemplateRepositoryManifest::from_yaml(&content, name)?)
    }

    fn check_engine_version(&self, name: &str, manifest: &TemplateRepositoryManifest) -> Result<()> {
        let running = engine_version();
        if let Some(required) = &manifest.stencil_version {
            let req = VersionReq::parse(&format!("={required}")).unwrap_or(VersionReq::STAR);
            if !req.matches(&running) {
                return Err(StencilError::EngineVersionMismatch {
                    module: name.to_string(),
                    required: required.clone(),
                    running: running.to_string(),
                }
                .into());
            }
        }
        if let Some(min) = &manifest.min_stencil_version {
            let req = VersionReq::parse(&format!(">={min}")).unwrap_or(VersionReq::STAR);
            if !req.matches(&running) {
                return Err(StencilError::EngineVersionMismatch {
                    module: name.to_string(),
                    required: format!(">={min}"),
                    running: running.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}
