//! The driver: orchestrates one full run.
//!
//! One public method per top-level command: `run` (full generation),
//! `upgrade` (force resolver upgrade mode, then run). Control flow: load
//! lockfile → resolve modules → build
//! the module filesystem → register extensions → render templates →
//! reconcile the project tree → write the lockfile → run post-run
//! commands.

pub mod cancel;
pub mod post_run;

use crate::cache::Cache;
use crate::config::GlobalConfig;
use crate::extension::{ExtensionHost, ExtensionSpec};
use crate::git::{GitRepo, VcsFetcher};
use crate::lockfile::{Lockfile, LockfileFileEntry, LockfileModuleEntry};
use crate::manifest::Manifest;
use crate::module_fs::ModuleFs;
use crate::reconcile::{self, ReconcileOptions};
use crate::render;
use crate::resolver::{ResolveOptions, Resolver};
use crate::utils::progress::{MultiPhaseProgress, RunPhase};
use anyhow::Result;
use cancel::CancellationToken;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Flags consumed by the core: `--dry-run`,
/// `--frozen-lockfile`, `--allow-major-version-upgrades`, `--adopt`,
/// `--skip-post-run`, `--fail-ignored`. `upgrade`/`allow_prerelease` aren't
/// exposed as their own `run` flags but feed the resolver directly,
/// needed to drive [`ResolveOptions`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub adopt: bool,
    pub skip_post_run: bool,
    pub fail_ignored: bool,
    pub frozen: bool,
    pub allow_major_version_upgrades: bool,
    pub upgrade: bool,
    pub allow_prerelease: bool,
}

/// What one `run`/`upgrade` invocation did, for the CLI to report.
pub struct RunSummary {
    pub modules: Vec<String>,
    pub outcomes: Vec<reconcile::Outcome>,
}

/// Orchestrates one project directory's generation pipeline.
pub struct Driver {
    project_root: PathBuf,
    manifest: Manifest,
    cache: Cache,
    fetcher: Box<dyn VcsFetcher>,
    global_config: GlobalConfig,
}

impl Driver {
    pub fn new(project_root: PathBuf, manifest: Manifest, global_config: GlobalConfig) -> Result<Self> {
        Ok(Self {
            project_root,
            manifest,
            cache: Cache::new()?,
            fetcher: Box::new(GitRepo::new()),
            global_config,
        })
    }

    /// Override the default system-`git`-backed fetcher, e.g. with a fake
    /// in tests or a custom cache directory via [`Cache::with_dir`].
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Box<dyn VcsFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = cache;
        self
    }

    fn lockfile_path(&self) -> PathBuf {
        self.project_root.join("stencil.lock")
    }

    pub async fn run(&self, options: RunOptions, cancel: &CancellationToken) -> Result<RunSummary> {
        self.run_with_progress(options, cancel, &MultiPhaseProgress::new(false)).await
    }

    /// Same as [`Self::run`], but reports each phase (resolve, fetch,
    /// render, reconcile, post-run) through `progress` as it happens.
    pub async fn run_with_progress(
        &self,
        options: RunOptions,
        cancel: &CancellationToken,
        progress: &MultiPhaseProgress,
    ) -> Result<RunSummary> {
        let resolve_options = ResolveOptions {
            frozen: options.frozen,
            upgrade: options.upgrade,
            allow_major_version_upgrades: options.allow_major_version_upgrades,
            allow_prerelease: options.allow_prerelease,
        };
        self.run_inner(resolve_options, &options, cancel, progress).await
    }

    /// Same as [`Self::run`], but always resolves in upgrade mode.
    pub async fn upgrade(&self, mut options: RunOptions, cancel: &CancellationToken) -> Result<RunSummary> {
        options.upgrade = true;
        self.run(options, cancel).await
    }

    /// Same as [`Self::upgrade`], reporting phases through `progress`.
    pub async fn upgrade_with_progress(
        &self,
        mut options: RunOptions,
        cancel: &CancellationToken,
        progress: &MultiPhaseProgress,
    ) -> Result<RunSummary> {
        options.upgrade = true;
        self.run_with_progress(options, cancel, progress).await
    }

    async fn run_inner(
        &self,
        resolve_options: ResolveOptions,
        options: &RunOptions,
        cancel: &CancellationToken,
        progress: &MultiPhaseProgress,
    ) -> Result<RunSummary> {
        let lockfile_path = self.lockfile_path();
        let mut lockfile = Lockfile::load(&lockfile_path)?;

        cancel.check()?;
        progress.start_phase(RunPhase::Resolving, None);
        let resolver =
            Resolver::new(&self.manifest, &lockfile, &self.cache, self.fetcher.as_ref(), resolve_options)
                .with_global_config(&self.global_config);
        let modules = resolver.resolve().await?;
        info!(count = modules.len(), "resolved modules");
        progress.complete_phase(Some(&format!("resolved {} module(s)", modules.len())));

        cancel.check()?;
        let module_fs = ModuleFs::discover(&modules);

        let extensions = self.start_extensions(&modules);

        cancel.check()?;
        progress.start_phase(RunPhase::Rendering, None);
        let files = render::render(&self.manifest, &modules, &module_fs, extensions).await?;
        info!(count = files.len(), "rendered files");
        progress.complete_phase(Some(&format!("rendered {} file(s)", files.len())));

        cancel.check()?;
        progress.start_phase(RunPhase::Reconciling, None);
        let reconcile_options = ReconcileOptions {
            dry_run: options.dry_run,
            fail_ignored: options.fail_ignored,
            adopt: options.adopt,
        };
        let report = reconcile::reconcile(&self.project_root, &files, &lockfile, &reconcile_options)?;
        progress.complete_phase(Some("reconciled project files"));

        if !options.dry_run {
            lockfile.modules = modules
                .iter()
                .map(|m| LockfileModuleEntry {
                    name: m.name.clone(),
                    url: m.url.clone(),
                    version: (&m.version).into(),
                    fingerprint: self
                        .manifest
                        .module(&m.name)
                        .map(|reference| reference.fingerprint())
                        .unwrap_or_default(),
                })
                .collect();
            // Only a path the reconciler actually wrote this run, or left
            // in place under `Once`, is still tracked — `.stencilignore`
            // matches, deletions, and explicit `file_skip` calls never
            // touch disk and must not be recorded as if they had.
            let tracked: std::collections::HashSet<&str> = report
                .outcomes
                .iter()
                .filter_map(|outcome| match outcome {
                    reconcile::Outcome::Written { path } | reconcile::Outcome::SkippedOnce { path } => {
                        Some(path.as_str())
                    }
                    reconcile::Outcome::Deleted { .. }
                    | reconcile::Outcome::SkippedIgnored { .. }
                    | reconcile::Outcome::Unchanged { .. } => None,
                })
                .collect();
            lockfile.files = files
                .iter()
                .filter(|f| tracked.contains(f.output_path.as_str()))
                .map(|f| LockfileFileEntry {
                    name: f.output_path.clone(),
                    template: f.template_path.clone(),
                    module: f.module.clone(),
                })
                .collect();
            lockfile.save(&lockfile_path)?;
        }

        if !options.skip_post_run && !options.dry_run && !self.manifest.post_run.is_empty() {
            cancel.check()?;
            progress.start_phase(RunPhase::PostRun, None);
            post_run::run_post_run_commands(&self.manifest.post_run, &self.project_root)?;
            progress.complete_phase(Some("post-run commands finished"));
        }

        Ok(RunSummary {
            modules: modules.into_iter().map(|m| m.name).collect(),
            outcomes: report.outcomes,
        })
    }

    /// Build one [`ExtensionHost`] per resolved extension module. Nothing
    /// is spawned yet — connection happens lazily on first call.
    fn start_extensions(&self, modules: &[crate::resolver::ResolvedModule]) -> BTreeMap<String, Arc<ExtensionHost>> {
        modules
            .iter()
            .filter_map(|module| {
                let entrypoint = module.extension_entrypoint.as_ref()?;
                let spec = ExtensionSpec {
                    module: module.name.clone(),
                    command: entrypoint.clone(),
                    args: Vec::new(),
                };
                Some((module.name.clone(), Arc::new(ExtensionHost::new(spec))))
            })
            .collect()
    }
}
