//! The thin command-line front end.
//!
//! A minimal `clap`-based binary front-end, the ambient entry point. This module does nothing but parse flags into
//! [`crate::driver::RunOptions`] / [`crate::resolver::ResolveOptions`] and
//! call [`crate::driver::Driver`], splitting `Cli` (what was typed) from
//! [`CliConfig`] (what the rest of the program needs) so tests can drive
//! the latter directly.

use crate::config::GlobalConfig;
use crate::core::StencilError;
use crate::driver::cancel::CancellationToken;
use crate::driver::{Driver, RunOptions, RunSummary};
use crate::lockfile::Lockfile;
use crate::manifest::{self, Manifest};
use crate::reconcile::Outcome;
use crate::utils::fs::normalize_relative_to;
use crate::utils::progress::MultiPhaseProgress;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Runtime configuration derived from parsed flags, kept separate from
/// [`Cli`] itself so tests can inject it without going through
/// `clap::Parser`.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub log_level: Option<String>,
}

#[derive(Parser)]
#[command(
    name = "stencil",
    about = "Project scaffolding and continuous-regeneration engine",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Render and report, but write nothing to disk and don't update the lockfile.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Fail instead of resolving anything that would deviate from `stencil.lock`.
    #[arg(long = "frozen-lockfile", global = true)]
    frozen_lockfile: bool,

    /// Permit a resolved module to cross a major-version boundary from the lockfile.
    #[arg(long = "allow-major-version-upgrades", global = true)]
    allow_major_version_upgrades: bool,

    /// Heuristically wrap pre-existing, block-free content instead of overwriting it.
    #[arg(long, global = true)]
    adopt: bool,

    /// Skip the manifest's `postRun` commands after a successful run.
    #[arg(long = "skip-post-run", global = true)]
    skip_post_run: bool,

    /// Treat any write blocked by `.stencilignore` as a fatal error.
    #[arg(long = "fail-ignored", global = true)]
    fail_ignored: bool,

    /// Raise the default log level to debug (ignored if `RUST_LOG` is set).
    #[arg(long, global = true)]
    debug: bool,

    /// Disable the phase progress spinners, even on a terminal.
    #[arg(long = "no-progress", global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-resolve every module to its latest satisfying version, ignoring
    /// the lockfile's recorded pins, then run.
    Upgrade,

    /// Operate on `stencil.lock` without rendering.
    Lockfile {
        #[command(subcommand)]
        action: LockfileAction,
    },

    /// Print which module and template produced a path.
    Describe { path: String },

    /// Scaffold a new template module. Out of scope for this build.
    Create {
        #[command(subcommand)]
        action: CreateAction,
    },
}

#[derive(Subcommand)]
enum LockfileAction {
    /// Remove file entries whose path is missing on disk, and (with
    /// `--modules`) module entries no longer referenced by the manifest.
    Prune {
        /// Restrict pruning to these output paths; omit to consider all entries.
        paths: Vec<String>,
        #[arg(long)]
        modules: bool,
    },
}

#[derive(Subcommand)]
enum CreateAction {
    Module { name: String },
}

impl Cli {
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        CliConfig {
            log_level: self.debug.then(|| "debug".to_string()),
        }
    }

    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    pub async fn execute_with_config(self, _config: CliConfig) -> Result<()> {
        match &self.command {
            Some(Commands::Lockfile { action }) => self.execute_lockfile(action),
            Some(Commands::Describe { path }) => self.execute_describe(path),
            Some(Commands::Create { action }) => Self::execute_create(action),
            Some(Commands::Upgrade) => self.execute_run(true).await,
            None => self.execute_run(false).await,
        }
    }

    fn run_options(&self, upgrade: bool) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            adopt: self.adopt,
            skip_post_run: self.skip_post_run,
            fail_ignored: self.fail_ignored,
            frozen: self.frozen_lockfile,
            allow_major_version_upgrades: self.allow_major_version_upgrades,
            upgrade,
            allow_prerelease: false,
        }
    }

    async fn execute_run(&self, upgrade: bool) -> Result<()> {
        let manifest_path = manifest::find_manifest()?;
        let project_root = manifest_path
            .parent()
            .context("manifest path has no parent directory")?
            .to_path_buf();
        let manifest = load_manifest(&manifest_path)?;

        let global_config = GlobalConfig::load().await.context("loading global config")?;
        let driver = Driver::new(project_root, manifest, global_config)?;

        let options = self.run_options(upgrade);
        let cancel = CancellationToken::new();
        let progress_enabled = !self.no_progress && std::io::stdout().is_terminal();
        let progress = MultiPhaseProgress::new(progress_enabled);
        let summary = if upgrade {
            driver.upgrade_with_progress(options, &cancel, &progress).await?
        } else {
            driver.run_with_progress(options, &cancel, &progress).await?
        };

        print_summary(&summary);
        Ok(())
    }

    fn execute_lockfile(&self, action: &LockfileAction) -> Result<()> {
        let manifest_path = manifest::find_manifest()?;
        let project_root = manifest_path.parent().context("manifest path has no parent directory")?;
        let manifest = load_manifest(&manifest_path)?;
        let lockfile_path = project_root.join("stencil.lock");
        let mut lockfile = Lockfile::load(&lockfile_path)?;

        match action {
            LockfileAction::Prune { paths, modules } => {
                let filter = (!paths.is_empty()).then_some(paths.as_slice());
                let pruned_files = lockfile.prune_files(project_root, filter);
                for path in &pruned_files {
                    println!("pruned file: {path}");
                }

                if *modules {
                    let manifest_modules: Vec<String> =
                        manifest.modules.iter().map(|m| m.name.clone()).collect();
                    let pruned_modules = lockfile.prune_modules(&manifest_modules, None);
                    for name in &pruned_modules {
                        println!("pruned module: {name}");
                    }
                }

                if pruned_files.is_empty() && !*modules {
                    println!("nothing to prune");
                }

                if !self.dry_run {
                    lockfile.save(&lockfile_path)?;
                }
                Ok(())
            }
        }
    }

    fn execute_describe(&self, path: &str) -> Result<()> {
        let manifest_path = manifest::find_manifest()?;
        let project_root = manifest_path.parent().context("manifest path has no parent directory")?;
        let lockfile = Lockfile::load(&project_root.join("stencil.lock"))?;

        let normalized = normalize_relative_to(project_root, std::path::Path::new(path));
        let normalized = normalized.to_string_lossy().replace('\\', "/");

        match lockfile.file_entry(&normalized) {
            Some(entry) => {
                println!("{} <- {}/{}", entry.name, entry.module, entry.template);
                Ok(())
            }
            None => bail!("no record of '{normalized}' in stencil.lock"),
        }
    }

    fn execute_create(action: &CreateAction) -> Result<()> {
        match action {
            CreateAction::Module { name } => Err(StencilError::Other {
                message: format!(
                    "`create module {name}` is out of scope for this build; scaffold the module by hand (manifest.yaml + templates)"
                ),
            }
            .into()),
        }
    }
}

fn load_manifest(path: &PathBuf) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading manifest at {}", path.display()))?;
    Ok(Manifest::from_yaml(&content)?)
}

fn print_summary(summary: &RunSummary) {
    println!("resolved {} module(s): {}", summary.modules.len(), summary.modules.join(", "));
    for outcome in &summary.outcomes {
        match outcome {
            Outcome::Written { path } => println!("  wrote {path}"),
            Outcome::Deleted { path } => println!("  deleted {path}"),
            Outcome::SkippedOnce { path } => println!("  skipped (once) {path}"),
            Outcome::SkippedIgnored { path } => println!("  skipped (ignored) {path}"),
            Outcome::Unchanged { path } => println!("  unchanged {path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_default_run_with_flags() {
        let cli = Cli::parse_from(["stencil", "--dry-run", "--adopt"]);
        assert!(cli.command.is_none());
        let options = cli.run_options(false);
        assert!(options.dry_run);
        assert!(options.adopt);
        assert!(!options.upgrade);
    }

    #[test]
    fn parses_upgrade_subcommand() {
        let cli = Cli::parse_from(["stencil", "upgrade"]);
        assert!(matches!(cli.command, Some(Commands::Upgrade)));
    }

    #[test]
    fn parses_lockfile_prune_with_paths() {
        let cli = Cli::parse_from(["stencil", "lockfile", "prune", "a.txt", "b.txt", "--modules"]);
        match cli.command {
            Some(Commands::Lockfile {
                action: LockfileAction::Prune { paths, modules },
            }) => {
                assert_eq!(paths, vec!["a.txt".to_string(), "b.txt".to_string()]);
                assert!(modules);
            }
            _ => panic!("expected Lockfile(Prune)"),
        }
    }

    #[test]
    fn parses_describe_path() {
        let cli = Cli::parse_from(["stencil", "describe", "hello.txt"]);
        assert!(matches!(cli.command, Some(Commands::Describe { path }) if path == "hello.txt"));
    }

    #[test]
    fn build_config_sets_debug_level() {
        let cli = Cli::parse_from(["stencil", "--debug"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn build_config_defaults_to_no_override() {
        let cli = Cli::parse_from(["stencil"]);
        assert_eq!(cli.build_config().log_level, None);
    }

    #[test]
    fn parses_no_progress_flag() {
        let cli = Cli::parse_from(["stencil", "--no-progress"]);
        assert!(cli.no_progress);
    }
}
