//! Stencil — a project scaffolding and continuous-regeneration engine.
//!
//! Given a project manifest declaring a set of remote template modules
//! (each an addressable VCS repository at a chosen version), the engine
//! resolves those modules into a consistent version set, renders their
//! templates against user-supplied arguments, merges results with prior
//! state recorded in a lockfile, and writes the updated project tree.
//! Unlike a one-shot generator, Stencil is re-runnable: on every
//! invocation it reconciles the on-disk project with new template
//! output, preserving user edits inside marked regions and obeying
//! ignore rules.
//!
//! # Architecture
//!
//! Stencil follows a manifest/lockfile model where:
//! - `stencil.yaml` declares a project's template modules, arguments, and
//!   post-run commands
//! - `stencil.lock` records the exact resolved module versions and the
//!   files a prior run emitted, for reproducible, idempotent re-runs
//! - Modules are fetched directly from Git repositories (no central registry)
//!
//! # Core Modules
//!
//! - [`cache`] - the global module cache and its per-URL locking
//! - [`cli`] - the thin command-line front end
//! - [`config`] - global, user-wide configuration (`~/.stencil/config.yaml`)
//! - [`core`] - shared error types and error-reporting helpers
//! - [`driver`] - orchestrates one full resolve → render → reconcile run
//! - [`extension`] - the native extension subprocess host and wire protocol
//! - [`git`] - VCS transport: cloning module repositories and listing refs
//! - [`lockfile`] - `stencil.lock` parsing, writing, and pruning
//! - [`manifest`] - `stencil.yaml` and module `manifest.yaml` parsing
//! - [`module_fs`] - the layered, read-only view over resolved modules' templates
//! - [`reconcile`] - merges rendered output with on-disk state
//! - [`render`] - the template runtime and its built-in function set
//! - [`resolver`] - module version resolution across the dependency graph
//! - [`utils`] - cross-platform file, path, and progress-reporting helpers
//! - [`value`] - the dynamic value type threaded through template functions
//! - [`version`] - version expression parsing and constraint satisfaction
//!
//! # Example
//!
//! ```yaml
//! # stencil.yaml
//! name: demo
//! modules:
//!   - name: github.com/stencil-rs/mod-go
//!     version: ^1.0.0
//! arguments:
//!   license: MIT
//! ```
//!
//! # Usage
//!
//! ```bash
//! # Render the project from stencil.yaml
//! stencil
//!
//! # Re-resolve every module to its latest satisfying version
//! stencil upgrade
//!
//! # Remove lockfile entries for files missing on disk
//! stencil lockfile prune
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod driver;
pub mod extension;
pub mod git;
pub mod lockfile;
pub mod manifest;
pub mod module_fs;
pub mod reconcile;
pub mod render;
pub mod resolver;
pub mod utils;
pub mod value;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
