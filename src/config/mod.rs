//! Global, user-wide configuration — distinct from the per-project
//! [`crate::manifest::Manifest`] (`stencil.yaml`).
//!
//! # Configuration layers
//!
//! 1. **Global config** (`~/.stencil/config.yaml`) — per-host auth tokens
//!    for private module repositories, and an optional cache directory
//!    override. Never committed to a project.
//! 2. **Project manifest** (`stencil.yaml`) — modules, arguments,
//!    replacements, post-run commands. See [`crate::manifest`].
//! 3. **Lockfile** (`stencil.lock`) — resolved versions and the files each
//!    module wrote. See [`crate::lockfile`].
//!
//! # Location
//!
//! - `$STENCIL_CONFIG_PATH` if set, else `~/.stencil/config.yaml` on every
//!   platform `dirs::home_dir` resolves.

mod global;

pub use global::{GlobalConfig, GlobalConfigManager};
