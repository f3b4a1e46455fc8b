//! Cross-platform utilities shared by the resolver, reconciler, and driver.
//!
//! # Modules
//!
//! - [`fs`] - atomic file writes, directory helpers, path normalization
//! - [`platform`] - OS-specific path/home-dir/cache-dir resolution
//! - [`progress`] - multi-phase progress reporting for a `stencil` run

pub mod fs;
pub mod platform;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, normalize_path, normalize_relative_to, safe_write};
pub use platform::{get_git_command, get_home_dir, is_windows, normalize_path_for_storage, resolve_path};
pub use progress::{MultiPhaseProgress, ProgressBar, RunPhase};
