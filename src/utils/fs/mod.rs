//! File system utilities for cross-platform file operations.
//!
//! Safe, atomic file operations used by the reconciler and lockfile store,
//! designed to work consistently across Windows, macOS, and Linux.
//!
//! - **Atomic operations**: files are written atomically to prevent corruption
//! - **Cross-platform**: handles Windows long paths, Unix permissions, and path separators
//! - **Safety**: ignore-pattern and output paths are normalized and
//!   re-relativized so `..`-escaping components collapse

pub mod atomic;
pub mod dirs;
pub mod paths;
pub mod temp;

pub use atomic::{atomic_write, safe_write};
pub use dirs::{ensure_dir, ensure_parent_dir, remove_dir_all};
pub use paths::{normalize_path, normalize_relative_to};
pub use temp::TempDir;
