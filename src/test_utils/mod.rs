//! Test tooling shared by unit and integration tests: temp project/module
//! directories, a real-`git` test helper, and a one-shot logging
//! initializer. Only compiled for `#[cfg(test)]` or under the `test-utils`
//! feature (see `Cargo.toml`), so this code never ships in the release
//! binary.

pub mod environment;
pub mod git_helper;

pub use environment::TestProject;
pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize `tracing` for tests, once per process. Honors `RUST_LOG` if
/// set; otherwise uses `level`, or stays silent if neither is given.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
