//! Executes a manifest's `postRun` shell commands sequentially
//!.

use crate::core::StencilError;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Runs each command in `commands` in order. The first non-zero exit is
/// fatal and later commands do not run.
pub fn run_post_run_commands(commands: &[String], project_root: &Path) -> Result<()> {
    for command in commands {
        info!(command = %command, "running post-run command");
        let status = Command::new("bash")
            .args(["-euo", "pipefail", "-c", command])
            .current_dir(project_root)
            .status()
            .with_context(|| format!("failed to spawn post-run command: {command}"))?;
        if !status.success() {
            return Err(StencilError::PostRunFailed {
                command: command.clone(),
                status: status.code().unwrap_or(-1),
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_commands_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("marker.txt");
        let commands = vec![
            format!("echo one >> {}", marker.display()),
            format!("echo two >> {}", marker.display()),
        ];
        run_post_run_commands(&commands, tmp.path()).unwrap();
        let content = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(content, "one\ntwo\n");
    }

    #[test]
    fn stops_on_first_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("marker.txt");
        let commands = vec!["exit 1".to_string(), format!("echo should-not-run >> {}", marker.display())];

        let err = run_post_run_commands(&commands, tmp.path()).unwrap_err();

        assert!(!marker.exists());
        assert!(err.downcast_ref::<StencilError>().is_some());
    }
}
