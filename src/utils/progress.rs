//! Progress indicators for a `stencil` run.
//!
//! A single [`MultiPhaseProgress`] tracks the driver's phases in order
//! as a sequence of spinners, each finalized to a static
//! completion line before the next starts.

use crate::manifest::Manifest;
use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Re-export for deprecated functions - use MultiPhaseProgress instead
#[deprecated(since = "0.3.0", note = "Use MultiPhaseProgress instead")]
pub use indicatif::ProgressBar;

/// One phase of a `stencil` run, per the driver's resolve → fetch → render → reconcile → post-run control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Resolving the module graph to a concrete version set.
    Resolving,
    /// Fetching/checking out resolved module sources.
    Fetching,
    /// Evaluating templates against the render context.
    Rendering,
    /// Merging rendered output with on-disk state.
    Reconciling,
    /// Running declared post-run shell commands.
    PostRun,
}

impl RunPhase {
    /// Get a human-readable description of the phase
    pub fn description(&self) -> &'static str {
        match self {
            Self::Resolving => "Resolving modules",
            Self::Fetching => "Fetching module sources",
            Self::Rendering => "Rendering templates",
            Self::Reconciling => "Reconciling project files",
            Self::PostRun => "Running post-run commands",
        }
    }

    /// Get the spinner prefix for this phase
    pub fn spinner_prefix(&self) -> &'static str {
        match self {
            Self::Resolving => "🔍",
            Self::Fetching => "⏳",
            Self::Rendering => "📝",
            Self::Reconciling => "📦",
            Self::PostRun => "▶",
        }
    }
}

/// Multi-phase progress manager that displays multiple progress bars
/// with completed phases showing as static messages
#[derive(Clone)]
pub struct MultiPhaseProgress {
    /// MultiProgress container from indicatif
    multi: Arc<indicatif::MultiProgress>,
    /// Current active spinner/progress bar
    current_bar: Arc<Mutex<Option<IndicatifBar>>>,
    /// Whether progress is enabled
    enabled: bool,
}

impl MultiPhaseProgress {
    /// Create a new multi-phase progress manager
    pub fn new(enabled: bool) -> Self {
        Self {
            multi: Arc::new(indicatif::MultiProgress::new()),
            current_bar: Arc::new(Mutex::new(None)),
            enabled,
        }
    }

    /// Start a new phase with a spinner
    pub fn start_phase(&self, phase: RunPhase, message: Option<&str>) {
        if !self.enabled {
            // In non-TTY mode, just print the phase
            if !self.enabled {
                return;
            }
            let phase_msg = if let Some(msg) = message {
                format!("{} {} {}", phase.spinner_prefix(), phase.description(), msg)
            } else {
                format!("{} {}", phase.spinner_prefix(), phase.description())
            };
            println!("{}", phase_msg);
            return;
        }

        // Don't clear the existing bar - it should already be finished with a message
        // Just remove our reference to it
        if let Ok(mut guard) = self.current_bar.lock() {
            *guard = None;
        }

        // Create new spinner for this phase
        let spinner = self.multi.add(IndicatifBar::new_spinner());

        // Format the phase message
        let phase_msg = format!(
            "{} {} {}",
            phase.spinner_prefix(),
            phase.description(),
            message.unwrap_or("")
        );

        // Configure spinner style
        let style = IndicatifStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner} {msg}")
            .unwrap();

        spinner.set_style(style);
        spinner.set_message(phase_msg);
        spinner.enable_steady_tick(Duration::from_millis(100));

        // Store the spinner
        *self.current_bar.lock().unwrap() = Some(spinner);
    }

    /// Start a new phase with a progress bar
    pub fn start_phase_with_progress(&self, phase: RunPhase, total: usize) {
        if !self.enabled {
            // In non-TTY mode, just print the phase
            if !self.enabled {
                return;
            }
            println!(
                "{} {} (0/{})",
                phase.spinner_prefix(),
                phase.description(),
                total
            );
            return;
        }

        // Don't clear the existing bar - it should already be finished with a message
        // Just remove our reference to it
        if let Ok(mut guard) = self.current_bar.lock() {
            *guard = None;
        }

        // Create new progress bar for this phase
        let progress_bar = self.multi.add(IndicatifBar::new(total as u64));

        // Configure progress bar style with phase prefix
        let style = IndicatifStyle::default_bar()
            .template(&format!(
                "{} {{msg}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}}",
                phase.spinner_prefix()
            ))
            .unwrap()
            .progress_chars("=>-");

        progress_bar.set_style(style);
        progress_bar.set_message(phase.description());

        // Store the progress bar
        *self.current_bar.lock().unwrap() = Some(progress_bar);
    }

    /// Update the message of the current phase
    pub fn update_message(&self, message: String) {
        if let Ok(guard) = self.current_bar.lock()
            && let Some(ref bar) = *guard
        {
            bar.set_message(message);
        }
    }

    /// Update the current message for the active phase
    pub fn update_current_message(&self, message: &str) {
        if let Ok(guard) = self.current_bar.lock()
            && let Some(ref bar) = *guard
        {
            bar.set_message(message.to_string());
        }
    }

    /// Increment progress for progress bars
    pub fn increment_progress(&self, delta: u64) {
        if let Ok(guard) = self.current_bar.lock()
            && let Some(ref bar) = *guard
        {
            bar.inc(delta);
        }
    }

    /// Set progress position for progress bars
    pub fn set_progress(&self, pos: usize) {
        if let Ok(guard) = self.current_bar.lock()
            && let Some(ref bar) = *guard
        {
            bar.set_position(pos as u64);
        }
    }

    /// Complete the current phase and show it as a static message
    pub fn complete_phase(&self, message: Option<&str>) {
        if !self.enabled {
            // In non-TTY mode, just print completion
            if !self.enabled {
                return;
            }
            if let Some(msg) = message {
                println!("✓ {}", msg);
            }
            return;
        }

        // Complete the current bar/spinner with a message and leave it visible
        if let Ok(mut guard) = self.current_bar.lock()
            && let Some(bar) = guard.take()
        {
            // Disable any animation
            bar.disable_steady_tick();

            // Set the final message
            let final_message = if let Some(msg) = message {
                format!("✓ {}", msg)
            } else {
                "✓ Phase complete".to_string()
            };

            // Clear the spinner
            bar.finish_and_clear();

            // Use suspend to print the completion message outside of the MultiProgress
            // This ensures it stays visible
            self.multi.suspend(|| {
                println!("{}", final_message);
            });
        }
    }

    /// Clear all progress displays
    pub fn clear(&self) {
        // Clear current bar if any
        if let Ok(mut guard) = self.current_bar.lock()
            && let Some(bar) = guard.take()
        {
            bar.finish_and_clear();
        }
        self.multi.clear().ok();
    }

    /// Create a subordinate progress bar for detailed progress within a phase
    pub fn add_progress_bar(&self, total: u64) -> Option<IndicatifBar> {
        if !self.enabled {
            return None;
        }

        let pb = self.multi.add(IndicatifBar::new(total));
        let style = IndicatifStyle::default_bar()
            .template("  {msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("=>-");
        pb.set_style(style);
        Some(pb)
    }
}

/// Collects the top-level module names declared in a manifest, in the
/// order they appear under `modules:`.
pub fn collect_module_names(manifest: &Manifest) -> Vec<String> {
    manifest.modules.iter().map(|m| m.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_phase_description() {
        assert_eq!(RunPhase::Resolving.description(), "Resolving modules");
        assert_eq!(RunPhase::Fetching.description(), "Fetching module sources");
        assert_eq!(RunPhase::Rendering.description(), "Rendering templates");
        assert_eq!(RunPhase::Reconciling.description(), "Reconciling project files");
        assert_eq!(RunPhase::PostRun.description(), "Running post-run commands");
    }

    #[test]
    fn test_run_phase_spinner_prefix() {
        assert_eq!(RunPhase::Resolving.spinner_prefix(), "🔍");
        assert_eq!(RunPhase::Fetching.spinner_prefix(), "⏳");
        assert_eq!(RunPhase::Rendering.spinner_prefix(), "📝");
        assert_eq!(RunPhase::Reconciling.spinner_prefix(), "📦");
        assert_eq!(RunPhase::PostRun.spinner_prefix(), "▶");
    }

    #[test]
    fn test_multi_phase_progress_new() {
        let progress = MultiPhaseProgress::new(true);

        progress.start_phase(RunPhase::Resolving, Some("test message"));
        progress.update_current_message("updated message");
        progress.complete_phase(Some("completed"));
        progress.clear();
    }

    #[test]
    fn test_multi_phase_progress_with_progress_bar() {
        let progress = MultiPhaseProgress::new(true);

        progress.start_phase_with_progress(RunPhase::Rendering, 10);
        progress.increment_progress(5);
        progress.set_progress(8);
        progress.complete_phase(Some("Rendering completed"));
    }

    #[test]
    fn test_multi_phase_progress_disabled() {
        let progress = MultiPhaseProgress::new(false);

        // These should not panic when disabled
        progress.start_phase(RunPhase::Resolving, None);
        progress.complete_phase(Some("test"));
        progress.clear();
    }

    #[test]
    fn test_collect_module_names() {
        let manifest = Manifest {
            name: "demo".to_string(),
            modules: vec![],
            arguments: Default::default(),
            replacements: Default::default(),
            post_run: vec![],
            min_stencil_version: None,
        };
        assert!(collect_module_names(&manifest).is_empty());
    }
}
