//! Error handling for the Stencil engine.
//!
//! The error system mirrors the error categories from the engine's design
//! document: configuration, resolution, rendering, reconciliation, post-run,
//! and extension-host failures each get their own [`StencilError`] variants
//! rather than a single catch-all string. Call sites propagate with
//! [`anyhow::Result`] and `.context(...)`; the binary's `main` converts the
//! final error into an [`ErrorContext`] for colored, actionable display.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// All failure modes the engine can report.
///
/// Variants are grouped by stage: configuration, resolution, rendering,
/// reconciliation, post-run, and extension-host errors.
#[derive(Error, Debug)]
pub enum StencilError {
    // ---- Configuration ----
    #[error("manifest file stencil.yaml not found in current directory or any parent directory")]
    ManifestNotFound,

    #[error("invalid manifest syntax in {file}: {reason}")]
    ManifestParseError { file: String, reason: String },

    #[error("manifest validation failed: {reason}")]
    ManifestValidationError { reason: String },

    #[error(
        "module '{module}' declares both stencilVersion and minStencilVersion; only one is allowed"
    )]
    ConflictingVersionConstraint { module: String },

    #[error("constraint on module '{module}' is unsatisfiable: {reason}")]
    UnsatisfiableConstraint { module: String, reason: String },

    #[error("duplicate module reference '{module}' in manifest")]
    DuplicateModule { module: String },

    #[error("invalid global config at {file}: {reason}")]
    ConfigParseError { file: String, reason: String },

    // ---- Resolution ----
    #[error("failed to fetch module '{module}' from {url}: {reason}")]
    FetchFailed {
        module: String,
        url: String,
        reason: String,
    },

    #[error("no version of module '{module}' satisfies constraint '{constraint}'")]
    VersionConstraintFailed { module: String, constraint: String },

    #[error(
        "frozen lockfile violation: module '{module}' would need to move from {locked} to satisfy the manifest"
    )]
    FrozenLockfileViolation { module: String, locked: String },

    #[error(
        "major-version upgrade of module '{module}' from {from} to {to} requires --allow-major-version-upgrades"
    )]
    DisallowedMajorUpgrade {
        module: String,
        from: String,
        to: String,
    },

    #[error("module '{module}' requires engine version {required}, running engine is {running}")]
    EngineVersionMismatch {
        module: String,
        required: String,
        running: String,
    },

    #[error("dependency cycle detected among modules")]
    ModuleCycle,

    // ---- Rendering ----
    #[error("template error in {template} (module '{module}'): {reason}")]
    TemplateError {
        module: String,
        template: String,
        reason: String,
    },

    #[error(
        "unknown native function '{name}' referenced in {template}{}",
        .suggestion.as_deref().map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default()
    )]
    UnknownFunction {
        name: String,
        template: String,
        suggestion: Option<String>,
    },

    #[error("duplicate block name '{name}' in {path}")]
    DuplicateBlockName { name: String, path: String },

    #[error("extension function '{module}.{function}' failed: {reason}")]
    ExtensionFunctionError {
        module: String,
        function: String,
        reason: String,
    },

    // ---- Reconciliation ----
    #[error("failed to write {path}: {reason}")]
    ReconcileIoError { path: String, reason: String },

    #[error("file '{path}' is ignored by .stencilignore and --fail-ignored was set")]
    IgnoredFileViolation { path: String },

    // ---- Post-run ----
    #[error("post-run command exited with status {status}: {command}")]
    PostRunFailed { command: String, status: i32 },

    // ---- Extension host ----
    #[error("extension '{module}' handshake failed: {reason}")]
    HandshakeFailed { module: String, reason: String },

    #[error("extension '{module}' subprocess crashed: {reason}")]
    ExtensionCrashed { module: String, reason: String },

    #[error("RPC transport error talking to extension '{module}': {reason}")]
    ExtensionTransportError { module: String, reason: String },

    // ---- Generic / transport ----
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("semver parsing error: {0}")]
    SemverError(#[from] semver::Error),

    #[error("{message}")]
    Other { message: String },
}

/// A [`StencilError`] plus optional user-facing suggestion and detail text.
///
/// This is the shape presented at the CLI boundary; the engine itself deals
/// only in [`StencilError`] / [`anyhow::Result`].
#[derive(Debug)]
pub struct ErrorContext {
    pub error: StencilError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: StencilError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print to stderr: error in red/bold, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);
        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\ndetails: {details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nsuggestion: {suggestion}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Attach a best-effort suggestion to whatever error bubbled up to `main`.
///
/// Recognizes the engine's own [`StencilError`] variants (via downcast) and
/// gives each a tailored suggestion; anything else gets a generic context.
pub fn user_friendly_error(err: anyhow::Error) -> ErrorContext {
    if err.downcast_ref::<StencilError>().is_some() {
        let suggestion = match err.downcast_ref::<StencilError>().unwrap() {
            StencilError::ManifestNotFound => {
                Some("create a stencil.yaml in your project directory".to_string())
            }
            StencilError::FrozenLockfileViolation { .. } => Some(
                "drop --frozen-lockfile, or revert the manifest change and re-run".to_string(),
            ),
            StencilError::DisallowedMajorUpgrade { .. } => Some(
                "pass --allow-major-version-upgrades to accept the new major version"
                    .to_string(),
            ),
            StencilError::IgnoredFileViolation { path } => Some(format!(
                "remove '{path}' from .stencilignore or drop --fail-ignored"
            )),
            _ => None,
        };
        let error = err.downcast::<StencilError>().expect("checked above");
        let mut ctx = ErrorContext::new(error);
        ctx.suggestion = suggestion;
        ctx
    } else {
        let details: Vec<String> = err.chain().skip(1).map(std::string::ToString::to_string).collect();
        ErrorContext {
            error: StencilError::Other {
                message: err.to_string(),
            },
            suggestion: None,
            details: if details.is_empty() {
                None
            } else {
                Some(details.join("\ncaused by: "))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_text() {
        let e = StencilError::FrozenLockfileViolation {
            module: "mod-a".into(),
            locked: "v1.0.0".into(),
        };
        assert!(e.to_string().contains("frozen lockfile violation"));
    }

    #[test]
    fn user_friendly_error_attaches_suggestion() {
        let err = anyhow::Error::new(StencilError::FrozenLockfileViolation {
            module: "mod-a".into(),
            locked: "v1.0.0".into(),
        });
        let ctx = user_friendly_error(err);
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn user_friendly_error_generic() {
        let err = anyhow::anyhow!("boom");
        let ctx = user_friendly_error(err);
        assert_eq!(ctx.error.to_string(), "boom");
    }
}
