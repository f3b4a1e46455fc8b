//! Resolver inputs and outputs.

use crate::manifest::TemplateRepositoryManifest;
use crate::version::ResolvedVersion;
use std::path::PathBuf;

/// One module with a concrete checkout ready to render from.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub name: String,
    /// The URL fetched, or `"<local>"` for a [`crate::manifest::Manifest::replacements`] entry.
    pub url: String,
    pub version: ResolvedVersion,
    /// Local checkout root (inside the cache, or the replacement directory).
    pub path: PathBuf,
    pub manifest: TemplateRepositoryManifest,
    /// Path to the extension's executable, when `manifest.is_extension()`.
    ///
    /// A resolved module may carry an optional extension entrypoint, but
    /// its on-disk location is unspecified upstream; resolved here
    /// to a fixed name (`stencil-extension`, with the platform's
    /// executable suffix) at the checkout root (see DESIGN.md).
    pub extension_entrypoint: Option<PathBuf>,
}

/// Controls how [`super::Resolver::resolve`] treats the existing lockfile.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Refuse to resolve anything that would change the lockfile; any
    /// drift is a [`crate::core::StencilError::FrozenLockfileViolation`].
    pub frozen: bool,
    /// Re-evaluate every constraint against the latest tags/branches
    /// instead of reusing the lockfile's recorded version when the
    /// manifest entry's fingerprint hasn't changed.
    pub upgrade: bool,
    /// Permit a resolved version to cross a major-version boundary from
    /// what the lockfile recorded.
    pub allow_major_version_upgrades: bool,
    pub allow_prerelease: bool,
}
