//! Version expressions and resolved module versions.
//!
//! A [`ModuleReference`](crate::manifest::ModuleReference) carries a
//! [`VersionExpr`] describing what the manifest author asked for; the
//! resolver (`crate::resolver`) turns that, plus every other referrer's
//! constraint on the same module, into exactly one [`ResolvedVersion`].
//!
//! # Version Expression Formats
//!
//! - **Exact pin**: `"=1.2.3"` or a bare full version `"1.2.3"` — matches
//!   only that tag.
//! - **Semver constraint**: `"^1.0.0"`, `"~1.2.0"`, `">=1.0.0, <2.0.0"` — resolved
//!   against the module's tags, same syntax as Cargo/semver ranges.
//! - **Branch**: any string that isn't a semver constraint and names a Git
//!   branch (e.g. `"main"`).
//! - **Unconstrained**: no version expression at all — resolves to the
//!   highest stable tag, or the default branch if there are no tags.
//!
//! A [`Replacement`](crate::manifest::Replacement) bypasses all of this and
//! resolves straight to [`ResolvedVersion::Virtual`].

pub mod constraints;

use semver::{Version, VersionReq};
use std::fmt;

/// What a manifest (or a module's own `dependencies` entry) asked for.
#[derive(Debug, Clone)]
pub enum VersionExpr {
    /// `=1.2.3` or bare `1.2.3` — exactly one tag, no range matching.
    Exact(Version),
    /// `^1.0.0`, `~1.2.0`, `>=1.0.0, <2.0.0`.
    ///
    /// Holds one [`VersionReq`] per `||`-separated alternative; a version
    /// satisfies the constraint if it matches any alternative.
    Constraint(Vec<VersionReq>),
    /// A Git branch name.
    Branch(String),
    /// No version expression given at all.
    Unconstrained,
}

impl VersionExpr {
    /// Parse a manifest `version` string plus an optional `branch` field.
    ///
    /// `branch` always wins if present, regardless of `version`'s contents —
    /// mirroring the manifest shape `{name, version?, branch?}`.
    pub fn parse(version: Option<&str>, branch: Option<&str>) -> Self {
        if let Some(branch) = branch {
            return Self::Branch(branch.to_string());
        }
        let Some(version) = version else {
            return Self::Unconstrained;
        };
        let trimmed = version.trim();
        if let Some(exact) = trimmed.strip_prefix('=') {
            if let Ok(v) = Version::parse(exact.trim_start_matches('v')) {
                return Self::Exact(v);
            }
        }
        // A bare, fully-specified version ("1.2.3"/"v1.2.3") means an
        // exact pin — check this *before* handing it to `VersionReq`,
        // since `VersionReq::parse` happily accepts a bare version and
        // treats it as equivalent to "^1.2.3", which is not what an
        // exact pin means.
        if !trimmed.contains("||") {
            if let Ok(v) = Version::parse(trimmed.trim_start_matches('v')) {
                return Self::Exact(v);
            }
        }
        if trimmed.contains("||") {
            let alternatives: Option<Vec<VersionReq>> = trimmed
                .split("||")
                .map(|part| VersionReq::parse(part.trim()).ok())
                .collect();
            if let Some(reqs) = alternatives {
                return Self::Constraint(reqs);
            }
        } else if let Ok(req) = VersionReq::parse(trimmed) {
            return Self::Constraint(vec![req]);
        }
        // Anything else is a branch name (a tag name behaves identically —
        // the resolver resolves branches and tags through the same Git ref
        // lookup, see `crate::git`).
        Self::Branch(trimmed.to_string())
    }

    /// A stable string identifying the exact referenced entry, for
    /// lockfile staleness checks.
    pub fn fingerprint(&self) -> String {
        match self {
            Self::Exact(v) => format!("={v}"),
            Self::Constraint(reqs) => {
                reqs.iter().map(std::string::ToString::to_string).collect::<Vec<_>>().join(" || ")
            }
            Self::Branch(b) => format!("branch:{b}"),
            Self::Unconstrained => "*".to_string(),
        }
    }
}

impl fmt::Display for VersionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "={v}"),
            Self::Constraint(reqs) => {
                write!(
                    f,
                    "{}",
                    reqs.iter().map(std::string::ToString::to_string).collect::<Vec<_>>().join(" || ")
                )
            }
            Self::Branch(b) => write!(f, "{b}"),
            Self::Unconstrained => write!(f, "*"),
        }
    }
}

/// The concrete version a module resolved to.
///
/// Every variant except [`Virtual`](Self::Virtual) carries a commit SHA —
/// an invariant the resolver and lockfile both rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedVersion {
    Tag { tag: String, commit: String },
    Branch { branch: String, commit: String },
    Commit(String),
    /// A local path replacement; synthetic version `Virtual=local`.
    Virtual,
}

impl ResolvedVersion {
    pub fn commit(&self) -> Option<&str> {
        match self {
            Self::Tag { commit, .. } | Self::Branch { commit, .. } | Self::Commit(commit) => {
                Some(commit)
            }
            Self::Virtual => None,
        }
    }

    /// The tag's semver, if this version is a semantic-version tag.
    pub fn semver(&self) -> Option<Version> {
        match self {
            Self::Tag { tag, .. } => Version::parse(tag.trim_start_matches('v')).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag { tag, .. } => write!(f, "{tag}"),
            Self::Branch { branch, .. } => write!(f, "{branch}"),
            Self::Commit(c) => write!(f, "{c}"),
            Self::Virtual => write!(f, "Virtual=local"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_pin() {
        match VersionExpr::parse(Some("=1.2.3"), None) {
            VersionExpr::Exact(v) => assert_eq!(v, Version::new(1, 2, 3)),
            other => panic!("expected Exact, got {other:?}"),
        }
    }

    #[test]
    fn parses_bare_version_as_exact_pin() {
        match VersionExpr::parse(Some("1.0.0"), None) {
            VersionExpr::Exact(v) => assert_eq!(v, Version::new(1, 0, 0)),
            other => panic!("expected Exact, got {other:?}"),
        }
    }

    #[test]
    fn parses_caret_constraint() {
        match VersionExpr::parse(Some("^1.0.0"), None) {
            VersionExpr::Constraint(reqs) => {
                assert!(reqs.iter().any(|r| r.matches(&Version::new(1, 5, 0))));
            }
            other => panic!("expected Constraint, got {other:?}"),
        }
    }

    #[test]
    fn branch_field_wins_over_version() {
        match VersionExpr::parse(Some("^1.0.0"), Some("main")) {
            VersionExpr::Branch(b) => assert_eq!(b, "main"),
            other => panic!("expected Branch, got {other:?}"),
        }
    }

    #[test]
    fn bare_name_is_a_branch() {
        match VersionExpr::parse(Some("feature/auth"), None) {
            VersionExpr::Branch(b) => assert_eq!(b, "feature/auth"),
            other => panic!("expected Branch, got {other:?}"),
        }
    }

    #[test]
    fn no_version_is_unconstrained() {
        assert!(matches!(VersionExpr::parse(None, None), VersionExpr::Unconstrained));
    }

    #[test]
    fn resolved_version_commit_accessor() {
        let v = ResolvedVersion::Tag {
            tag: "v1.0.0".into(),
            commit: "abc123".into(),
        };
        assert_eq!(v.commit(), Some("abc123"));
        assert_eq!(ResolvedVersion::Virtual.commit(), None);
    }
}
