//! Conjunction of every referrer's constraint on a single module.
//!
//! Collects constraints from all referrers: the root manifest plus every
//! dependency edge into a module. [`ConstraintSet`]
//! is that collection: each referrer contributes one [`VersionExpr`], and a
//! candidate version must satisfy all of them (AND across referrers; `||`
//! within a single referrer's own constraint is handled by
//! [`VersionExpr::Constraint`] already holding the OR-alternatives).

use crate::version::VersionExpr;
use semver::Version;

/// One referrer's constraint, kept alongside its source so an unsatisfiable
/// constraint error can name the conflicting referrers.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub referrer: String,
    pub expr: VersionExpr,
}

#[derive(Debug, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, referrer: impl Into<String>, expr: VersionExpr) {
        self.constraints.push(Constraint {
            referrer: referrer.into(),
            expr,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn referrers(&self) -> impl Iterator<Item = &str> {
        self.constraints.iter().map(|c| c.referrer.as_str())
    }

    /// Whether any referrer pinned an exact version or a branch — those
    /// aren't semver-resolved, so the set degenerates to "exactly one
    /// acceptable ref name".
    pub fn pinned_ref(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match &c.expr {
            VersionExpr::Branch(b) => Some(b.as_str()),
            _ => None,
        })
    }

    pub fn exact_version(&self) -> Option<&Version> {
        self.constraints.iter().find_map(|c| match &c.expr {
            VersionExpr::Exact(v) => Some(v),
            _ => None,
        })
    }

    /// Does `version` satisfy every semver-constrained referrer in this set?
    ///
    /// Referrers pinning a branch or an exact version are checked by the
    /// caller separately (see [`Self::pinned_ref`] / [`Self::exact_version`]):
    /// this only evaluates [`VersionExpr::Constraint`] entries, which is what
    /// "filter by the conjunction of constraints"
    /// means once pins have been handled.
    pub fn semver_satisfies(&self, version: &Version) -> bool {
        self.constraints.iter().all(|c| match &c.expr {
            VersionExpr::Constraint(reqs) => reqs.iter().any(|r| r.matches(version)),
            VersionExpr::Exact(v) => v == version,
            VersionExpr::Branch(_) | VersionExpr::Unconstrained => true,
        })
    }

    /// Human-readable summary of every referrer's ask, for unsatisfiable-
    /// constraint error messages.
    pub fn describe(&self) -> String {
        self.constraints
            .iter()
            .map(|c| format!("{} requires {}", c.referrer, c.expr))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Select the highest version in `candidates` that satisfies `set`,
/// excluding pre-releases unless `allow_prerelease` is set.
pub fn pick_highest_satisfying<'a>(
    set: &ConstraintSet,
    candidates: impl IntoIterator<Item = &'a Version>,
    allow_prerelease: bool,
) -> Option<&'a Version> {
    candidates
        .into_iter()
        .filter(|v| allow_prerelease || v.pre.is_empty())
        .filter(|v| set.semver_satisfies(v))
        .max()
}

/// Whether moving from `from` to `to` crosses a major-version boundary,
/// per semver's "0.y.z" special-casing (a 0.x bump in minor is already a
/// breaking change by semver convention, so treat 0.x -> 0.y as major too).
pub fn is_major_jump(from: &Version, to: &Version) -> bool {
    if from.major != to.major {
        return true;
    }
    from.major == 0 && from.minor != to.minor
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::VersionReq;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn conjunction_across_referrers() {
        let mut set = ConstraintSet::new();
        set.add("root", VersionExpr::Constraint(vec![VersionReq::parse(">=1.0.0").unwrap()]));
        set.add("dep-b", VersionExpr::Constraint(vec![VersionReq::parse("<1.5.0").unwrap()]));
        assert!(set.semver_satisfies(&v("1.2.0")));
        assert!(!set.semver_satisfies(&v("1.6.0")));
        assert!(!set.semver_satisfies(&v("0.9.0")));
    }

    #[test]
    fn picks_highest_matching_stable() {
        let mut set = ConstraintSet::new();
        set.add("root", VersionExpr::Constraint(vec![VersionReq::parse("^1.0.0").unwrap()]));
        let candidates = vec![v("1.0.0"), v("1.5.0"), v("2.0.0"), v("1.9.0-beta.1")];
        let picked = pick_highest_satisfying(&set, &candidates, false);
        assert_eq!(picked, Some(&v("1.5.0")));
    }

    #[test]
    fn prerelease_excluded_by_default() {
        let mut set = ConstraintSet::new();
        set.add("root", VersionExpr::Constraint(vec![VersionReq::parse("*").unwrap()]));
        let candidates = vec![v("2.0.0-rc.1")];
        assert_eq!(pick_highest_satisfying(&set, &candidates, false), None);
        assert_eq!(pick_highest_satisfying(&set, &candidates, true), Some(&v("2.0.0-rc.1")));
    }

    #[test]
    fn major_jump_detection() {
        assert!(is_major_jump(&v("1.0.0"), &v("2.0.0")));
        assert!(!is_major_jump(&v("1.0.0"), &v("1.9.0")));
        assert!(is_major_jump(&v("0.1.0"), &v("0.2.0")));
        assert!(!is_major_jump(&v("0.1.0"), &v("0.1.5")));
    }
}
