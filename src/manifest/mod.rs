//! The project manifest (`stencil.yaml`) and a module's own
//! template-repository manifest (`manifest.yaml`).
//!
//! # `stencil.yaml`
//!
//! ```yaml
//! name: demo
//! modules:
//!   - name: github.com/stencil-rs/mod-go
//!     version: ^1.0.0
//!   - name: github.com/stencil-rs/mod-docs
//!     branch: main
//! arguments:
//!   license: MIT
//! replacements:
//!   github.com/stencil-rs/mod-go: ../local/mod-go
//! postRun:
//!   - go mod tidy
//! minStencilVersion: "1.0.0"
//! ```
//!
//! See [`Manifest`] for field documentation and [`TemplateRepositoryManifest`]
//! for the shape of a module's own `manifest.yaml`.

mod io;
mod template_repo;

pub use io::find_manifest;
pub use template_repo::{ModuleDependency, TemplateRepositoryManifest, TemplateRepositoryType};

use crate::core::StencilError;
use crate::version::VersionExpr;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// One entry in `modules:` — what the manifest author asked for.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleReference {
    /// URL-like module name, e.g. `github.com/org/repo`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl ModuleReference {
    pub fn version_expr(&self) -> VersionExpr {
        VersionExpr::parse(self.version.as_deref(), self.branch.as_deref())
    }

    /// A stable fingerprint of `(name, version-expr)`, used by the resolver
    /// to detect whether the root manifest's entry for it has changed.
    pub fn fingerprint(&self) -> String {
        format!("{}@{}", self.name, self.version_expr().fingerprint())
    }
}

/// The complete `stencil.yaml` project declaration.
///
/// Invariants enforced by [`Manifest::validate`]: each module is referenced
/// at most once, and names are unique.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Manifest {
    pub name: String,

    #[serde(default)]
    pub modules: Vec<ModuleReference>,

    /// Free-form project argument map, passed to every template.
    #[serde(default)]
    pub arguments: HashMap<String, JsonValue>,

    /// Module name -> local directory. Overrides any remote fetch.
    #[serde(default)]
    pub replacements: HashMap<String, String>,

    /// Shell commands run sequentially after a successful render+reconcile.
    #[serde(default, rename = "postRun")]
    pub post_run: Vec<String>,

    #[serde(default, rename = "minStencilVersion", skip_serializing_if = "Option::is_none")]
    pub min_stencil_version: Option<String>,
}

impl Manifest {
    pub fn from_yaml(content: &str) -> Result<Self, StencilError> {
        let manifest: Self =
            serde_yaml::from_str(content).map_err(|e| StencilError::ManifestParseError {
                file: "stencil.yaml".to_string(),
                reason: e.to_string(),
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_yaml(&self) -> Result<String, StencilError> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn validate(&self) -> Result<(), StencilError> {
        let mut seen = std::collections::HashSet::new();
        for module in &self.modules {
            if !seen.insert(module.name.as_str()) {
                return Err(StencilError::DuplicateModule {
                    module: module.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn module(&self, name: &str) -> Option<&ModuleReference> {
        self.modules.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: demo
modules:
  - name: mod-a
    version: ^1.0.0
  - name: mod-b
    branch: main
arguments:
  license: MIT
replacements:
  mod-a: ../local/mod-a
postRun:
  - echo hi
minStencilVersion: "1.0.0"
"#;

    #[test]
    fn parses_sample_manifest() {
        let m = Manifest::from_yaml(SAMPLE).unwrap();
        assert_eq!(m.name, "demo");
        assert_eq!(m.modules.len(), 2);
        assert_eq!(m.arguments.get("license").unwrap(), "MIT");
        assert_eq!(m.replacements.get("mod-a").unwrap(), "../local/mod-a");
        assert_eq!(m.post_run, vec!["echo hi"]);
        assert_eq!(m.min_stencil_version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn rejects_duplicate_module_names() {
        let yaml = r#"
name: demo
modules:
  - name: mod-a
  - name: mod-a
"#;
        let err = Manifest::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, StencilError::DuplicateModule { .. }));
    }

    #[test]
    fn fingerprint_changes_with_version() {
        let a = ModuleReference {
            name: "mod-a".into(),
            version: Some("^1.0.0".into()),
            branch: None,
        };
        let b = ModuleReference {
            name: "mod-a".into(),
            version: Some("^2.0.0".into()),
            branch: None,
        };
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
