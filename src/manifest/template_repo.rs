//! A module's own declaration of itself (`manifest.yaml` at the module's
//! checkout root).
//!
//! A module's own `manifest.yaml`: type set, required stencil-engine
//! version constraint, declared arguments schema, optional `dependencies`.
//! This is what lets
//! the resolver extend the module graph with transitive module
//! dependencies and lets the render phase validate
//! arguments against a schema before rendering.

use crate::core::StencilError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// What a module can provide. A module is renderable only if its type set
/// contains `Templates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateRepositoryType {
    Templates,
    Extension,
}

/// A dependency on a sibling module, declared inside another module's own
/// manifest (as opposed to the root project manifest).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleDependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// The parsed `manifest.yaml` found at the root of a resolved module's
/// checkout.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateRepositoryManifest {
    pub name: String,

    #[serde(rename = "type")]
    pub types: Vec<TemplateRepositoryType>,

    #[serde(default)]
    pub arguments: HashMap<String, JsonValue>,

    #[serde(default)]
    pub dependencies: Vec<ModuleDependency>,

    #[serde(default, rename = "stencilVersion", skip_serializing_if = "Option::is_none")]
    pub stencil_version: Option<String>,

    #[serde(default, rename = "minStencilVersion", skip_serializing_if = "Option::is_none")]
    pub min_stencil_version: Option<String>,
}

impl TemplateRepositoryManifest {
    pub fn from_yaml(content: &str, module_name: &str) -> Result<Self, StencilError> {
        let manifest: Self =
            serde_yaml::from_str(content).map_err(|e| StencilError::ManifestParseError {
                file: format!("{module_name}/manifest.yaml"),
                reason: e.to_string(),
            })?;
        if manifest.stencil_version.is_some() && manifest.min_stencil_version.is_some() {
            return Err(StencilError::ConflictingVersionConstraint {
                module: module_name.to_string(),
            });
        }
        Ok(manifest)
    }

    pub fn is_renderable(&self) -> bool {
        self.types.contains(&TemplateRepositoryType::Templates)
    }

    pub fn is_extension(&self) -> bool {
        self.types.contains(&TemplateRepositoryType::Extension)
    }

    /// Default value for `argument` (from the declaring module's own
    /// arguments schema), consulted by the render context when the project
    /// manifest doesn't supply one").
    pub fn argument_default(&self, key: &str) -> Option<&JsonValue> {
        self.arguments.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_template_and_extension_types() {
        let yaml = r#"
name: mod-a
type: [templates, extension]
dependencies:
  - name: mod-b
    version: ^1.0.0
"#;
        let m = TemplateRepositoryManifest::from_yaml(yaml, "mod-a").unwrap();
        assert!(m.is_renderable());
        assert!(m.is_extension());
        assert_eq!(m.dependencies.len(), 1);
    }

    #[test]
    fn rejects_both_version_fields() {
        let yaml = r#"
name: mod-a
type: [templates]
stencilVersion: "1.0.0"
minStencilVersion: "1.0.0"
"#;
        let err = TemplateRepositoryManifest::from_yaml(yaml, "mod-a").unwrap_err();
        assert!(matches!(err, StencilError::ConflictingVersionConstraint { .. }));
    }
}
