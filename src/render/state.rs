//! Mutable state shared across a single run's template evaluations.
//!
//! Module hooks and the file emission log are scoped to a single driver
//! invocation; they live in an explicit run context rather than a process
//! global. This
//! is that context. It is built once per [`super::Runtime::run`] call and
//! dropped at the end of it.

use crate::extension::ExtensionHost;
use crate::manifest::{Manifest, TemplateRepositoryManifest};
use crate::module_fs::TemplateEntry;
use crate::resolver::ResolvedModule;
use crate::value::Value;
use dashmap::DashMap;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One output file as it is being assembled by the template currently
/// evaluating. Promoted to a [`super::File`] once the template finishes.
#[derive(Debug, Clone)]
pub struct BufferedFile {
    pub contents: Vec<u8>,
    pub mode: u32,
    pub skipped: Option<String>,
    pub deleted: bool,
    pub once: bool,
}

impl BufferedFile {
    fn default_for(contents: Vec<u8>) -> Self {
        Self {
            contents,
            mode: 0o644,
            skipped: None,
            deleted: false,
            once: false,
        }
    }
}

/// Per-template scratch state, reset before each template evaluation
/// (including the phase-2 re-render of templates that declared
/// `needsRerender`).
pub struct CurrentTemplate {
    pub module: String,
    pub template_rel_path: String,
    pub default_output_path: String,
    /// Insertion-ordered: spec.md's "insertion order within a template"
    /// file-emission guarantee depends on iterating these back out in the
    /// order `file_create`/`file_set_contents`/the default output were
    /// first touched, not sorted by path.
    pub files: IndexMap<String, BufferedFile>,
    pub needs_rerender: bool,
}

impl CurrentTemplate {
    pub fn new(entry: &TemplateEntry) -> Self {
        Self {
            module: entry.module.clone(),
            template_rel_path: entry.template_rel_path.clone(),
            default_output_path: entry.output_path.clone(),
            files: IndexMap::new(),
            needs_rerender: false,
        }
    }

    /// The file at `path`, or the template's own default output if `path`
    /// is `None` — every file-control Tera global accepts an optional
    /// `path` kwarg for this reason.
    pub fn file_mut(&mut self, path: Option<&str>) -> &mut BufferedFile {
        let path = path.unwrap_or(&self.default_output_path).to_string();
        self.files.entry(path).or_insert_with(|| BufferedFile::default_for(Vec::new()))
    }

    pub fn ensure_created(&mut self, path: &str) {
        self.files.entry(path.to_string()).or_insert_with(|| BufferedFile::default_for(Vec::new()));
    }

    /// Seed the default output with the template's own rendered text,
    /// unless a function call already created that path explicitly (in
    /// which case the explicit contents win).
    pub fn seed_default_output(&mut self, rendered: Vec<u8>) {
        self.files.entry(self.default_output_path.clone()).or_insert_with(|| BufferedFile::default_for(rendered));
    }
}

/// A minimal summary of a resolved module, exposed to templates through
/// `stencil_modules()`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub url: String,
    pub version: String,
}

/// Everything a Tera global function needs to read or mutate while one
/// template is rendering.
pub struct RunState {
    pub manifest_name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
    pub modules: Vec<ModuleSummary>,
    pub module_manifests: BTreeMap<String, TemplateRepositoryManifest>,
    pub extensions: BTreeMap<String, Arc<ExtensionHost>>,
    /// `(module, hook name) -> appended values`: named, append-only lists
    /// any template can write to and later templates can read.
    pub hooks: DashMap<(String, String), Vec<Value>>,
    /// `(module, module-relative path) -> absolute path`, from
    /// [`crate::module_fs::ModuleFs::asset_map`] — what `file_copy`
    /// resolves its `src` argument against.
    pub assets: BTreeMap<(String, String), PathBuf>,
    pub current: Mutex<CurrentTemplate>,
}

impl RunState {
    pub fn new(
        manifest: &Manifest,
        modules: &[ResolvedModule],
        extensions: BTreeMap<String, Arc<ExtensionHost>>,
        assets: BTreeMap<(String, String), PathBuf>,
        placeholder: &TemplateEntry,
    ) -> Self {
        let arguments = match serde_json::to_value(&manifest.arguments) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        let summaries = modules
            .iter()
            .map(|m| ModuleSummary {
                name: m.name.clone(),
                url: m.url.clone(),
                version: m.version.to_string(),
            })
            .collect();
        let module_manifests =
            modules.iter().map(|m| (m.name.clone(), m.manifest.clone())).collect();

        Self {
            manifest_name: manifest.name.clone(),
            arguments,
            modules: summaries,
            module_manifests,
            extensions,
            hooks: DashMap::new(),
            assets,
            current: Mutex::new(CurrentTemplate::new(placeholder)),
        }
    }

    /// The absolute path of `module`'s asset at `rel_path`, if it was
    /// discovered in the module filesystem this run.
    pub fn asset_path(&self, module: &str, rel_path: &str) -> Option<&Path> {
        self.assets.get(&(module.to_string(), rel_path.to_string())).map(PathBuf::as_path)
    }

    /// Reads the project argument map, falling back to the declaring
    /// module's schema default. `owning_module` is whichever
    /// template is currently being evaluated.
    pub fn arg(&self, owning_module: &str, key: &str) -> serde_json::Value {
        if let Some(v) = self.arguments.get(key) {
            return v.clone();
        }
        self.module_manifests
            .get(owning_module)
            .and_then(|m| m.argument_default(key))
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}
