//! The layered, read-only template filesystem view over every resolved
//! module's checkout.
//!
//! Templates are files ending in `.tpl` anywhere under a
//! module's checkout (excluding `manifest.yaml` and VCS metadata); when
//! more than one module declares the same relative output path, the
//! resolver's module order decides which wins, and within one module
//! paths are visited in lexicographic order, walked with `walkdir` for
//! deterministic ordering across platforms.
//!
//! Every other file under a module's checkout (not `.tpl`-suffixed, not
//! `manifest.yaml`, not VCS metadata) is a module asset: never evaluated,
//! never auto-emitted, and only copied into the render's output when a
//! template explicitly calls `file_copy` (see `crate::render::functions`).

use crate::resolver::ResolvedModule;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const TEMPLATE_SUFFIX: &str = ".tpl";
const MODULE_MANIFEST_FILE: &str = "manifest.yaml";

/// One discovered template, keyed by the output path it will eventually
/// produce (its module-relative path with `.tpl` stripped).
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    /// Path relative to the project root once rendered.
    pub output_path: String,
    /// Absolute path to the `.tpl` source file.
    pub source_path: PathBuf,
    /// Path relative to the module's checkout root, `.tpl` suffix included
    /// — recorded as `LockfileFileEntry::template` provenance.
    pub template_rel_path: String,
    pub module: String,
}

/// A module asset: a non-`.tpl` file under a module's checkout,
/// discovered but never rendered — copied verbatim only when a template
/// calls `file_copy`.
#[derive(Debug, Clone)]
pub struct AssetEntry {
    /// Path relative to the module's checkout root.
    pub rel_path: String,
    /// Absolute path to the asset on disk.
    pub source_path: PathBuf,
}

/// A flattened, conflict-resolved view of every module's templates, keyed
/// by output path, plus every module's raw (non-`.tpl`) assets, keyed by
/// `(module, module-relative path)`. `entries()` yields templates sorted
/// by output path; callers that need the module-then-path evaluation
/// order the template runtime uses re-sort against the resolver's module
/// list themselves rather than relying on this type's own iteration
/// order. Assets are never merged across modules the way templates are —
/// each module's assets are addressed only from within that module's own
/// templates, so collisions between two modules' same-named assets are
/// not possible.
pub struct ModuleFs {
    entries: BTreeMap<String, TemplateEntry>,
    assets: BTreeMap<(String, String), PathBuf>,
}

impl ModuleFs {
    /// Walk every resolved module's checkout in order, later modules
    /// overriding earlier ones when two declare the same output path. A
    /// module whose own `manifest.yaml` doesn't declare the `templates`
    /// type (an extension-only module, say) contributes no templates,
    /// even if a stray `.tpl` file happens to live in its checkout — per
    /// spec, "a module is renderable if its type contains `templates`".
    pub fn discover(modules: &[ResolvedModule]) -> Self {
        let mut entries = BTreeMap::new();
        let mut assets = BTreeMap::new();
        for module in modules {
            if module.manifest.is_renderable() {
                for entry in Self::walk_module(module) {
                    entries.insert(entry.output_path.clone(), entry);
                }
            }
            for asset in Self::walk_assets(module) {
                assets.insert((module.name.clone(), asset.rel_path), asset.source_path);
            }
        }
        Self { entries, assets }
    }

    fn relative_paths_under(module: &ResolvedModule) -> Vec<PathBuf> {
        if !module.path.exists() {
            return Vec::new();
        }
        let mut relative_paths: Vec<PathBuf> = WalkDir::new(&module.path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| !is_vcs_metadata(e.path()))
            .filter_map(|e| e.path().strip_prefix(&module.path).ok().map(Path::to_path_buf))
            .collect();
        relative_paths.sort();
        relative_paths
    }

    fn walk_module(module: &ResolvedModule) -> Vec<TemplateEntry> {
        Self::relative_paths_under(module)
            .into_iter()
            .filter(|relative| relative.extension().is_some_and(|ext| ext == "tpl"))
            .map(|relative| {
                let output_path = relative.to_string_lossy().trim_end_matches(TEMPLATE_SUFFIX).to_string();
                TemplateEntry {
                    output_path,
                    source_path: module.path.join(&relative),
                    template_rel_path: relative.to_string_lossy().replace('\\', "/"),
                    module: module.name.clone(),
                }
            })
            .collect()
    }

    fn walk_assets(module: &ResolvedModule) -> Vec<AssetEntry> {
        Self::relative_paths_under(module)
            .into_iter()
            .filter(|relative| !relative.extension().is_some_and(|ext| ext == "tpl"))
            .filter(|relative| relative.to_string_lossy() != MODULE_MANIFEST_FILE)
            .map(|relative| AssetEntry {
                rel_path: relative.to_string_lossy().replace('\\', "/"),
                source_path: module.path.join(&relative),
            })
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TemplateEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The absolute path of `module`'s asset at `rel_path`, if it was
    /// discovered during `discover`.
    pub fn asset_path(&self, module: &str, rel_path: &str) -> Option<&Path> {
        self.assets.get(&(module.to_string(), rel_path.to_string())).map(PathBuf::as_path)
    }

    /// A clone of the full `(module, rel_path) -> absolute path` asset
    /// map, handed to the template runtime's [`crate::render::state::RunState`]
    /// so `file_copy` can resolve assets without borrowing `ModuleFs` itself.
    pub fn asset_map(&self) -> BTreeMap<(String, String), PathBuf> {
        self.assets.clone()
    }
}

fn is_vcs_metadata(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == ".git")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::TemplateRepositoryManifest;
    use crate::version::ResolvedVersion;

    fn manifest() -> TemplateRepositoryManifest {
        TemplateRepositoryManifest::from_yaml("name: m\ntype: [templates]\n", "m").unwrap()
    }

    fn make_module(dir: &Path, name: &str) -> ResolvedModule {
        ResolvedModule {
            name: name.to_string(),
            url: "https://example.com".to_string(),
            version: ResolvedVersion::Virtual,
            path: dir.to_path_buf(),
            manifest: manifest(),
            extension_entrypoint: None,
        }
    }

    #[test]
    fn discovers_tpl_files_and_strips_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("README.md.tpl"), "hi").unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/main.rs.tpl"), "fn main() {}").unwrap();
        std::fs::write(tmp.path().join("manifest.yaml"), "name: m\ntype: [templates]\n").unwrap();

        let modules = vec![make_module(tmp.path(), "mod-a")];
        let fs = ModuleFs::discover(&modules);

        let paths: Vec<&str> = fs.entries().map(|e| e.output_path.as_str()).collect();
        assert!(paths.contains(&"README.md"));
        assert!(paths.contains(&"src/main.rs"));
        assert_eq!(fs.len(), 2);
    }

    #[test]
    fn later_module_wins_on_collision() {
        let tmp_a = tempfile::tempdir().unwrap();
        let tmp_b = tempfile::tempdir().unwrap();
        std::fs::write(tmp_a.path().join("hello.txt.tpl"), "from a").unwrap();
        std::fs::write(tmp_b.path().join("hello.txt.tpl"), "from b").unwrap();

        let modules = vec![make_module(tmp_a.path(), "mod-a"), make_module(tmp_b.path(), "mod-b")];
        let fs = ModuleFs::discover(&modules);

        let entry = fs.entries().find(|e| e.output_path == "hello.txt").unwrap();
        assert_eq!(entry.module, "mod-b");
    }

    #[test]
    fn extension_only_module_contributes_no_templates() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("leftover.txt.tpl"), "should not render").unwrap();
        std::fs::write(tmp.path().join("manifest.yaml"), "name: m\ntype: [extension]\n").unwrap();

        let extension_manifest =
            TemplateRepositoryManifest::from_yaml("name: m\ntype: [extension]\n", "m").unwrap();
        let modules = vec![ResolvedModule {
            name: "mod-ext".to_string(),
            url: "https://example.com".to_string(),
            version: ResolvedVersion::Virtual,
            path: tmp.path().to_path_buf(),
            manifest: extension_manifest,
            extension_entrypoint: None,
        }];
        let fs = ModuleFs::discover(&modules);

        assert!(fs.is_empty());
        assert!(fs.entries().all(|e| e.output_path != "leftover.txt"));
    }

    #[test]
    fn discovers_non_tpl_files_as_assets_not_templates() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("assets")).unwrap();
        std::fs::write(tmp.path().join("assets/logo.png"), b"\x89PNG\r\n").unwrap();
        std::fs::write(tmp.path().join("manifest.yaml"), "name: m\ntype: [templates]\n").unwrap();

        let modules = vec![make_module(tmp.path(), "mod-a")];
        let fs = ModuleFs::discover(&modules);

        assert!(fs.entries().all(|e| e.output_path != "assets/logo.png"));
        assert!(fs.asset_path("mod-a", "assets/logo.png").is_some());
        assert!(fs.asset_path("mod-a", "manifest.yaml").is_none());
        assert!(fs.asset_path("other-module", "assets/logo.png").is_none());
    }
}
