//! The template runtime: evaluates every discovered template against the
//! built-in function set plus any live native extensions, and produces
//! the [`File`] set the reconciler will merge onto disk.
//!
//! Two passes over the ordered template set:
//!
//! 1. **Discovery** — every template is evaluated once, in module order
//!    then lexicographic path order within a module; hook writes and
//!    buffered file outputs are recorded.
//! 2. **Finalize** — any template that called `stencil_needs_rerender()`
//!    during phase 1 is evaluated again, now seeing every hook write from
//!    every template (including ones that ran after it in phase 1); its
//!    phase-1 output is discarded in favor of the phase-2 output. Every
//!    other template keeps its phase-1 output unchanged.
//!
//! Evaluation itself is single-threaded and side-effecting by design
//! — the whole point of the two explicit phases is to give
//! hook-dependent templates a well-defined second look without needing
//! real concurrency control.

mod functions;
mod state;

use crate::core::StencilError;
use crate::extension::ExtensionHost;
use crate::manifest::Manifest;
use crate::module_fs::{ModuleFs, TemplateEntry};
use crate::resolver::ResolvedModule;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use state::{CurrentTemplate, RunState};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tera::{Context as TeraContext, Tera};

/// One rendered output, ready for the reconciler.
///
/// Each `File` has: output path, bytes, file mode, skipped flag + reason,
/// deleted flag, once flag, provenance (module name + template path).
#[derive(Debug, Clone)]
pub struct File {
    pub output_path: String,
    pub contents: Vec<u8>,
    pub mode: u32,
    pub skipped: Option<String>,
    pub deleted: bool,
    pub once: bool,
    pub module: String,
    pub template_path: String,
}

impl File {
    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// A template entry paired with its position in the deterministic
/// evaluation order.
struct OrderedEntry<'a> {
    entry: &'a TemplateEntry,
}

fn order_templates<'a>(modules: &[ResolvedModule], module_fs: &'a ModuleFs) -> Vec<OrderedEntry<'a>> {
    let module_order: HashMap<&str, usize> =
        modules.iter().enumerate().map(|(i, m)| (m.name.as_str(), i)).collect();
    let mut ordered: Vec<OrderedEntry<'a>> =
        module_fs.entries().map(|entry| OrderedEntry { entry }).collect();
    ordered.sort_by(|a, b| {
        let ia = module_order.get(a.entry.module.as_str()).copied().unwrap_or(usize::MAX);
        let ib = module_order.get(b.entry.module.as_str()).copied().unwrap_or(usize::MAX);
        ia.cmp(&ib).then_with(|| a.entry.output_path.cmp(&b.entry.output_path))
    });
    ordered
}

/// Build the shared Tera instance for one run: the fixed built-in
/// globals plus one `ext_<module>_<fn>` wrapper per function a live
/// extension module advertises via `GetTemplateFunctions`.
///
/// `module` names are turned into identifier-safe fragments by replacing
/// every non `[A-Za-z0-9_]` byte with `_`.
async fn build_tera(
    state: Arc<RunState>,
    extensions: &BTreeMap<String, Arc<ExtensionHost>>,
) -> Result<(Tera, Vec<String>)> {
    let mut tera = Tera::default();
    let mut names = Vec::new();

    tera.register_function("file_create", functions::FileCreate(state.clone()));
    tera.register_function("file_set_contents", functions::FileSetContents(state.clone()));
    tera.register_function("file_copy", functions::FileCopy(state.clone()));
    tera.register_function("file_append", functions::FileAppend(state.clone()));
    tera.register_function("file_skip", functions::FileSkip(state.clone()));
    tera.register_function("file_delete", functions::FileDelete(state.clone()));
    tera.register_function("file_once", functions::FileOnce(state.clone()));
    tera.register_function("file_set_mode", functions::FileSetMode(state.clone()));
    tera.register_function("stencil_needs_rerender", functions::NeedsRerender(state.clone()));
    tera.register_function("stencil_get_module_hook", functions::GetModuleHook(state.clone()));
    tera.register_function("stencil_add_to_module_hook", functions::AddToModuleHook(state.clone()));
    tera.register_function("stencil_manifest_name", functions::ManifestName(state.clone()));
    tera.register_function("stencil_modules", functions::Modules(state.clone()));
    tera.register_function("stencil_arg", functions::Arg(state.clone()));

    names.extend(
        [
            "file_create",
            "file_set_contents",
            "file_copy",
            "file_append",
            "file_skip",
            "file_delete",
            "file_once",
            "file_set_mode",
            "stencil_needs_rerender",
            "stencil_get_module_hook",
            "stencil_add_to_module_hook",
            "stencil_manifest_name",
            "stencil_modules",
            "stencil_arg",
        ]
        .map(str::to_string),
    );

    for (module, host) in extensions {
        let function_names = host
            .get_template_functions()
            .await
            .with_context(|| format!("extension '{module}' failed GetTemplateFunctions"))?;
        let safe_module: String =
            module.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect();
        for function in function_names {
            let safe_fn: String =
                function.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect();
            let name = format!("ext_{safe_module}_{safe_fn}");
            tera.register_function(
                &name,
                functions::ExtensionCall {
                    host: host.clone(),
                    module: module.clone(),
                    function,
                },
            );
            names.push(name);
        }
    }

    Ok((tera, names))
}

/// Tera reports an unknown global function as a generic render error whose
/// message contains the function's name; pull it out so we can offer a
/// `strsim`-ranked "did you mean" suggestion.
fn unknown_function_name(message: &str) -> Option<&str> {
    let start = message.find("function '")? + "function '".len();
    let rest = &message[start..];
    let end = rest.find('\'')?;
    Some(&rest[..end])
}

fn suggest_function(name: &str, known: &[String]) -> Option<String> {
    known
        .iter()
        .map(|candidate| (candidate, strsim::levenshtein(name, candidate)))
        .filter(|(_, distance)| *distance <= 3)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate.clone())
}

/// Evaluate one template once, returning its buffered outputs and
/// whether it asked for a phase-2 re-render.
fn eval_once(tera: &Tera, state: &RunState, entry: &TemplateEntry, known_functions: &[String]) -> Result<(Vec<File>, bool)> {
    let source = std::fs::read_to_string(&entry.source_path)
        .with_context(|| format!("failed to read template {}", entry.source_path.display()))?;

    {
        let mut current = state.current.lock().unwrap();
        *current = CurrentTemplate::new(entry);
    }

    let rendered = tera.render_str(&source, &TeraContext::new()).map_err(|e| {
        let message = e.to_string();
        if let Some(name) = unknown_function_name(&message) {
            if !known_functions.iter().any(|f| f == name) {
                return StencilError::UnknownFunction {
                    name: name.to_string(),
                    template: entry.template_rel_path.clone(),
                    suggestion: suggest_function(name, known_functions),
                };
            }
        }
        StencilError::TemplateError {
            module: entry.module.clone(),
            template: entry.template_rel_path.clone(),
            reason: message,
        }
    })?;

    let mut current = state.current.lock().unwrap();
    current.seed_default_output(rendered.into_bytes());

    let files = current
        .files
        .iter()
        .map(|(path, buffered)| File {
            output_path: path.clone(),
            contents: buffered.contents.clone(),
            mode: buffered.mode,
            skipped: buffered.skipped.clone(),
            deleted: buffered.deleted,
            once: buffered.once,
            module: entry.module.clone(),
            template_path: entry.template_rel_path.clone(),
        })
        .collect();

    Ok((files, current.needs_rerender))
}

/// Evaluate every template discovered in `module_fs` and return the
/// final set of output files, one per output path.
///
/// When two templates (via `file_create`) target the same output path,
/// the template evaluated later wins — the same "later module/template
/// wins" rule `crate::module_fs::ModuleFs` already applies at discovery.
pub async fn render(
    manifest: &Manifest,
    modules: &[ResolvedModule],
    module_fs: &ModuleFs,
    extensions: BTreeMap<String, Arc<ExtensionHost>>,
) -> Result<Vec<File>> {
    let ordered = order_templates(modules, module_fs);
    let Some(first) = ordered.first() else {
        return Ok(Vec::new());
    };

    let state = Arc::new(RunState::new(manifest, modules, extensions.clone(), module_fs.asset_map(), first.entry));
    let (tera, known_functions) = build_tera(state.clone(), &extensions).await?;

    let mut phase1 = Vec::with_capacity(ordered.len());
    for ordered_entry in &ordered {
        let (files, needs_rerender) = eval_once(&tera, &state, ordered_entry.entry, &known_functions)?;
        phase1.push((ordered_entry.entry, files, needs_rerender));
    }

    // Insertion-ordered: spec.md's "template order otherwise" file-emission
    // guarantee requires later templates' files to be appended after
    // earlier ones, with a same-path overwrite keeping its original slot
    // rather than moving to the end — exactly `IndexMap::insert`'s
    // behavior, unlike a `BTreeMap` which would silently re-sort by path.
    let mut by_path: IndexMap<String, File> = IndexMap::new();
    for (entry, files, needs_rerender) in phase1 {
        let files = if needs_rerender {
            let (files2, _) = eval_once(&tera, &state, entry, &known_functions)?;
            files2
        } else {
            files
        };
        for file in files {
            by_path.insert(file.output_path.clone(), file);
        }
    }

    Ok(by_path.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Manifest, TemplateRepositoryManifest};
    use crate::version::ResolvedVersion;
    use std::collections::HashMap as StdHashMap;
    use std::path::Path;

    fn manifest(args: &[(&str, serde_json::Value)]) -> Manifest {
        let mut arguments = StdHashMap::new();
        for (k, v) in args {
            arguments.insert((*k).to_string(), v.clone());
        }
        Manifest {
            name: "demo".to_string(),
            modules: vec![],
            arguments,
            replacements: StdHashMap::new(),
            post_run: vec![],
            min_stencil_version: None,
        }
    }

    fn module(dir: &Path, name: &str) -> ResolvedModule {
        ResolvedModule {
            name: name.to_string(),
            url: "https://example.com".to_string(),
            version: ResolvedVersion::Virtual,
            path: dir.to_path_buf(),
            manifest: TemplateRepositoryManifest::from_yaml("name: m\ntype: [templates]\n", name).unwrap(),
            extension_entrypoint: None,
        }
    }

    #[tokio::test]
    async fn renders_basic_variable_substitution() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("hello.txt.tpl"), "Hello, {{ stencil_manifest_name() }}!").unwrap();
        let modules = vec![module(tmp.path(), "mod-a")];
        let module_fs = ModuleFs::discover(&modules);
        let m = manifest(&[]);

        let files = render(&m, &modules, &module_fs, BTreeMap::new()).await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].output_path, "hello.txt");
        assert_eq!(String::from_utf8(files[0].contents.clone()).unwrap(), "Hello, demo!");
    }

    #[tokio::test]
    async fn file_create_emits_an_extra_output() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("main.tpl"),
            r#"{{ file_create(path="extra.txt") }}{{ file_set_contents(path="extra.txt", content="side output") }}main body"#,
        )
        .unwrap();
        let modules = vec![module(tmp.path(), "mod-a")];
        let module_fs = ModuleFs::discover(&modules);
        let m = manifest(&[]);

        let mut files = render(&m, &modules, &module_fs, BTreeMap::new()).await.unwrap();
        files.sort_by(|a, b| a.output_path.cmp(&b.output_path));

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].output_path, "extra.txt");
        assert_eq!(String::from_utf8(files[0].contents.clone()).unwrap(), "side output");
        assert_eq!(files[1].output_path, "main");
    }

    #[tokio::test]
    async fn file_copy_reads_a_module_asset_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("assets")).unwrap();
        std::fs::write(tmp.path().join("assets/logo.png"), b"\x89PNG\r\n").unwrap();
        std::fs::write(
            tmp.path().join("main.tpl"),
            r#"{{ file_copy(src="assets/logo.png", path="out/logo.png") }}main body"#,
        )
        .unwrap();
        let modules = vec![module(tmp.path(), "mod-a")];
        let module_fs = ModuleFs::discover(&modules);
        let m = manifest(&[]);

        let mut files = render(&m, &modules, &module_fs, BTreeMap::new()).await.unwrap();
        files.sort_by(|a, b| a.output_path.cmp(&b.output_path));

        assert_eq!(files.len(), 2);
        let copied = files.iter().find(|f| f.output_path == "out/logo.png").unwrap();
        assert_eq!(copied.contents, b"\x89PNG\r\n");
    }

    #[tokio::test]
    async fn file_copy_rejects_an_unknown_asset() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("main.tpl"), r#"{{ file_copy(src="missing.bin") }}"#).unwrap();
        let modules = vec![module(tmp.path(), "mod-a")];
        let module_fs = ModuleFs::discover(&modules);
        let m = manifest(&[]);

        let err = render(&m, &modules, &module_fs, BTreeMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("missing.bin"));
    }

    #[tokio::test]
    async fn file_list_preserves_emission_order_not_alphabetical() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("main.tpl"),
            r#"{% set _z = file_create(path="z.txt") %}{% set _a = file_create(path="a.txt") %}body"#,
        )
        .unwrap();
        let modules = vec![module(tmp.path(), "mod-a")];
        let module_fs = ModuleFs::discover(&modules);
        let m = manifest(&[]);

        let files = render(&m, &modules, &module_fs, BTreeMap::new()).await.unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.output_path.as_str()).collect();
        assert_eq!(paths, vec!["z.txt", "a.txt", "main"]);
    }

    #[tokio::test]
    async fn hooks_are_visible_to_later_templates() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("a.txt.tpl"),
            r#"{{ stencil_add_to_module_hook(module="mod-a", hook="greetings", value="hi") }}a"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("b.txt.tpl"),
            r#"{{ stencil_get_module_hook(module="mod-a", hook="greetings") | length }}"#,
        )
        .unwrap();
        let modules = vec![module(tmp.path(), "mod-a")];
        let module_fs = ModuleFs::discover(&modules);
        let m = manifest(&[]);

        let files = render(&m, &modules, &module_fs, BTreeMap::new()).await.unwrap();
        let b = files.iter().find(|f| f.output_path == "b.txt").unwrap();
        assert_eq!(String::from_utf8(b.contents.clone()).unwrap(), "1");
    }

    #[tokio::test]
    async fn stencil_arg_falls_back_to_module_schema_default() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("manifest.yaml"), "name: mod-a\ntype: [templates]\narguments:\n  license: MIT\n").unwrap();
        std::fs::write(tmp.path().join("out.txt.tpl"), r#"{{ stencil_arg(name="license") }}"#).unwrap();

        let module_manifest = TemplateRepositoryManifest::from_yaml(
            &std::fs::read_to_string(tmp.path().join("manifest.yaml")).unwrap(),
            "mod-a",
        )
        .unwrap();
        let modules = vec![ResolvedModule {
            name: "mod-a".to_string(),
            url: "https://example.com".to_string(),
            version: ResolvedVersion::Virtual,
            path: tmp.path().to_path_buf(),
            manifest: module_manifest,
            extension_entrypoint: None,
        }];
        let module_fs = ModuleFs::discover(&modules);
        let m = manifest(&[]);

        let files = render(&m, &modules, &module_fs, BTreeMap::new()).await.unwrap();
        let out = files.iter().find(|f| f.output_path == "out.txt").unwrap();
        assert_eq!(String::from_utf8(out.contents.clone()).unwrap(), "MIT");
    }

    #[tokio::test]
    async fn needs_rerender_sees_hooks_written_by_later_templates() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("a.txt.tpl"),
            r#"{{ stencil_needs_rerender() }}count={{ stencil_get_module_hook(module="mod-a", hook="items") | length }}"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("z.txt.tpl"),
            r#"{{ stencil_add_to_module_hook(module="mod-a", hook="items", value=1) }}z"#,
        )
        .unwrap();
        let modules = vec![module(tmp.path(), "mod-a")];
        let module_fs = ModuleFs::discover(&modules);
        let m = manifest(&[]);

        let files = render(&m, &modules, &module_fs, BTreeMap::new()).await.unwrap();
        let a = files.iter().find(|f| f.output_path == "a.txt").unwrap();
        // phase 1 evaluates a.txt before z.txt (alphabetical), seeing 0 items;
        // phase 2 re-evaluates a.txt after z.txt has written its hook.
        assert_eq!(String::from_utf8(a.contents.clone()).unwrap(), "count=1");
    }
}
