//! Tera global functions: the built-in file-control/context-access
//! surface plus one wrapper per live native-extension
//! function.
//!
//! Tera's function-call syntax is flat (`name(kwarg=value, ...)`); it
//! cannot express a `file.Create(...)`-style method
//! chain. So every function below is a flat, namespaced global, and
//! every file-control function takes an optional `path` kwarg addressing
//! which buffered output it affects — defaulting to the evaluating
//! template's own default output when omitted.

use super::state::RunState;
use crate::value::Value as StencilValue;
use std::collections::HashMap;
use std::sync::Arc;
use tera::{Error as TeraError, Function as TeraFunction, Result as TeraResult, Value as TeraValue};

fn str_arg(args: &HashMap<String, TeraValue>, name: &str) -> TeraResult<String> {
    args.get(name)
        .and_then(TeraValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| TeraError::msg(format!("function requires a string `{name}` argument")))
}

fn opt_str_arg(args: &HashMap<String, TeraValue>, name: &str) -> Option<String> {
    args.get(name).and_then(TeraValue::as_str).map(str::to_string)
}

/// `file_create(path)` — registers a new buffered output at `path`
/// (idempotent); returns `path` so a template can capture it
/// (`{% set f = file_create(path="extra.txt") %}`).
pub struct FileCreate(pub Arc<RunState>);
impl TeraFunction for FileCreate {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let path = str_arg(args, "path")?;
        self.0.current.lock().unwrap().ensure_created(&path);
        Ok(TeraValue::String(path))
    }
}

/// `file_set_contents(content, path=None)` — replaces the contents of
/// the addressed file.
pub struct FileSetContents(pub Arc<RunState>);
impl TeraFunction for FileSetContents {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let content = str_arg(args, "content")?;
        let path = opt_str_arg(args, "path");
        let mut current = self.0.current.lock().unwrap();
        current.file_mut(path.as_deref()).contents = content.into_bytes();
        Ok(TeraValue::Null)
    }
}

/// `file_append(content, path=None)` — appends bytes to the addressed
/// file's existing contents.
pub struct FileAppend(pub Arc<RunState>);
impl TeraFunction for FileAppend {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let content = str_arg(args, "content")?;
        let path = opt_str_arg(args, "path");
        let mut current = self.0.current.lock().unwrap();
        current.file_mut(path.as_deref()).contents.extend_from_slice(content.as_bytes());
        Ok(TeraValue::Null)
    }
}

/// `file_skip(reason, path=None)`.
pub struct FileSkip(pub Arc<RunState>);
impl TeraFunction for FileSkip {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let reason = str_arg(args, "reason")?;
        let path = opt_str_arg(args, "path");
        let mut current = self.0.current.lock().unwrap();
        current.file_mut(path.as_deref()).skipped = Some(reason);
        Ok(TeraValue::Null)
    }
}

/// `file_delete(path=None)`.
pub struct FileDelete(pub Arc<RunState>);
impl TeraFunction for FileDelete {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let path = opt_str_arg(args, "path");
        let mut current = self.0.current.lock().unwrap();
        current.file_mut(path.as_deref()).deleted = true;
        Ok(TeraValue::Null)
    }
}

/// `file_once(path=None)`.
pub struct FileOnce(pub Arc<RunState>);
impl TeraFunction for FileOnce {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let path = opt_str_arg(args, "path");
        let mut current = self.0.current.lock().unwrap();
        current.file_mut(path.as_deref()).once = true;
        Ok(TeraValue::Null)
    }
}

/// `file_copy(src, path=None)` — copies a module asset (a non-`.tpl`
/// file in the calling template's own module) verbatim into the
/// addressed output; `path` defaults to `src`.
pub struct FileCopy(pub Arc<RunState>);
impl TeraFunction for FileCopy {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let src = str_arg(args, "src")?;
        let path = opt_str_arg(args, "path");
        let module = self.0.current.lock().unwrap().module.clone();
        let source_path = self
            .0
            .asset_path(&module, &src)
            .map(std::path::Path::to_path_buf)
            .ok_or_else(|| TeraError::msg(format!("module '{module}' has no asset '{src}' to copy")))?;
        let bytes = std::fs::read(&source_path)
            .map_err(|e| TeraError::msg(format!("failed to read asset '{src}': {e}")))?;
        let dest = path.unwrap_or_else(|| src.clone());
        self.0.current.lock().unwrap().file_mut(Some(&dest)).contents = bytes;
        Ok(TeraValue::String(dest))
    }
}

/// `file_set_mode(mode, path=None)` — `mode` is an octal-looking integer
/// such as `0o755`/`493`; Tera has no octal literal so templates
/// typically pass the decimal equivalent or a string like `"0755"`.
pub struct FileSetMode(pub Arc<RunState>);
impl TeraFunction for FileSetMode {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let mode = match args.get("mode") {
            Some(TeraValue::Number(n)) => n.as_u64().ok_or_else(|| TeraError::msg("mode must be a non-negative integer"))? as u32,
            Some(TeraValue::String(s)) => u32::from_str_radix(s.trim_start_matches("0o"), 8)
                .map_err(|e| TeraError::msg(format!("invalid octal mode '{s}': {e}")))?,
            _ => return Err(TeraError::msg("file_set_mode requires a `mode` argument")),
        };
        let path = opt_str_arg(args, "path");
        let mut current = self.0.current.lock().unwrap();
        current.file_mut(path.as_deref()).mode = mode;
        Ok(TeraValue::Null)
    }
}

/// `stencil_needs_rerender()` — opts the currently-evaluating template
/// into phase 2.
pub struct NeedsRerender(pub Arc<RunState>);
impl TeraFunction for NeedsRerender {
    fn call(&self, _args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        self.0.current.lock().unwrap().needs_rerender = true;
        Ok(TeraValue::Null)
    }
}

/// `stencil_get_module_hook(module, hook)` — reads a hook's
/// currently-visible contents as a Tera array.
pub struct GetModuleHook(pub Arc<RunState>);
impl TeraFunction for GetModuleHook {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let module = str_arg(args, "module")?;
        let hook = str_arg(args, "hook")?;
        let values = self
            .0
            .hooks
            .get(&(module, hook))
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        Ok(StencilValue::Sequence(values).to_json())
    }
}

/// `stencil_add_to_module_hook(module, hook, value)` — appends to a
/// hook, visible to every template evaluated after this call.
pub struct AddToModuleHook(pub Arc<RunState>);
impl TeraFunction for AddToModuleHook {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let module = str_arg(args, "module")?;
        let hook = str_arg(args, "hook")?;
        let value = args.get("value").cloned().unwrap_or(TeraValue::Null);
        self.0
            .hooks
            .entry((module, hook))
            .or_default()
            .push(StencilValue::from_json(&value));
        Ok(TeraValue::Null)
    }
}

/// `stencil_manifest_name()` — the project manifest's `name` field.
pub struct ManifestName(pub Arc<RunState>);
impl TeraFunction for ManifestName {
    fn call(&self, _args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        Ok(TeraValue::String(self.0.manifest_name.clone()))
    }
}

/// `stencil_modules()` — every resolved module, as `{name, url, version}`.
pub struct Modules(pub Arc<RunState>);
impl TeraFunction for Modules {
    fn call(&self, _args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        serde_json::to_value(&self.0.modules).map_err(|e| TeraError::msg(e.to_string()))
    }
}

/// `stencil_arg(name)` — the project argument map with per-module schema
/// defaults.
pub struct Arg(pub Arc<RunState>);
impl TeraFunction for Arg {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let name = str_arg(args, "name")?;
        let owning_module = self.0.current.lock().unwrap().module.clone();
        Ok(self.0.arg(&owning_module, &name))
    }
}

/// `ext_<module>_<fn>(...)` — dispatches to a native extension's
/// function over RPC. Every kwarg except a reserved
/// `args` array is dropped into a sorted-by-key positional list; pass
/// `args=[...]` explicitly when argument order matters.
///
/// Bridges the synchronous Tera call into the async [`crate::extension::ExtensionHost`]
/// via `block_in_place` + the ambient Tokio handle — safe because the
/// binary always runs on the multi-thread runtime (`#[tokio::main]`
/// without `flavor = "current_thread"`).
pub struct ExtensionCall {
    pub host: Arc<crate::extension::ExtensionHost>,
    pub module: String,
    pub function: String,
}

impl TeraFunction for ExtensionCall {
    fn call(&self, args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
        let positional: Vec<StencilValue> = if let Some(TeraValue::Array(items)) = args.get("args") {
            items.iter().map(StencilValue::from_json).collect()
        } else {
            let mut keys: Vec<&String> = args.keys().collect();
            keys.sort();
            keys.into_iter().map(|k| StencilValue::from_json(&args[k])).collect()
        };

        let host = self.host.clone();
        let function = self.function.clone();
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| TeraError::msg(format!("no Tokio runtime available: {e}")))?;
        let result = tokio::task::block_in_place(|| {
            handle.block_on(host.execute_template_function(&function, positional))
        });

        match result {
            Ok(value) => Ok(value.to_json()),
            Err(err) => Err(TeraError::msg(format!(
                "extension function '{}.{}' failed: {err}",
                self.module, self.function
            ))),
        }
    }
}
