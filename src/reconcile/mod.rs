//! The file reconciler: merges rendered template output with whatever
//! already lives on disk.
//!
//! Uses the `ignore::gitignore` idiom for `.stencilignore` matching.

pub mod adopt;
pub mod blocks;
pub mod ignore;

use crate::core::StencilError;
use crate::lockfile::Lockfile;
use crate::render::File;
use ignore::IgnoreSet;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::warn;

/// What happened to one rendered [`File`] during reconciliation.
#[derive(Debug, Clone)]
pub enum Outcome {
    Written { path: String },
    Deleted { path: String },
    SkippedOnce { path: String },
    SkippedIgnored { path: String },
    Unchanged { path: String },
}

pub struct ReconcileOptions {
    pub dry_run: bool,
    pub fail_ignored: bool,
    /// Heuristically wrap pre-existing, block-free content instead of
    /// overwriting it outright.
    pub adopt: bool,
}

pub struct ReconcileReport {
    pub outcomes: Vec<Outcome>,
    pub ignored_violations: Vec<String>,
}

/// Apply every rendered [`File`] to `project_root` via the five-step merge
/// protocol below, in the order the files were emitted.
pub fn reconcile(
    project_root: &Path,
    files: &[File],
    lockfile: &Lockfile,
    options: &ReconcileOptions,
) -> Result<ReconcileReport, StencilError> {
    let ignore_set = IgnoreSet::load(project_root)?;
    let mut outcomes = Vec::with_capacity(files.len());
    let mut ignored_violations = Vec::new();

    for file in files {
        let outcome = reconcile_one(project_root, file, lockfile, &ignore_set, options, &mut ignored_violations)?;
        outcomes.push(outcome);
    }

    if options.fail_ignored && !ignored_violations.is_empty() {
        return Err(StencilError::IgnoredFileViolation { path: ignored_violations.join(", ") });
    }

    Ok(ReconcileReport { outcomes, ignored_violations })
}

fn reconcile_one(
    project_root: &Path,
    file: &File,
    lockfile: &Lockfile,
    ignore_set: &IgnoreSet,
    options: &ReconcileOptions,
    ignored_violations: &mut Vec<String>,
) -> Result<Outcome, StencilError> {
    let disk_path = project_root.join(&file.output_path);

    // Step 1: ignore set.
    if ignore_set.is_ignored(&file.output_path) {
        ignored_violations.push(file.output_path.clone());
        return Ok(Outcome::SkippedIgnored { path: file.output_path.clone() });
    }

    if file.is_skipped() {
        return Ok(Outcome::Unchanged { path: file.output_path.clone() });
    }

    // Step 2: deletion.
    if file.deleted {
        if !options.dry_run && disk_path.exists() {
            std::fs::remove_file(&disk_path).map_err(|e| StencilError::ReconcileIoError {
                path: file.output_path.clone(),
                reason: e.to_string(),
            })?;
        }
        return Ok(Outcome::Deleted { path: file.output_path.clone() });
    }

    // Step 3: once-only files already tracked by a prior run.
    if file.once && lockfile.file_entry(&file.output_path).is_some() {
        return Ok(Outcome::SkippedOnce { path: file.output_path.clone() });
    }

    // Steps 4/5: merge with existing content, or create fresh.
    let final_contents = if disk_path.exists() {
        let existing = std::fs::read_to_string(&disk_path).map_err(|e| StencilError::ReconcileIoError {
            path: file.output_path.clone(),
            reason: e.to_string(),
        })?;
        let rendered = String::from_utf8_lossy(&file.contents);
        if options.adopt {
            if let Some(adopted) = adopt::adopt_merge(&existing, &rendered, &file.output_path) {
                adopted.into_bytes()
            } else {
                let (merged, unknown) = blocks::merge(&rendered, &existing, &file.output_path)?;
                for name in unknown {
                    warn!(path = %file.output_path, block = %name, "block present on disk but absent from rendered template output; dropping");
                }
                merged.into_bytes()
            }
        } else {
            let (merged, unknown) = blocks::merge(&rendered, &existing, &file.output_path)?;
            for name in unknown {
                warn!(path = %file.output_path, block = %name, "block present on disk but absent from rendered template output; dropping");
            }
            merged.into_bytes()
        }
    } else {
        file.contents.clone()
    };

    if !options.dry_run {
        if let Some(parent) = disk_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StencilError::ReconcileIoError {
                path: file.output_path.clone(),
                reason: e.to_string(),
            })?;
            let mut perms = std::fs::metadata(parent)
                .map_err(|e| StencilError::ReconcileIoError { path: file.output_path.clone(), reason: e.to_string() })?
                .permissions();
            perms.set_mode(0o755);
            let _ = std::fs::set_permissions(parent, perms);
        }
        std::fs::write(&disk_path, &final_contents).map_err(|e| StencilError::ReconcileIoError {
            path: file.output_path.clone(),
            reason: e.to_string(),
        })?;
        let mut perms = std::fs::metadata(&disk_path)
            .map_err(|e| StencilError::ReconcileIoError { path: file.output_path.clone(), reason: e.to_string() })?
            .permissions();
        perms.set_mode(file.mode);
        std::fs::set_permissions(&disk_path, perms).map_err(|e| StencilError::ReconcileIoError {
            path: file.output_path.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(Outcome::Written { path: file.output_path.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockfile::{Lockfile, LockfileFileEntry};

    fn file(output_path: &str, contents: &str) -> File {
        File {
            output_path: output_path.to_string(),
            contents: contents.as_bytes().to_vec(),
            mode: 0o644,
            skipped: None,
            deleted: false,
            once: false,
            module: "mod-a".to_string(),
            template_path: format!("{output_path}.tpl"),
        }
    }

    fn options() -> ReconcileOptions {
        ReconcileOptions { dry_run: false, fail_ignored: false, adopt: false }
    }

    #[test]
    fn creates_new_file_with_declared_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![file("hello.txt", "Hello, demo!")];
        let lockfile = Lockfile::default();

        let report = reconcile(tmp.path(), &files, &lockfile, &options()).unwrap();

        assert!(matches!(report.outcomes[0], Outcome::Written { .. }));
        assert_eq!(std::fs::read_to_string(tmp.path().join("hello.txt")).unwrap(), "Hello, demo!");
    }

    #[test]
    fn preserves_block_body_across_reruns() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("hello.txt"),
            "Hello, demo!\n<<Stencil::Block(extra)>>\nuniverse\n<</Stencil::Block>>\n",
        )
        .unwrap();
        let mut f = file(
            "hello.txt",
            "Hello, demo v2!\n<<Stencil::Block(extra)>>\nworld\n<</Stencil::Block>>\n",
        );
        f.contents = "Hello, demo v2!\n<<Stencil::Block(extra)>>\nworld\n<</Stencil::Block>>\n"
            .as_bytes()
            .to_vec();
        let lockfile = Lockfile::default();

        reconcile(tmp.path(), &[f], &lockfile, &options()).unwrap();

        let written = std::fs::read_to_string(tmp.path().join("hello.txt")).unwrap();
        assert!(written.contains("universe"));
        assert!(written.contains("Hello, demo v2!"));
    }

    #[test]
    fn deletes_file_marked_deleted() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("gone.txt"), "bye").unwrap();
        let mut f = file("gone.txt", "");
        f.deleted = true;
        let lockfile = Lockfile::default();

        let report = reconcile(tmp.path(), &[f], &lockfile, &options()).unwrap();

        assert!(matches!(report.outcomes[0], Outcome::Deleted { .. }));
        assert!(!tmp.path().join("gone.txt").exists());
    }

    #[test]
    fn once_file_is_skipped_if_already_tracked() {
        let tmp = tempfile::tempdir().unwrap();
        let mut f = file("once.txt", "first");
        f.once = true;
        let mut lockfile = Lockfile::default();
        lockfile.files.push(LockfileFileEntry {
            name: "once.txt".to_string(),
            template: "once.txt.tpl".to_string(),
            module: "mod-a".to_string(),
        });

        let report = reconcile(tmp.path(), &[f], &lockfile, &options()).unwrap();

        assert!(matches!(report.outcomes[0], Outcome::SkippedOnce { .. }));
        assert!(!tmp.path().join("once.txt").exists());
    }

    #[test]
    fn ignored_file_is_never_written() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".stencilignore"), "go.mod\n").unwrap();
        std::fs::write(tmp.path().join("go.mod"), "hello").unwrap();
        let f = file("go.mod", "from template");
        let lockfile = Lockfile::default();

        let report = reconcile(tmp.path(), &[f], &lockfile, &options()).unwrap();

        assert!(matches!(report.outcomes[0], Outcome::SkippedIgnored { .. }));
        assert_eq!(std::fs::read_to_string(tmp.path().join("go.mod")).unwrap(), "hello");
    }

    #[test]
    fn fail_ignored_raises_a_fatal_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".stencilignore"), "go.mod\n").unwrap();
        let f = file("go.mod", "from template");
        let lockfile = Lockfile::default();
        let opts = ReconcileOptions { dry_run: false, fail_ignored: true, adopt: false };

        let err = reconcile(tmp.path(), &[f], &lockfile, &opts).unwrap_err();
        assert!(matches!(err, StencilError::IgnoredFileViolation { .. }));
    }

    #[test]
    fn dry_run_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![file("hello.txt", "Hello, demo!")];
        let lockfile = Lockfile::default();
        let opts = ReconcileOptions { dry_run: true, fail_ignored: false, adopt: false };

        reconcile(tmp.path(), &files, &lockfile, &opts).unwrap();

        assert!(!tmp.path().join("hello.txt").exists());
    }
}
