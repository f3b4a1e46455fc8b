//! Best-effort `--adopt` heuristic: wrap pre-existing, block-free content
//! in synthesized block markers so a first stencil run over a
//! hand-written project doesn't clobber it.
//!
//! Adopt mode scans existing files and attempts to infer block
//! boundaries as a best-effort heuristic: the longest common line-prefix
//! and line-suffix between the existing file and the freshly rendered
//! one are left alone, and whatever sits between them on disk is kept
//! verbatim inside one synthesized block.

use super::blocks;

const ADOPTED_BLOCK_NAME: &str = "adopted";

/// Returns `None` when `existing` already has at least one real block —
/// adoption only applies to files a template has never annotated.
pub fn adopt_merge(existing: &str, rendered: &str, path: &str) -> Option<String> {
    if existing == rendered {
        return None;
    }
    if blocks::parse(existing, path).ok()?.block_names().next().is_some() {
        return None;
    }

    let existing_lines: Vec<&str> = existing.split_inclusive('\n').collect();
    let rendered_lines: Vec<&str> = rendered.split_inclusive('\n').collect();

    let prefix_len = existing_lines
        .iter()
        .zip(rendered_lines.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let max_suffix = (existing_lines.len() - prefix_len).min(rendered_lines.len() - prefix_len);
    let suffix_len = (0..max_suffix)
        .take_while(|i| existing_lines[existing_lines.len() - 1 - i] == rendered_lines[rendered_lines.len() - 1 - i])
        .count();

    let existing_middle: String = existing_lines[prefix_len..existing_lines.len() - suffix_len].concat();
    if existing_middle.is_empty() {
        return None;
    }

    let mut out = String::new();
    out.extend(rendered_lines[..prefix_len].iter().copied());
    out.push_str(&format!("<<Stencil::Block({ADOPTED_BLOCK_NAME})>>\n"));
    out.push_str(&existing_middle);
    out.push_str("<</Stencil::Block>>\n");
    out.extend(rendered_lines[rendered_lines.len() - suffix_len..].iter().copied());

    Some(out)
}
