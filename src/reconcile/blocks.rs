//! Parsing and merging of `<<Stencil::Block(NAME)>>` markers.
//!
//! A block-open marker is a line which, after
//! stripping leading whitespace and an optional single-line comment
//! leader, equals `<<Stencil::Block(NAME)>>`; close is
//! `<</Stencil::Block>>`. Comment leaders are not interpreted — only the
//! marker text matters, so templates can place markers inside any file
//! format that tolerates a single-line comment. Blocks do not nest;
//! duplicate names within one file are fatal.

use crate::core::StencilError;
use regex::Regex;
use std::sync::LazyLock;

/// Known single-line comment leaders, longest first so `///` is tried
/// before `//`.
const COMMENT_LEADERS: &[&str] = &["///", "//", "#!", "#", "--", ";;", ";", "%", "'"];

static OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<<Stencil::Block\(([A-Za-z0-9_-]+)\)>>\s*$").unwrap());
static CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<</Stencil::Block>>\s*$").unwrap());

fn strip_comment_leader(trimmed: &str) -> &str {
    for leader in COMMENT_LEADERS {
        if let Some(rest) = trimmed.strip_prefix(leader) {
            return rest.trim_start();
        }
    }
    trimmed
}

fn open_marker_name(line: &str) -> Option<String> {
    let trimmed = strip_comment_leader(line.trim_start());
    OPEN_RE.captures(trimmed.trim_end_matches(['\n', '\r'])).map(|c| c[1].to_string())
}

fn is_close_marker(line: &str) -> bool {
    let trimmed = strip_comment_leader(line.trim_start());
    CLOSE_RE.is_match(trimmed.trim_end_matches(['\n', '\r']))
}

/// One top-to-bottom chunk of a file: either raw passthrough text, or a
/// named block (its open/close marker lines kept verbatim so they can be
/// reproduced unchanged, with only the body swappable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Block { name: String, open_line: String, body: String, close_line: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    pub segments: Vec<Segment>,
}

impl ParsedFile {
    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Block { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn block_body(&self, name: &str) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            Segment::Block { name: n, body, .. } if n == name => Some(body.as_str()),
            _ => None,
        })
    }

    /// Reassemble the file text verbatim.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Block { open_line, body, close_line, .. } => {
                    out.push_str(open_line);
                    out.push_str(body);
                    out.push_str(close_line);
                }
            }
        }
        out
    }
}

/// Parse `content` into literal and block segments.
///
/// `path` is used only to identify the file in a [`StencilError::DuplicateBlockName`].
/// An open marker with no matching close marker before end-of-file is
/// treated as plain text (not a block) rather than an error — a truncated
/// marker is far more likely to be a coincidental line than a real block.
pub fn parse(content: &str, path: &str) -> Result<ParsedFile, StencilError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut seen = std::collections::HashSet::new();

    let mut lines = content.split_inclusive('\n').peekable();
    while let Some(line) = lines.next() {
        let Some(name) = open_marker_name(line) else {
            literal.push_str(line);
            continue;
        };

        // Look ahead for the matching close marker; if none exists treat
        // the open line itself as ordinary text.
        let mut body = String::new();
        let mut found_close = None;
        let mut lookahead = lines.clone();
        let mut consumed = 0usize;
        for candidate in lookahead.by_ref() {
            consumed += 1;
            if is_close_marker(candidate) {
                found_close = Some(candidate.to_string());
                break;
            }
            body.push_str(candidate);
        }

        let Some(close_line) = found_close else {
            literal.push_str(line);
            continue;
        };

        if !seen.insert(name.clone()) {
            return Err(StencilError::DuplicateBlockName { name, path: path.to_string() });
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Block { name, open_line: line.to_string(), body, close_line });

        for _ in 0..consumed {
            lines.next();
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(ParsedFile { segments })
}

/// Merge rendered template output with a file's existing on-disk content
///: blocks named in both keep the existing body;
/// blocks present on disk but absent from the rendered output are
/// reported (second return value) and dropped.
pub fn merge(rendered: &str, existing: &str, path: &str) -> Result<(String, Vec<String>), StencilError> {
    let rendered_parsed = parse(rendered, path)?;
    let existing_parsed = parse(existing, path)?;

    let rendered_names: std::collections::HashSet<&str> = rendered_parsed.block_names().collect();
    let unknown: Vec<String> = existing_parsed
        .block_names()
        .filter(|n| !rendered_names.contains(n))
        .map(str::to_string)
        .collect();

    let mut merged_segments = Vec::with_capacity(rendered_parsed.segments.len());
    for segment in rendered_parsed.segments {
        match segment {
            Segment::Block { name, open_line, body, close_line } => {
                let body = existing_parsed.block_body(&name).map(str::to_string).unwrap_or(body);
                merged_segments.push(Segment::Block { name, open_line, body, close_line });
            }
            literal => merged_segments.push(literal),
        }
    }

    Ok((ParsedFile { segments: merged_segments }.render(), unknown))
}
