//! Removal of merged patches from the series file and the spec file.
//!
//! Both rewrites are pure functions from the full prior content to the full
//! new content; [`drop_patch`] is the only part that touches the filesystem.
//! Lines are removed by exact pattern and never reformatted, and surviving
//! `Patch<N>` ordinals are never renumbered.
use crate::util::write_atomic;
use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

/// What a [`drop_patch`] call removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropReport {
    pub removed_from_series: bool,
    /// Ordinal of the removed `Patch<N>:` declaration, if the spec file declared it.
    pub ordinal: Option<u32>,
    pub removed_invocation: bool,
}

/// Result of rewriting spec-file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRewrite {
    pub content: String,
    pub ordinal: Option<u32>,
    pub removed_invocation: bool,
}

/// Remove the first line exactly equal to `patch` and keep everything else.
pub fn drop_from_series(content: &str, patch: &str) -> (String, bool) {
    let mut removed = false;
    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        if !removed && line.strip_suffix('\n').unwrap_or(line) == patch {
            removed = true;
            continue;
        }
        out.push_str(line);
    }
    (out, removed)
}

/// Remove the `Patch<N>: <patch>` declaration and the next `%patch` line
/// applying ordinal N that follows it anywhere later in the file.
///
/// A `%patch` line that also applies other ordinals keeps its line and loses
/// only the reference to N.
pub fn drop_from_manifest(content: &str, patch: &str) -> ManifestRewrite {
    let preamble = Regex::new(&format!(
        r"^Patch(\d+)\s*:\s*{}\s*$",
        regex::escape(patch)
    ))
    .expect("regex for patch declarations");

    let mut ordinal: Option<u32> = None;
    let mut removed_invocation = false;
    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        match ordinal {
            None => {
                if let Some(number) = preamble
                    .captures(bare)
                    .and_then(|caps| caps[1].parse::<u32>().ok())
                {
                    ordinal = Some(number);
                    continue;
                }
            }
            Some(number) if !removed_invocation => match match_invocation(bare, number) {
                Some(InvocationMatch::Whole) => {
                    removed_invocation = true;
                    continue;
                }
                Some(InvocationMatch::Span(span)) => {
                    removed_invocation = true;
                    tracing::debug!(line = bare, ordinal = number, "shared %patch line kept");
                    out.push_str(bare[..span.start].trim_end());
                    out.push_str(&bare[span.end..]);
                    out.push_str(&line[bare.len()..]);
                    continue;
                }
                None => {}
            },
            Some(_) => {}
        }
        out.push_str(line);
    }
    ManifestRewrite {
        content: out,
        ordinal,
        removed_invocation,
    }
}

/// Drop a merged patch from the series file and the spec file in place.
pub fn drop_patch(patch: &str, series_path: &Path, manifest_path: &Path) -> Result<DropReport> {
    let series = fs::read_to_string(series_path)
        .with_context(|| format!("read series {}", series_path.display()))?;
    let (series_out, removed_from_series) = drop_from_series(&series, patch);
    if removed_from_series {
        write_atomic(series_path, &series_out)?;
    }

    let manifest = fs::read_to_string(manifest_path)
        .with_context(|| format!("read spec {}", manifest_path.display()))?;
    let rewrite = drop_from_manifest(&manifest, patch);
    if rewrite.ordinal.is_some() {
        write_atomic(manifest_path, &rewrite.content)?;
    } else {
        tracing::debug!(patch, "patch not declared in spec file");
    }

    Ok(DropReport {
        removed_from_series,
        ordinal: rewrite.ordinal,
        removed_invocation: rewrite.removed_invocation,
    })
}

/// How a `%patch` line refers to one ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
enum InvocationMatch {
    /// The line applies that ordinal and nothing else.
    Whole,
    /// The line applies other ordinals too; the range covers this one's token.
    Span(Range<usize>),
}

// Options of %patch that take a separate value token.
const VALUE_FLAGS: &[&str] = &["-b", "-d", "-F", "-o", "-p", "-z"];

static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();

// Understands `%patch7 -p1`, `%patch -P 7 -p1`, `%patch -P7` and the
// positional `%patch 7 -p1`, including lines that list several ordinals.
fn match_invocation(line: &str, ordinal: u32) -> Option<InvocationMatch> {
    let token_regex = TOKEN_REGEX.get_or_init(|| Regex::new(r"\S+").expect("regex for tokens"));
    let mut tokens = token_regex.find_iter(line);
    let head = tokens.next().filter(|head| head.start() == 0)?;
    let suffix = head.as_str().strip_prefix("%patch")?;
    if !suffix.is_empty() {
        return (suffix.parse::<u32>().ok() == Some(ordinal)).then_some(InvocationMatch::Whole);
    }

    let mut refs: Vec<(u32, Range<usize>)> = Vec::new();
    // Start offset of a pending flag, and whether that flag is `-P`.
    let mut pending: Option<(usize, bool)> = None;
    for token in tokens {
        let text = token.as_str();
        if let Some((start, is_patch_flag)) = pending.take() {
            if is_patch_flag {
                if let Ok(number) = text.parse() {
                    refs.push((number, start..token.end()));
                }
            }
            continue;
        }
        if text == "-P" {
            pending = Some((token.start(), true));
        } else if VALUE_FLAGS.contains(&text) {
            pending = Some((token.start(), false));
        } else if let Some(number) = text.strip_prefix("-P").and_then(|d| d.parse().ok()) {
            refs.push((number, token.range()));
        } else if let Ok(number) = text.parse() {
            refs.push((number, token.range()));
        }
    }

    let span = refs.iter().find(|(number, _)| *number == ordinal)?.1.clone();
    if refs.iter().all(|(number, _)| *number == ordinal) {
        Some(InvocationMatch::Whole)
    } else {
        Some(InvocationMatch::Span(span))
    }
}
