//! Changes-file entries describing a session.
//!
//! Entries are prepended in the `osc vc` layout: a dashed separator, a
//! `<timestamp> - <author>` line, a blank line, `  + ` bullets, and a blank
//! line. An entry whose body equals the newest existing entry's body is not
//! written again, so rerunning against an unchanged package is a no-op.
use crate::driver::RefreshSession;
use crate::util::{read_or_empty, write_atomic};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub const SEPARATOR: &str =
    "-------------------------------------------------------------------";

const HEADER: &str = "- Rebased patches:";

/// Inputs of one changes entry.
#[derive(Debug, Clone)]
pub struct EntryRequest<'a> {
    pub session: &'a RefreshSession,
    pub author: &'a str,
    pub timestamp: &'a str,
    pub fuzz_tolerance: bool,
    /// Patch files `osc status` reports as modified.
    pub otherwise_modified: &'a [String],
}

/// Changes file that belongs to a spec file (`foo.spec` -> `foo.changes`).
pub fn changes_path_for(manifest: &Path) -> PathBuf {
    manifest.with_extension("changes")
}

/// Entry timestamp in the `osc vc` format.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%a %b %d %H:%M:%S UTC %Y").to_string()
}

/// Build the body lines, header included.
pub fn compose_body(
    session: &RefreshSession,
    fuzz_tolerance: bool,
    otherwise_modified: &[String],
) -> Vec<String> {
    let mut lines = vec![HEADER.to_string()];
    if fuzz_tolerance {
        lines.extend(session.refreshed.iter().map(|patch| format!("  + {patch}")));
    }
    lines.extend(
        session
            .dropped
            .iter()
            .map(|patch| format!("  + {patch} dropped (merged upstream)")),
    );
    lines.extend(
        otherwise_modified
            .iter()
            .filter(|patch| !session.refreshed.contains(*patch))
            .map(|patch| format!("  + {patch} (manually)")),
    );
    lines
}

/// Body of the newest entry in `changes`, surrounding blank lines trimmed.
pub fn first_entry_body(changes: &str) -> Option<Vec<&str>> {
    let lines: Vec<&str> = changes.lines().collect();
    let start = lines.iter().position(|line| *line == SEPARATOR)?;
    let body_start = start + 2;
    if body_start > lines.len() {
        return None;
    }
    let end = lines[body_start..]
        .iter()
        .position(|line| *line == SEPARATOR)
        .map(|offset| body_start + offset)
        .unwrap_or(lines.len());
    Some(trim_blank(&lines[body_start..end]).to_vec())
}

/// Render a full entry followed by the previous file content.
pub fn render_entry(author: &str, timestamp: &str, body: &[String], previous: &str) -> String {
    let mut out = String::new();
    out.push_str(SEPARATOR);
    out.push('\n');
    out.push_str(&format!("{timestamp} - {author}\n\n"));
    for line in body {
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(previous);
    out
}

/// Compose an entry for the session and prepend it to `changes_path` unless
/// there is nothing to report or the newest entry already says the same.
///
/// Returns whether the file was written.
pub fn compose_and_append(request: &EntryRequest<'_>, changes_path: &Path) -> Result<bool> {
    let body = compose_body(
        request.session,
        request.fuzz_tolerance,
        request.otherwise_modified,
    );
    if body.len() == 1 {
        tracing::debug!("no patch changes to record");
        return Ok(false);
    }

    let previous = read_or_empty(changes_path)?;
    if let Some(existing) = first_entry_body(&previous) {
        if existing.iter().copied().eq(body.iter().map(String::as_str)) {
            tracing::info!(
                path = %changes_path.display(),
                "newest changes entry already records these patches"
            );
            return Ok(false);
        }
    }

    let text = render_entry(request.author, request.timestamp, &body, &previous);
    write_atomic(changes_path, &text)?;
    tracing::info!(
        path = %changes_path.display(),
        lines = body.len() - 1,
        "changes entry added"
    );
    Ok(true)
}

fn trim_blank<'a, 'b>(lines: &'b [&'a str]) -> &'b [&'a str] {
    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map(|idx| idx + 1)
        .unwrap_or(start);
    &lines[start..end]
}

#[cfg(test)]
#[path = "changelog_tests.rs"]
mod tests;
