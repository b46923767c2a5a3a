//! Per-spec-file orchestration.
//!
//! For each spec file in the package directory: acquire a workspace, unpack
//! with `quilt setup`, drive the patch stack, write the changes entry on
//! success, and release the workspace on every path. The run stops at the
//! first spec file that ends fatally.
use crate::changelog::{self, EntryRequest};
use crate::classify::{classify_setup, Outcome};
use crate::driver::{DriverConfig, RefreshDriver, RefreshError};
use crate::osc;
use crate::tool::PatchTool;
use crate::util::{display_path, truncate_string};
use crate::workspace::Workspace;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_DIAGNOSTIC_BYTES: usize = 4096;

/// Run-wide settings derived from the CLI.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub sourcedir: PathBuf,
    pub changes_generate: bool,
    pub changes_author: Option<String>,
    pub ignore_fuzz: bool,
}

/// Outcome of one spec file, printed with `--json`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ManifestReport {
    pub manifest: String,
    pub refreshed: Vec<String>,
    pub dropped: Vec<String>,
    pub changes_written: bool,
}

/// Spec files in `dir`, sorted by name.
pub fn discover_manifests(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut manifests: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "spec"))
        .collect();
    manifests.sort();
    Ok(manifests)
}

/// Process every spec file, stopping at the first failure.
pub fn run<T: PatchTool + ?Sized>(tool: &T, options: &RunOptions) -> Result<Vec<ManifestReport>> {
    let sourcedir = options
        .sourcedir
        .canonicalize()
        .with_context(|| format!("resolve {}", options.sourcedir.display()))?;
    let manifests = discover_manifests(&sourcedir)?;
    if manifests.is_empty() {
        tracing::warn!(dir = %sourcedir.display(), "no spec files found");
    }
    let author = options
        .changes_generate
        .then(|| osc::resolve_author(options.changes_author.as_deref()));

    let mut reports = Vec::with_capacity(manifests.len());
    for manifest in &manifests {
        let label = display_path(manifest, Some(&sourcedir));
        let report = process_manifest(tool, manifest, &sourcedir, options, author.as_deref())
            .with_context(|| format!("refresh patches for {label}"))?;
        reports.push(report);
    }
    Ok(reports)
}

/// Refresh the patch stack of one spec file.
///
/// Classified failures are returned as [`RefreshError`] values inside the
/// error chain; the workspace is gone by the time this returns either way.
pub fn process_manifest<T: PatchTool + ?Sized>(
    tool: &T,
    manifest: &Path,
    sourcedir: &Path,
    options: &RunOptions,
    author: Option<&str>,
) -> Result<ManifestReport> {
    let label = display_path(manifest, Some(sourcedir));
    eprintln!("Processing {label}");
    let workspace = Workspace::acquire()?;

    let setup = tool.setup(manifest, sourcedir, workspace.path())?;
    if let Outcome::SetupFailed(output) = classify_setup(&setup) {
        discard(workspace);
        return Err(RefreshError::SetupFailure {
            output: truncate_string(&output, MAX_DIAGNOSTIC_BYTES),
        }
        .into());
    }
    let tree = workspace.locate_tree()?;
    tracing::info!(manifest = %label, tree = %tree.display(), "sources unpacked");

    let config = DriverConfig {
        ignore_fuzz: options.ignore_fuzz,
    };
    let session = RefreshDriver::new(tool, &tree, manifest, config).run()?;
    if let Some(err) = session.fatal() {
        discard(workspace);
        return Err(err.clone().into());
    }
    workspace.release()?;

    let mut changes_written = false;
    if let Some(author) = author {
        let otherwise_modified = osc::modified_patches(sourcedir);
        let timestamp = changelog::format_timestamp(chrono::Utc::now());
        let request = EntryRequest {
            session: &session,
            author,
            timestamp: &timestamp,
            fuzz_tolerance: options.ignore_fuzz,
            otherwise_modified: &otherwise_modified,
        };
        changes_written =
            changelog::compose_and_append(&request, &changelog::changes_path_for(manifest))?;
    }

    tracing::info!(
        manifest = %label,
        tree = %session.tree.display(),
        refreshed = session.refreshed.len(),
        dropped = session.dropped.len(),
        changes_written,
        "spec file done"
    );
    Ok(ManifestReport {
        manifest: label,
        refreshed: session.refreshed,
        dropped: session.dropped,
        changes_written,
    })
}

// Release on a fatal path: a cleanup failure is logged, never returned.
fn discard(workspace: Workspace) {
    let path = workspace.path().to_path_buf();
    if let Err(err) = workspace.release() {
        tracing::warn!(workspace = %path.display(), error = %format!("{err:#}"), "workspace cleanup failed");
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
