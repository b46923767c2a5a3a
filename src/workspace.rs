//! Scoped extraction directory for one spec file.
//!
//! The directory lives exactly as long as the [`Workspace`] value: dropping
//! it on any path, including early returns through `?`, removes the tree.
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Ephemeral directory that quilt unpacks sources into.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under the system temp directory.
    pub fn acquire() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("refresh-patches-")
            .tempdir()
            .context("create extraction workspace")?;
        tracing::debug!(path = %dir.path().display(), "workspace acquired");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Locate the unpacked source tree: the directory that carries the quilt
    /// `series` file, either the workspace itself or one level below it.
    pub fn locate_tree(&self) -> Result<PathBuf> {
        let root = self.dir.path();
        if root.join("series").is_file() {
            return Ok(root.to_path_buf());
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(root)
            .with_context(|| format!("read {}", root.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir() && path.join("series").is_file())
            .collect();
        entries.sort();
        entries
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no unpacked tree with a series file in {}", root.display()))
    }

    /// Remove the workspace, reporting removal errors instead of ignoring them.
    pub fn release(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .with_context(|| format!("remove workspace {}", path.display()))?;
        tracing::debug!(path = %path.display(), "workspace released");
        Ok(())
    }
}
