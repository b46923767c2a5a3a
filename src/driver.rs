//! The push/refresh state machine.
//!
//! One [`RefreshDriver::run`] walks a patch stack to its end: each `quilt
//! push` is classified, patches that needed an offset (or fuzz, when
//! tolerated) are refreshed, and patches already present upstream are dropped
//! from the series and spec files. The run ends on end-of-stack or on the
//! first fatal classification, which is recorded in the returned session
//! rather than raised, so the caller decides the run-level policy.
use crate::classify::{classify_push, classify_refresh, Outcome};
use crate::registry::drop_patch;
use crate::tool::PatchTool;
use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Fatal conditions that end a spec file's session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("quilt setup failed to unpack the sources:\n{output}")]
    SetupFailure { output: String },
    #[error("patch does not apply:\n{output}")]
    ApplyFailure { output: String },
    #[error("patch {patch} applies only with fuzz (refresh it with --ignorefuzz enable)")]
    FuzzDetected { patch: String },
    #[error("refreshing patch {patch} failed:\n{output}")]
    RefreshFailure { patch: String, output: String },
    #[error("unrecognized quilt push output:\n{output}")]
    UnrecognizedOutput { output: String },
    #[error("quilt reported patch {patch} twice; the stack is not advancing")]
    StackStalled { patch: String },
}

/// Terminal state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Success,
    Fatal(RefreshError),
}

/// Per-spec-file results accumulated by the driver.
#[derive(Debug, Clone)]
pub struct RefreshSession {
    pub tree: PathBuf,
    pub refreshed: Vec<String>,
    pub dropped: Vec<String>,
    pub outcome: Option<SessionOutcome>,
}

impl RefreshSession {
    pub fn new(tree: PathBuf) -> Self {
        Self {
            tree,
            refreshed: Vec::new(),
            dropped: Vec::new(),
            outcome: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Some(SessionOutcome::Success))
    }

    pub fn fatal(&self) -> Option<&RefreshError> {
        match &self.outcome {
            Some(SessionOutcome::Fatal(err)) => Some(err),
            _ => None,
        }
    }
}

/// Driver switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverConfig {
    /// Refresh fuzzy patches instead of failing on them.
    pub ignore_fuzz: bool,
}

enum State {
    Pushing,
    Refreshing(String),
    Done(SessionOutcome),
}

/// Drives one unpacked tree to the end of its patch stack.
pub struct RefreshDriver<'a, T: PatchTool + ?Sized> {
    tool: &'a T,
    tree: PathBuf,
    series_path: PathBuf,
    manifest_path: PathBuf,
    config: DriverConfig,
}

impl<'a, T: PatchTool + ?Sized> RefreshDriver<'a, T> {
    pub fn new(tool: &'a T, tree: &Path, manifest_path: &Path, config: DriverConfig) -> Self {
        Self {
            tool,
            tree: tree.to_path_buf(),
            series_path: tree.join("series"),
            manifest_path: manifest_path.to_path_buf(),
            config,
        }
    }

    /// Run until the stack is fully applied or a fatal outcome occurs.
    ///
    /// I/O failures (spawning quilt, rewriting files) are returned as errors;
    /// classified failures end up in [`RefreshSession::outcome`].
    pub fn run(&self) -> Result<RefreshSession> {
        let mut session = RefreshSession::new(self.tree.clone());
        let mut seen = BTreeSet::new();
        let mut state = State::Pushing;
        loop {
            state = match state {
                State::Pushing => self.push(&mut session, &mut seen)?,
                State::Refreshing(patch) => self.refresh(&mut session, patch)?,
                State::Done(outcome) => {
                    session.outcome = Some(outcome);
                    tracing::info!(
                        refreshed = session.refreshed.len(),
                        dropped = session.dropped.len(),
                        success = session.succeeded(),
                        "patch stack finished"
                    );
                    return Ok(session);
                }
            };
        }
    }

    fn push(&self, session: &mut RefreshSession, seen: &mut BTreeSet<String>) -> Result<State> {
        let raw = self.tool.push(&self.tree)?;
        let outcome = classify_push(&raw);
        tracing::debug!(?outcome, "classified push");

        if let Some(patch) = pushed_patch(&outcome) {
            if !seen.insert(patch.to_string()) {
                return Ok(fatal(RefreshError::StackStalled {
                    patch: patch.to_string(),
                }));
            }
        }

        let next = match outcome {
            Outcome::FullyApplied | Outcome::SeriesEmpty => State::Done(SessionOutcome::Success),
            Outcome::CleanApplied(_) => State::Pushing,
            Outcome::FuzzApplied(patch) if !self.config.ignore_fuzz => {
                fatal(RefreshError::FuzzDetected { patch })
            }
            Outcome::FuzzApplied(patch) | Outcome::OffsetApplied(patch) => {
                State::Refreshing(patch)
            }
            Outcome::ReverseApplied(patch) => {
                eprintln!("Patch {patch} is merged upstream, dropping it");
                let report = drop_patch(&patch, &self.series_path, &self.manifest_path)?;
                tracing::info!(
                    patch = %patch,
                    ordinal = ?report.ordinal,
                    removed_invocation = report.removed_invocation,
                    "dropped merged patch"
                );
                if !report.removed_from_series {
                    // quilt would offer the same patch again on the next push.
                    return Ok(fatal(RefreshError::StackStalled { patch }));
                }
                push_unique(&mut session.dropped, patch);
                State::Pushing
            }
            Outcome::ApplyFailed(output) => fatal(RefreshError::ApplyFailure { output }),
            Outcome::Unrecognized(_)
            | Outcome::SetupOk
            | Outcome::SetupFailed(_)
            | Outcome::RefreshOk
            | Outcome::RefreshFailed(_) => unexpected(raw),
        };
        Ok(next)
    }

    fn refresh(&self, session: &mut RefreshSession, patch: String) -> Result<State> {
        eprintln!("Refreshing patch {patch}");
        let output = self.tool.refresh(&self.tree)?;
        let next = match classify_refresh(&output) {
            Outcome::RefreshOk => {
                tracing::info!(patch = %patch, "refreshed patch");
                push_unique(&mut session.refreshed, patch);
                State::Pushing
            }
            _ => fatal(RefreshError::RefreshFailure { patch, output }),
        };
        Ok(next)
    }
}

fn fatal(err: RefreshError) -> State {
    tracing::warn!(error = %err, "patch stack aborted");
    State::Done(SessionOutcome::Fatal(err))
}

fn unexpected(output: String) -> State {
    fatal(RefreshError::UnrecognizedOutput { output })
}

fn pushed_patch(outcome: &Outcome) -> Option<&str> {
    match outcome {
        Outcome::CleanApplied(patch)
        | Outcome::FuzzApplied(patch)
        | Outcome::OffsetApplied(patch)
        | Outcome::ReverseApplied(patch) => Some(patch),
        _ => None,
    }
}

fn push_unique(list: &mut Vec<String>, patch: String) {
    if !list.contains(&patch) {
        list.push(patch);
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
