//! The patch-stack tool seam.
//!
//! The driver only needs the captured text of `setup`, `push`, and `refresh`;
//! exit codes are ignored because quilt reports most outcomes through
//! non-zero statuses that are still meaningful text. [`QuiltTool`] runs the
//! real binary, tests substitute scripted implementations.
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Command;
use std::time::Instant;

/// Environment override for the quilt command line.
pub const QUILT_COMMAND_ENV: &str = "REFRESH_PATCHES_QUILT_COMMAND";

/// Operations the refresh driver issues against a patch stack.
pub trait PatchTool {
    /// Unpack the sources of `manifest` into `workdir`, linking patches from `sourcedir`.
    fn setup(&self, manifest: &Path, sourcedir: &Path, workdir: &Path) -> Result<String>;
    /// Apply the next patch of the stack in `tree`.
    fn push(&self, tree: &Path) -> Result<String>;
    /// Regenerate the topmost applied patch in `tree`.
    fn refresh(&self, tree: &Path) -> Result<String>;
}

/// Per-invocation process configuration.
///
/// quilt and patch localise their status lines, so every call pins the C
/// locale explicitly rather than relying on the caller's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolEnv {
    pub vars: Vec<(String, String)>,
}

impl Default for ToolEnv {
    fn default() -> Self {
        Self {
            vars: vec![
                ("LC_ALL".to_string(), "C".to_string()),
                ("LANG".to_string(), "C".to_string()),
            ],
        }
    }
}

/// Runs quilt as a child process.
#[derive(Debug, Clone)]
pub struct QuiltTool {
    argv: Vec<String>,
    env: ToolEnv,
}

impl QuiltTool {
    pub fn new(argv: Vec<String>, env: ToolEnv) -> Result<Self> {
        if argv.is_empty() {
            return Err(anyhow!("quilt command is empty"));
        }
        Ok(Self { argv, env })
    }

    /// Resolve the quilt command from the environment, falling back to `quilt`.
    pub fn from_env() -> Result<Self> {
        let argv = match std::env::var(QUILT_COMMAND_ENV) {
            Ok(command) => shell_words::split(&command)
                .with_context(|| format!("parse quilt command: {command}"))?,
            Err(_) => vec!["quilt".to_string()],
        };
        Self::new(argv, ToolEnv::default())
    }

    fn run(&self, op: &str, args: &[&str], cwd: &Path) -> Result<String> {
        let start = Instant::now();
        let mut command = Command::new(&self.argv[0]);
        command.args(&self.argv[1..]).arg(op).args(args).current_dir(cwd);
        for (key, value) in &self.env.vars {
            command.env(key, value);
        }
        let output = command
            .output()
            .with_context(|| format!("run {} {op}", self.argv[0]))?;
        let elapsed_ms = start.elapsed().as_millis();

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        tracing::info!(
            op,
            elapsed_ms,
            status = %output.status,
            output_bytes = text.len(),
            "quilt invoke complete"
        );
        Ok(text)
    }
}

impl PatchTool for QuiltTool {
    fn setup(&self, manifest: &Path, sourcedir: &Path, workdir: &Path) -> Result<String> {
        let workdir = path_arg(workdir)?;
        let sourcedir = path_arg(sourcedir)?;
        let manifest = path_arg(manifest)?;
        self.run(
            "setup",
            &["-d", workdir, "--sourcedir", sourcedir, manifest],
            Path::new("."),
        )
    }

    fn push(&self, tree: &Path) -> Result<String> {
        self.run("push", &[], tree)
    }

    fn refresh(&self, tree: &Path) -> Result<String> {
        self.run("refresh", &[], tree)
    }
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("path is not valid UTF-8: {}", path.display()))
}
