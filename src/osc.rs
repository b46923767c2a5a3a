//! Optional packaging-service collaborators.
//!
//! Both lookups degrade instead of failing: without an `osc` binary there are
//! no manually modified patches to report, and without `~/.oscrc` the
//! changes entry is attributed to the default packaging identity.
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment override for the osc command line.
pub const OSC_COMMAND_ENV: &str = "REFRESH_PATCHES_OSC_COMMAND";

/// Author used when neither `--changesauthor` nor `~/.oscrc` provide one.
pub const DEFAULT_AUTHOR: &str = "opensuse-packaging@opensuse.org";

const PATCH_SUFFIXES: &[&str] = &[".patch", ".diff", ".dif"];

/// Patch files that `osc status` reports as locally modified in `package_dir`.
pub fn modified_patches(package_dir: &Path) -> Vec<String> {
    match osc_status(package_dir) {
        Ok(Some(output)) => parse_status(&output),
        Ok(None) => {
            tracing::debug!("osc not available; no manually modified patches reported");
            Vec::new()
        }
        Err(err) => {
            tracing::debug!(error = %err, "osc status failed; no manually modified patches reported");
            Vec::new()
        }
    }
}

/// Patch names from `M <file>` lines of `osc status` output.
pub fn parse_status(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("M"), Some(name)) => Some(name),
                _ => None,
            }
        })
        .filter(|name| PATCH_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
        .map(str::to_string)
        .collect()
}

/// Author for changes entries: explicit value, then `~/.oscrc`, then the default.
pub fn resolve_author(explicit: Option<&str>) -> String {
    if let Some(author) = explicit.filter(|author| !author.trim().is_empty()) {
        return author.to_string();
    }
    oscrc_path()
        .and_then(|path| fs::read_to_string(path).ok())
        .and_then(|text| parse_oscrc_email(&text))
        .unwrap_or_else(|| DEFAULT_AUTHOR.to_string())
}

/// Value of the first `email = <value>` line.
pub fn parse_oscrc_email(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if key.trim() != "email" {
            return None;
        }
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn oscrc_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".oscrc"))
}

fn osc_command() -> Result<Option<Vec<String>>> {
    if let Ok(command) = std::env::var(OSC_COMMAND_ENV) {
        let argv = shell_words::split(&command)
            .with_context(|| format!("parse osc command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("osc command is empty"));
        }
        return Ok(Some(argv));
    }
    Ok(which::which("osc")
        .ok()
        .map(|path| vec![path.display().to_string()]))
}

fn osc_status(package_dir: &Path) -> Result<Option<String>> {
    let Some(argv) = osc_command()? else {
        return Ok(None);
    };
    let output = Command::new(&argv[0])
        .args(&argv[1..])
        .arg("status")
        .current_dir(package_dir)
        .env("LC_ALL", "C")
        .output()
        .with_context(|| format!("run {} status", argv[0]))?;
    if !output.status.success() {
        return Err(anyhow!(
            "osc status failed with status {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}
