use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Replace `dest` with `text` through a sibling temp file and a rename.
///
/// A symlinked `dest` is resolved first so the link survives, and the
/// replaced file keeps its permissions.
pub fn write_atomic(dest: &Path, text: &str) -> Result<()> {
    let target = match fs::symlink_metadata(dest) {
        Ok(meta) if meta.file_type().is_symlink() => fs::canonicalize(dest)
            .with_context(|| format!("resolve {}", dest.display()))?,
        _ => dest.to_path_buf(),
    };
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("rewrite");
    let tmp_path = target
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, text.as_bytes())
        .with_context(|| format!("write {}", tmp_path.display()))?;
    if let Ok(meta) = fs::metadata(&target) {
        fs::set_permissions(&tmp_path, meta.permissions())
            .with_context(|| format!("copy permissions onto {}", tmp_path.display()))?;
    }
    fs::rename(&tmp_path, &target).with_context(|| format!("replace {}", target.display()))?;
    Ok(())
}

/// Read a text file, treating a missing file as empty.
pub fn read_or_empty(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
    }
}

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}
