use std::path::{Path, PathBuf};

use dirs_next::home_dir;

pub fn expand_tilde(path: &str) -> PathBuf {
    let p = path.trim();
    if p == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = p.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    if let Some(rest) = p.strip_prefix("~\\") {
        // Windows-style
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(p)
}

/// Resolve `path` against `base` unless it is already absolute. `~` is expanded first.
pub fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    let expanded = expand_tilde(&path.to_string_lossy());
    if expanded.is_absolute() { expanded } else { base.join(expanded) }
}

/// Split a slash-delimited command path into segments, dropping empty ones.
///
/// `"/foo//bar/"` becomes `["foo", "bar"]`.
pub fn split_command_path(path: &str) -> Vec<String> {
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize a mount point to `/segment/...` without a trailing slash; the root mount is `""`.
pub fn normalize_mount(mount: &str) -> String {
    let segments = split_command_path(mount);
    if segments.is_empty() {
        return String::new();
    }
    format!("/{}", segments.join("/"))
}
