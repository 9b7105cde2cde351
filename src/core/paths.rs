//! Shared path manipulation utilities: root resolution and search-path expansion.

use std::env;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::core::errors::{Result, VciError};

/// Resolve a scan root to an absolute, canonical directory path.
///
/// Fails with [`VciError::RootNotFound`] when nothing exists at `path` and
/// [`VciError::RootNotDirectory`] when something other than a directory does.
pub fn resolve_root(path: &Path) -> Result<PathBuf> {
    let absolute = absolutize(path);
    let canonical = match std::fs::canonicalize(&absolute) {
        Ok(canonical) => canonical,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(VciError::RootNotFound { path: absolute });
        }
        Err(err) => return Err(VciError::io(&absolute, err)),
    };
    if !canonical.is_dir() {
        return Err(VciError::RootNotDirectory { path: canonical });
    }
    Ok(canonical)
}

/// Make `path` absolute relative to CWD and resolve `.`/`..` syntactically.
pub fn absolutize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    normalize_syntactic(&absolute)
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

/// Split a platform path list (`a:b:c` on Unix, `a;b;c` on Windows).
pub fn split_search_path(raw: &OsStr) -> Vec<PathBuf> {
    env::split_paths(raw)
        .filter(|entry| !entry.as_os_str().is_empty())
        .collect()
}

/// Keep only the search-path entries that are existing directories, in order.
///
/// Archives and missing entries on a class path are silently dropped: only
/// directory trees can be scanned.
pub fn directory_entries(entries: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in entries {
        if entry.is_dir() && !dirs.contains(entry) {
            dirs.push(entry.clone());
        }
    }
    dirs
}
