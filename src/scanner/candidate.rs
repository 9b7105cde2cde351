//! Candidates: discovered artifact paths paired with their logical names.

#![allow(missing_docs)]

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::core::errors::{Result, VciError};

/// Separator between the segments of a logical name.
pub const NAME_SEPARATOR: &str = ".";

/// One artifact to load: where it lives and what it must be called.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Candidate {
    pub path: PathBuf,
    pub logical_name: String,
}

impl Candidate {
    /// Pair `path` with the logical name it has under `root`.
    pub fn derive(root: &Path, path: &Path, extension: &str) -> Result<Self> {
        Ok(Self {
            logical_name: logical_name(root, path, extension)?,
            path: path.to_path_buf(),
        })
    }
}

/// Root-relative path with separators mapped to `.` and the extension dropped:
/// `<root>/a/b/Foo.class` → `a.b.Foo`.
///
/// Only the final `.{extension}` suffix is removed, so `Foo.bar.class` keeps
/// its inner dot.
pub fn logical_name(root: &Path, path: &Path, extension: &str) -> Result<String> {
    let outside = || VciError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };
    let relative = path.strip_prefix(root).map_err(|_| outside())?;

    let mut segments = Vec::new();
    for component in relative.components() {
        let Component::Normal(segment) = component else {
            return Err(outside());
        };
        let segment = segment.to_str().ok_or_else(|| VciError::NonUtf8Path {
            path: path.to_path_buf(),
        })?;
        segments.push(segment);
    }

    let Some(last) = segments.pop() else {
        return Err(outside());
    };
    let suffix = format!(".{extension}");
    let stem = last.strip_suffix(suffix.as_str()).unwrap_or(last);
    segments.push(stem);
    Ok(segments.join(NAME_SEPARATOR))
}
