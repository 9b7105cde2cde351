//! Depth-first artifact discovery under one root.
//!
//! The walker is the "eyes" of the scan: it collects every regular file with
//! the configured extension below a root. It never opens the files it finds.

#![allow(missing_docs)]

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::config::ScanConfig;
use crate::core::errors::{Result, VciError};
use crate::core::paths::resolve_root;

/// Walker configuration derived from `ScanConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Extension without the leading dot, matched exactly.
    pub extension: String,
    pub follow_symlinks: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extension: "class".to_string(),
            follow_symlinks: false,
        }
    }
}

impl From<&ScanConfig> for DiscoveryConfig {
    fn from(scan: &ScanConfig) -> Self {
        Self {
            extension: scan.extension.clone(),
            follow_symlinks: scan.follow_symlinks,
        }
    }
}

/// Recursive walker producing the candidate paths of one root.
///
/// - Root resolved to an absolute canonical path before walking
/// - Children visited in file-name order, so the walk itself is deterministic
/// - Symlinks skipped unless `follow_symlinks`; when followed, a link back
///   into the directory chain currently being walked is not re-entered
/// - Any directory that cannot be listed aborts the walk
#[derive(Debug, Clone, Default)]
pub struct ArtifactDiscoverer {
    config: DiscoveryConfig,
}

impl ArtifactDiscoverer {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Every matching file below `root`, as absolute paths.
    pub fn discover(&self, root: &Path) -> Result<BTreeSet<PathBuf>> {
        let root = resolve_root(root)?;
        let mut found = BTreeSet::new();
        let mut chain = HashSet::new();
        self.walk_dir(&root, &mut found, &mut chain)?;
        Ok(found)
    }

    /// `true` when `path` carries exactly the configured extension.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == self.config.extension.as_str())
    }

    fn walk_dir(
        &self,
        dir: &Path,
        found: &mut BTreeSet<PathBuf>,
        chain: &mut HashSet<PathBuf>,
    ) -> Result<()> {
        let canonical = if self.config.follow_symlinks {
            let canonical = fs::canonicalize(dir).map_err(|source| VciError::io(dir, source))?;
            if !chain.insert(canonical.clone()) {
                return Ok(());
            }
            Some(canonical)
        } else {
            None
        };

        let mut entries = fs::read_dir(dir)
            .map_err(|source| VciError::io(dir, source))?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|source| VciError::io(dir, source))?;
        entries.sort_by_key(fs::DirEntry::file_name);

        for entry in entries {
            let path = entry.path();
            let ft = entry
                .file_type()
                .map_err(|source| VciError::io(&path, source))?;

            let (is_dir, is_file) = if ft.is_symlink() {
                if !self.config.follow_symlinks {
                    continue;
                }
                // Dangling links have nothing to contribute.
                match fs::metadata(&path) {
                    Ok(meta) => (meta.is_dir(), meta.is_file()),
                    Err(_) => continue,
                }
            } else {
                (ft.is_dir(), ft.is_file())
            };

            if is_dir {
                self.walk_dir(&path, found, chain)?;
            } else if is_file && self.matches(&path) {
                found.insert(path);
            }
        }

        if let Some(canonical) = canonical {
            chain.remove(&canonical);
        }
        Ok(())
    }
}
