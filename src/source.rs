//! Filtered, immutable copies of the project source tree
//!
//! Stages never see the project directory itself. Each run copies the tree
//! into its run directory with the configured exclusions applied, so build
//! output and dependency caches are physically absent from every stage's
//! mounts. Dependency-only subsets are carved out of that copy the same way.

use crate::error::{DrydockError, DrydockResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Paths hidden from every stage
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    /// Component names matched at any depth
    names: Vec<String>,
    /// Relative prefixes matched from the root
    prefixes: Vec<PathBuf>,
}

impl Exclusions {
    /// Parse exclusion patterns.
    ///
    /// `target` hides every path component named `target`; `web/dist` hides
    /// only that path relative to the root.
    pub fn new(patterns: &[String]) -> Self {
        let mut names = Vec::new();
        let mut prefixes = Vec::new();

        for pattern in patterns {
            let trimmed = pattern.trim().trim_matches('/');
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.contains('/') {
                prefixes.push(PathBuf::from(trimmed));
            } else {
                names.push(trimmed.to_string());
            }
        }

        Self { names, prefixes }
    }

    /// Check a path relative to the snapshot root
    pub fn is_excluded(&self, relative: &Path) -> bool {
        if self.prefixes.iter().any(|p| relative.starts_with(p)) {
            return true;
        }

        relative.components().any(|c| match c {
            Component::Normal(name) => self.names.iter().any(|n| name == n.as_str()),
            _ => false,
        })
    }
}

/// An immutable, filtered copy of a source tree
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    /// Directory holding the copy
    dir: PathBuf,
    /// Relative file paths in the copy, sorted
    files: Vec<PathBuf>,
}

impl SourceSnapshot {
    /// Copy `root` into `dest`, skipping excluded paths
    pub fn capture(root: &Path, dest: &Path, exclusions: &Exclusions) -> DrydockResult<Self> {
        if !root.is_dir() {
            return Err(DrydockError::PathNotFound(root.to_path_buf()));
        }

        Self::copy_filtered(root, dest, |relative, _| !exclusions.is_excluded(relative))
    }

    /// Carve out the files whose name is in `file_names`, below `within`.
    ///
    /// Used for dependency-only inputs: the copy contains nothing but
    /// manifests and lockfiles, so its content key only changes when the
    /// dependency declarations change.
    pub fn subset(
        &self,
        within: Option<&Path>,
        file_names: &[String],
        dest: &Path,
    ) -> DrydockResult<Self> {
        let root = match within {
            Some(sub) => self.dir.join(sub),
            None => self.dir.clone(),
        };
        if !root.is_dir() {
            return Err(DrydockError::PathNotFound(root));
        }

        Self::copy_filtered(&root, dest, |relative, is_dir| {
            is_dir
                || relative
                    .file_name()
                    .is_some_and(|name| file_names.iter().any(|n| name == n.as_str()))
        })
    }

    fn copy_filtered(
        root: &Path,
        dest: &Path,
        keep: impl Fn(&Path, bool) -> bool,
    ) -> DrydockResult<Self> {
        fs::create_dir_all(dest)
            .map_err(|e| DrydockError::io(format!("creating snapshot dir {}", dest.display()), e))?;

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| match entry.path().strip_prefix(root) {
                Ok(relative) if relative.as_os_str().is_empty() => true,
                Ok(relative) => keep(relative, entry.file_type().is_dir()),
                Err(_) => false,
            });

        for entry in walker {
            let entry = entry.map_err(|e| DrydockError::PathInvalid {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;

            let relative = match entry.path().strip_prefix(root) {
                Ok(r) if !r.as_os_str().is_empty() => r.to_path_buf(),
                _ => continue,
            };
            let target = dest.join(&relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target)
                    .map_err(|e| DrydockError::io(format!("creating {}", target.display()), e))?;
            } else if file_type.is_symlink() {
                copy_symlink(entry.path(), &target)?;
                files.push(relative);
            } else {
                fs::copy(entry.path(), &target).map_err(|e| {
                    DrydockError::io(format!("copying {}", entry.path().display()), e)
                })?;
                files.push(relative);
            }
        }

        debug!("Snapshot {} holds {} file(s)", dest.display(), files.len());
        Ok(Self {
            dir: dest.to_path_buf(),
            files,
        })
    }

    /// Directory holding the copy
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Relative paths of every file in the copy
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Whether the copy holds the given relative path
    pub fn contains(&self, relative: &Path) -> bool {
        self.files.iter().any(|f| f == relative)
    }

    /// Content-addressed key over every file path and its bytes.
    ///
    /// First 12 hex chars of a SHA-256, stable across runs and machines.
    pub fn content_key(&self) -> DrydockResult<String> {
        let mut hasher = Sha256::new();

        for relative in &self.files {
            let path = self.dir.join(relative);
            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update([0u8]);

            let metadata = fs::symlink_metadata(&path)
                .map_err(|e| DrydockError::io(format!("reading {}", path.display()), e))?;
            let contents = if metadata.file_type().is_symlink() {
                fs::read_link(&path)
                    .map_err(|e| DrydockError::io(format!("reading {}", path.display()), e))?
                    .to_string_lossy()
                    .into_owned()
                    .into_bytes()
            } else {
                fs::read(&path)
                    .map_err(|e| DrydockError::io(format!("reading {}", path.display()), e))?
            };
            hasher.update(&contents);
            hasher.update([0u8]);
        }

        Ok(hex::encode(&hasher.finalize()[..6]))
    }
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> DrydockResult<()> {
    let link = fs::read_link(source)
        .map_err(|e| DrydockError::io(format!("reading link {}", source.display()), e))?;
    std::os::unix::fs::symlink(&link, target)
        .map_err(|e| DrydockError::io(format!("creating link {}", target.display()), e))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> DrydockResult<()> {
    fs::copy(source, target)
        .map(|_| ())
        .map_err(|e| DrydockError::io(format!("copying {}", source.display()), e))
}
