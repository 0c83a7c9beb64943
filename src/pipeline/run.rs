//! Per-run directory layout
//!
//! Everything a run produces lives under `<state dir>/runs/<run id>/`.

use crate::error::{DrydockError, DrydockResult};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Paths of one pipeline run
#[derive(Debug, Clone)]
pub struct RunLayout {
    id: String,
    root: PathBuf,
}

impl RunLayout {
    /// Fresh run id: UTC timestamp plus a short random suffix
    pub fn new_id() -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%SZ"), &suffix[..8])
    }

    /// Layout for `id` below `state_dir`
    pub fn new(state_dir: &Path, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            root: state_dir.join("runs").join(&id),
            id,
        }
    }

    /// Create the run directories
    pub fn create(&self) -> DrydockResult<()> {
        for dir in [self.root.clone(), self.bin_dir(), self.cook_dir()] {
            std::fs::create_dir_all(&dir)
                .map_err(|e| DrydockError::io(format!("creating {}", dir.display()), e))?;
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filtered copy of the project
    pub fn source_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    /// Manifest-only copy used for recipe extraction
    pub fn recipe_source_dir(&self) -> PathBuf {
        self.root.join("recipe-src")
    }

    /// Stage outputs (`recipe.json`, `bin/`)
    pub fn out_dir(&self) -> PathBuf {
        self.root.join("out")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.out_dir().join("bin")
    }

    /// Empty workspace the dependency cook runs in
    pub fn cook_dir(&self) -> PathBuf {
        self.root.join("cook")
    }

    /// Manifest-only copy of the web project
    pub fn web_deps_dir(&self) -> PathBuf {
        self.root.join("web-deps")
    }

    /// Writable copy of the web project the bundle is built in
    pub fn web_build_dir(&self) -> PathBuf {
        self.root.join("web-build")
    }

    /// Whether `path` belongs to this run
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}
