//! Named stage outputs

use crate::error::{DrydockError, DrydockResult};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Whether an artifact is a single file or a directory tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    File,
    Directory,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// An immutable, named build output on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    name: String,
    kind: ArtifactKind,
    path: PathBuf,
}

impl Artifact {
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: ArtifactKind::File,
            path: path.into(),
        }
    }

    pub fn directory(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: ArtifactKind::Directory,
            path: path.into(),
        }
    }

    /// Stable logical name (`recipe`, `bin/server`, `dist`)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last path component, used as the file name when copying
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.replace('/', "-"))
    }

    /// Check the artifact was actually produced with the right kind
    pub fn verify(&self) -> DrydockResult<()> {
        let ok = match self.kind {
            ArtifactKind::File => self.path.is_file(),
            ArtifactKind::Directory => self.path.is_dir(),
        };
        if ok {
            Ok(())
        } else {
            Err(DrydockError::PathInvalid {
                path: self.path.clone(),
                reason: format!("artifact {} is not a {}", self.name, self.kind),
            })
        }
    }
}

/// Binaries produced by the native branch, keyed by binary name
#[derive(Debug, Clone, Default)]
pub struct BinaryArtifacts {
    binaries: BTreeMap<String, Artifact>,
}

impl BinaryArtifacts {
    pub fn insert(&mut self, binary: &str, artifact: Artifact) {
        self.binaries.insert(binary.to_string(), artifact);
    }

    pub fn get(&self, binary: &str) -> Option<&Artifact> {
        self.binaries.get(binary)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.binaries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.binaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn verify_checks_kind() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("server");
        std::fs::write(&file, b"\x7fELF").unwrap();

        assert!(Artifact::file("bin/server", &file).verify().is_ok());
        assert!(Artifact::directory("bin/server", &file).verify().is_err());
        assert!(Artifact::directory("dist", dir.path()).verify().is_ok());
        assert!(Artifact::file("missing", dir.path().join("nope")).verify().is_err());
    }

    #[test]
    fn file_name_from_path() {
        let artifact = Artifact::file("bin/db-cleaner", "/runs/1/out/bin/db-cleaner");
        assert_eq!(artifact.file_name(), "db-cleaner");
    }
}
