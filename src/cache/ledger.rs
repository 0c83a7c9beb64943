//! Host-side cache ledger
//!
//! Records, per cache volume, which key was last warmed into it and
//! whether the warm-up finished. Volumes themselves are never relabelled,
//! so the ledger is the only place cache state changes.

use crate::cache::volume::CacheState;
use crate::error::{DrydockError, DrydockResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Ledger file name inside the state directory
pub const LEDGER_FILE: &str = "cache-ledger.json";

/// What a volume was last warmed with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub key: String,
    pub state: CacheState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CacheLedger {
    path: PathBuf,
    entries: BTreeMap<String, LedgerEntry>,
}

impl CacheLedger {
    /// Empty ledger that will be written to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the ledger, starting empty if the file doesn't exist yet
    pub async fn load(path: &Path) -> DrydockResult<Self> {
        if !path.exists() {
            debug!("No cache ledger at {}, starting empty", path.display());
            return Ok(Self::empty(path));
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DrydockError::io(format!("reading {}", path.display()), e))?;
        let entries =
            serde_json::from_str(&content).map_err(|e| DrydockError::CacheLedgerRead {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Persist the ledger
    pub async fn save(&self) -> DrydockResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DrydockError::io(format!("creating {}", parent.display()), e))?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)
            .await
            .map_err(|e| DrydockError::io(format!("writing {}", self.path.display()), e))
    }

    pub fn entry(&self, volume: &str) -> Option<&LedgerEntry> {
        self.entries.get(volume)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &LedgerEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether `volume` was fully warmed for `key`
    pub fn is_complete(&self, volume: &str, key: &str) -> bool {
        self.entries
            .get(volume)
            .is_some_and(|e| e.key == key && e.state == CacheState::Complete)
    }

    /// Record the state of `volume` for `key`
    pub fn mark(&mut self, volume: &str, key: &str, state: CacheState) {
        self.entries.insert(
            volume.to_string(),
            LedgerEntry {
                key: key.to_string(),
                state,
                updated_at: Utc::now(),
            },
        );
    }

    /// Forget a volume (after it was removed)
    pub fn forget(&mut self, volume: &str) {
        self.entries.remove(volume);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn complete_requires_matching_key() {
        let mut ledger = CacheLedger::empty("/tmp/ledger.json");
        ledger.mark("vol", "abc", CacheState::Building);
        assert!(!ledger.is_complete("vol", "abc"));

        ledger.mark("vol", "abc", CacheState::Complete);
        assert!(ledger.is_complete("vol", "abc"));
        assert!(!ledger.is_complete("vol", "def"));
        assert!(!ledger.is_complete("other", "abc"));
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".drydock").join(LEDGER_FILE);

        let mut ledger = CacheLedger::load(&path).await.unwrap();
        assert_eq!(ledger.entries().count(), 0);

        ledger.mark("drydock-cache-build-artifacts", "1a2b3c", CacheState::Complete);
        ledger.save().await.unwrap();

        let loaded = CacheLedger::load(&path).await.unwrap();
        assert!(loaded.is_complete("drydock-cache-build-artifacts", "1a2b3c"));
    }

    #[tokio::test]
    async fn corrupt_ledger_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LEDGER_FILE);
        std::fs::write(&path, "{not json").unwrap();

        let err = CacheLedger::load(&path).await.unwrap_err();
        assert!(matches!(err, DrydockError::CacheLedgerRead { .. }));
    }
}
