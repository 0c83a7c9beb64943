//! Named cache volumes
//!
//! Two engine volumes persist across runs: the web package store and the
//! compiled target directory. They are created on demand, labelled once,
//! and never relabelled or removed by a pipeline run.

use crate::config::Config;
use crate::error::DrydockResult;
use crate::orchestration::{ContainerRuntime, Mount};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Prefix shared by every cache volume name
pub const VOLUME_PREFIX: &str = "drydock-cache-";

/// Mount path of the package store inside asset containers
pub const STORE_PATH: &str = "/cache/store";

/// Volume label keys used to mark cache volumes
pub mod labels {
    /// Marks volume as a drydock cache
    pub const DRYDOCK_CACHE: &str = "io.drydock.cache";
    /// Which cache this volume holds
    pub const KIND: &str = "io.drydock.cache.kind";
    /// Creation timestamp (RFC3339)
    pub const CREATED_AT: &str = "io.drydock.cache.created_at";
}

/// The two persistent caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Web package manager store
    DependencyStore,
    /// Compiled target directory
    BuildArtifacts,
}

impl CacheKind {
    pub const ALL: [CacheKind; 2] = [CacheKind::DependencyStore, CacheKind::BuildArtifacts];

    /// Stable identifier, also the volume name suffix
    pub fn id(&self) -> &'static str {
        match self {
            Self::DependencyStore => "dependency-store",
            Self::BuildArtifacts => "build-artifacts",
        }
    }

    /// Engine volume name
    pub fn volume_name(&self) -> String {
        format!("{}{}", VOLUME_PREFIX, self.id())
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// State of a cache as recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// Warm-up started but never finished (in progress or crashed)
    Building,
    /// Warmed for the recorded key
    Complete,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Building => write!(f, "building"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// A cache volume and where stages mount it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVolume {
    pub kind: CacheKind,
    /// Volume name (drydock-cache-{id})
    pub name: String,
    /// Mount path inside stage containers
    pub container_path: String,
}

impl CacheVolume {
    pub fn new(kind: CacheKind, container_path: impl Into<String>) -> Self {
        Self {
            kind,
            name: kind.volume_name(),
            container_path: container_path.into(),
        }
    }

    /// Labels applied when the volume is first created
    pub fn labels(&self) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert(labels::DRYDOCK_CACHE.to_string(), "true".to_string());
        labels.insert(labels::KIND.to_string(), self.kind.id().to_string());
        labels.insert(labels::CREATED_AT.to_string(), Utc::now().to_rfc3339());
        labels
    }

    /// Read-write mount at the container path
    pub fn mount(&self) -> Mount {
        Mount::volume(&self.name, &self.container_path)
    }
}

/// Both caches of a project
#[derive(Debug, Clone)]
pub struct CacheVolumes {
    dependency_store: CacheVolume,
    build_artifacts: CacheVolume,
}

impl CacheVolumes {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dependency_store: CacheVolume::new(CacheKind::DependencyStore, STORE_PATH),
            build_artifacts: CacheVolume::new(
                CacheKind::BuildArtifacts,
                &config.toolchain.target_dir,
            ),
        }
    }

    pub fn get(&self, kind: CacheKind) -> &CacheVolume {
        match kind {
            CacheKind::DependencyStore => &self.dependency_store,
            CacheKind::BuildArtifacts => &self.build_artifacts,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheVolume> {
        [&self.dependency_store, &self.build_artifacts].into_iter()
    }

    /// Create any missing volume; existing volumes are left untouched.
    ///
    /// Returns the kinds that were created, which start out empty.
    pub async fn ensure(
        &self,
        runtime: &dyn ContainerRuntime,
    ) -> DrydockResult<Vec<CacheKind>> {
        let mut created = Vec::new();
        for volume in self.iter() {
            if runtime.volume_exists(&volume.name).await? {
                debug!("Cache volume present: {}", volume.name);
                continue;
            }
            runtime.volume_create(&volume.name, &volume.labels()).await?;
            debug!("Cache volume created: {}", volume.name);
            created.push(volume.kind);
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::fake::{Call, FakeRuntime};

    #[test]
    fn volume_names() {
        assert_eq!(
            CacheKind::DependencyStore.volume_name(),
            "drydock-cache-dependency-store"
        );
        assert_eq!(
            CacheKind::BuildArtifacts.volume_name(),
            "drydock-cache-build-artifacts"
        );
    }

    #[test]
    fn cache_volume_labels() {
        let vol = CacheVolume::new(CacheKind::BuildArtifacts, "/app/target");
        let labels = vol.labels();

        assert_eq!(labels.get(labels::DRYDOCK_CACHE), Some(&"true".to_string()));
        assert_eq!(labels.get(labels::KIND), Some(&"build-artifacts".to_string()));
        assert!(labels.contains_key(labels::CREATED_AT));
    }

    #[test]
    fn mount_targets_follow_config() {
        let mut config = Config::default();
        config.toolchain.target_dir = "/work/target".to_string();
        let volumes = CacheVolumes::from_config(&config);

        let mount = volumes.get(CacheKind::BuildArtifacts).mount();
        assert_eq!(mount.volume_arg(), "drydock-cache-build-artifacts:/work/target");
        assert_eq!(
            volumes.get(CacheKind::DependencyStore).container_path,
            STORE_PATH
        );
    }

    #[tokio::test]
    async fn ensure_only_creates_missing_volumes() {
        let runtime = FakeRuntime::new().with_volume("drydock-cache-build-artifacts");
        let volumes = CacheVolumes::from_config(&Config::default());

        let first = volumes.ensure(&runtime).await.unwrap();
        let second = volumes.ensure(&runtime).await.unwrap();
        assert_eq!(first, vec![CacheKind::DependencyStore]);
        assert!(second.is_empty());

        let creates: Vec<Call> = runtime
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::VolumeCreate(_)))
            .collect();
        assert_eq!(
            creates,
            vec![Call::VolumeCreate("drydock-cache-dependency-store".to_string())]
        );
    }
}
