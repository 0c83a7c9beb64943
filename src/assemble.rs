//! Runtime image assembly
//!
//! Pure composition: one `Image` per service, layered from the artifacts
//! of the current run. No engine calls happen here.

use crate::artifact::{Artifact, BinaryArtifacts};
use crate::config::ServiceConfig;
use crate::error::{DrydockError, DrydockResult};
use crate::image::Image;
use std::path::PathBuf;
use tracing::debug;

/// Directory binaries are installed to inside runtime images
pub const BIN_DIR: &str = "/usr/local/bin";

pub struct RuntimeAssembler {
    run_id: String,
    run_dir: PathBuf,
    default_base: String,
}

impl RuntimeAssembler {
    pub fn new(
        run_id: impl Into<String>,
        run_dir: impl Into<PathBuf>,
        default_base: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            run_dir: run_dir.into(),
            default_base: default_base.into(),
        }
    }

    /// Compose the image for one service
    pub fn assemble(
        &self,
        service: &ServiceConfig,
        binaries: &BinaryArtifacts,
        dist: Option<&Artifact>,
    ) -> DrydockResult<Image> {
        let binary = binaries
            .get(&service.binary)
            .ok_or_else(|| DrydockError::Assembly {
                service: service.name.clone(),
                reason: format!("binary {} was not built", service.binary),
            })?;
        self.check_run_scoped(binary)?;

        let entrypoint = format!("{}/{}", BIN_DIR, service.binary);
        let base = service.base_image.as_deref().unwrap_or(&self.default_base);

        let mut image = Image::new(&service.name, base, &self.run_id)
            .with_artifact(binary.clone(), &entrypoint)
            .with_entrypoint(vec![entrypoint.clone()])
            .with_args(service.args.clone());

        if let Some(mount_path) = &service.assets {
            let dist = dist.ok_or_else(|| DrydockError::Assembly {
                service: service.name.clone(),
                reason: "asset bundle was not built".to_string(),
            })?;
            self.check_run_scoped(dist)?;
            image = image.with_artifact(dist.clone(), mount_path);
        }

        for (key, value) in &service.env {
            image = image.with_env(key, value);
        }
        for port in &service.ports {
            image = image.with_exposed_port(*port);
        }

        debug!(
            "Assembled {} from {} layer(s)",
            service.name,
            image.layers().len()
        );
        Ok(image)
    }

    /// Compose every service, failing on the first that can't be built
    pub fn assemble_all(
        &self,
        services: &[ServiceConfig],
        binaries: &BinaryArtifacts,
        dist: Option<&Artifact>,
    ) -> DrydockResult<Vec<Image>> {
        services
            .iter()
            .map(|service| self.assemble(service, binaries, dist))
            .collect()
    }

    fn check_run_scoped(&self, artifact: &Artifact) -> DrydockResult<()> {
        if artifact.path().starts_with(&self.run_dir) {
            Ok(())
        } else {
            Err(DrydockError::ForeignArtifact {
                name: artifact.name().to_string(),
                run_dir: self.run_dir.clone(),
            })
        }
    }
}
