//! Stage image provisioning
//!
//! Builds a toolchain or asset image from a base image plus setup
//! commands. The image tag is derived from a SHA256 hash of the inputs,
//! so an unchanged toolchain is never rebuilt.

use crate::error::{DrydockError, DrydockResult};
use crate::orchestration::ContainerRuntime;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// Result of provisioning a stage image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedImage {
    /// Full image tag (e.g., "drydock-toolchain-a1b2c3d4e5f6")
    pub tag: String,

    /// Whether the image already existed (no build needed)
    pub was_cached: bool,
}

/// Provision a stage image.
///
/// Failures of any kind (missing base image, failing setup command) are
/// reported as `ToolchainProvisioning`.
pub async fn provision_image(
    runtime: &dyn ContainerRuntime,
    prefix: &str,
    base_image: &str,
    setup: &[String],
    workdir: &str,
) -> DrydockResult<ProvisionedImage> {
    let tag = compute_image_tag(prefix, base_image, setup, workdir);
    debug!("Stage image tag: {}", tag);

    if runtime.image_exists(&tag).await.unwrap_or(false) {
        debug!("Stage image already cached: {}", tag);
        return Ok(ProvisionedImage {
            tag,
            was_cached: true,
        });
    }

    let provisioning = |reason: String| DrydockError::ToolchainProvisioning {
        image: base_image.to_string(),
        reason,
    };

    let build_dir = crate::orchestration::scratch_build_dir()
        .await
        .map_err(|e| provisioning(e.to_string()))?;

    let result = async {
        write_dockerfile(&build_dir, base_image, setup, workdir).await?;
        runtime.build_image(&build_dir, &tag).await
    }
    .await;

    // Clean up build directory (best-effort)
    let _ = tokio::fs::remove_dir_all(&build_dir).await;

    result.map_err(|e| provisioning(e.to_string()))?;

    Ok(ProvisionedImage {
        tag,
        was_cached: false,
    })
}

/// Deterministic tag over every input of the image
fn compute_image_tag(prefix: &str, base_image: &str, setup: &[String], workdir: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base_image.as_bytes());
    hasher.update([0u8]);
    hasher.update(workdir.as_bytes());
    for command in setup {
        hasher.update([0u8]);
        hasher.update(command.as_bytes());
    }
    let hash = hex::encode(hasher.finalize());
    format!("{}-{}", prefix, &hash[..12])
}

async fn write_dockerfile(
    build_dir: &Path,
    base_image: &str,
    setup: &[String],
    workdir: &str,
) -> DrydockResult<()> {
    let dockerfile = generate_dockerfile(base_image, setup, workdir);
    tokio::fs::write(build_dir.join("Dockerfile"), &dockerfile)
        .await
        .map_err(|e| DrydockError::io("writing Dockerfile", e))
}

/// Generate a Dockerfile with one RUN per setup command.
///
/// Separate instructions give the engine's build cache per-command
/// granularity.
fn generate_dockerfile(base_image: &str, setup: &[String], workdir: &str) -> String {
    let mut lines = Vec::new();

    lines.push(format!("FROM {}", base_image));
    for command in setup {
        lines.push(format!("RUN {}", command));
    }
    lines.push(format!("WORKDIR {}", workdir));
    lines.push(String::new());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::fake::{Call, FakeRuntime};

    fn setup() -> Vec<String> {
        vec!["cargo install cargo-chef --locked".to_string()]
    }

    #[test]
    fn generate_dockerfile_structure() {
        let dockerfile = generate_dockerfile(
            "rust:1.83",
            &["apt-get update".to_string(), "cargo install cargo-chef".to_string()],
            "/app",
        );
        assert_eq!(
            dockerfile,
            "FROM rust:1.83\nRUN apt-get update\nRUN cargo install cargo-chef\nWORKDIR /app\n"
        );
    }

    #[test]
    fn tag_is_deterministic() {
        let a = compute_image_tag("drydock-toolchain", "rust:1.83", &setup(), "/app");
        let b = compute_image_tag("drydock-toolchain", "rust:1.83", &setup(), "/app");
        assert_eq!(a, b);
        assert_eq!(a.len(), "drydock-toolchain-".len() + 12);
    }

    #[test]
    fn tag_changes_with_inputs() {
        let base = compute_image_tag("drydock-toolchain", "rust:1.83", &setup(), "/app");
        assert_ne!(
            base,
            compute_image_tag("drydock-toolchain", "rust:1.84", &setup(), "/app")
        );
        assert_ne!(
            base,
            compute_image_tag("drydock-toolchain", "rust:1.83", &[], "/app")
        );
        assert_ne!(
            base,
            compute_image_tag("drydock-toolchain", "rust:1.83", &setup(), "/src")
        );
    }

    #[tokio::test]
    async fn cached_image_is_not_rebuilt() {
        let tag = compute_image_tag("drydock-toolchain", "rust:1.83", &setup(), "/app");
        let runtime = FakeRuntime::new().with_image(&tag);

        let image = provision_image(&runtime, "drydock-toolchain", "rust:1.83", &setup(), "/app")
            .await
            .unwrap();

        assert!(image.was_cached);
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn build_failure_is_provisioning_error() {
        let runtime = FakeRuntime::new().failing_builds();

        let err = provision_image(&runtime, "drydock-toolchain", "rust:1.83", &setup(), "/app")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DrydockError::ToolchainProvisioning { ref image, .. } if image == "rust:1.83"
        ));
        assert!(matches!(runtime.calls()[0], Call::BuildImage(_)));
    }
}
