//! Container runtime abstraction
//!
//! Every external collaborator of the pipeline (toolchain, package manager,
//! image builder, registry) is reached through this trait. The production
//! implementation drives an engine CLI; tests use an in-memory fake.

use crate::error::DrydockResult;
use crate::image::Image;
use crate::orchestration::podman::{CommandOutput, Environment, VolumeInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// Abstract container runtime interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check if the engine is installed and answers
    async fn is_available(&self) -> DrydockResult<bool>;

    /// Ensure the engine is ready to run stages
    async fn ensure_ready(&self) -> DrydockResult<()>;

    /// Check if an image exists locally
    async fn image_exists(&self, image: &str) -> DrydockResult<bool>;

    /// Pull an image
    async fn pull(&self, image: &str) -> DrydockResult<()>;

    /// Build an image from a context directory containing a Dockerfile
    async fn build_image(&self, context_dir: &Path, tag: &str) -> DrydockResult<()>;

    /// Run a command to completion inside an environment.
    ///
    /// A non-zero exit is reported through `CommandOutput::exit_code`, not as
    /// an error; errors mean the engine itself could not be driven.
    async fn exec(&self, env: &Environment, command: &[String]) -> DrydockResult<CommandOutput>;

    /// Check if a named volume exists
    async fn volume_exists(&self, name: &str) -> DrydockResult<bool>;

    /// Create a named volume with labels (no-op if it exists)
    async fn volume_create(&self, name: &str, labels: &HashMap<String, String>)
        -> DrydockResult<()>;

    /// List volumes whose name starts with `prefix`
    async fn volume_list(&self, prefix: &str) -> DrydockResult<Vec<VolumeInfo>>;

    /// Remove a named volume
    async fn volume_remove(&self, name: &str) -> DrydockResult<()>;

    /// Build an assembled image locally, returning its local tag
    async fn materialize(&self, image: &Image) -> DrydockResult<String>;

    /// Build and push an assembled image, returning the resolved reference
    async fn push(&self, image: &Image, reference: &str) -> DrydockResult<String>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
