//! Assembled runtime images
//!
//! An `Image` is a pure description: base runtime, artifact layers and
//! runtime configuration. Nothing touches the engine until the release
//! executor asks the runtime to materialize or push it.

use crate::artifact::{Artifact, ArtifactKind};
use crate::error::{DrydockError, DrydockResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// One artifact placed into an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub artifact: Artifact,
    /// Absolute path inside the image
    pub mount_path: String,
}

/// A fully described runtime image for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    name: String,
    base: String,
    run_id: String,
    layers: Vec<Layer>,
    env: BTreeMap<String, String>,
    ports: Vec<u16>,
    entrypoint: Vec<String>,
    args: Vec<String>,
}

impl Image {
    pub fn new(name: impl Into<String>, base: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            run_id: run_id.into(),
            layers: Vec::new(),
            env: BTreeMap::new(),
            ports: Vec::new(),
            entrypoint: Vec::new(),
            args: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, artifact: Artifact, mount_path: impl Into<String>) -> Self {
        self.layers.push(Layer {
            artifact,
            mount_path: mount_path.into(),
        });
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_exposed_port(mut self, port: u16) -> Self {
        if !self.ports.contains(&port) {
            self.ports.push(port);
        }
        self
    }

    pub fn with_entrypoint(mut self, entrypoint: Vec<String>) -> Self {
        self.entrypoint = entrypoint;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Tag the image is built under locally
    pub fn local_tag(&self) -> String {
        format!("localhost/drydock/{}:{}", self.name, self.run_id)
    }

    /// Registry reference for one tag
    pub fn destination(&self, registry: &str, tag: &str) -> String {
        format!("{}/{}:{}", registry.trim_end_matches('/'), self.name, tag)
    }

    /// Build-context name of a layer
    fn layer_source(index: usize, layer: &Layer) -> String {
        format!("layer-{}-{}", index, layer.artifact.file_name())
    }

    /// Generate the Dockerfile for this image.
    ///
    /// Deterministic: layers in insertion order, env sorted by key.
    pub fn dockerfile(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("FROM {}", self.base));
        lines.push(format!(
            "LABEL io.drydock.service={} io.drydock.run={}",
            self.name, self.run_id
        ));

        for (index, layer) in self.layers.iter().enumerate() {
            lines.push(format!(
                "COPY {} {}",
                Self::layer_source(index, layer),
                layer.mount_path
            ));
        }

        for (key, value) in &self.env {
            lines.push(format!("ENV {}={}", key, dockerfile_quote(value)));
        }

        for port in &self.ports {
            lines.push(format!("EXPOSE {}", port));
        }

        if !self.entrypoint.is_empty() {
            lines.push(format!("ENTRYPOINT {}", exec_form(&self.entrypoint)));
        }
        if !self.args.is_empty() {
            lines.push(format!("CMD {}", exec_form(&self.args)));
        }

        lines.push(String::new());
        lines.join("\n")
    }

    /// Populate a build context: every layer's artifact plus the Dockerfile
    pub fn write_context(&self, dir: &Path) -> DrydockResult<()> {
        fs::create_dir_all(dir)
            .map_err(|e| DrydockError::io(format!("creating build context {}", dir.display()), e))?;

        for (index, layer) in self.layers.iter().enumerate() {
            let target = dir.join(Self::layer_source(index, layer));
            match layer.artifact.kind() {
                ArtifactKind::File => {
                    fs::copy(layer.artifact.path(), &target).map_err(|e| {
                        DrydockError::io(
                            format!("copying {} into build context", layer.artifact.name()),
                            e,
                        )
                    })?;
                }
                ArtifactKind::Directory => copy_tree(layer.artifact.path(), &target)?,
            }
        }

        fs::write(dir.join("Dockerfile"), self.dockerfile())
            .map_err(|e| DrydockError::io("writing Dockerfile", e))
    }
}

fn copy_tree(source: &Path, target: &Path) -> DrydockResult<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| DrydockError::PathInvalid {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| DrydockError::Internal(e.to_string()))?;
        let dest = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)
                .map_err(|e| DrydockError::io(format!("creating {}", dest.display()), e))?;
        } else {
            fs::copy(entry.path(), &dest)
                .map_err(|e| DrydockError::io(format!("copying {}", entry.path().display()), e))?;
        }
    }
    Ok(())
}

/// JSON exec form for ENTRYPOINT / CMD
fn exec_form(parts: &[String]) -> String {
    serde_json::to_string(parts).unwrap_or_else(|_| "[]".to_string())
}

/// Quote a value for a Dockerfile ENV instruction.
/// Embedded double quotes and backslashes are escaped to prevent injection.
fn dockerfile_quote(value: &str) -> String {
    if value.contains('$') || value.contains(' ') || value.contains('"') || value.contains('\\') {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}
