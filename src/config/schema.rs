//! Configuration schema for drydock
//!
//! Configuration lives in `drydock.toml` at the project root. Every section
//! is optional; missing keys fall back to the defaults below, which describe
//! a Rust workspace with a pnpm web frontend and four deployable services.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Source snapshot settings
    pub project: ProjectConfig,

    /// Container engine settings
    pub engine: EngineConfig,

    /// Native build branch
    pub toolchain: ToolchainConfig,

    /// Web asset branch
    pub assets: AssetsConfig,

    /// Stage scheduling
    pub pipeline: PipelineConfig,

    /// Release defaults
    pub release: ReleaseConfig,

    /// Deployable services, one image each
    #[serde(rename = "service")]
    pub services: Vec<ServiceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            project: ProjectConfig::default(),
            engine: EngineConfig::default(),
            toolchain: ToolchainConfig::default(),
            assets: AssetsConfig::default(),
            pipeline: PipelineConfig::default(),
            release: ReleaseConfig::default(),
            services: default_services(),
        }
    }
}

impl Config {
    /// Binaries the native branch must copy out of the target directory.
    ///
    /// Service binaries in declaration order, then the asset helper. No
    /// duplicates.
    pub fn required_binaries(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let helper = self
            .assets
            .enabled
            .then(|| self.assets.helper.clone())
            .flatten();

        for name in self
            .services
            .iter()
            .map(|s| s.binary.clone())
            .chain(helper)
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Source snapshot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Paths never visible to any stage.
    ///
    /// A bare name (`target`) matches that component at any depth; a path
    /// with a slash (`web/dist`) matches that prefix from the project root.
    pub exclude: Vec<String>,

    /// Directory (relative to the project root) holding run state and the
    /// cache ledger
    pub state_dir: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            exclude: vec![
                "target".to_string(),
                "node_modules".to_string(),
                ".git".to_string(),
                ".drydock".to_string(),
                "web/dist".to_string(),
            ],
            state_dir: ".drydock".to_string(),
        }
    }
}

/// Container engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine CLI (podman or docker)
    pub binary: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: "podman".to_string(),
        }
    }
}

/// Native build branch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Toolchain base image
    pub image: String,

    /// Shell commands baked into the toolchain image
    pub setup: Vec<String>,

    /// Working directory inside build containers
    pub workdir: String,

    /// Target directory (mount point of the build-artifacts cache)
    pub target_dir: String,

    /// Build profile directory under the target dir
    pub profile: String,

    /// File names that make up the dependency recipe input
    pub manifest_files: Vec<String>,

    /// Writes the recipe to `/out/recipe.json`
    pub recipe_command: Vec<String>,

    /// Compiles dependencies from `/out/recipe.json`
    pub cook_command: Vec<String>,

    /// Compiles the full workspace
    pub build_command: Vec<String>,

    /// Runs the test suite
    pub test_command: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            image: "docker.io/library/rust:1.83-bookworm".to_string(),
            setup: vec!["cargo install cargo-chef --locked".to_string()],
            workdir: "/app".to_string(),
            target_dir: "/build/target".to_string(),
            profile: "release".to_string(),
            manifest_files: vec![
                "Cargo.toml".to_string(),
                "Cargo.lock".to_string(),
                "rust-toolchain".to_string(),
                "rust-toolchain.toml".to_string(),
            ],
            recipe_command: args(&["cargo", "chef", "prepare", "--recipe-path", "/out/recipe.json"]),
            cook_command: args(&[
                "cargo",
                "chef",
                "cook",
                "--release",
                "--recipe-path",
                "/out/recipe.json",
            ]),
            build_command: args(&["cargo", "build", "--release", "--workspace", "--bins"]),
            test_command: args(&["cargo", "test", "--release", "--workspace"]),
        }
    }
}

/// Web asset branch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Build the asset bundle at all
    pub enabled: bool,

    /// Node base image
    pub image: String,

    /// Shell commands baked into the asset image
    pub setup: Vec<String>,

    /// Web project directory, relative to the project root
    pub dir: String,

    /// File names that make up the dependency-only subset
    pub manifest_files: Vec<String>,

    /// Fills the dependency store from the lockfile alone
    pub fetch_command: Vec<String>,

    /// Installs from the store and compiles the bundle
    pub build_command: Vec<String>,

    /// Bundle directory, relative to `dir`
    pub output_dir: String,

    /// Binary from the native branch run over the bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helper: Option<String>,

    /// Arguments for the helper; the bundle path is appended
    pub postprocess_args: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            image: "docker.io/library/node:20-bookworm-slim".to_string(),
            setup: vec!["corepack enable".to_string()],
            dir: "web".to_string(),
            manifest_files: vec![
                "package.json".to_string(),
                "pnpm-lock.yaml".to_string(),
            ],
            fetch_command: args(&["pnpm", "fetch"]),
            build_command: args(&[
                "sh",
                "-c",
                "pnpm install --offline --frozen-lockfile && pnpm run build",
            ]),
            output_dir: "dist".to_string(),
            helper: Some("precompress".to_string()),
            postprocess_args: vec![],
        }
    }
}

/// Stage scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the asset branch alongside the native branch
    pub concurrent_branches: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrent_branches: true,
        }
    }
}

/// Release settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Registry path prefix; images are pushed to `<registry>/<service>:<tag>`
    pub registry: String,

    /// Push to the registry instead of verifying locally
    pub publish: bool,

    /// Version tag applied next to `latest`
    pub version: String,

    /// Maximum release tasks in flight (0 = unbounded)
    pub max_concurrency: usize,

    /// Base runtime image for services that don't set one
    pub base_image: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            registry: "ghcr.io/example".to_string(),
            publish: false,
            version: crate::release::LATEST.to_string(),
            max_concurrency: 0,
            base_image: "docker.io/library/debian:bookworm-slim".to_string(),
        }
    }
}

/// A deployable service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Image name
    pub name: String,

    /// Binary baked into the image
    pub binary: String,

    /// Mount path for the asset bundle, if the service serves it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,

    /// Base runtime image override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,

    /// Exposed ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,

    /// Default invocation arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Environment variables
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ServiceConfig {
    /// Service running only its own binary
    pub fn binary_only(name: &str, binary: &str) -> Self {
        Self {
            name: name.to_string(),
            binary: binary.to_string(),
            assets: None,
            base_image: None,
            ports: vec![],
            args: vec![],
            env: BTreeMap::new(),
        }
    }
}

fn default_services() -> Vec<ServiceConfig> {
    let mut web = ServiceConfig::binary_only("web", "server");
    web.assets = Some("/srv/dist".to_string());
    web.env
        .insert("STATIC_DIR".to_string(), "/srv/dist".to_string());
    web.env
        .insert("LISTEN_ADDR".to_string(), "0.0.0.0:8081".to_string());
    web.ports = vec![8081];

    vec![
        web,
        ServiceConfig::binary_only("migrator", "migrator"),
        ServiceConfig::binary_only("db-cleaner", "db-cleaner"),
        ServiceConfig::binary_only("importer", "importer"),
    ]
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
