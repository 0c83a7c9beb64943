//! Error types for drydock
//!
//! All modules use `DrydockResult<T>` as their return type. Build-side
//! failures (provisioning, compilation, tests) are fatal and propagate with
//! `?`. Release failures are captured per task by the release executor and
//! only surface through its report.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for drydock operations
pub type DrydockResult<T> = Result<T, DrydockError>;

/// All errors that can occur in drydock
#[derive(Error, Debug)]
pub enum DrydockError {
    // Engine errors
    #[error("Container engine not found: {0}. Install podman (or docker) and make sure it is on PATH")]
    EngineNotFound(String),

    #[error("Container engine is not usable: {reason}")]
    EngineUnavailable { reason: String },

    #[error("Unsupported platform: {0}. drydock supports macOS and Linux.")]
    UnsupportedPlatform(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Pipeline errors
    #[error("Toolchain provisioning failed for {image}:\n{reason}")]
    ToolchainProvisioning { image: String, reason: String },

    #[error("Compilation failed in stage {stage}:\n{output}")]
    Compilation { stage: String, output: String },

    #[error("Test suite failed (exit code {exit_code}):\n{output}")]
    TestFailure { exit_code: i32, output: String },

    #[error("Cannot assemble image {service}: {reason}")]
    Assembly { service: String, reason: String },

    #[error("Artifact {name} is outside run directory {run_dir}")]
    ForeignArtifact { name: String, run_dir: PathBuf },

    #[error("Release of {image} to {destination} failed: {reason}")]
    ReleaseTask {
        image: String,
        destination: String,
        reason: String,
    },

    #[error("Invalid image tag: {0:?}")]
    InvalidTag(String),

    #[error("{failed} of {total} release task(s) failed")]
    PartialRelease { failed: usize, total: usize },

    // Engine command errors
    #[error("Image build failed: {tag}:\n{reason}")]
    ImageBuild { tag: String, reason: String },

    #[error("Image pull failed: {image}: {reason}")]
    ImagePull { image: String, reason: String },

    // Cache errors
    #[error("Failed to create cache volume {name}: {reason}")]
    CacheVolumeCreate { name: String, reason: String },

    #[error("Failed to read cache ledger {path}: {reason}")]
    CacheLedgerRead { path: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Invalid path: {path}: {reason}")]
    PathInvalid { path: PathBuf, reason: String },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl DrydockError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::EngineNotFound(_) => Some("Install podman: https://podman.io/docs/installation"),
            Self::EngineUnavailable { .. } => Some("Run: drydock status"),
            Self::ConfigNotFound(_) => Some("Run: drydock config init"),
            Self::TestFailure { .. } => Some("Fix the failing tests; nothing was assembled or released"),
            Self::PartialRelease { .. } => {
                Some("Failed tasks are listed in the run's release.jsonl; re-run to retry them")
            }
            _ => None,
        }
    }
}
