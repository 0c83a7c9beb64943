//! Runtime factory for creating the configured container runtime
//!
//! Provides platform detection and runtime instantiation.

use crate::config::Config;
use crate::error::{DrydockError, DrydockResult};
use crate::orchestration::engine::CliEngineRuntime;
use crate::orchestration::runtime::ContainerRuntime;
use std::sync::Arc;

/// Detected platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// macOS - engine runs in a VM behind the CLI
    MacOS,
    /// Linux - engine runs natively
    Linux,
    /// Unsupported platform
    Unsupported,
}

impl Platform {
    /// Detect the current platform
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOS,
            "linux" => Platform::Linux,
            _ => Platform::Unsupported,
        }
    }

    /// Get a human-readable platform name
    pub fn name(&self) -> &'static str {
        match self {
            Platform::MacOS => "macOS",
            Platform::Linux => "Linux",
            Platform::Unsupported => "Unsupported",
        }
    }
}

/// Create the container runtime named by the configuration.
///
/// The runtime is shared between concurrently running stages and release
/// tasks, hence the `Arc`.
pub fn create_runtime(config: &Config) -> DrydockResult<Arc<dyn ContainerRuntime>> {
    match Platform::detect() {
        Platform::MacOS | Platform::Linux => {
            Ok(Arc::new(CliEngineRuntime::new(config.engine.binary.clone())))
        }
        Platform::Unsupported => Err(DrydockError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        )),
    }
}
