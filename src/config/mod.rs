//! Configuration management for drydock

pub mod schema;

pub use schema::{Config, ServiceConfig};

use crate::error::{DrydockError, DrydockResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File name looked up from the working directory upwards
pub const CONFIG_FILE_NAME: &str = "drydock.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager for `drydock.toml` in the given project root
    pub fn for_project(project_root: &Path) -> Self {
        Self {
            config_path: project_root.join(CONFIG_FILE_NAME),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Walk up from `start` looking for `drydock.toml`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Project root: the directory holding the config file, made absolute
    pub fn project_root(&self) -> PathBuf {
        let dir = match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        absolute_dir(dir)
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> DrydockResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> DrydockResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DrydockError::io(format!("reading config from {}", path.display()), e))?;

        let config: Config = toml::from_str(&content).map_err(|e| DrydockError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        validate(&config).map_err(|reason| DrydockError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!("Loaded {} service(s) from {}", config.services.len(), path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> DrydockResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            DrydockError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> DrydockResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DrydockError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

/// Reject configurations the pipeline cannot run
/// Resolve `path` against the working directory. Engine bind mounts need
/// absolute host paths.
pub fn absolute_dir(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn validate(config: &Config) -> Result<(), String> {
    if config.services.is_empty() {
        return Err("at least one [[service]] is required".to_string());
    }

    let mut seen: Vec<&str> = Vec::new();
    for service in &config.services {
        if service.name.is_empty() || service.binary.is_empty() {
            return Err("every service needs a name and a binary".to_string());
        }
        if seen.contains(&service.name.as_str()) {
            return Err(format!("duplicate service name: {}", service.name));
        }
        seen.push(&service.name);

        if service.assets.is_some() && !config.assets.enabled {
            return Err(format!(
                "service {} mounts assets but [assets] is disabled",
                service.name
            ));
        }
    }

    for (name, command) in [
        ("toolchain.recipe_command", &config.toolchain.recipe_command),
        ("toolchain.cook_command", &config.toolchain.cook_command),
        ("toolchain.build_command", &config.toolchain.build_command),
        ("toolchain.test_command", &config.toolchain.test_command),
    ] {
        if command.is_empty() {
            return Err(format!("{} must not be empty", name));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::for_project(temp.path());

        let config = manager.load().await.unwrap();
        assert_eq!(config.engine.binary, "podman");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::for_project(temp.path());

        let mut config = Config::default();
        config.release.registry = "registry.test/acme".to_string();

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.release.registry, "registry.test/acme");
        assert_eq!(loaded.services, config.services);
    }

    #[tokio::test]
    async fn rejects_duplicate_services() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
[[service]]
name = "api"
binary = "api"

[[service]]
name = "api"
binary = "other"
"#,
        )
        .unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(err.to_string().contains("duplicate service name: api"));
    }

    #[test]
    fn finds_config_in_ancestor() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE_NAME), "").unwrap();
        let nested = temp.path().join("crates").join("server");
        std::fs::create_dir_all(&nested).unwrap();

        let found = ConfigManager::find_local_config(&nested).unwrap();
        assert_eq!(found, temp.path().join(CONFIG_FILE_NAME));
        assert_eq!(ConfigManager::with_path(found).project_root(), temp.path());
    }

    #[test]
    fn bare_config_name_resolves_to_working_directory() {
        let root = ConfigManager::with_path(PathBuf::from(CONFIG_FILE_NAME)).project_root();
        assert!(root.is_absolute());
        assert_eq!(root, std::env::current_dir().unwrap());
    }

    #[test]
    fn relative_config_path_gives_absolute_root() {
        let root = ConfigManager::with_path(PathBuf::from("web").join(CONFIG_FILE_NAME))
            .project_root();
        assert_eq!(root, std::env::current_dir().unwrap().join("web"));
    }
}
