//! Shared engine types
//!
//! Data structures passed to container runtimes. Stage environments are
//! immutable values: every builder method returns a new `Environment`, so
//! concurrently running branches can derive from the same base without
//! sharing mutable state.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Where a mount comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountSource {
    /// Host directory or file (bind mount)
    Host(PathBuf),
    /// Named engine volume
    Volume(String),
}

/// A mount inside a stage container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: MountSource,
    /// Mount path inside the container
    pub target: String,
    pub readonly: bool,
}

impl Mount {
    /// Bind mount a host path
    pub fn host(path: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: MountSource::Host(path.into()),
            target: target.into(),
            readonly: false,
        }
    }

    /// Mount a named volume
    pub fn volume(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: MountSource::Volume(name.into()),
            target: target.into(),
            readonly: false,
        }
    }

    /// Same mount, read-only
    pub fn read_only(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Generate the `-v` argument for the engine
    pub fn volume_arg(&self) -> String {
        let source = match &self.source {
            MountSource::Host(path) => path.display().to_string(),
            MountSource::Volume(name) => name.clone(),
        };
        let ro = if self.readonly { ":ro" } else { "" };
        format!("{}:{}{}", source, self.target, ro)
    }
}

/// Environment a stage command runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    image: String,
    workdir: String,
    mounts: Vec<Mount>,
    env: BTreeMap<String, String>,
}

impl Environment {
    /// Bare environment on an image
    pub fn new(image: impl Into<String>, workdir: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            workdir: workdir.into(),
            mounts: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Add a mount; an existing mount at the same target is replaced
    pub fn with_mount(&self, mount: Mount) -> Self {
        let mut next = self.clone();
        next.mounts.retain(|m| m.target != mount.target);
        next.mounts.push(mount);
        next
    }

    /// Set an environment variable
    pub fn with_env(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.env.insert(key.into(), value.into());
        next
    }

    /// Change the working directory
    pub fn with_workdir(&self, workdir: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.workdir = workdir.into();
        next
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn workdir(&self) -> &str {
        &self.workdir
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Resolve a container path to the host path behind a bind mount.
    ///
    /// The deepest matching mount wins. Volume mounts have no host path.
    pub fn host_path(&self, container_path: &str) -> Option<PathBuf> {
        let wanted = Path::new(container_path);
        self.mounts
            .iter()
            .filter(|m| wanted.starts_with(&m.target))
            .max_by_key(|m| m.target.len())
            .and_then(|m| match &m.source {
                MountSource::Host(host) => {
                    let rest = wanted.strip_prefix(&m.target).ok()?;
                    if rest.as_os_str().is_empty() {
                        Some(host.clone())
                    } else {
                        Some(host.join(rest))
                    }
                }
                MountSource::Volume(_) => None,
            })
    }

    /// Engine arguments for `run --rm` of `command` in this environment
    pub fn run_args(&self, command: &[String]) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];

        args.push("-w".to_string());
        args.push(self.workdir.clone());

        for mount in &self.mounts {
            args.push("-v".to_string());
            args.push(mount.volume_arg());
        }

        for (k, v) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", k, v));
        }

        args.push(self.image.clone());
        args.extend(command.iter().cloned());
        args
    }
}

/// Result of a command run inside an environment
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Combined stdout and stderr lines, in arrival order
    pub output: Vec<String>,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Successful run with the given lines
    pub fn ok(lines: &[&str]) -> Self {
        Self {
            output: lines.iter().map(|l| l.to_string()).collect(),
            exit_code: 0,
        }
    }

    /// Failed run with the given exit code and lines
    pub fn failed(exit_code: i32, lines: &[&str]) -> Self {
        Self {
            output: lines.iter().map(|l| l.to_string()).collect(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Tail of the output suitable for an error message
    pub fn tail(&self) -> String {
        super::build_error_output(&self.output.join("\n"), "")
    }
}

/// Information about an engine volume
#[derive(Debug, Clone)]
pub struct VolumeInfo {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub mountpoint: Option<String>,
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_builders_return_new_values() {
        let base = Environment::new("rust:1.83", "/app");
        let derived = base
            .with_mount(Mount::host("/tmp/src", "/app").read_only())
            .with_env("CARGO_TARGET_DIR", "/app/target");

        assert!(base.mounts().is_empty());
        assert!(base.env().is_empty());
        assert_eq!(derived.mounts().len(), 1);
        assert_eq!(derived.env()["CARGO_TARGET_DIR"], "/app/target");
    }

    #[test]
    fn with_mount_replaces_same_target() {
        let env = Environment::new("img", "/app")
            .with_mount(Mount::host("/a", "/out"))
            .with_mount(Mount::host("/b", "/out"));
        assert_eq!(env.mounts().len(), 1);
        assert_eq!(env.mounts()[0].source, MountSource::Host(PathBuf::from("/b")));
    }

    #[test]
    fn mount_volume_arg() {
        let mount = Mount::volume("drydock-cache-build-artifacts", "/app/target");
        assert_eq!(mount.volume_arg(), "drydock-cache-build-artifacts:/app/target");

        let mount = Mount::host("/run/src", "/app").read_only();
        assert_eq!(mount.volume_arg(), "/run/src:/app:ro");
    }

    #[test]
    fn host_path_prefers_deepest_mount() {
        let env = Environment::new("img", "/app")
            .with_mount(Mount::host("/run/out", "/out"))
            .with_mount(Mount::host("/run/bin", "/out/bin"))
            .with_mount(Mount::volume("cache", "/app/target"));

        assert_eq!(
            env.host_path("/out/recipe.json"),
            Some(PathBuf::from("/run/out/recipe.json"))
        );
        assert_eq!(
            env.host_path("/out/bin/server"),
            Some(PathBuf::from("/run/bin/server"))
        );
        assert_eq!(env.host_path("/app/target/release/server"), None);
        assert_eq!(env.host_path("/etc/passwd"), None);
    }

    #[test]
    fn run_args_layout() {
        let env = Environment::new("drydock-toolchain-abc", "/app")
            .with_mount(Mount::host("/run/src", "/app").read_only())
            .with_env("A", "1");
        let args = env.run_args(&["cargo".to_string(), "build".to_string()]);

        assert_eq!(
            args,
            vec![
                "run",
                "--rm",
                "-w",
                "/app",
                "-v",
                "/run/src:/app:ro",
                "-e",
                "A=1",
                "drydock-toolchain-abc",
                "cargo",
                "build"
            ]
        );
    }
}
