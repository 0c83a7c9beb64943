//! In-memory container runtime for tests
//!
//! Records every call in order and emulates the side effects stages rely
//! on: the recipe step writes its recipe file, `cp` drops files into bind
//! mounts, and the asset build produces a bundle. A hook can override any
//! exec to simulate failures.

use crate::error::{DrydockError, DrydockResult};
use crate::image::Image;
use crate::orchestration::podman::{CommandOutput, Environment, VolumeInfo};
use crate::orchestration::runtime::ContainerRuntime;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Overrides an exec; `None` falls through to the default behaviour
pub type ExecHook = Arc<dyn Fn(&Environment, &[String]) -> Option<CommandOutput> + Send + Sync>;

/// A recorded runtime call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Pull(String),
    BuildImage(String),
    Exec { image: String, command: Vec<String> },
    VolumeCreate(String),
    VolumeRemove(String),
    Materialize(String),
    Push(String),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    images: HashSet<String>,
    volumes: HashMap<String, HashMap<String, String>>,
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<State>,
    hook: Option<ExecHook>,
    failing_pushes: HashSet<String>,
    failing_materializations: HashSet<String>,
    fail_builds: bool,
    push_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(
        mut self,
        hook: impl Fn(&Environment, &[String]) -> Option<CommandOutput> + Send + Sync + 'static,
    ) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Pushes to this exact reference fail
    pub fn failing_push(mut self, reference: &str) -> Self {
        self.failing_pushes.insert(reference.to_string());
        self
    }

    /// Local builds of this image name fail
    pub fn failing_materialize(mut self, image: &str) -> Self {
        self.failing_materializations.insert(image.to_string());
        self
    }

    /// Every `build_image` fails
    pub fn failing_builds(mut self) -> Self {
        self.fail_builds = true;
        self
    }

    /// Hold each push open for a while so overlap can be observed
    pub fn with_push_delay(mut self, delay: Duration) -> Self {
        self.push_delay = Some(delay);
        self
    }

    /// Pretend an image already exists locally
    pub fn with_image(self, tag: &str) -> Self {
        self.lock().images.insert(tag.to_string());
        self
    }

    /// Pretend a volume already exists
    pub fn with_volume(self, name: &str) -> Self {
        self.lock().volumes.insert(name.to_string(), HashMap::new());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: Call) {
        self.lock().calls.push(call);
    }

    /// Every call in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Every exec'd command in order
    pub fn execs(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Exec { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Number of exec'd commands containing `word`
    pub fn exec_count(&self, word: &str) -> usize {
        self.execs()
            .iter()
            .filter(|cmd| cmd.iter().any(|a| a.contains(word)))
            .count()
    }

    /// Every pushed reference, including failed attempts
    pub fn pushes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Push(reference) => Some(reference),
                _ => None,
            })
            .collect()
    }

    /// Every materialized image name, including failed attempts
    pub fn materializations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Materialize(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Highest number of pushes observed running at once
    pub fn max_concurrent_pushes(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn default_exec(&self, env: &Environment, command: &[String]) -> CommandOutput {
        let is_prepare = command.iter().any(|a| a == "prepare");
        if is_prepare {
            if let Some(path) = arg_after(command, "--recipe-path").and_then(|p| env.host_path(p)) {
                write_file(&path, br#"{"skeleton":{"manifests":[]}}"#);
            }
        }

        if command.first().map(String::as_str) == Some("cp") && command.len() >= 3 {
            let dest = &command[command.len() - 1];
            if let Some(dest_dir) = env.host_path(dest) {
                for source in &command[1..command.len() - 1] {
                    if let Some(name) = Path::new(source).file_name() {
                        write_file(&dest_dir.join(name), b"\x7fELF");
                    }
                }
            }
        }

        if command.iter().any(|a| a.contains("run build")) {
            if let Some(workdir) = env.host_path(env.workdir()) {
                write_file(&workdir.join("dist").join("index.html"), b"<!doctype html>");
            }
        }

        if command.iter().any(|a| a == "test") {
            return CommandOutput::ok(&["test result: ok. 3 passed; 0 failed"]);
        }

        CommandOutput::ok(&[])
    }
}

fn arg_after<'a>(command: &'a [String], flag: &str) -> Option<&'a str> {
    command
        .iter()
        .position(|a| a == flag)
        .and_then(|i| command.get(i + 1))
        .map(String::as_str)
}

fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(path, contents);
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn is_available(&self) -> DrydockResult<bool> {
        Ok(true)
    }

    async fn ensure_ready(&self) -> DrydockResult<()> {
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> DrydockResult<bool> {
        Ok(self.lock().images.contains(image))
    }

    async fn pull(&self, image: &str) -> DrydockResult<()> {
        self.record(Call::Pull(image.to_string()));
        self.lock().images.insert(image.to_string());
        Ok(())
    }

    async fn build_image(&self, _context_dir: &Path, tag: &str) -> DrydockResult<()> {
        self.record(Call::BuildImage(tag.to_string()));
        if self.fail_builds {
            return Err(DrydockError::ImageBuild {
                tag: tag.to_string(),
                reason: "E: Unable to locate package".to_string(),
            });
        }
        self.lock().images.insert(tag.to_string());
        Ok(())
    }

    async fn exec(&self, env: &Environment, command: &[String]) -> DrydockResult<CommandOutput> {
        self.record(Call::Exec {
            image: env.image().to_string(),
            command: command.to_vec(),
        });

        if let Some(hook) = &self.hook {
            if let Some(output) = hook(env, command) {
                return Ok(output);
            }
        }
        Ok(self.default_exec(env, command))
    }

    async fn volume_exists(&self, name: &str) -> DrydockResult<bool> {
        Ok(self.lock().volumes.contains_key(name))
    }

    async fn volume_create(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
    ) -> DrydockResult<()> {
        self.record(Call::VolumeCreate(name.to_string()));
        self.lock()
            .volumes
            .entry(name.to_string())
            .or_insert_with(|| labels.clone());
        Ok(())
    }

    async fn volume_list(&self, prefix: &str) -> DrydockResult<Vec<VolumeInfo>> {
        let mut volumes: Vec<VolumeInfo> = self
            .lock()
            .volumes
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, labels)| VolumeInfo {
                name: name.clone(),
                labels: labels.clone(),
                mountpoint: None,
                created_at: None,
            })
            .collect();
        volumes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(volumes)
    }

    async fn volume_remove(&self, name: &str) -> DrydockResult<()> {
        self.record(Call::VolumeRemove(name.to_string()));
        self.lock().volumes.remove(name);
        Ok(())
    }

    async fn materialize(&self, image: &Image) -> DrydockResult<String> {
        self.record(Call::Materialize(image.name().to_string()));
        if self.failing_materializations.contains(image.name()) {
            return Err(DrydockError::ImageBuild {
                tag: image.local_tag(),
                reason: "COPY failed: file not found in build context".to_string(),
            });
        }
        Ok(image.local_tag())
    }

    async fn push(&self, _image: &Image, reference: &str) -> DrydockResult<String> {
        self.record(Call::Push(reference.to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.push_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_pushes.contains(reference) {
            return Err(DrydockError::command_exec(
                format!("push {}", reference),
                "denied: requested access to the resource is denied",
            ));
        }
        Ok(format!("{}@sha256:{}", reference, "0".repeat(64)))
    }

    fn runtime_name(&self) -> &'static str {
        "Fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::podman::Mount;
    use tempfile::TempDir;

    #[tokio::test]
    async fn cp_writes_into_bind_mount() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::new();
        let env = Environment::new("toolchain", "/app").with_mount(Mount::host(dir.path(), "/out/bin"));

        runtime
            .exec(
                &env,
                &[
                    "cp".to_string(),
                    "/app/target/release/server".to_string(),
                    "/out/bin/".to_string(),
                ],
            )
            .await
            .unwrap();

        assert!(dir.path().join("server").is_file());
        assert_eq!(runtime.execs().len(), 1);
    }

    #[tokio::test]
    async fn hook_overrides_exec() {
        let runtime = FakeRuntime::new().with_hook(|_, cmd| {
            (cmd.first().map(String::as_str) == Some("false")).then(|| CommandOutput::failed(1, &[]))
        });
        let env = Environment::new("img", "/");

        let out = runtime.exec(&env, &["false".to_string()]).await.unwrap();
        assert_eq!(out.exit_code, 1);
        let out = runtime.exec(&env, &["true".to_string()]).await.unwrap();
        assert!(out.success());
    }
}
