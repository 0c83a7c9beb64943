//! Container runtime driving an engine CLI (podman or docker)
//!
//! Every operation shells out to the configured engine binary through
//! `tokio::process`. Stage commands are streamed line by line into the
//! debug log so `-vv` shows compiler and package-manager output live.

use crate::error::{DrydockError, DrydockResult};
use crate::image::Image;
use crate::orchestration::podman::{CommandOutput, Environment, VolumeInfo};
use crate::orchestration::runtime::ContainerRuntime;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

/// Container runtime backed by an engine CLI on the host
pub struct CliEngineRuntime {
    binary: String,
    /// Local builds keyed by local tag; each image is built at most once
    /// no matter how many release tasks reference it
    materialized: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl CliEngineRuntime {
    /// Create a runtime for the given engine binary
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            materialized: Mutex::new(HashMap::new()),
        }
    }

    /// Engine binary this runtime calls
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Check if the engine binary is installed
    async fn engine_installed(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Execute an engine command and return the output
    async fn run(&self, args: &[&str]) -> DrydockResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.binary, args);

        Command::new(&self.binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DrydockError::command_failed(format!("{} {:?}", self.binary, args), e))
    }

    /// Execute an engine command, streaming output into the debug log
    async fn run_streaming(&self, args: &[String]) -> DrydockResult<CommandOutput> {
        debug!("Executing: {} {:?}", self.binary, args);

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DrydockError::command_failed(format!("{} {}", self.binary, args[0]), e))?;

        let output = super::stream_child_output(&mut child, &|line| debug!("  {}", line)).await;

        let status = child
            .wait()
            .await
            .map_err(|e| DrydockError::command_failed(format!("{} {}", self.binary, args[0]), e))?;

        Ok(CommandOutput {
            output,
            exit_code: status.code().unwrap_or(-1),
        })
    }

    /// Fail with the command's stderr unless it succeeded
    fn check(&self, what: &str, output: &std::process::Output) -> DrydockResult<()> {
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DrydockError::command_exec(
                format!("{} {}", self.binary, what),
                stderr,
            ))
        }
    }

    /// Build an image from a generated context, removing the context afterwards
    async fn build_from_context(&self, image: &Image) -> DrydockResult<String> {
        let tag = image.local_tag();
        let build_dir = super::scratch_build_dir().await?;

        let result = async {
            image.write_context(&build_dir)?;
            self.build_image(&build_dir, &tag).await
        }
        .await;

        // Clean up build directory (best-effort)
        let _ = tokio::fs::remove_dir_all(&build_dir).await;

        result?;
        info!("Built {}", tag);
        Ok(tag)
    }
}

#[async_trait]
impl ContainerRuntime for CliEngineRuntime {
    async fn is_available(&self) -> DrydockResult<bool> {
        if !self.engine_installed().await {
            return Ok(false);
        }
        let output = self.run(&["info"]).await?;
        Ok(output.status.success())
    }

    async fn ensure_ready(&self) -> DrydockResult<()> {
        if !self.engine_installed().await {
            return Err(DrydockError::EngineNotFound(self.binary.clone()));
        }

        let output = self.run(&["info"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DrydockError::EngineUnavailable {
                reason: stderr.trim().to_string(),
            });
        }

        Ok(())
    }

    async fn image_exists(&self, image: &str) -> DrydockResult<bool> {
        // `image inspect` works on both podman and docker
        let output = self.run(&["image", "inspect", image]).await?;
        Ok(output.status.success())
    }

    async fn pull(&self, image: &str) -> DrydockResult<()> {
        info!("Pulling image: {}", image);

        let output = self.run(&["pull", image]).await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DrydockError::ImagePull {
                image: image.to_string(),
                reason: stderr.to_string(),
            })
        }
    }

    async fn build_image(&self, context_dir: &Path, tag: &str) -> DrydockResult<()> {
        let context = context_dir.display().to_string();
        let dockerfile = context_dir.join("Dockerfile").display().to_string();
        let args: Vec<String> = ["build", "-t", tag, "-f", &dockerfile, &context]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result = self.run_streaming(&args).await?;
        if !result.success() {
            return Err(DrydockError::ImageBuild {
                tag: tag.to_string(),
                reason: result.tail(),
            });
        }

        Ok(())
    }

    async fn exec(&self, env: &Environment, command: &[String]) -> DrydockResult<CommandOutput> {
        if !self.image_exists(env.image()).await? {
            self.pull(env.image()).await?;
        }

        let result = self.run_streaming(&env.run_args(command)).await?;
        debug!(
            "{:?} exited with {} ({} line(s))",
            command.first(),
            result.exit_code,
            result.output.len()
        );
        Ok(result)
    }

    async fn volume_exists(&self, name: &str) -> DrydockResult<bool> {
        let output = self.run(&["volume", "inspect", name]).await?;
        Ok(output.status.success())
    }

    async fn volume_create(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
    ) -> DrydockResult<()> {
        if self.volume_exists(name).await? {
            return Ok(());
        }
        debug!("Creating volume: {}", name);

        let mut args = vec!["volume", "create"];

        // Build label arguments
        let label_strings: Vec<String> =
            labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        for label in &label_strings {
            args.push("--label");
            args.push(label);
        }
        args.push(name);

        let output = self.run(&args).await?;
        if output.status.success() {
            debug!("Volume created: {}", name);
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DrydockError::CacheVolumeCreate {
                name: name.to_string(),
                reason: stderr.trim().to_string(),
            })
        }
    }

    async fn volume_list(&self, prefix: &str) -> DrydockResult<Vec<VolumeInfo>> {
        let output = self
            .run(&["volume", "ls", "--format", "{{json .}}"])
            .await?;
        self.check("volume ls", &output)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_volume_list(&stdout)?
            .into_iter()
            .filter(|v| v.name.starts_with(prefix))
            .collect())
    }

    async fn volume_remove(&self, name: &str) -> DrydockResult<()> {
        debug!("Removing volume: {}", name);

        let output = self.run(&["volume", "rm", "-f", name]).await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        // Ignore "no such volume" errors
        if stderr.to_lowercase().contains("no such volume") {
            Ok(())
        } else {
            Err(DrydockError::command_exec(
                format!("{} volume rm", self.binary),
                stderr,
            ))
        }
    }

    async fn materialize(&self, image: &Image) -> DrydockResult<String> {
        let cell = {
            let mut builds = self.materialized.lock().await;
            builds
                .entry(image.local_tag())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_try_init(|| self.build_from_context(image))
            .await
            .cloned()
    }

    async fn push(&self, image: &Image, reference: &str) -> DrydockResult<String> {
        let local = self.materialize(image).await?;

        let output = self.run(&["tag", &local, reference]).await?;
        self.check("tag", &output)?;

        let args = vec!["push".to_string(), reference.to_string()];
        let result = self.run_streaming(&args).await?;
        if !result.success() {
            return Err(DrydockError::command_exec(
                format!("{} push {}", self.binary, reference),
                result.tail(),
            ));
        }

        let resolved = match parse_digest(&result.output) {
            Some(digest) => format!("{}@{}", reference, digest),
            None => reference.to_string(),
        };
        debug!("Pushed {}", resolved);
        Ok(resolved)
    }

    fn runtime_name(&self) -> &'static str {
        match self.binary.rsplit('/').next() {
            Some("docker") => "Docker",
            Some("podman") => "Podman",
            _ => "Container engine",
        }
    }
}

/// Parse `volume ls` output.
///
/// Podman prints a JSON array; docker prints one JSON object per line with
/// labels as a `k=v,k=v` string. Both shapes are accepted.
fn parse_volume_list(stdout: &str) -> DrydockResult<Vec<VolumeInfo>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<serde_json::Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?
    };

    Ok(values
        .iter()
        .filter_map(|vol| {
            let name = vol["Name"].as_str()?;
            let labels = match &vol["Labels"] {
                serde_json::Value::Object(obj) => obj
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect(),
                serde_json::Value::String(s) => s
                    .split(',')
                    .filter_map(|pair| pair.split_once('='))
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                _ => HashMap::new(),
            };
            Some(VolumeInfo {
                name: name.to_string(),
                labels,
                mountpoint: vol["Mountpoint"].as_str().map(String::from),
                created_at: vol["CreatedAt"].as_str().map(String::from),
            })
        })
        .collect())
}

/// Find the pushed manifest digest in push output
fn parse_digest(output: &[String]) -> Option<String> {
    output.iter().rev().find_map(|line| {
        let start = line.find("sha256:")?;
        let hex: String = line[start + 7..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        (hex.len() == 64).then(|| format!("sha256:{}", hex))
    })
}
