//! Orchestration module for container engines
//!
//! Every stage of the pipeline runs inside a container. This module holds
//! the engine-facing types, the `ContainerRuntime` trait, and the CLI
//! engine implementation used in production.

mod engine;
mod factory;
#[cfg(test)]
pub mod fake;
pub mod podman;
mod runtime;

pub use engine::CliEngineRuntime;
pub use factory::{create_runtime, Platform};
pub use podman::{CommandOutput, Environment, Mount, MountSource, VolumeInfo};
pub use runtime::ContainerRuntime;

use crate::error::{DrydockError, DrydockResult};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Max number of output lines to include in stage error messages.
const BUILD_ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of stage output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `BUILD_ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn build_error_output(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > BUILD_ERROR_TAIL_LINES {
        lines[total - BUILD_ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

/// Create a fresh, uniquely named build context directory.
///
/// Lives under `~/.local/share/drydock/builds/` so a VM-backed engine that
/// only mounts the user home can still read it. Callers remove it after
/// the build.
pub(crate) async fn scratch_build_dir() -> DrydockResult<PathBuf> {
    let builds_dir = dirs::data_local_dir()
        .ok_or_else(|| DrydockError::Internal("Could not determine data directory".to_string()))?
        .join("drydock")
        .join("builds");

    let build_dir = builds_dir.join(uuid::Uuid::new_v4().to_string());
    tokio::fs::create_dir_all(&build_dir)
        .await
        .map_err(|e| DrydockError::io("creating build directory", e))?;
    Ok(build_dir)
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting. This is a standalone
/// async function (not behind `async_trait`) to avoid lifetime issues with the
/// `dyn Fn` callback.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> Vec<String> {
    let mut stderr_reader = child.stderr.take().map(|s| BufReader::new(s).lines());
    let mut stdout_reader = child.stdout.take().map(|s| BufReader::new(s).lines());

    let mut all_output = Vec::new();
    let mut stderr_done = stderr_reader.is_none();
    let mut stdout_done = stdout_reader.is_none();

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = next_line(&mut stderr_reader), if !stderr_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stderr_done = true,
                }
            }
            line = next_line(&mut stdout_reader), if !stdout_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stdout_done = true,
                }
            }
        }
    }

    all_output
}

async fn next_line<R>(reader: &mut Option<tokio::io::Lines<BufReader<R>>>) -> Option<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match reader {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_output_keeps_tail() {
        let stdout: String = (0..80).map(|i| format!("line {}\n", i)).collect();
        let tail = build_error_output(&stdout, "error: boom");
        let lines: Vec<&str> = tail.lines().collect();

        assert_eq!(lines.len(), BUILD_ERROR_TAIL_LINES);
        assert_eq!(lines.last(), Some(&"error: boom"));
        assert!(!tail.contains("line 0\n"));
    }

    #[test]
    fn build_error_output_short_input_untouched() {
        assert_eq!(build_error_output("a\nb", "c"), "a\nb\nc");
    }

    #[tokio::test]
    async fn stream_child_output_collects_both_streams() {
        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "echo out; echo err 1>&2"])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .unwrap();

        let seen = std::sync::Mutex::new(Vec::new());
        let lines = stream_child_output(&mut child, &|line| seen.lock().unwrap().push(line)).await;
        child.wait().await.unwrap();

        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"out".to_string()));
        assert!(lines.contains(&"err".to_string()));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
