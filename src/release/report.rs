//! Release report
//!
//! Writes one JSON line per release task to `<run dir>/release.jsonl`, so
//! a partially failed run can be inspected and its failed pushes re-run.

use crate::release::executor::{ReleaseReport, TaskOutcome};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// File name of the report inside a run directory
pub const REPORT_FILE: &str = "release.jsonl";

/// Appends release outcomes as JSON lines
pub struct ReleaseLog {
    path: PathBuf,
}

impl ReleaseLog {
    pub fn new(run_dir: &Path) -> Self {
        Self {
            path: run_dir.join(REPORT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record every outcome of a release.
    ///
    /// IO failures are logged and swallowed; the report never changes the
    /// outcome of a run.
    pub async fn write(&self, report: &ReleaseReport) {
        let mut lines = String::new();
        for outcome in &report.outcomes {
            match serde_json::to_string(&entry(report, outcome)) {
                Ok(line) => {
                    lines.push_str(&line);
                    lines.push('\n');
                }
                Err(e) => warn!("Failed to serialize release outcome: {}", e),
            }
        }

        if let Err(e) = self.append(&lines).await {
            warn!("Failed to write release report: {}", e);
        }
    }

    async fn append(&self, lines: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn entry(report: &ReleaseReport, outcome: &TaskOutcome) -> serde_json::Value {
    let (status, detail) = match &outcome.result {
        Ok(resolved) => ("ok", serde_json::json!({ "resolved": resolved })),
        Err(reason) => ("failed", serde_json::json!({ "reason": reason })),
    };

    serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "mode": report.mode,
        "image": outcome.task.image,
        "destination": outcome.task.destination,
        "status": status,
        "detail": detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::executor::{Destination, ReleaseMode, ReleaseTask};
    use tempfile::TempDir;

    fn report() -> ReleaseReport {
        ReleaseReport {
            mode: ReleaseMode::Publish,
            outcomes: vec![
                TaskOutcome {
                    task: ReleaseTask {
                        image: "web".to_string(),
                        destination: Destination::Registry {
                            reference: "ghcr.io/acme/web:latest".to_string(),
                            tag: "latest".to_string(),
                        },
                    },
                    result: Ok("ghcr.io/acme/web:latest@sha256:00".to_string()),
                },
                TaskOutcome {
                    task: ReleaseTask {
                        image: "importer".to_string(),
                        destination: Destination::Registry {
                            reference: "ghcr.io/acme/importer:latest".to_string(),
                            tag: "latest".to_string(),
                        },
                    },
                    result: Err("denied".to_string()),
                },
            ],
        }
    }

    #[tokio::test]
    async fn writes_one_line_per_task() {
        let dir = TempDir::new().unwrap();
        let log = ReleaseLog::new(dir.path());

        log.write(&report()).await;

        let content = tokio::fs::read_to_string(log.path()).await.unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["status"], "ok");
        assert_eq!(lines[0]["mode"], "publish");
        assert_eq!(lines[0]["destination"]["kind"], "registry");
        assert_eq!(lines[1]["image"], "importer");
        assert_eq!(lines[1]["detail"]["reason"], "denied");
        assert!(lines[1]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn appends_across_writes() {
        let dir = TempDir::new().unwrap();
        let log = ReleaseLog::new(dir.path());

        log.write(&report()).await;
        log.write(&report()).await;

        let content = tokio::fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(content.lines().count(), 4);
    }
}
