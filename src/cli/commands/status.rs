//! Status command - engine health and recent runs

use crate::cache::{CacheLedger, CacheState, LEDGER_FILE};
use crate::config::{Config, ConfigManager};
use crate::error::{DrydockError, DrydockResult};
use crate::orchestration::{create_runtime, Platform};
use crate::pipeline::state_dir;
use crate::release::REPORT_FILE;
use crate::ui::{self, TaskSpinner, UiContext};
use std::path::{Path, PathBuf};

/// Runs shown by `status`
const RECENT_RUNS: usize = 5;

/// Execute the status command
pub async fn execute(config: &Config, manager: &ConfigManager) -> DrydockResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "drydock status");

    ui::section(&ctx, "Engine");
    ui::key_value(&ctx, "platform", Platform::detect().name());
    ui::key_value(&ctx, "binary", &config.engine.binary);

    let runtime = create_runtime(config)?;
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Checking {}...", config.engine.binary));
    let engine_ok = match runtime.is_available().await {
        Ok(true) => {
            spinner.stop(&format!("{} is ready", runtime.runtime_name()));
            true
        }
        Ok(false) => {
            spinner.stop_error(&format!("{} is not usable", config.engine.binary));
            false
        }
        Err(e) => {
            spinner.stop_error(&e.to_string());
            false
        }
    };

    let root = manager.project_root();
    let state = state_dir(config, &root);
    ui::section(&ctx, "Project");
    ui::key_value_status(
        &ctx,
        "config",
        &manager.path().display().to_string(),
        manager.path().is_file(),
    );
    ui::key_value(&ctx, "state", &state.display().to_string());
    ui::key_value(&ctx, "services", &config.services.len().to_string());

    let ledger = CacheLedger::load(&state.join(LEDGER_FILE)).await?;
    ui::section(&ctx, "Caches");
    let mut any = false;
    for (volume, entry) in ledger.entries() {
        any = true;
        ui::key_value_status(
            &ctx,
            volume,
            &format!("{} ({})", entry.key, entry.state),
            entry.state == CacheState::Complete,
        );
    }
    if !any {
        ui::remark(&ctx, "no cache has been warmed yet");
    }

    ui::section(&ctx, "Recent runs");
    let runs = recent_runs(&state.join("runs"), RECENT_RUNS)?;
    if runs.is_empty() {
        ui::remark(&ctx, "no runs yet");
    }
    for run in &runs {
        match release_counts(&run.join(REPORT_FILE)) {
            Some((ok, 0)) => {
                ui::step_ok_detail(&ctx, &file_name(run), &format!("{} released", ok))
            }
            Some((ok, failed)) => ui::step_error_detail(
                &ctx,
                &file_name(run),
                &format!("{} released, {} failed", ok, failed),
            ),
            None => ui::step_warn_hint(&ctx, &file_name(run), "nothing released"),
        }
    }

    if engine_ok {
        ui::outro_success(&ctx, "Ready to run");
    } else {
        ui::outro_warn(&ctx, "The container engine is not usable");
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Newest run directories first; run ids sort by start time
fn recent_runs(runs_dir: &Path, limit: usize) -> DrydockResult<Vec<PathBuf>> {
    if !runs_dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(runs_dir)
        .map_err(|e| DrydockError::io(format!("listing {}", runs_dir.display()), e))?;
    let mut runs: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    runs.sort();
    runs.reverse();
    runs.truncate(limit);
    Ok(runs)
}

/// `(ok, failed)` task counts of a release report, `None` if there is none
fn release_counts(report: &Path) -> Option<(usize, usize)> {
    let content = std::fs::read_to_string(report).ok()?;
    let mut counts = (0, 0);
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        match value["status"].as_str() {
            Some("ok") => counts.0 += 1,
            Some(_) => counts.1 += 1,
            None => {}
        }
    }
    Some(counts)
}
