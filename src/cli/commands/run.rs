//! Run command - build, test, assemble and release

use crate::cache::CacheOutcome;
use crate::cli::args::RunArgs;
use crate::config::{absolute_dir, Config, ConfigManager};
use crate::error::{DrydockError, DrydockResult};
use crate::orchestration::create_runtime;
use crate::pipeline::{Pipeline, PipelineOutcome, PipelineState};
use crate::release::{Destination, ReleaseLog, ReleaseMode, RunOptions, TaskOutcome};
use crate::ui::{self, StageProgress, UiContext};
use tracing::debug;

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config, manager: &ConfigManager) -> DrydockResult<()> {
    let ctx = UiContext::detect();
    let mut config = config.clone();
    if args.sequential {
        config.pipeline.concurrent_branches = false;
    }

    let project_root = args
        .project
        .as_deref()
        .map(absolute_dir)
        .unwrap_or_else(|| manager.project_root());
    let version = args
        .release_version
        .clone()
        .unwrap_or_else(|| config.release.version.clone());
    let options = RunOptions::new(args.publish || config.release.publish, &version)?;

    let runtime = create_runtime(&config)?;
    debug!("Using engine: {}", runtime.runtime_name());

    let stages = if config.assets.enabled { 6 } else { 5 };
    let pipeline = Pipeline::new(config, &project_root, runtime, options.clone());

    ui::intro(&ctx, &format!("drydock run {}", pipeline.run_id()));
    ui::key_value(&ctx, "project", &project_root.display().to_string());
    ui::key_value(&ctx, "mode", &options.mode.to_string());
    if options.mode == ReleaseMode::Publish {
        ui::key_value(&ctx, "tags", &options.tags.to_string());
    }

    let progress = StageProgress::new(&ctx, "pipeline", stages);
    let outcome = pipeline.with_observer(progress.observer()).run().await;
    progress.finish();

    report(&ctx, &outcome);
    finish(&ctx, outcome, args.allow_partial)
}

fn report(ctx: &UiContext, outcome: &PipelineOutcome) {
    if !outcome.cache.is_empty() {
        ui::section(ctx, "Caches");
        for (kind, result) in &outcome.cache {
            let value = match result {
                CacheOutcome::Hit => "hit",
                CacheOutcome::Warmed => "warmed",
            };
            ui::key_value_status(ctx, kind.id(), value, *result == CacheOutcome::Hit);
        }
    }

    if let Some(tests) = &outcome.test_report {
        ui::section(ctx, "Tests");
        for line in tests.summary() {
            ui::step_info(ctx, line.trim());
        }
        ui::remark(ctx, &format!("finished in {:.1?}", tests.duration));
    }

    if let Some(release) = &outcome.release {
        ui::section(ctx, &format!("Release ({})", release.mode));
        for task in &release.outcomes {
            match release_line(task) {
                Ok(resolved) => ui::step_ok_detail(ctx, &task.task.image, &resolved),
                Err(failure) => ui::step_error_detail(ctx, &task.task.image, &failure),
            }
        }
        let log = ReleaseLog::new(&outcome.run_dir);
        ui::remark(ctx, &format!("release log: {}", log.path().display()));
    }
}

/// Resolved reference of a settled task, or its failure message
fn release_line(task: &TaskOutcome) -> Result<String, String> {
    match task.error() {
        Some(err) => Err(err.to_string()),
        None => Ok(task.result.clone().unwrap_or_default()),
    }
}

/// Map the final state to the process result
fn finish(ctx: &UiContext, outcome: PipelineOutcome, allow_partial: bool) -> DrydockResult<()> {
    match outcome.state {
        PipelineState::Done => {
            let release = outcome.release.as_ref();
            let published = release
                .map(|r| {
                    r.succeeded()
                        .filter(|t| matches!(t.task.destination, Destination::Registry { .. }))
                        .count()
                })
                .unwrap_or(0);
            let message = if published > 0 {
                format!("Published {} image reference(s)", published)
            } else {
                format!("Verified {} image(s)", outcome.images.len())
            };
            ui::outro_success(ctx, &message);
            Ok(())
        }
        PipelineState::PartiallyFailed => {
            let Some(release) = outcome.release else {
                return Err(DrydockError::Internal(
                    "partially failed run without a release report".to_string(),
                ));
            };
            let failed = release.failed().count();
            ui::outro_warn(
                ctx,
                &format!("{} of {} release task(s) failed", failed, release.total()),
            );
            if allow_partial {
                Ok(())
            } else {
                release.into_result().map(|_| ())
            }
        }
        _ => {
            ui::outro_error(ctx, &format!("Run {} failed", outcome.run_id));
            Err(outcome
                .error
                .unwrap_or_else(|| DrydockError::Internal(format!("run ended in {}", outcome.state))))
        }
    }
}
