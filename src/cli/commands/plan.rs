//! Plan command - show what a run would do

use crate::cli::args::{OutputFormat, PlanArgs};
use crate::config::{Config, ServiceConfig};
use crate::error::DrydockResult;
use crate::image::Image;
use crate::release::{plan_tasks, ReleaseMode, ReleaseTask, RunOptions};
use crate::ui::{self, UiContext};
use serde::Serialize;

const NATIVE_STAGES: &[&str] = &[
    "prepare",
    "recipe-extraction",
    "dependency-precompute",
    "full-build",
    "test",
];

const ASSET_STAGES: &[&str] = &["asset-prepare", "asset-fetch", "asset-build"];

/// A run, resolved without touching the engine
#[derive(Debug, Serialize)]
struct Plan<'a> {
    mode: ReleaseMode,
    tags: Vec<String>,
    native: Vec<&'static str>,
    assets: Vec<&'static str>,
    /// Post-processing waits for this binary from `full-build`
    helper: Option<&'a str>,
    binaries: Vec<String>,
    services: &'a [ServiceConfig],
    tasks: Vec<ReleaseTask>,
}

/// Execute the plan command
pub async fn execute(args: PlanArgs, config: &Config) -> DrydockResult<()> {
    let version = args
        .release_version
        .unwrap_or_else(|| config.release.version.clone());
    let options = RunOptions::new(args.publish || config.release.publish, &version)?;
    let plan = build_plan(config, &options);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Table => print_plan(&UiContext::detect(), &plan),
    }
    Ok(())
}

fn build_plan<'a>(config: &'a Config, options: &RunOptions) -> Plan<'a> {
    let images: Vec<Image> = config
        .services
        .iter()
        .map(|service| {
            let base = service
                .base_image
                .as_deref()
                .unwrap_or(&config.release.base_image);
            Image::new(&service.name, base, "plan")
        })
        .collect();

    let tasks = plan_tasks(&config.release.registry, &images, options);

    let assets_enabled = config.assets.enabled;
    let helper = assets_enabled
        .then_some(config.assets.helper.as_deref())
        .flatten();
    let mut assets = if assets_enabled {
        ASSET_STAGES.to_vec()
    } else {
        Vec::new()
    };
    if helper.is_some() {
        assets.push("asset-postprocess");
    }

    Plan {
        mode: options.mode,
        tags: options.tags.iter().map(str::to_string).collect(),
        native: NATIVE_STAGES.to_vec(),
        assets,
        helper,
        binaries: config.required_binaries(),
        services: &config.services,
        tasks,
    }
}

fn print_plan(ctx: &UiContext, plan: &Plan<'_>) {
    ui::intro(ctx, &format!("drydock plan ({})", plan.mode));

    ui::section(ctx, "Stages");
    ui::key_value(ctx, "native", &plan.native.join(" -> "));
    if !plan.assets.is_empty() {
        ui::key_value(ctx, "assets", &plan.assets.join(" -> "));
    }
    if let Some(helper) = plan.helper {
        ui::remark(
            ctx,
            &format!("asset-postprocess waits for {} from full-build", helper),
        );
    }
    ui::key_value(ctx, "then", "assemble -> release");
    ui::key_value(ctx, "binaries", &plan.binaries.join(", "));

    ui::section(ctx, "Services");
    for service in plan.services {
        let mut detail = format!("binary {}", service.binary);
        if let Some(mount) = &service.assets {
            detail.push_str(&format!(", assets at {}", mount));
        }
        if !service.ports.is_empty() {
            let ports: Vec<String> = service.ports.iter().map(u16::to_string).collect();
            detail.push_str(&format!(", ports {}", ports.join(",")));
        }
        ui::step_ok_detail(ctx, &service.name, &detail);
    }

    ui::section(ctx, &format!("Release tasks ({})", plan.tasks.len()));
    for task in &plan.tasks {
        ui::key_value(ctx, &task.image, &task.destination.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::Destination;

    #[test]
    fn publish_plan_has_one_task_per_image_and_tag() {
        let config = Config::default();
        let options = RunOptions::new(true, "v1.2.3").unwrap();

        let plan = build_plan(&config, &options);

        assert_eq!(plan.tasks.len(), 8);
        assert_eq!(plan.tags, vec!["v1.2.3", "latest"]);
        assert!(plan.tasks.iter().any(|t| t.destination
            == Destination::Registry {
                reference: "ghcr.io/example/importer:v1.2.3".to_string(),
                tag: "v1.2.3".to_string(),
            }));
    }

    #[test]
    fn verify_plan_releases_locally() {
        let config = Config::default();
        let options = RunOptions::new(false, "latest").unwrap();

        let plan = build_plan(&config, &options);

        assert_eq!(plan.tasks.len(), 4);
        assert!(plan.tasks.iter().all(|t| t.destination == Destination::Local));
    }

    #[test]
    fn disabled_assets_drop_asset_stages() {
        let mut config = Config::default();
        config.assets.enabled = false;
        let options = RunOptions::new(false, "latest").unwrap();

        let plan = build_plan(&config, &options);

        assert!(plan.assets.is_empty());
        assert!(plan.helper.is_none());
        assert!(!plan.binaries.contains(&"precompress".to_string()));
    }

    #[test]
    fn plan_needs_no_engine() {
        let mut config = Config::default();
        config.engine.binary = "/nonexistent/engine".to_string();
        let options = RunOptions::new(true, "v2.0.0").unwrap();

        let plan = build_plan(&config, &options);

        assert_eq!(plan.tasks.len(), 8);
        assert_eq!(plan.tasks[0].destination.to_string(), "ghcr.io/example/web:v2.0.0");
    }
}
