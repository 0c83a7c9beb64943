//! Cache command - inspect and clear the persistent caches

use crate::cache::{labels, CacheKind, CacheLedger, LEDGER_FILE, VOLUME_PREFIX};
use crate::cli::args::{CacheAction, CacheArgs, CacheKindArg, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::DrydockResult;
use crate::orchestration::{create_runtime, ContainerRuntime};
use crate::pipeline::state_dir;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;

/// One cache volume joined with its ledger entry
#[derive(Debug, Serialize)]
struct CacheRow {
    volume: String,
    kind: String,
    key: Option<String>,
    state: Option<String>,
    updated_at: Option<String>,
}

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config, manager: &ConfigManager) -> DrydockResult<()> {
    let runtime = create_runtime(config)?;
    runtime.ensure_ready().await?;
    let ledger_path = state_dir(config, &manager.project_root()).join(LEDGER_FILE);

    match args.action {
        CacheAction::List { format } => {
            let ledger = CacheLedger::load(&ledger_path).await?;
            let rows = cache_rows(runtime.as_ref(), &ledger).await?;
            match format {
                OutputFormat::Table => print_table(&rows),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
            }
            Ok(())
        }
        CacheAction::Clear { kind, yes } => {
            let ctx = UiContext::detect().with_auto_yes(yes);
            let kinds = selected(kind);
            let names: Vec<String> = kinds.iter().map(|k| k.volume_name()).collect();

            if !ui::confirm(&ctx, &format!("Remove {}?", names.join(", ")), false).await? {
                ui::remark(&ctx, "Nothing removed");
                return Ok(());
            }

            let mut ledger = CacheLedger::load(&ledger_path).await?;
            clear(runtime.as_ref(), &mut ledger, &kinds).await?;
            for name in &names {
                ui::step_ok(&ctx, &format!("Removed {}", name));
            }
            Ok(())
        }
    }
}

fn selected(kind: Option<CacheKindArg>) -> Vec<CacheKind> {
    match kind {
        Some(CacheKindArg::DependencyStore) => vec![CacheKind::DependencyStore],
        Some(CacheKindArg::BuildArtifacts) => vec![CacheKind::BuildArtifacts],
        None => CacheKind::ALL.to_vec(),
    }
}

async fn cache_rows(
    runtime: &dyn ContainerRuntime,
    ledger: &CacheLedger,
) -> DrydockResult<Vec<CacheRow>> {
    let volumes = runtime.volume_list(VOLUME_PREFIX).await?;

    Ok(volumes
        .into_iter()
        .map(|volume| {
            let entry = ledger.entry(&volume.name);
            CacheRow {
                kind: volume
                    .labels
                    .get(labels::KIND)
                    .cloned()
                    .unwrap_or_else(|| volume.name.trim_start_matches(VOLUME_PREFIX).to_string()),
                key: entry.map(|e| e.key.clone()),
                state: entry.map(|e| e.state.to_string()),
                updated_at: entry.map(|e| e.updated_at.to_rfc3339()),
                volume: volume.name,
            }
        })
        .collect())
}

/// Remove the volumes first, then forget their keys
async fn clear(
    runtime: &dyn ContainerRuntime,
    ledger: &mut CacheLedger,
    kinds: &[CacheKind],
) -> DrydockResult<()> {
    for kind in kinds {
        let name = kind.volume_name();
        runtime.volume_remove(&name).await?;
        ledger.forget(&name);
    }
    ledger.save().await
}

fn print_table(rows: &[CacheRow]) {
    if rows.is_empty() {
        println!("No cache volumes found.");
        return;
    }

    println!(
        "{:<32} {:<18} {:<14} {:<10}",
        "VOLUME", "KIND", "KEY", "STATE"
    );
    println!("{}", "-".repeat(76));

    for row in rows {
        let state = match row.state.as_deref() {
            Some("complete") => style("complete").green().to_string(),
            Some(other) => style(other).yellow().to_string(),
            None => style("unknown").dim().to_string(),
        };
        println!(
            "{:<32} {:<18} {:<14} {:<10}",
            row.volume,
            row.kind,
            row.key.as_deref().unwrap_or("-"),
            state
        );
    }

    println!();
    println!("Total: {} cache(s)", rows.len());
}
