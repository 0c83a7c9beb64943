//! drydock - declarative build-and-release pipeline
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use drydock::cli::args::LogFormat;
use drydock::cli::{Cli, Commands};
use drydock::config::{Config, ConfigManager};
use drydock::error::{DrydockError, DrydockResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> DrydockResult<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| DrydockError::io("getting current directory", e))?;
            match ConfigManager::find_local_config(&cwd) {
                Some(path) => ConfigManager::with_path(path),
                None => ConfigManager::for_project(&cwd),
            }
        }
    };

    if cli.config.is_some() && !manager.path().is_file() && !is_config_init(&cli.command) {
        return Err(DrydockError::ConfigNotFound(manager.path().to_path_buf()));
    }

    let config = manager.load().await?;
    init_logging(&cli, &config);
    debug!("Using config {}", manager.path().display());

    match cli.command {
        Commands::Run(args) => drydock::cli::commands::run(args, &config, &manager).await,
        Commands::Plan(args) => drydock::cli::commands::plan(args, &config).await,
        Commands::Status => drydock::cli::commands::status(&config, &manager).await,
        Commands::Cache(args) => drydock::cli::commands::cache(args, &config, &manager).await,
        Commands::Config(args) => drydock::cli::commands::config(args, &config, &manager).await,
    }
}

fn is_config_init(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Config(args)
            if matches!(args.action, Some(drydock::cli::args::ConfigAction::Init { .. }))
    )
}

/// 0 = warn (progress output only), 1 = info, 2+ = debug
fn init_logging(cli: &Cli, config: &Config) {
    let filter = match cli.verbose {
        0 => EnvFilter::new("drydock=warn"),
        1 => EnvFilter::new("drydock=info"),
        _ => EnvFilter::new("drydock=debug"),
    };

    let json = match cli.log_format {
        Some(format) => format == LogFormat::Json,
        None => config.general.log_format.eq_ignore_ascii_case("json"),
    };

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }

    drydock::ui::init_theme();
}
