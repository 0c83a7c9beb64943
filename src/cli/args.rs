//! CLI argument definitions using clap derive

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// drydock - declarative build-and-release pipeline
///
/// Snapshots a Rust workspace with a web frontend, builds and tests it in
/// containers with persistent dependency caches, assembles one minimal
/// runtime image per service and publishes every image concurrently.
#[derive(Parser, Debug)]
#[command(name = "drydock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path (defaults to the nearest drydock.toml)
    #[arg(short, long, global = true, env = "DRYDOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format (overrides general.log_format)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build, test, assemble and release every service
    Run(RunArgs),

    /// Show the stage graph and release tasks without running anything
    Plan(PlanArgs),

    /// Check the container engine and show recent runs
    Status,

    /// Manage dependency caches
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Project directory (defaults to the directory holding drydock.toml)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Push images to the registry instead of only verifying them
    #[arg(long, env = "DRYDOCK_PUBLISH", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub publish: bool,

    /// Version tag to release in addition to `latest`
    #[arg(long = "release-version", env = "DRYDOCK_VERSION")]
    pub release_version: Option<String>,

    /// Exit successfully even when some release tasks failed
    #[arg(long)]
    pub allow_partial: bool,

    /// Run the native and asset branches one after the other
    #[arg(long)]
    pub sequential: bool,
}

/// Arguments for the plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Plan a publishing run
    #[arg(long, env = "DRYDOCK_PUBLISH", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub publish: bool,

    /// Version tag to plan for
    #[arg(long = "release-version", env = "DRYDOCK_VERSION")]
    pub release_version: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Write a default drydock.toml
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cache volumes and their recorded keys
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove cache volumes and forget their keys
    Clear {
        /// Only clear this cache
        #[arg(long, value_enum)]
        kind: Option<CacheKindArg>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Cache selector for `cache clear`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheKindArg {
    /// Package-manager store used by the asset branch
    DependencyStore,
    /// Compiled dependencies used by the native branch
    BuildArtifacts,
}
