//! PhotoSync CLI - Command-line interface for PhotoSync
//!
//! Provides commands for:
//! - Camera roll download for every download profile
//! - Incremental uploads for upload profiles
//! - Upload cache maintenance
//! - Device-code authentication per profile

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

mod commands;
mod logging;
mod output;

use commands::{
    auth::AuthCommand, cache::CacheCommand, sync::SyncCommand, upload::UploadCommand, AppContext,
};
use output::OutputFormat;
use photosync_core::config::Config;

#[derive(Debug, Parser)]
#[command(name = "photosync", version, about = "OneDrive photo and scan synchronization")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file
    #[arg(long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download new camera roll items for every download profile
    Sync(SyncCommand),
    /// Upload new and changed files for upload profiles
    Upload(UploadCommand),
    /// Inspect or rebuild a profile's upload cache
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let formatter = output::get_formatter(cli.json);

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            formatter.error(&error.to_string());
        }
        bail!("{} configuration error(s) in {}", errors.len(), cli.config.display());
    }

    let log_file = logging::init(&config, cli.verbose, cli.json)?;
    tracing::debug!(config = %cli.config.display(), log_file = %log_file.display(), "Configuration loaded");

    let ctx = AppContext::new(config, format);
    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Upload(cmd) => cmd.execute(&ctx).await,
        Commands::Cache(cmd) => cmd.execute(&ctx).await,
        Commands::Auth(cmd) => cmd.execute(&ctx).await,
    }
}
