//! hubcache - Crash-safe shared module cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use hubcache::cli::{Cli, Commands};
use hubcache::config::ConfigManager;
use hubcache::error::HubResult;
use std::process::ExitCode;
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

async fn run() -> HubResult<()> {
    let cli = Cli::parse();

    // Completions don't need config loading
    if let Commands::Completions(args) = cli.command {
        return hubcache::cli::commands::completions(args);
    }

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config.general.log_format);

    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::Fetch(args) => hubcache::cli::commands::fetch(args, &config).await,
        Commands::Path(args) => hubcache::cli::commands::path(args, &config).await,
        Commands::Cache(args) => hubcache::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            hubcache::cli::commands::config(args, &config_manager, &config).await
        }
    }
}

/// 0 = warn, 1 = info (download progress), 2+ = debug (lock protocol steps)
fn init_logging(verbose: u8, log_format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("hubcache=warn"),
        1 => EnvFilter::new("hubcache=info"),
        _ => EnvFilter::new("hubcache=debug"),
    };

    // stdout carries command output such as resolved paths
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
}
