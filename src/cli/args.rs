//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// hubcache - Crash-safe shared module cache
///
/// Downloads modules once into a cache directory shared by any number of
/// processes and hosts, and prints where they live.
#[derive(Parser, Debug)]
#[command(name = "hubcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "HUBCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a handle, downloading it into the cache if needed
    Fetch(FetchArgs),

    /// Print the cache directory a URL handle maps to
    Path(PathArgs),

    /// Inspect or clear the module cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Module handle: an http(s) URL or a local path
    pub handle: String,

    /// Cache directory (overrides config and HUBCACHE_CACHE_DIR)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Seconds without progress before another process's lock is taken over
    #[arg(long, value_name = "SECS")]
    pub lock_timeout: Option<u64>,

    /// Show download progress in place
    #[arg(long)]
    pub progress: bool,
}

/// Arguments for the path command
#[derive(Parser, Debug)]
pub struct PathArgs {
    /// Module URL
    pub handle: String,

    /// Cache directory (overrides config and HUBCACHE_CACHE_DIR)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
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
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cache.dir)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for list command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,

    /// Cache directory (overrides config and HUBCACHE_CACHE_DIR)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached modules
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove everything in the cache directory
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
