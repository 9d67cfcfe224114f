//! CLI command implementations

pub mod cache;
pub mod completions;
pub mod config;
pub mod fetch;
pub mod path;

pub use cache::execute as cache;
pub use completions::execute as completions;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use path::execute as path;

use crate::config::Config;
use crate::error::{HubError, HubResult};
use std::path::PathBuf;

/// Cache directory from the command line, else from configuration
pub(crate) fn cache_dir(config: &Config, cli_override: Option<PathBuf>) -> HubResult<PathBuf> {
    cli_override
        .or_else(|| config.cache_dir())
        .ok_or(HubError::NoCacheDir)
}
