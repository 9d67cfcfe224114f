//! Path command - where a URL handle lives in the cache

use crate::cli::args::PathArgs;
use crate::cli::commands::cache_dir;
use crate::config::Config;
use crate::error::{HubError, HubResult};
use crate::resolver::{is_url_handle, module_dir_for};

/// Execute the path command
pub async fn execute(args: PathArgs, config: &Config) -> HubResult<()> {
    if !is_url_handle(&args.handle) {
        return Err(HubError::User(format!(
            "{} is not an http(s) URL; local paths are used in place",
            args.handle
        )));
    }

    let dir = cache_dir(config, args.cache_dir)?;
    println!("{}", module_dir_for(&dir, &args.handle).display());
    Ok(())
}
