//! Fetch command - resolve a handle to a local module directory

use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{HubError, HubResult};
use crate::resolver::ResolverChain;
use crate::storage::LocalStorage;
use crate::ui::UiContext;
use std::sync::Arc;
use tracing::{debug, warn};

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> HubResult<()> {
    let ctx = UiContext::detect();
    let config = fetch_config(config, &args, &ctx);
    let chain = ResolverChain::standard(&config, Arc::new(LocalStorage::new()));

    let outcome = tokio::select! {
        result = chain.resolve(&args.handle) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(result) => {
            let path = result?;
            debug!("Resolved '{}' to {}", args.handle, path.display());
            println!("{}", path.display());
            Ok(())
        }
        None => {
            warn!("Interrupted, releasing cache lock");
            chain.finish_pending_cleanups().await;
            Err(HubError::User(format!("Fetch of {} interrupted", args.handle)))
        }
    }
}

/// Configuration with command-line overrides applied
fn fetch_config(config: &Config, args: &FetchArgs, ctx: &UiContext) -> Config {
    let mut config = config.clone();
    if let Some(ref dir) = args.cache_dir {
        config.cache.dir = Some(dir.clone());
    }
    if let Some(secs) = args.lock_timeout {
        config.cache.lock_timeout_secs = secs;
    }
    config.download.interactive_progress =
        ctx.live_progress(args.progress || config.download.interactive_progress);
    config
}
