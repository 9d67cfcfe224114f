//! Handle resolution
//!
//! Turns a handle (a URL or a filesystem path) into a local directory
//! holding the module. Each [`Resolver`] declares which handles it can
//! serve; a [`ResolverChain`] asks them in order.

mod http;
mod path;

pub use http::{is_url_handle, module_dir_for, HttpResolver};
pub use path::PathResolver;

use crate::cache::{CachePopulator, CacheSettings};
use crate::config::Config;
use crate::download::{DownloadSettings, HttpArchiveDownloader};
use crate::error::{HubError, HubResult};
use crate::storage::Storage;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Resolves handles of one kind to local module directories
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Whether this resolver can serve `handle`
    fn is_supported(&self, handle: &str) -> bool;

    /// Local directory holding the module for `handle`
    async fn resolve(&self, handle: &str) -> HubResult<PathBuf>;

    /// Get the human-readable resolver name for display
    fn name(&self) -> &'static str;

    /// Wait for cleanup of interrupted resolutions, if this resolver has any
    async fn finish_pending_cleanups(&self) {}
}

/// Resolvers consulted in order; the first that supports a handle wins
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver with lower priority than those already present
    pub fn with(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    /// URL handles through the cache, then plain paths
    pub fn standard(config: &Config, storage: Arc<dyn Storage>) -> Self {
        let populator = Arc::new(CachePopulator::new(
            storage,
            CacheSettings::from_config(config),
        ));
        let downloader = HttpArchiveDownloader::new(DownloadSettings::from_config(config));

        Self::new()
            .with(HttpResolver::new(config.cache_dir(), populator, downloader))
            .with(PathResolver)
    }

    pub fn resolvers(&self) -> impl Iterator<Item = &dyn Resolver> {
        self.resolvers.iter().map(|r| r.as_ref())
    }

    /// First resolver supporting `handle`
    pub fn find(&self, handle: &str) -> Option<&dyn Resolver> {
        self.resolvers().find(|r| r.is_supported(handle))
    }

    pub async fn resolve(&self, handle: &str) -> HubResult<PathBuf> {
        let resolver = self
            .find(handle)
            .ok_or_else(|| HubError::UnsupportedHandle(handle.to_string()))?;
        debug!("Resolving '{}' with the {} resolver", handle, resolver.name());
        resolver.resolve(handle).await
    }

    pub async fn finish_pending_cleanups(&self) {
        for resolver in &self.resolvers {
            resolver.finish_pending_cleanups().await;
        }
    }
}
