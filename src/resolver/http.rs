//! URL handles, downloaded once into the shared cache

use crate::cache::{CachePopulator, Downloader};
use crate::download::HttpArchiveDownloader;
use crate::error::{HubError, HubResult};
use crate::resolver::Resolver;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cache location of the module behind `handle`
pub fn module_dir_for(cache_dir: &Path, handle: &str) -> PathBuf {
    let digest = Sha256::digest(handle.as_bytes());
    cache_dir.join(hex::encode(digest))
}

/// Whether `handle` is an `http://` or `https://` URL
pub fn is_url_handle(handle: &str) -> bool {
    let lower = handle.get(..8).unwrap_or(handle).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Resolves `http://` and `https://` handles through the module cache
pub struct HttpResolver<D = HttpArchiveDownloader> {
    cache_dir: Option<PathBuf>,
    populator: Arc<CachePopulator>,
    downloader: D,
}

impl<D: Downloader> HttpResolver<D> {
    pub fn new(cache_dir: Option<PathBuf>, populator: Arc<CachePopulator>, downloader: D) -> Self {
        Self {
            cache_dir,
            populator,
            downloader,
        }
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }
}

#[async_trait]
impl<D: Downloader + 'static> Resolver for HttpResolver<D> {
    fn is_supported(&self, handle: &str) -> bool {
        is_url_handle(handle)
    }

    async fn resolve(&self, handle: &str) -> HubResult<PathBuf> {
        let cache_dir = self.cache_dir.as_deref().ok_or(HubError::NoCacheDir)?;
        self.populator.storage().make_dirs(cache_dir).await?;

        let module_dir = module_dir_for(cache_dir, handle);
        self.populator
            .populate(handle, &self.downloader, &module_dir)
            .await
    }

    fn name(&self) -> &'static str {
        "http"
    }

    async fn finish_pending_cleanups(&self) {
        self.populator.finish_pending_cleanups().await;
    }
}
