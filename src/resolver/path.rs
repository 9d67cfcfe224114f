//! Handles that are already local paths

use crate::error::{HubError, HubResult};
use crate::resolver::Resolver;
use async_trait::async_trait;
use std::path::PathBuf;

/// Serves any handle naming an existing path, as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct PathResolver;

#[async_trait]
impl Resolver for PathResolver {
    fn is_supported(&self, _handle: &str) -> bool {
        true
    }

    async fn resolve(&self, handle: &str) -> HubResult<PathBuf> {
        let path = PathBuf::from(handle);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok(path),
            Ok(false) => Err(HubError::HandleNotFound(handle.to_string())),
            Err(e) => Err(HubError::io(format!("checking {}", handle), e)),
        }
    }

    fn name(&self) -> &'static str {
        "path"
    }
}
