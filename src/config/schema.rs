//! Configuration schema for hubcache
//!
//! Configuration is stored at `~/.config/hubcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the shared cache directory under the system temp dir
pub const TEMP_CACHE_DIR_NAME: &str = "hubcache_modules";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Module cache settings
    pub cache: CacheConfig,

    /// Download settings
    pub download: DownloadConfig,
}

impl Config {
    /// Directory modules are cached in.
    ///
    /// The configured directory wins; otherwise a directory under the system
    /// temp dir is used when `use_temp_fallback` is set.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        if let Some(ref dir) = self.cache.dir {
            return Some(dir.clone());
        }
        if self.cache.use_temp_fallback {
            return Some(std::env::temp_dir().join(TEMP_CACHE_DIR_NAME));
        }
        None
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Module cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root shared by all processes
    pub dir: Option<PathBuf>,

    /// Fall back to a directory under the system temp dir when `dir` is unset
    pub use_temp_fallback: bool,

    /// Seconds a lock holder may show no progress before its lock is taken over
    pub lock_timeout_secs: u64,

    /// Seconds between checks of a lock held by another process
    pub poll_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            use_temp_fallback: true,
            lock_timeout_secs: 600,
            poll_interval_secs: 5,
        }
    }
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DownloadConfig {
    /// Redraw progress in place instead of logging it periodically
    pub interactive_progress: bool,

    /// Seconds between progress log lines
    pub progress_interval_secs: u64,

    /// Skip TLS certificate validation
    pub disable_cert_validation: bool,

    /// Overall request timeout in seconds (unset = no timeout)
    pub timeout_secs: Option<u64>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            interactive_progress: false,
            progress_interval_secs: 15,
            disable_cert_validation: false,
            timeout_secs: None,
        }
    }
}
