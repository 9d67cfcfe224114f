//! Configuration management for hubcache
//!
//! Settings come from the TOML file, then environment variables override
//! individual keys:
//!
//! | Variable | Key |
//! |----------|-----|
//! | `HUBCACHE_CACHE_DIR` | `cache.dir` |
//! | `HUBCACHE_LOCK_TIMEOUT_SECS` | `cache.lock_timeout_secs` |
//! | `HUBCACHE_DOWNLOAD_PROGRESS` | `download.interactive_progress` (any non-empty value) |
//! | `HUBCACHE_DISABLE_CERT_VALIDATION` | `download.disable_cert_validation` (only `true`) |

pub mod schema;

pub use schema::Config;

use crate::error::{HubError, HubResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use toml_edit::{DocumentMut, Item};
use tracing::{debug, info};

pub const ENV_CACHE_DIR: &str = "HUBCACHE_CACHE_DIR";
pub const ENV_LOCK_TIMEOUT: &str = "HUBCACHE_LOCK_TIMEOUT_SECS";
pub const ENV_DOWNLOAD_PROGRESS: &str = "HUBCACHE_DOWNLOAD_PROGRESS";
pub const ENV_DISABLE_CERT_VALIDATION: &str = "HUBCACHE_DISABLE_CERT_VALIDATION";

/// Keys accepted by [`ConfigManager::set_value`]
pub const SETTABLE_KEYS: &[&str] = &[
    "general.log_format",
    "cache.dir",
    "cache.use_temp_fallback",
    "cache.lock_timeout_secs",
    "cache.poll_interval_secs",
    "download.interactive_progress",
    "download.progress_interval_secs",
    "download.disable_cert_validation",
    "download.timeout_secs",
];

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hubcache")
            .join("config.toml")
    }

    /// Load configuration with environment overrides applied
    pub async fn load(&self) -> HubResult<Config> {
        let mut config = self.load_file().await?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load the configuration file alone, or defaults if it does not exist
    pub async fn load_file(&self) -> HubResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> HubResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| HubError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| HubError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> HubResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            HubError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Set one `section.key` in the config file, keeping the rest of the
    /// file (comments, ordering) as it is.
    pub async fn set_value(&self, key: &str, value: &str) -> HubResult<()> {
        let (section, field) = key
            .split_once('.')
            .ok_or_else(|| unknown_key(key))?;
        let item = parse_setting(key, value)?;

        let content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path).await.map_err(|e| {
                HubError::io(format!("reading {}", self.config_path.display()), e)
            })?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = content.parse().map_err(|e: toml_edit::TomlError| {
            HubError::ConfigInvalid {
                path: self.config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        let table = doc
            .entry(section)
            .or_insert(toml_edit::table())
            .as_table_like_mut()
            .ok_or_else(|| HubError::ConfigInvalid {
                path: self.config_path.clone(),
                reason: format!("[{}] is not a table", section),
            })?;
        table.insert(field, item);

        let updated = doc.to_string();
        toml::from_str::<Config>(&updated).map_err(|e| HubError::ConfigInvalid {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })?;

        self.ensure_config_dir().await?;
        fs::write(&self.config_path, updated).await.map_err(|e| {
            HubError::io(format!("writing {}", self.config_path.display()), e)
        })?;

        debug!("Set {} in {}", key, self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> HubResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| HubError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply environment overrides read through `lookup`
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> HubResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.is_empty()) {
        debug!("Cache directory from {}: {}", ENV_CACHE_DIR, dir);
        config.cache.dir = Some(PathBuf::from(dir));
    }

    if let Some(secs) = lookup(ENV_LOCK_TIMEOUT).filter(|v| !v.is_empty()) {
        config.cache.lock_timeout_secs = secs.trim().parse().map_err(|_| {
            HubError::User(format!("Invalid {}: {} (expected seconds)", ENV_LOCK_TIMEOUT, secs))
        })?;
    }

    if lookup(ENV_DOWNLOAD_PROGRESS).is_some_and(|v| !v.is_empty()) {
        config.download.interactive_progress = true;
    }

    if lookup(ENV_DISABLE_CERT_VALIDATION).as_deref() == Some("true") {
        config.download.disable_cert_validation = true;
    }

    Ok(())
}

fn unknown_key(key: &str) -> HubError {
    HubError::User(format!(
        "Unknown config key: {} (valid keys: {})",
        key,
        SETTABLE_KEYS.join(", ")
    ))
}

/// Validate `value` for `key` and convert it to a TOML item
fn parse_setting(key: &str, value: &str) -> HubResult<Item> {
    match key {
        "general.log_format" => match value {
            "text" | "json" => Ok(toml_edit::value(value)),
            _ => Err(HubError::User(format!(
                "Invalid log format: {}. Use text or json",
                value
            ))),
        },
        "cache.dir" => Ok(toml_edit::value(value)),
        "cache.use_temp_fallback"
        | "download.interactive_progress"
        | "download.disable_cert_validation" => Ok(toml_edit::value(parse_bool(value)?)),
        "cache.lock_timeout_secs"
        | "cache.poll_interval_secs"
        | "download.progress_interval_secs"
        | "download.timeout_secs" => Ok(toml_edit::value(parse_secs(value)?)),
        _ => Err(unknown_key(key)),
    }
}

fn parse_bool(value: &str) -> HubResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(HubError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_secs(value: &str) -> HubResult<i64> {
    value
        .parse::<u32>()
        .map(i64::from)
        .map_err(|_| HubError::User(format!("Invalid number of seconds: {}", value)))
}
