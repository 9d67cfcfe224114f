//! Inspecting what a cache directory holds
//!
//! Groups the files of the cache root by module: the module directory itself,
//! its lock, its descriptor and any temporary download directories.

use crate::cache::descriptor::handle_from_descriptor;
use crate::cache::lock::{LOCK_SUFFIX, TMP_SUFFIX};
use crate::error::HubResult;
use crate::storage::{dir_size, is_populated, Storage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

const DESCRIPTOR_SUFFIX: &str = ".descriptor.txt";
const STAGING_SUFFIX: &str = ".staging";

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// State of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Populated module directory, ready to use
    Complete,
    /// Locked by a task that is (or was) downloading it
    Downloading,
    /// Leftovers without a lock: empty directory or orphaned temp dirs
    Partial,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Downloading => write!(f, "downloading"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

/// One module in the cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// Directory name under the cache root
    pub name: String,
    pub path: PathBuf,
    pub state: EntryState,
    /// Handle recorded in the descriptor, if any
    pub handle: Option<String>,
    /// Lock content of the current holder
    pub lock_holder: Option<String>,
    /// Size of the module directory (complete entries only)
    pub size_bytes: Option<u64>,
    /// Number of temporary download directories
    pub temp_dirs: usize,
}

#[derive(Default)]
struct Parts {
    has_dir: bool,
    has_lock: bool,
    descriptor: bool,
    temp_dirs: usize,
}

/// Module name a temp dir belongs to: `<name>.<uid>.tmp` -> `<name>`
fn temp_dir_owner(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(TMP_SUFFIX)?;
    let (owner, uid) = stem.rsplit_once('.')?;
    if owner.is_empty() || uid.is_empty() {
        return None;
    }
    Some(owner)
}

/// List cache entries under `cache_dir`, sorted by name
pub async fn scan(storage: &dyn Storage, cache_dir: &Path) -> HubResult<Vec<CacheEntry>> {
    if !storage.exists(cache_dir).await? {
        return Ok(Vec::new());
    }

    let mut parts: BTreeMap<String, Parts> = BTreeMap::new();
    for name in storage.list_dir(cache_dir).await? {
        if name.ends_with(STAGING_SUFFIX) {
            continue;
        }
        if let Some(base) = name.strip_suffix(LOCK_SUFFIX) {
            parts.entry(base.to_string()).or_default().has_lock = true;
        } else if let Some(base) = name.strip_suffix(DESCRIPTOR_SUFFIX) {
            parts.entry(base.to_string()).or_default().descriptor = true;
        } else if let Some(base) = temp_dir_owner(&name) {
            parts.entry(base.to_string()).or_default().temp_dirs += 1;
        } else if storage.stat(&cache_dir.join(&name)).await?.is_dir {
            parts.entry(name).or_default().has_dir = true;
        }
    }

    let mut entries = Vec::with_capacity(parts.len());
    for (name, part) in parts {
        let path = cache_dir.join(&name);

        let complete = part.has_dir && is_populated(storage, &path).await?;
        let state = if complete {
            EntryState::Complete
        } else if part.has_lock {
            EntryState::Downloading
        } else if part.has_dir || part.temp_dirs > 0 {
            EntryState::Partial
        } else {
            // Stray descriptor of a module that was removed
            continue;
        };

        let lock_holder = if part.has_lock {
            read_optional(storage, &cache_dir.join(format!("{}{}", name, LOCK_SUFFIX))).await?
        } else {
            None
        };
        let descriptor = if part.descriptor {
            read_optional(storage, &cache_dir.join(format!("{}{}", name, DESCRIPTOR_SUFFIX)))
                .await?
        } else {
            None
        };
        let handle = descriptor
            .as_deref()
            .and_then(handle_from_descriptor)
            .map(str::to_string);
        let size_bytes = if complete {
            Some(dir_size(storage, &path).await?)
        } else {
            None
        };

        entries.push(CacheEntry {
            name,
            path,
            state,
            handle,
            lock_holder,
            size_bytes,
            temp_dirs: part.temp_dirs,
        });
    }

    Ok(entries)
}

async fn read_optional(storage: &dyn Storage, path: &Path) -> HubResult<Option<String>> {
    match storage.read_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}
