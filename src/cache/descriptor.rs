//! Descriptor file written next to a downloaded module
//!
//! Purely informational: tells a human which handle a hashed cache directory
//! holds, and who downloaded it when. Nothing in the protocol reads it.

use crate::error::HubResult;
use crate::storage::Storage;
use chrono::Local;
use std::path::{Path, PathBuf};

/// Path of the descriptor for `module_dir`
pub fn descriptor_path(module_dir: &Path) -> PathBuf {
    let mut name = module_dir.as_os_str().to_os_string();
    name.push(".descriptor.txt");
    PathBuf::from(name)
}

/// Descriptor text for a module downloaded by this process
pub fn descriptor_content(handle: &str) -> String {
    format!(
        "Module: {}\nDownload Time: {}\nDownloader Hostname: {} (PID:{})",
        handle,
        Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
        gethostname::gethostname().to_string_lossy(),
        std::process::id()
    )
}

/// Write the descriptor for `module_dir`.
///
/// A crashed process may have left one behind, so overwriting is allowed.
pub async fn write_descriptor(
    storage: &dyn Storage,
    handle: &str,
    module_dir: &Path,
) -> HubResult<()> {
    let path = descriptor_path(module_dir);
    storage
        .write_string(&path, &descriptor_content(handle), true)
        .await?;
    Ok(())
}

/// Handle recorded in a descriptor, if the text has one
pub fn handle_from_descriptor(content: &str) -> Option<&str> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Module: "))
        .map(str::trim)
}
