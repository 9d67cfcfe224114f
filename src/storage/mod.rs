//! Storage capability interface
//!
//! The cache protocol touches storage only through the [`Storage`] trait so
//! that the same code runs against a local disk, a network filesystem, or an
//! object store with weaker latency and consistency.
//!
//! Backends must provide two guarantees the protocol relies on:
//!
//! - `write_string(path, _, false)` fails with `AlreadyExists` when `path`
//!   exists, and never overwrites it.
//! - `rename` of a directory is atomic and reports `AlreadyExists` when the
//!   destination is already populated.

mod local;

pub use local::LocalStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Metadata returned by [`Storage::stat`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub len: u64,
}

/// Filesystem-like operations over a path namespace
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Check whether a path exists
    async fn exists(&self, path: &Path) -> StorageResult<bool>;

    /// List the entry names (not full paths) directly under a directory
    async fn list_dir(&self, path: &Path) -> StorageResult<Vec<String>>;

    /// Size and type of a path
    async fn stat(&self, path: &Path) -> StorageResult<FileStat>;

    /// Create a directory and all missing parents
    async fn make_dirs(&self, path: &Path) -> StorageResult<()>;

    /// Atomically rename `src` to `dst`
    async fn rename(&self, src: &Path, dst: &Path) -> StorageResult<()>;

    /// Delete a file or a directory tree
    async fn delete_recursive(&self, path: &Path) -> StorageResult<()>;

    /// Write a whole file; with `overwrite == false` this fails if `path` exists
    async fn write_string(&self, path: &Path, content: &str, overwrite: bool)
        -> StorageResult<()>;

    /// Read a whole file as UTF-8
    async fn read_string(&self, path: &Path) -> StorageResult<String>;

    /// Remove a single file
    async fn remove(&self, path: &Path) -> StorageResult<()>;

    /// Human-readable backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Whether `path` exists and holds at least one entry.
///
/// This is the readiness test for a cache entry: a populated directory is
/// complete and immutable.
pub async fn is_populated(storage: &dyn Storage, path: &Path) -> StorageResult<bool> {
    if !storage.exists(path).await? {
        return Ok(false);
    }
    match storage.list_dir(path).await {
        Ok(entries) => Ok(!entries.is_empty()),
        // Removed between the two calls
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Total size in bytes of all files below `dir`.
pub async fn dir_size(storage: &dyn Storage, dir: &Path) -> StorageResult<u64> {
    let mut size = 0;
    let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for name in storage.list_dir(&current).await? {
            let child = current.join(name);
            let stat = storage.stat(&child).await?;
            if stat.is_dir {
                pending.push(child);
            } else {
                size += stat.len;
            }
        }
    }

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn populated_requires_entries() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let dir = temp.path().join("module");

        assert!(!is_populated(&storage, &dir).await.unwrap());

        fs::create_dir(&dir).unwrap();
        assert!(!is_populated(&storage, &dir).await.unwrap());

        fs::write(dir.join("saved_model.pb"), b"x").unwrap();
        assert!(is_populated(&storage, &dir).await.unwrap());
    }

    #[tokio::test]
    async fn dir_size_sums_nested_files() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let root = temp.path().join("tree");
        fs::create_dir_all(root.join("variables/shards")).unwrap();
        fs::write(root.join("saved_model.pb"), vec![0u8; 100]).unwrap();
        fs::write(root.join("variables/index"), vec![0u8; 20]).unwrap();
        fs::write(root.join("variables/shards/data-0"), vec![0u8; 3]).unwrap();

        assert_eq!(dir_size(&storage, &root).await.unwrap(), 123);
    }

    #[tokio::test]
    async fn dir_size_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();

        let err = dir_size(&storage, &temp.path().join("absent"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
