//! Local (and network-mounted) filesystem backend

use super::{FileStat, Storage, StorageResult};
use crate::error::{StorageError, StorageErrorKind};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Storage backend over `std::fs` semantics
#[derive(Debug, Clone, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }

    /// Sibling path used to stage a write before publishing it
    fn staging_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(format!(".{}.staging", uuid::Uuid::new_v4().simple()));
        PathBuf::from(name)
    }

    async fn write_staged(staging: &Path, content: &str) -> io::Result<()> {
        let mut file = fs::File::create(staging).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Publish `staging` at `path` without replacing an existing file.
    ///
    /// A hard link fails with `EEXIST` if `path` exists, so readers never see
    /// a half-written lock. Filesystems without hard links fall back to
    /// `O_CREAT | O_EXCL`.
    async fn publish_exclusive(staging: &Path, path: &Path, content: &str) -> io::Result<()> {
        match fs::hard_link(staging, path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Unsupported => {
                debug!("Hard links unsupported for {}, using create_new", path.display());
                let mut file = fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(path)
                    .await?;
                file.write_all(content.as_bytes()).await?;
                file.sync_all().await
            }
            Err(e) => Err(e),
        }
    }
}

/// Classify an `io::Error` into the protocol's storage error kinds
pub(crate) fn classify_io_error(e: &io::Error) -> StorageErrorKind {
    #[cfg(unix)]
    if let Some(code) = e.raw_os_error() {
        match code {
            libc::ENOSPC | libc::EDQUOT => return StorageErrorKind::ResourceExhausted,
            libc::ENOTEMPTY | libc::EEXIST => return StorageErrorKind::AlreadyExists,
            libc::EROFS => return StorageErrorKind::PermissionDenied,
            libc::ENOTDIR | libc::ENAMETOOLONG => return StorageErrorKind::InvalidArgument,
            libc::ENOSYS => return StorageErrorKind::Unimplemented,
            _ => {}
        }
    }

    match e.kind() {
        io::ErrorKind::NotFound => StorageErrorKind::NotFound,
        io::ErrorKind::AlreadyExists => StorageErrorKind::AlreadyExists,
        io::ErrorKind::PermissionDenied => StorageErrorKind::PermissionDenied,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
            StorageErrorKind::InvalidArgument
        }
        io::ErrorKind::Unsupported => StorageErrorKind::Unimplemented,
        io::ErrorKind::OutOfMemory => StorageErrorKind::ResourceExhausted,
        _ => StorageErrorKind::Unavailable,
    }
}

fn map_io(op: &'static str, path: &Path, e: io::Error) -> StorageError {
    StorageError::new(classify_io_error(&e), op, path, e.to_string())
}

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, path: &Path) -> StorageResult<bool> {
        fs::try_exists(path)
            .await
            .map_err(|e| map_io("exists", path, e))
    }

    async fn list_dir(&self, path: &Path) -> StorageResult<Vec<String>> {
        let mut entries = fs::read_dir(path)
            .await
            .map_err(|e| map_io("list", path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| map_io("list", path, e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn stat(&self, path: &Path) -> StorageResult<FileStat> {
        let meta = fs::metadata(path)
            .await
            .map_err(|e| map_io("stat", path, e))?;
        Ok(FileStat {
            is_dir: meta.is_dir(),
            len: if meta.is_dir() { 0 } else { meta.len() },
        })
    }

    async fn make_dirs(&self, path: &Path) -> StorageResult<()> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| map_io("mkdir", path, e))
    }

    async fn rename(&self, src: &Path, dst: &Path) -> StorageResult<()> {
        match fs::rename(src, dst).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let kind = classify_io_error(&e);
                // rename(2) onto a non-empty directory reports ENOTEMPTY,
                // which classifies as AlreadyExists
                Err(StorageError::new(kind, "rename", dst, e.to_string()))
            }
        }
    }

    async fn delete_recursive(&self, path: &Path) -> StorageResult<()> {
        let meta = fs::symlink_metadata(path)
            .await
            .map_err(|e| map_io("delete", path, e))?;
        let result = if meta.is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        result.map_err(|e| map_io("delete", path, e))
    }

    async fn write_string(
        &self,
        path: &Path,
        content: &str,
        overwrite: bool,
    ) -> StorageResult<()> {
        let staging = Self::staging_path(path);
        if let Err(e) = Self::write_staged(&staging, content).await {
            let _ = fs::remove_file(&staging).await;
            return Err(map_io("write", path, e));
        }

        let result = if overwrite {
            fs::rename(&staging, path).await
        } else {
            let published = Self::publish_exclusive(&staging, path, content).await;
            let _ = fs::remove_file(&staging).await;
            published
        };

        if result.is_err() {
            let _ = fs::remove_file(&staging).await;
        }
        result.map_err(|e| map_io("write", path, e))
    }

    async fn read_string(&self, path: &Path) -> StorageResult<String> {
        fs::read_to_string(path)
            .await
            .map_err(|e| map_io("read", path, e))
    }

    async fn remove(&self, path: &Path) -> StorageResult<()> {
        fs::remove_file(path)
            .await
            .map_err(|e| map_io("remove", path, e))
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn exclusive_write_refuses_existing() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let path = temp.path().join("module.lock");

        storage.write_string(&path, "first", false).await.unwrap();
        let err = storage
            .write_string(&path, "second", false)
            .await
            .unwrap_err();

        assert!(err.is_already_exists());
        assert_eq!(storage.read_string(&path).await.unwrap(), "first");
    }

    #[tokio::test]
    async fn exclusive_write_leaves_no_staging_files() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let path = temp.path().join("module.lock");

        storage.write_string(&path, "a", false).await.unwrap();
        let _ = storage.write_string(&path, "b", false).await;

        let names = storage.list_dir(temp.path()).await.unwrap();
        assert_eq!(names, vec!["module.lock".to_string()]);
    }

    #[tokio::test]
    async fn overwrite_write_replaces() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let path = temp.path().join("module.descriptor.txt");

        storage.write_string(&path, "old", true).await.unwrap();
        storage.write_string(&path, "new", true).await.unwrap();

        assert_eq!(storage.read_string(&path).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn rename_onto_populated_dir_is_already_exists() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let src = temp.path().join("module.abc.tmp");
        let dst = temp.path().join("module");
        stdfs::create_dir_all(&src).unwrap();
        stdfs::write(src.join("a"), b"1").unwrap();
        stdfs::create_dir_all(&dst).unwrap();
        stdfs::write(dst.join("b"), b"2").unwrap();

        let err = storage.rename(&src, &dst).await.unwrap_err();
        assert!(err.is_already_exists());
        assert!(src.join("a").exists());
    }

    #[tokio::test]
    async fn missing_paths_are_not_found() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let missing = temp.path().join("nope");

        assert!(!storage.exists(&missing).await.unwrap());
        assert!(storage.read_string(&missing).await.unwrap_err().is_not_found());
        assert!(storage.remove(&missing).await.unwrap_err().is_not_found());
        assert!(storage
            .delete_recursive(&missing)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn stat_reports_type_and_len() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let file = temp.path().join("f");
        stdfs::write(&file, b"12345").unwrap();

        let stat = storage.stat(&file).await.unwrap();
        assert!(!stat.is_dir);
        assert_eq!(stat.len, 5);
        assert!(storage.stat(temp.path()).await.unwrap().is_dir);
    }

    #[test]
    fn classify_kinds() {
        let e = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(classify_io_error(&e), StorageErrorKind::PermissionDenied);
        let e = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(classify_io_error(&e), StorageErrorKind::Unavailable);
    }

    #[cfg(unix)]
    #[test]
    fn classify_errno() {
        let e = io::Error::from_raw_os_error(libc::ENOSPC);
        assert_eq!(classify_io_error(&e), StorageErrorKind::ResourceExhausted);
        let e = io::Error::from_raw_os_error(libc::ENOTEMPTY);
        assert_eq!(classify_io_error(&e), StorageErrorKind::AlreadyExists);
    }
}
