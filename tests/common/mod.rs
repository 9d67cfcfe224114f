#![allow(dead_code)]

use async_trait::async_trait;
use hubcache::cache::Downloader;
use hubcache::error::{HubError, HubResult, StorageError, StorageErrorKind};
use hubcache::storage::{FileStat, LocalStorage, Storage, StorageResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Storage operations a fault can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Exists,
    ListDir,
    Stat,
    MakeDirs,
    Rename,
    DeleteRecursive,
    WriteString,
    ReadString,
    Remove,
}

#[derive(Debug)]
struct Fault {
    op: Op,
    path_suffix: String,
    kind: StorageErrorKind,
    remaining: usize,
    /// Perform the operation, then report the failure anyway
    after_commit: bool,
}

/// Local storage that fails chosen operations on demand and counts calls
pub struct FaultyStorage {
    inner: LocalStorage,
    faults: Mutex<Vec<Fault>>,
    delays: Mutex<Vec<(Op, String, Duration)>>,
    calls: Mutex<HashMap<Op, usize>>,
}

impl FaultyStorage {
    pub fn new() -> Self {
        Self {
            inner: LocalStorage::new(),
            faults: Mutex::new(Vec::new()),
            delays: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Fail the next `times` calls of `op` on paths ending in `path_suffix`
    pub fn fail(&self, op: Op, path_suffix: &str, kind: StorageErrorKind, times: usize) {
        self.push(op, path_suffix, kind, times, false);
    }

    /// Like [`fail`](Self::fail), but the operation takes effect first
    pub fn fail_after_commit(&self, op: Op, path_suffix: &str, kind: StorageErrorKind, times: usize) {
        self.push(op, path_suffix, kind, times, true);
    }

    fn push(&self, op: Op, path_suffix: &str, kind: StorageErrorKind, times: usize, after_commit: bool) {
        self.faults.lock().unwrap().push(Fault {
            op,
            path_suffix: path_suffix.to_string(),
            kind,
            remaining: times,
            after_commit,
        });
    }

    /// Stall every call of `op` on paths ending in `path_suffix` by `by`
    pub fn delay(&self, op: Op, path_suffix: &str, by: Duration) {
        self.delays
            .lock()
            .unwrap()
            .push((op, path_suffix.to_string(), by));
    }

    /// Number of calls made to `op`
    pub fn calls(&self, op: Op) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    /// Record a call and take a matching fault, if one is armed
    fn check(&self, op: Op, path: &Path) -> Option<(StorageErrorKind, bool)> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;

        let path = path.to_string_lossy();
        let mut faults = self.faults.lock().unwrap();
        let fault = faults
            .iter_mut()
            .find(|f| f.op == op && f.remaining > 0 && path.ends_with(&f.path_suffix))?;
        fault.remaining -= 1;
        Some((fault.kind, fault.after_commit))
    }

    async fn run<T, F>(&self, op: Op, path: &Path, action: F) -> StorageResult<T>
    where
        F: std::future::Future<Output = StorageResult<T>>,
    {
        let delay = self
            .delays
            .lock()
            .unwrap()
            .iter()
            .find(|(o, suffix, _)| *o == op && path.to_string_lossy().ends_with(suffix.as_str()))
            .map(|(_, _, by)| *by);
        if let Some(by) = delay {
            tokio::time::sleep(by).await;
        }

        match self.check(op, path) {
            None => action.await,
            Some((kind, false)) => Err(injected(kind, path)),
            Some((kind, true)) => {
                action.await?;
                Err(injected(kind, path))
            }
        }
    }
}

fn injected(kind: StorageErrorKind, path: &Path) -> StorageError {
    StorageError::new(kind, "injected", path, "injected fault")
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn exists(&self, path: &Path) -> StorageResult<bool> {
        self.run(Op::Exists, path, self.inner.exists(path)).await
    }

    async fn list_dir(&self, path: &Path) -> StorageResult<Vec<String>> {
        self.run(Op::ListDir, path, self.inner.list_dir(path)).await
    }

    async fn stat(&self, path: &Path) -> StorageResult<FileStat> {
        self.run(Op::Stat, path, self.inner.stat(path)).await
    }

    async fn make_dirs(&self, path: &Path) -> StorageResult<()> {
        self.run(Op::MakeDirs, path, self.inner.make_dirs(path)).await
    }

    async fn rename(&self, src: &Path, dst: &Path) -> StorageResult<()> {
        self.run(Op::Rename, dst, self.inner.rename(src, dst)).await
    }

    async fn delete_recursive(&self, path: &Path) -> StorageResult<()> {
        self.run(Op::DeleteRecursive, path, self.inner.delete_recursive(path))
            .await
    }

    async fn write_string(&self, path: &Path, content: &str, overwrite: bool) -> StorageResult<()> {
        self.run(
            Op::WriteString,
            path,
            self.inner.write_string(path, content, overwrite),
        )
        .await
    }

    async fn read_string(&self, path: &Path) -> StorageResult<String> {
        self.run(Op::ReadString, path, self.inner.read_string(path)).await
    }

    async fn remove(&self, path: &Path) -> StorageResult<()> {
        self.run(Op::Remove, path, self.inner.remove(path)).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty-local"
    }
}

/// Downloader writing a fixed module, optionally slowly
pub struct FileDownloader {
    pub calls: AtomicUsize,
    pub delay: Duration,
}

impl FileDownloader {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Downloader for FileDownloader {
    async fn download(&self, _handle: &str, dest_dir: &Path) -> HubResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(dest_dir.join("saved_model.pb"), b"graph")
            .await
            .map_err(|e| HubError::io("writing module", e))?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

/// Downloader that writes part of a module and then fails
pub struct FailingDownloader;

#[async_trait]
impl Downloader for FailingDownloader {
    async fn download(&self, handle: &str, dest_dir: &Path) -> HubResult<()> {
        tokio::fs::write(dest_dir.join("partial.bin"), b"half")
            .await
            .map_err(|e| HubError::io("writing module", e))?;
        Err(HubError::Download {
            handle: handle.to_string(),
            reason: "connection reset".to_string(),
        })
    }
}

/// Names in `dir`, sorted
pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
