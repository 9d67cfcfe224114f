//! Populating a cache entry exactly once across processes
//!
//! # Protocol
//!
//! 1. A populated module directory is returned as-is, without locking.
//! 2. Otherwise the task writes `<module_dir>.lock` with exclusive-create
//!    semantics. Losing that race means waiting on the holder (see
//!    [`monitor`](crate::cache::monitor)) and trying again.
//! 3. The lock holder downloads into `<module_dir>.<uid>.tmp` and renames it
//!    to `<module_dir>`. A rename that finds the destination populated means
//!    another task won; its result is used and ours discarded.
//! 4. The temp directory and the lock are removed on every exit path. The lock
//!    is only removed while it still carries our content, since a contender
//!    may have stolen and re-created it in the meantime.
//!
//! Locking only avoids duplicate downloads. The atomic rename is what keeps
//! readers from ever observing a partial module.

use crate::cache::descriptor::write_descriptor;
use crate::cache::lock::{lock_path, new_task_uid, temp_download_dir, LockRecord};
use crate::cache::monitor::{wait_for_lock_to_clear, WaitOutcome};
use crate::config::Config;
use crate::error::{HubError, HubResult};
use crate::storage::{is_populated, Storage, StorageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Default time a lock holder may go without progress before losing its lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default delay between two checks of a contended lock
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Fetches the content for a handle into a directory
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Populate `dest_dir` completely, or fail.
    ///
    /// Partial content on failure is fine; the caller discards `dest_dir`.
    async fn download(&self, handle: &str, dest_dir: &Path) -> HubResult<()>;
}

/// Timing knobs of the population protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// How long a holder may show no progress before its lock is stolen
    pub lock_timeout: Duration,
    /// Delay between lock checks while waiting
    pub poll_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl CacheSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lock_timeout: Duration::from_secs(config.cache.lock_timeout_secs),
            poll_interval: Duration::from_secs(config.cache.poll_interval_secs.max(1)),
        }
    }
}

type PendingCleanups = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Drives cache population against a storage backend
pub struct CachePopulator {
    storage: Arc<dyn Storage>,
    settings: CacheSettings,
    pending: PendingCleanups,
}

impl CachePopulator {
    pub fn new(storage: Arc<dyn Storage>, settings: CacheSettings) -> Self {
        Self {
            storage,
            settings,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Return `module_dir`, downloading `handle` into it first if needed.
    pub async fn populate(
        &self,
        handle: &str,
        downloader: &dyn Downloader,
        module_dir: &Path,
    ) -> HubResult<PathBuf> {
        self.populate_with_timeout(handle, downloader, module_dir, self.settings.lock_timeout)
            .await
    }

    /// Like [`populate`](Self::populate) with an explicit lock timeout.
    pub async fn populate_with_timeout(
        &self,
        handle: &str,
        downloader: &dyn Downloader,
        module_dir: &Path,
        lock_timeout: Duration,
    ) -> HubResult<PathBuf> {
        let storage = self.storage.as_ref();

        if is_populated(storage, module_dir).await? {
            debug!("Module '{}' already cached in {}", handle, module_dir.display());
            return Ok(module_dir.to_path_buf());
        }

        let task_uid = new_task_uid();
        let lock = lock_path(module_dir);
        let lock_content = LockRecord::current(&task_uid).encode();
        let tmp_dir = temp_download_dir(module_dir, &task_uid);

        loop {
            self.acquire_lock(handle, &lock, &lock_content, lock_timeout)
                .await?;

            let guard = AttemptGuard {
                storage: Arc::clone(&self.storage),
                lock_path: lock.clone(),
                lock_content: lock_content.clone(),
                tmp_dir: tmp_dir.clone(),
                pending: Arc::clone(&self.pending),
                armed: true,
            };

            match self.recheck_locked(module_dir).await {
                Ok(Recheck::Populated) => {
                    guard.release().await;
                    return Ok(module_dir.to_path_buf());
                }
                Ok(Recheck::Clear) => {}
                Err(e) if e.is_permanent() => {
                    guard.release().await;
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(
                        "Transient error checking {}, retrying: {}",
                        module_dir.display(),
                        e
                    );
                    guard.release().await;
                    sleep(self.settings.poll_interval).await;
                    continue;
                }
            }

            let result = self
                .download_locked(handle, downloader, module_dir, &guard.tmp_dir)
                .await;
            guard.release().await;
            return result;
        }
    }

    /// Wait for cleanups spawned by attempts whose future was dropped.
    pub async fn finish_pending_cleanups(&self) {
        let handles: Vec<JoinHandle<()>> = match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Cache cleanup task failed: {}", e);
            }
        }
    }

    async fn acquire_lock(
        &self,
        handle: &str,
        lock: &Path,
        lock_content: &str,
        lock_timeout: Duration,
    ) -> HubResult<()> {
        let storage = self.storage.as_ref();

        loop {
            match storage.write_string(lock, lock_content, false).await {
                Ok(()) => {
                    debug!("Acquired lock {}", lock.display());
                    return Ok(());
                }
                Err(e) if e.is_permanent() => return Err(e.into()),
                Err(e) if e.is_already_exists() => {
                    debug!("Lock {} is held by another task", lock.display());
                }
                Err(e) => {
                    debug!("Retrying lock {} after transient error: {}", lock.display(), e);
                    // The write may have landed even though it reported failure
                    if let Ok(current) = storage.read_string(lock).await {
                        if current == lock_content {
                            return Ok(());
                        }
                    }
                }
            }

            let outcome = wait_for_lock_to_clear(
                storage,
                handle,
                lock,
                lock_timeout,
                self.settings.poll_interval,
            )
            .await?;
            if outcome == WaitOutcome::Stolen {
                info!("Took over abandoned download of '{}'", handle);
            }
        }
    }

    /// Another task may have finished between the first check and our lock.
    /// A leftover directory that is not populated is removed.
    async fn recheck_locked(&self, module_dir: &Path) -> StorageResult<Recheck> {
        let storage = self.storage.as_ref();

        if is_populated(storage, module_dir).await? {
            return Ok(Recheck::Populated);
        }
        if storage.exists(module_dir).await? {
            debug!("Removing incomplete module directory {}", module_dir.display());
            match storage.delete_recursive(module_dir).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Recheck::Clear)
    }

    async fn download_locked(
        &self,
        handle: &str,
        downloader: &dyn Downloader,
        module_dir: &Path,
        tmp_dir: &Path,
    ) -> HubResult<PathBuf> {
        let storage = self.storage.as_ref();

        info!("Downloading module '{}'.", handle);
        storage.make_dirs(tmp_dir).await?;
        downloader.download(handle, tmp_dir).await?;

        if storage.list_dir(tmp_dir).await?.is_empty() {
            return Err(HubError::Download {
                handle: handle.to_string(),
                reason: "download produced no files".to_string(),
            });
        }

        write_descriptor(storage, handle, module_dir).await?;

        match storage.rename(tmp_dir, module_dir).await {
            Ok(()) => info!("Downloaded module '{}'.", handle),
            Err(e) if e.is_already_exists() => {
                warn!("Module already exists in {}", module_dir.display());
            }
            Err(e) => return Err(e.into()),
        }

        Ok(module_dir.to_path_buf())
    }
}

/// State of the module directory once the lock is held
enum Recheck {
    Populated,
    Clear,
}

/// Lock and temp directory owned by one population attempt
struct AttemptGuard {
    storage: Arc<dyn Storage>,
    lock_path: PathBuf,
    lock_content: String,
    tmp_dir: PathBuf,
    pending: PendingCleanups,
    armed: bool,
}

impl AttemptGuard {
    /// Clean up in place. If this future is dropped midway the guard is
    /// still armed, so `Drop` schedules the whole cleanup again.
    async fn release(mut self) {
        release_attempt(
            self.storage.as_ref(),
            &self.tmp_dir,
            &self.lock_path,
            &self.lock_content,
        )
        .await;
        self.armed = false;
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let storage = Arc::clone(&self.storage);
        let tmp_dir = std::mem::take(&mut self.tmp_dir);
        let lock_path = std::mem::take(&mut self.lock_path);
        let lock_content = std::mem::take(&mut self.lock_content);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("Attempt interrupted, scheduling cleanup of {}", lock_path.display());
                let task = runtime.spawn(async move {
                    release_attempt(storage.as_ref(), &tmp_dir, &lock_path, &lock_content).await;
                });
                if let Ok(mut pending) = self.pending.lock() {
                    pending.push(task);
                }
            }
            Err(_) => warn!(
                "No runtime to clean up {}; it will expire via the lock timeout",
                lock_path.display()
            ),
        }
    }
}

/// Remove our temp directory, and our lock if we still own it
async fn release_attempt(
    storage: &dyn Storage,
    tmp_dir: &Path,
    lock_path: &Path,
    lock_content: &str,
) {
    match storage.delete_recursive(tmp_dir).await {
        Ok(()) => debug!("Removed {}", tmp_dir.display()),
        Err(e) if e.is_not_found() => {}
        Err(e) => warn!("Failed to remove temp dir {}: {}", tmp_dir.display(), e),
    }

    let current = match storage.read_string(lock_path).await {
        Ok(content) => content,
        Err(e) if e.is_not_found() => return,
        Err(e) => {
            warn!("Failed to read lock {}: {}", lock_path.display(), e);
            return;
        }
    };

    if current != lock_content {
        debug!(
            "Lock {} now belongs to '{}', leaving it",
            lock_path.display(),
            current
        );
        return;
    }

    match storage.remove(lock_path).await {
        Ok(()) => debug!("Released lock {}", lock_path.display()),
        Err(e) if e.is_not_found() => {}
        Err(e) => warn!("Failed to remove lock {}: {}", lock_path.display(), e),
    }
}
