//! Waiting on a lock held by another process
//!
//! Storage backends offer no change notification, so the monitor polls. A
//! holder counts as alive while its temporary download directory keeps
//! growing or its lock content changes. The check compares two samples taken
//! `timeout` apart; a holder silent across a whole window loses its lock.

use crate::cache::lock::{module_dir_from_lock, task_uid_from_content, temp_download_dir};
use crate::error::{HubResult, StorageError};
use crate::storage::{dir_size, Storage};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Log the "waiting" message once per this many polls
const LOG_EVERY_N_POLLS: u64 = 10;

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The lock disappeared on its own
    Released,
    /// The holder made no progress within the timeout and its lock was removed
    Stolen,
}

/// Last observation of the holder's progress
#[derive(Debug)]
struct Sample {
    tmp_dir_size: u64,
    lock_content: Option<String>,
    taken_at: Instant,
}

enum Step<T> {
    Value(T),
    LockGone,
    Retry,
}

/// Sort a storage result into value / lock vanished / transient failure
fn triage<T>(result: Result<T, StorageError>, what: &str) -> HubResult<Step<T>> {
    match result {
        Ok(v) => Ok(Step::Value(v)),
        Err(e) if e.is_not_found() => Ok(Step::LockGone),
        Err(e) if e.is_permanent() => Err(e.into()),
        Err(e) => {
            warn!("Transient error while {}: {}", what, e);
            Ok(Step::Retry)
        }
    }
}

/// Size of the temp directory belonging to the task named in `lock_content`
async fn locked_tmp_dir_size(
    storage: &dyn Storage,
    lock_path: &Path,
    lock_content: &str,
) -> HubResult<Step<u64>> {
    let module_dir = module_dir_from_lock(lock_path)?;
    let tmp_dir = temp_download_dir(&module_dir, task_uid_from_content(lock_content));
    match dir_size(storage, &tmp_dir).await {
        // Not created yet, or already renamed away
        Err(e) if e.is_not_found() => Ok(Step::Value(0)),
        result => triage(result, "sizing holder's temp dir"),
    }
}

/// Block until the lock at `lock_path` no longer exists.
///
/// Returns once the holder removed the lock, or after this call removed it
/// because the holder showed no progress for longer than `timeout`.
pub async fn wait_for_lock_to_clear(
    storage: &dyn Storage,
    handle: &str,
    lock_path: &Path,
    timeout: Duration,
    poll_interval: Duration,
) -> HubResult<WaitOutcome> {
    let mut sample = Sample {
        tmp_dir_size: 0,
        lock_content: None,
        taken_at: Instant::now(),
    };
    let mut polls: u64 = 0;

    loop {
        match triage(storage.exists(lock_path).await, "checking lock")? {
            Step::Value(false) | Step::LockGone => return Ok(WaitOutcome::Released),
            Step::Value(true) => {}
            Step::Retry => {
                sleep(poll_interval).await;
                continue;
            }
        }

        let content = match triage(storage.read_string(lock_path).await, "reading lock")? {
            Step::Value(content) => content,
            Step::LockGone => return Ok(WaitOutcome::Released),
            Step::Retry => {
                sleep(poll_interval).await;
                continue;
            }
        };

        if polls % LOG_EVERY_N_POLLS == 0 {
            info!(
                "Module '{}' already being downloaded by '{}'. Waiting.",
                handle, content
            );
        }
        polls += 1;

        if sample.taken_at.elapsed() > timeout {
            let size = match locked_tmp_dir_size(storage, lock_path, &content).await? {
                Step::Value(size) => size,
                // NotFound is mapped to 0 above
                Step::LockGone => 0,
                Step::Retry => {
                    sleep(poll_interval).await;
                    continue;
                }
            };
            let current = match triage(storage.read_string(lock_path).await, "reading lock")? {
                Step::Value(current) => current,
                Step::LockGone => return Ok(WaitOutcome::Released),
                Step::Retry => {
                    sleep(poll_interval).await;
                    continue;
                }
            };

            if size == sample.tmp_dir_size && sample.lock_content.as_deref() == Some(&current) {
                warn!(
                    "Deleting lock file {} due to inactivity.",
                    lock_path.display()
                );
                match storage.remove(lock_path).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        debug!("Lock {} already removed by another task", lock_path.display());
                    }
                    Err(e) if e.is_permanent() => return Err(e.into()),
                    Err(e) => {
                        warn!("Failed to remove stale lock {}: {}", lock_path.display(), e);
                        sleep(poll_interval).await;
                        continue;
                    }
                }
                return Ok(WaitOutcome::Stolen);
            }

            debug!(
                "Lock holder of {} progressed: {} -> {} bytes",
                lock_path.display(),
                sample.tmp_dir_size,
                size
            );
            sample = Sample {
                tmp_dir_size: size,
                lock_content: Some(current),
                taken_at: Instant::now(),
            };
        }

        sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::lock::{encode, lock_path};
    use crate::storage::LocalStorage;
    use std::fs;
    use tempfile::TempDir;

    const POLL: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn returns_immediately_without_lock() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let lock = lock_path(&temp.path().join("module"));

        let outcome =
            wait_for_lock_to_clear(&storage, "h", &lock, Duration::from_secs(60), POLL)
                .await
                .unwrap();
        assert_eq!(outcome, WaitOutcome::Released);
    }

    #[tokio::test]
    async fn steals_lock_of_silent_holder() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let lock = lock_path(&temp.path().join("module"));
        fs::write(&lock, encode("ghost", "1", "0000")).unwrap();

        let outcome =
            wait_for_lock_to_clear(&storage, "h", &lock, Duration::from_millis(50), POLL)
                .await
                .unwrap();

        assert_eq!(outcome, WaitOutcome::Stolen);
        assert!(!lock.exists());
    }

    #[tokio::test]
    async fn bad_lock_path_is_an_error() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let not_a_lock = temp.path().join("module.pid");
        fs::write(&not_a_lock, "x.1.uid").unwrap();

        let result =
            wait_for_lock_to_clear(&storage, "h", &not_a_lock, Duration::from_millis(1), POLL)
                .await;
        assert!(result.is_err());
    }
}
