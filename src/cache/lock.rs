//! Lock records and the paths derived from a module directory
//!
//! A lock file sits next to the module directory and names the task that is
//! populating it: `<hostname>.<pid>.<task_uid>`. The same uid is embedded in
//! the name of the task's temporary download directory, so a waiting process
//! can find (and measure) the holder's work in progress from the lock alone.

use crate::error::{HubError, HubResult};
use std::path::{Path, PathBuf};

/// Suffix appended to a module directory to form its lock file
pub const LOCK_SUFFIX: &str = ".lock";

/// Suffix of a temporary download directory
pub const TMP_SUFFIX: &str = ".tmp";

/// Identity of a lock holder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub host: String,
    pub pid: u32,
    pub task_uid: String,
}

impl LockRecord {
    /// Record for the current process and the given attempt
    pub fn current(task_uid: impl Into<String>) -> Self {
        Self {
            host: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            task_uid: task_uid.into(),
        }
    }

    /// Lock file content for this record
    pub fn encode(&self) -> String {
        encode(&self.host, &self.pid.to_string(), &self.task_uid)
    }
}

/// Join holder identity fields into lock file content
pub fn encode(host: &str, pid: &str, task_uid: &str) -> String {
    format!("{}.{}.{}", host, pid, task_uid)
}

/// Task uid from lock file content.
///
/// Hostnames often contain dots, so only the trailing field is meaningful.
pub fn task_uid_from_content(content: &str) -> &str {
    content.rsplit('.').next().unwrap_or(content).trim()
}

/// Mint a fresh task uid (128 random bits as 32 hex chars)
pub fn new_task_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Absolute form of `path`, without touching the filesystem
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Lock file guarding `module_dir`
pub fn lock_path(module_dir: &Path) -> PathBuf {
    with_suffix(&absolute_path(module_dir), LOCK_SUFFIX)
}

/// Module directory guarded by a lock file
pub fn module_dir_from_lock(lock_path: &Path) -> HubResult<PathBuf> {
    let raw = lock_path.as_os_str().to_string_lossy();
    match raw.strip_suffix(LOCK_SUFFIX) {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => Err(HubError::InvalidLockPath(lock_path.to_path_buf())),
    }
}

/// Temporary directory a task downloads into before publishing
pub fn temp_download_dir(module_dir: &Path, task_uid: &str) -> PathBuf {
    with_suffix(
        &absolute_path(module_dir),
        &format!(".{}{}", task_uid, TMP_SUFFIX),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        for (host, pid, uid) in [
            ("worker7", "4242", "0f1e2d3c4b5a69788796a5b4c3d2e1f0"),
            ("localhost", "1", "abc"),
            ("", "0", "deadbeef"),
        ] {
            let content = encode(host, pid, uid);
            assert_eq!(task_uid_from_content(&content), uid);
        }
    }

    #[test]
    fn dotted_hostname_decodes_trailing_field() {
        let record = LockRecord {
            host: "node-3.cluster.example.com".to_string(),
            pid: 991,
            task_uid: "7c9e6679742540de944be07fc1f90ae7".to_string(),
        };
        let content = record.encode();

        assert_eq!(
            content,
            "node-3.cluster.example.com.991.7c9e6679742540de944be07fc1f90ae7"
        );
        assert_eq!(
            task_uid_from_content(&content),
            "7c9e6679742540de944be07fc1f90ae7"
        );
    }

    #[test]
    fn current_record_uses_this_process() {
        let record = LockRecord::current("uid");
        assert_eq!(record.pid, std::process::id());
        assert!(record.encode().ends_with(&format!(".{}.uid", std::process::id())));
    }

    #[test]
    fn task_uids_are_unique_hex() {
        let a = new_task_uid();
        let b = new_task_uid();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn lock_path_roundtrip() {
        let module_dir = Path::new("/cache/3f2a");
        let lock = lock_path(module_dir);

        assert_eq!(lock, PathBuf::from("/cache/3f2a.lock"));
        assert_eq!(module_dir_from_lock(&lock).unwrap(), module_dir);
    }

    #[test]
    fn lock_path_is_absolute() {
        let lock = lock_path(Path::new("relative/module"));
        assert!(lock.is_absolute());
        assert!(lock.to_string_lossy().ends_with("relative/module.lock"));
    }

    #[test]
    fn module_dir_from_bad_lock_path() {
        assert!(matches!(
            module_dir_from_lock(Path::new("/cache/module.txt")),
            Err(HubError::InvalidLockPath(_))
        ));
        assert!(module_dir_from_lock(Path::new(".lock")).is_err());
    }

    #[test]
    fn temp_dir_embeds_uid() {
        let tmp = temp_download_dir(Path::new("/cache/3f2a"), "cafe01");
        assert_eq!(tmp, PathBuf::from("/cache/3f2a.cafe01.tmp"));
    }
}
