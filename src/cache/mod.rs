//! Crash-safe module cache
//!
//! Populates `<cache_dir>/<module>` from a remote source while any number of
//! processes, possibly on different hosts sharing the cache directory, try to
//! do the same.
//!
//! # On-disk layout
//!
//! | Path | Meaning |
//! |------|---------|
//! | `<module>/` | Complete module (exists and non-empty = ready, never mutated) |
//! | `<module>.lock` | `<host>.<pid>.<uid>` of the task populating it |
//! | `<module>.<uid>.tmp/` | Work in progress of task `<uid>` |
//! | `<module>.descriptor.txt` | Who downloaded what, for humans only |

pub mod descriptor;
pub mod entries;
pub mod lock;
pub mod monitor;
pub mod populate;

pub use entries::{format_bytes, scan, CacheEntry, EntryState};
pub use lock::LockRecord;
pub use monitor::{wait_for_lock_to_clear, WaitOutcome};
pub use populate::{CachePopulator, CacheSettings, Downloader};
