//! Byte-count progress for long transfers
//!
//! In interactive mode the count is redrawn in place on every update. In
//! log mode a line is emitted at most once per interval so that CI logs and
//! shared log files are not flooded. A final summary is always emitted.

use crate::cache::format_bytes;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Default spacing of progress lines in log mode
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(15);

/// How progress is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Redraw a single terminal line on every update
    Interactive,
    /// Log a line at most once per `interval`
    Log { interval: Duration },
}

impl ProgressMode {
    pub fn new(interactive: bool, interval: Duration) -> Self {
        if interactive {
            Self::Interactive
        } else {
            Self::Log { interval }
        }
    }
}

impl Default for ProgressMode {
    fn default() -> Self {
        Self::Log {
            interval: DEFAULT_LOG_INTERVAL,
        }
    }
}

/// Progress of one download
pub struct DownloadProgress {
    label: String,
    mode: ProgressMode,
    total_bytes: u64,
    last_report: Instant,
    reports: u64,
    bar: Option<ProgressBar>,
}

impl DownloadProgress {
    pub fn new(label: impl Into<String>, mode: ProgressMode) -> Self {
        let label = label.into();
        let bar = match mode {
            ProgressMode::Interactive => {
                let bar = ProgressBar::new_spinner();
                let bar_style = ProgressStyle::default_spinner()
                    .template("  {spinner:.cyan} Downloading {prefix}: {bytes} {binary_bytes_per_sec:.dim}  {elapsed:.dim}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
                bar.set_style(bar_style);
                bar.set_prefix(label.clone());
                Some(bar)
            }
            ProgressMode::Log { .. } => None,
        };

        Self {
            label,
            mode,
            total_bytes: 0,
            last_report: Instant::now(),
            reports: 0,
            bar,
        }
    }

    /// Account for `bytes` more transferred bytes
    pub fn record(&mut self, bytes: u64) {
        self.total_bytes += bytes;

        match self.mode {
            ProgressMode::Interactive => {
                if let Some(ref bar) = self.bar {
                    bar.set_position(self.total_bytes);
                }
                self.reports += 1;
            }
            ProgressMode::Log { interval } => {
                if self.last_report.elapsed() > interval {
                    info!(
                        "Downloading {}: {}",
                        self.label,
                        format_bytes(self.total_bytes)
                    );
                    self.last_report = Instant::now();
                    self.reports += 1;
                }
            }
        }
    }

    /// Emit the closing summary, regardless of throttling
    pub fn finish(&mut self) {
        let summary = self.summary();
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
            eprintln!("  {} {}", style("✓").green(), summary);
        } else {
            info!("{}", summary);
        }
        self.reports += 1;
    }

    /// Abandon the progress display without a summary
    pub fn abandon(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Downloaded {}, Total size: {}",
            self.label,
            format_bytes(self.total_bytes)
        )
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Number of progress messages emitted so far
    pub fn reports(&self) -> u64 {
        self.reports
    }
}

/// A reader that reports every read to a [`DownloadProgress`].
///
/// Remembers a failure of the underlying source so that callers can tell a
/// broken connection apart from a malformed payload.
pub struct ProgressReader<R> {
    inner: R,
    progress: DownloadProgress,
    source_error: Option<String>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, progress: DownloadProgress) -> Self {
        Self {
            inner,
            progress,
            source_error: None,
            cancel: None,
        }
    }

    /// Fail the next read once `flag` is set
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Error raised by the wrapped source, if any
    pub fn source_error(&self) -> Option<&str> {
        self.source_error.as_deref()
    }

    pub fn into_progress(self) -> DownloadProgress {
        self.progress
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            self.source_error = Some("download cancelled".to_string());
            return Err(io::Error::other("download cancelled"));
        }

        match self.inner.read(buf) {
            Ok(n) => {
                if n > 0 {
                    self.progress.record(n as u64);
                }
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => {
                self.source_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}
