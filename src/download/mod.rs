//! Remote module retrieval
//!
//! [`HttpArchiveDownloader`] implements the cache's [`Downloader`](crate::cache::Downloader)
//! for handles served as tar archives over HTTP(S).

pub mod archive;
pub mod http;
pub mod progress;

pub use archive::unpack_archive;
pub use http::{archive_url, HttpArchiveDownloader};
pub use progress::{DownloadProgress, ProgressMode, ProgressReader};

use crate::config::Config;
use std::time::Duration;

/// How downloads are performed and reported
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadSettings {
    pub progress: ProgressMode,
    /// Skip TLS certificate validation
    pub disable_cert_validation: bool,
    /// Overall timeout of one request, body included
    pub timeout: Option<Duration>,
}

impl DownloadSettings {
    pub fn from_config(config: &Config) -> Self {
        let download = &config.download;
        Self {
            progress: ProgressMode::new(
                download.interactive_progress,
                Duration::from_secs(download.progress_interval_secs.max(1)),
            ),
            disable_cert_validation: download.disable_cert_validation,
            timeout: download.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_from_default_config() {
        let settings = DownloadSettings::from_config(&Config::default());
        assert_eq!(settings.progress, ProgressMode::default());
        assert!(!settings.disable_cert_validation);
        assert_eq!(settings.timeout, None);
    }

    #[test]
    fn settings_follow_config() {
        let mut config = Config::default();
        config.download.interactive_progress = true;
        config.download.timeout_secs = Some(30);

        let settings = DownloadSettings::from_config(&config);
        assert_eq!(settings.progress, ProgressMode::Interactive);
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
    }
}
