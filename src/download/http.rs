//! Fetching module archives over HTTP(S)

use crate::cache::Downloader;
use crate::download::archive::unpack_archive;
use crate::download::progress::{DownloadProgress, ProgressReader};
use crate::download::DownloadSettings;
use crate::error::{HubError, HubResult};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use ureq::tls::TlsConfig;
use ureq::Agent;

/// Query parameter asking the server for the compressed archive format
pub const COMPRESSED_FORMAT_QUERY: &str = "tf-hub-format=compressed";

/// URL to fetch the archive of `handle` from.
///
/// Appends [`COMPRESSED_FORMAT_QUERY`], keeping any existing query and
/// fragment intact.
pub fn archive_url(handle: &str) -> String {
    let (base, fragment) = match handle.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (handle, None),
    };

    let separator = if base.contains('?') {
        if base.ends_with('?') || base.ends_with('&') {
            ""
        } else {
            "&"
        }
    } else {
        "?"
    };

    let mut url = format!("{}{}{}", base, separator, COMPRESSED_FORMAT_QUERY);
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

/// Downloads a handle's tar archive and unpacks it into the target directory
#[derive(Clone)]
pub struct HttpArchiveDownloader {
    agent: Agent,
    settings: DownloadSettings,
}

impl HttpArchiveDownloader {
    pub fn new(settings: DownloadSettings) -> Self {
        let mut builder = Agent::config_builder().timeout_global(settings.timeout);
        if settings.disable_cert_validation {
            warn!("TLS certificate validation is disabled for module downloads");
            builder = builder.tls_config(TlsConfig::builder().disable_verification(true).build());
        }

        Self {
            agent: Agent::new_with_config(builder.build()),
            settings,
        }
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.settings
    }
}

/// Raises its flag when dropped, which stops the blocking transfer
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl Downloader for HttpArchiveDownloader {
    async fn download(&self, handle: &str, dest_dir: &Path) -> HubResult<()> {
        let agent = self.agent.clone();
        let settings = self.settings.clone();
        let handle = handle.to_string();
        let dest_dir = dest_dir.to_path_buf();
        let cancel = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(Arc::clone(&cancel));

        tokio::task::spawn_blocking(move || {
            fetch_and_unpack(&agent, &settings, &handle, &dest_dir, cancel)
        })
        .await
        .map_err(|e| HubError::Internal(format!("Download task failed: {}", e)))?
    }
}

fn fetch_and_unpack(
    agent: &Agent,
    settings: &DownloadSettings,
    handle: &str,
    dest_dir: &Path,
    cancel: Arc<AtomicBool>,
) -> HubResult<()> {
    let url = archive_url(handle);
    debug!("GET {}", url);

    let response = agent
        .get(&url)
        .call()
        .map_err(|e| request_error(handle, &url, e))?;

    let body = response.into_body().into_reader();
    let progress = DownloadProgress::new(handle, settings.progress);
    let mut reader = ProgressReader::new(body, progress).with_cancel(cancel);

    match unpack_archive(&mut reader, dest_dir, handle) {
        Ok(_) => {
            reader.into_progress().finish();
            Ok(())
        }
        Err(e) => {
            let source_error = reader.source_error().map(str::to_string);
            reader.into_progress().abandon();
            match source_error {
                // The connection broke; the payload itself may be fine
                Some(reason) => Err(HubError::Download {
                    handle: handle.to_string(),
                    reason,
                }),
                None => Err(e),
            }
        }
    }
}

fn request_error(handle: &str, url: &str, error: ureq::Error) -> HubError {
    match error {
        ureq::Error::StatusCode(404) => HubError::HandleNotFound(handle.to_string()),
        ureq::Error::StatusCode(code) => HubError::Http {
            url: url.to_string(),
            reason: format!("server returned status {}", code),
        },
        other => HubError::Http {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}
