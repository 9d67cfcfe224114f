//! Unpacking downloaded module archives
//!
//! Modules are shipped as tar archives, usually gzip-compressed. The format
//! is detected from the first bytes, so both variants can be streamed
//! straight from the network without buffering to disk.

use crate::error::{HubError, HubResult};
use flate2::read::GzDecoder;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use tar::{Archive, EntryType};
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Whether an unpack failure is the archive's fault rather than the disk's
fn is_format_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::Other
    )
}

fn unpack_error(handle: &str, context: &str, e: io::Error) -> HubError {
    if is_format_error(&e) {
        HubError::invalid_artifact(handle, e)
    } else {
        HubError::io(format!("{} for {}", context, handle), e)
    }
}

/// Unpack a tar or tar.gz stream into `dest`.
///
/// Returns the number of entries written. Unparseable streams, empty
/// archives, unsupported entry types and entries escaping `dest` are
/// reported as [`HubError::InvalidArtifact`].
pub fn unpack_archive<R: Read>(reader: R, dest: &Path, handle: &str) -> HubResult<usize> {
    let mut buffered = BufReader::new(reader);
    let compressed = buffered
        .fill_buf()
        .map_err(|e| unpack_error(handle, "reading archive", e))?
        .starts_with(&GZIP_MAGIC);

    let stream: Box<dyn Read + '_> = if compressed {
        Box::new(GzDecoder::new(buffered))
    } else {
        Box::new(buffered)
    };

    let mut archive = Archive::new(stream);
    archive.set_preserve_permissions(false);

    let mut count = 0;
    let entries = archive
        .entries()
        .map_err(|e| HubError::invalid_artifact(handle, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| HubError::invalid_artifact(handle, e))?;

        match entry.header().entry_type() {
            EntryType::Regular
            | EntryType::Continuous
            | EntryType::Directory
            | EntryType::Symlink
            | EntryType::Link => {}
            EntryType::XGlobalHeader => continue,
            other => {
                return Err(HubError::invalid_artifact(
                    handle,
                    format!("unsupported tar entry type {:?}", other),
                ))
            }
        }

        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| unpack_error(handle, "unpacking archive entry", e))?;
        if !unpacked {
            let path = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return Err(HubError::invalid_artifact(
                handle,
                format!("entry {} escapes the destination", path),
            ));
        }
        count += 1;
    }

    if count == 0 {
        return Err(HubError::invalid_artifact(handle, "archive is empty"));
    }

    debug!("Unpacked {} entries into {}", count, dest.display());
    Ok(count)
}
