//! Values handed back to callers of `RequestExecutor`.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Progress snapshot emitted after each chunk of a file download.
///
/// `max` is the declared content length, or 0 when the server did not send
/// one. In that case `fraction` is `None` and no percentage should be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub file: PathBuf,
    pub current: u64,
    pub max: u64,
}

impl DownloadProgress {
    pub fn is_total_known(&self) -> bool {
        self.max > 0
    }

    pub fn fraction(&self) -> Option<f64> {
        self.is_total_known()
            .then(|| self.current as f64 / self.max as f64)
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// Streaming response body. Dropping it releases the connection.
pub struct BodyStream {
    reader: ureq::BodyReader<'static>,
    status: u16,
    content_length: Option<u64>,
}

impl BodyStream {
    pub(crate) fn new(
        reader: ureq::BodyReader<'static>,
        status: u16,
        content_length: Option<u64>,
    ) -> Self {
        Self {
            reader,
            status,
            content_length,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Length declared by the server, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

impl Read for BodyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl std::fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyStream")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}
