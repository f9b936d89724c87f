//! Configurable single-request HTTP executor.
//!
//! # Design
//! `RequestExecutor` owns a `RequestConfig` and shapes results on demand:
//! text, a byte stream, a file on disk, a parsed JSON-path value, or the whole
//! response. Each accessor freezes the config into an `HttpRequest`, executes
//! it once and maps the response, releasing the body before returning (except
//! `fetch_stream`, which hands the body to the caller).
//!
//! Every accessor returns `Ok(None)` when no URL is configured and performs no
//! I/O in that case. Transport failures are returned as
//! `CallError::Transport`, never swallowed.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::config::{ProxyConfig, ProxyKind, RequestConfig};
use crate::error::CallError;
use crate::http::{HeaderEntry, HttpMethod, HttpRequest, HttpResponse};
use crate::json_path::parse_json_path;
use crate::transport;
use crate::types::{BodyStream, DownloadProgress};

/// Bytes read from the body per progress report.
pub const DOWNLOAD_CHUNK_SIZE: usize = 1024;

/// Issues one HTTP request per accessor call from its current configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestExecutor {
    config: RequestConfig,
}

impl RequestExecutor {
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(RequestConfig::new(url))
    }

    pub fn from_config(config: RequestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RequestConfig {
        &mut self.config
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.config.method = method;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.config.body = body.into();
        self
    }

    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.config.media_type = media_type.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn retry_on_failure(mut self, retry: bool) -> Self {
        self.config.retry_on_failure = retry;
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Set proxy credentials. Ignored until a proxy is configured; both
    /// halves must be present for them to be sent.
    pub fn proxy_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        if let Some(proxy) = self.config.proxy.as_mut() {
            proxy.username = Some(username.into());
            proxy.password = Some(password.into());
        }
        self
    }

    /// Append one header. Duplicate keys are kept; always returns `true`.
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.config.headers.push(HeaderEntry::new(key, value));
        true
    }

    /// Append headers in iteration order.
    pub fn add_headers<I, H>(&mut self, headers: I)
    where
        I: IntoIterator<Item = H>,
        H: Into<HeaderEntry>,
    {
        self.config.headers.extend(headers.into_iter().map(Into::into));
    }

    /// Freeze the current configuration. `None` when no URL is set.
    pub fn prepare(&self) -> Result<Option<HttpRequest>, CallError> {
        self.config.prepare()
    }

    /// Status, headers and body text of one call.
    #[instrument(level = "debug", skip(self), fields(url = ?self.config.url))]
    pub fn fetch_response(&self) -> Result<Option<HttpResponse>, CallError> {
        let Some(request) = self.prepare()? else {
            return Ok(None);
        };
        let mut response = transport::execute(&request)?;
        let status = response.status().as_u16();
        let headers = transport::response_headers(&response);
        let body = read_text(&request, response.body_mut())?;
        Ok(Some(HttpResponse {
            status,
            headers,
            body,
        }))
    }

    /// Body decoded as text.
    #[instrument(level = "debug", skip(self), fields(url = ?self.config.url))]
    pub fn fetch_text(&self) -> Result<Option<String>, CallError> {
        let Some(request) = self.prepare()? else {
            return Ok(None);
        };
        let mut response = transport::execute(&request)?;
        read_text(&request, response.body_mut()).map(Some)
    }

    /// Body as a byte stream. The caller owns it and releases the connection
    /// by reading to the end or dropping it.
    #[instrument(level = "debug", skip(self), fields(url = ?self.config.url))]
    pub fn fetch_stream(&self) -> Result<Option<BodyStream>, CallError> {
        let Some(request) = self.prepare()? else {
            return Ok(None);
        };
        let response = transport::execute(&request)?;
        let status = response.status().as_u16();
        let body = response.into_body();
        let content_length = body.content_length();
        Ok(Some(BodyStream::new(body.into_reader(), status, content_length)))
    }

    /// Write the body to `path` in `DOWNLOAD_CHUNK_SIZE` chunks, reporting
    /// progress after each chunk is written.
    ///
    /// `DownloadProgress::max` is 0 when the server declared no length. If the
    /// body read or a write fails partway, the partial file is removed.
    #[instrument(level = "debug", skip(self, path, on_progress), fields(url = ?self.config.url))]
    pub fn fetch_file<P, F>(&self, path: P, mut on_progress: F) -> Result<Option<PathBuf>, CallError>
    where
        P: AsRef<Path>,
        F: FnMut(&DownloadProgress),
    {
        let Some(request) = self.prepare()? else {
            return Ok(None);
        };
        let path = path.as_ref().to_path_buf();
        let response = transport::execute(&request)?;
        let body = response.into_body();
        let max = body.content_length().unwrap_or(0);
        let mut reader = body.into_reader();

        let file = File::create(&path).map_err(|e| CallError::io(&path, e))?;
        match copy_body(&request, &path, &mut reader, file, max, &mut on_progress) {
            Ok(current) => {
                info!(path = %path.display(), bytes = current, "download complete");
                Ok(Some(path))
            }
            Err(err) => {
                // A truncated file is never left behind.
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove partial download");
                }
                Err(err)
            }
        }
    }

    /// Fetch the body and evaluate a JSON-path query against it.
    ///
    /// Fails with `EmptyResponseBody` when there is no URL or the body is
    /// empty, before the query engine runs.
    pub fn fetch_json_path<T: DeserializeOwned>(
        &self,
        path: &str,
        debug: bool,
    ) -> Result<T, CallError> {
        let json = match self.fetch_text()? {
            Some(text) if !text.is_empty() => text,
            _ => return Err(CallError::EmptyResponseBody),
        };
        parse_json_path(&json, path, debug)
    }

    /// Route through the given proxy and fetch the body as text.
    ///
    /// The proxy stays configured afterwards. Credentials passed as `None`
    /// keep whatever was configured before.
    pub fn fetch_via_proxy(
        &mut self,
        host: impl Into<String>,
        port: u16,
        kind: ProxyKind,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Option<String>, CallError> {
        let previous = self.config.proxy.take();
        let mut proxy = ProxyConfig::new(host, port, kind);
        proxy.username = username.or_else(|| previous.as_ref().and_then(|p| p.username.clone()));
        proxy.password = password.or_else(|| previous.as_ref().and_then(|p| p.password.clone()));
        debug!(?proxy, "configured proxy");
        self.config.proxy = Some(proxy);
        self.fetch_text()
    }
}

fn copy_body<F>(
    request: &HttpRequest,
    path: &Path,
    reader: &mut impl Read,
    file: File,
    max: u64,
    on_progress: &mut F,
) -> Result<u64, CallError>
where
    F: FnMut(&DownloadProgress),
{
    let mut writer = BufWriter::new(file);
    let mut chunk = [0u8; DOWNLOAD_CHUNK_SIZE];
    let mut current = 0u64;

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(source) => {
                warn!(url = %request.url, error = %source, "download interrupted");
                return Err(CallError::Body {
                    url: request.url.clone(),
                    source,
                });
            }
        };
        writer
            .write_all(&chunk[..read])
            .map_err(|e| CallError::io(path, e))?;
        current += read as u64;
        on_progress(&DownloadProgress {
            file: path.to_path_buf(),
            current,
            max,
        });
    }

    writer.flush().map_err(|e| CallError::io(path, e))?;
    if let Err(e) = writer.get_ref().sync_all() {
        warn!(path = %path.display(), error = %e, "failed to sync downloaded file");
    }
    Ok(current)
}

/// Whole body, no size cap. Invalid UTF-8 is replaced rather than rejected.
fn read_text(request: &HttpRequest, body: &mut ureq::Body) -> Result<String, CallError> {
    let bytes = body
        .with_config()
        .limit(u64::MAX)
        .read_to_vec()
        .map_err(|source| {
            warn!(url = %request.url, error = %source, "failed to read response body");
            CallError::transport(&request.url, source)
        })?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug!(url = %request.url, "response body is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    })
}
