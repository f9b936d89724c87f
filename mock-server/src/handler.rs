//! Canned responses, recorded requests and the dispatch strategies that map
//! one to the other.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::stream;

/// Size of each frame when a response is sent chunked.
const CHUNK_FRAME_SIZE: usize = 512;

/// A response the mock server sends back.
///
/// Defaults to `200` with no headers and an empty body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
    chunked: bool,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Bytes::new(),
            chunked: false,
        }
    }
}

impl MockResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Append a header. Repeated keys are sent as repeated header lines.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Send the body with chunked transfer encoding, so no content length is
    /// declared.
    pub fn chunked(mut self, chunked: bool) -> Self {
        self.chunked = chunked;
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn is_chunked(&self) -> bool {
        self.chunked
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = axum::http::Response::builder().status(status);
        for (key, value) in &self.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let body = if self.chunked {
            let frames: Vec<Result<Bytes, io::Error>> = self
                .body
                .chunks(CHUNK_FRAME_SIZE)
                .map(|frame| Ok(Bytes::copy_from_slice(frame)))
                .collect();
            Body::from_stream(stream::iter(frames))
        } else {
            Body::from(self.body)
        };

        builder.body(body).unwrap_or_else(|err| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("invalid mock response: {err}")).into_response()
        })
    }
}

/// What the mock server saw for one incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string. For authority-form targets such as
    /// `CONNECT host:443` this is the authority.
    pub path: String,
    /// Headers as received; keys are lower-case.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RecordedRequest {
    pub(crate) fn from_parts(parts: &Parts, body: Bytes) -> Self {
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.to_string());
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Self {
            method: parts.method.as_str().to_string(),
            path,
            headers,
            body,
        }
    }

    /// First value of the named header, compared case-insensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.header_values(key).into_iter().next()
    }

    /// Every value of the named header, in the order received.
    pub fn header_values(&self, key: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The running server, as seen from inside a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerHandle {
    addr: SocketAddr,
    sequence: u64,
}

impl ServerHandle {
    pub(crate) fn new(addr: SocketAddr, sequence: u64) -> Self {
        Self { addr, sequence }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// 1-based position of the current request since the server started.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Absolute URL on this server, e.g. `url("/next")`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub type ComputeFn = dyn Fn(&ServerHandle, &RecordedRequest) -> MockResponse + Send + Sync;

/// How the mock server answers requests.
#[derive(Clone)]
pub enum MockHandler {
    /// The same response every time.
    Static(MockResponse),
    /// A response computed from the request.
    Computed(Arc<ComputeFn>),
}

impl MockHandler {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&ServerHandle, &RecordedRequest) -> MockResponse + Send + Sync + 'static,
    {
        MockHandler::Computed(Arc::new(f))
    }

    pub fn respond(&self, server: &ServerHandle, request: &RecordedRequest) -> MockResponse {
        match self {
            MockHandler::Static(response) => response.clone(),
            MockHandler::Computed(f) => f(server, request),
        }
    }
}

impl Default for MockHandler {
    fn default() -> Self {
        MockHandler::Static(MockResponse::new().body("Hello World"))
    }
}

impl From<MockResponse> for MockHandler {
    fn from(response: MockResponse) -> Self {
        MockHandler::Static(response)
    }
}

impl fmt::Debug for MockHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockHandler::Static(response) => f.debug_tuple("Static").field(response).finish(),
            MockHandler::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}
