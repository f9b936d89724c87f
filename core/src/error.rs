//! Error types for `RequestExecutor`.
//!
//! # Design
//! Configuration errors (`InvalidMediaType`) are raised before any I/O.
//! Transport failures are never swallowed: they surface as `Transport` and
//! the caller decides whether to treat them as "no result". Query errors from
//! the JSON-path engine are carried unchanged as the error source.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by `RequestExecutor` accessors and `parse_json_path`.
#[derive(Debug, Error)]
pub enum CallError {
    /// The configured media type string does not parse.
    #[error("media type {media_type:?} does not exist")]
    InvalidMediaType { media_type: String },

    /// A JSON-path query was requested but the response had no content.
    #[error("response body is empty, nothing to query")]
    EmptyResponseBody,

    /// Network-level failure: connect, DNS, timeout, reset.
    #[error("transport error calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: ureq::Error,
    },

    /// The proxy settings could not be turned into a proxy URI.
    #[error("invalid proxy {uri}: {source}")]
    InvalidProxy {
        uri: String,
        #[source]
        source: ureq::Error,
    },

    /// The JSON-path expression is malformed.
    #[error("invalid JSON path: {0}")]
    Query(#[from] serde_json_path::ParseError),

    /// A definite JSON path selected nothing.
    #[error("no value at JSON path {path}")]
    NoMatch { path: String },

    /// JSON could not be parsed, or did not fit the requested shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system error while writing a download.
    #[error("IO error writing to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the response body failed part way through.
    #[error("error reading response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl CallError {
    pub fn transport(url: impl Into<String>, source: ureq::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures that happened on the wire rather than in configuration.
    pub fn is_transport(&self) -> bool {
        matches!(self, CallError::Transport { .. } | CallError::Body { .. })
    }
}
