//! Blocking convenience layer over an HTTP client.
//!
//! # Overview
//! `RequestExecutor` holds the configuration for a single request (URL,
//! method, body, media type, headers, proxy, timeout, redirect and retry
//! policy) and returns the result as text, a byte stream, a file with
//! progress reports, or a value selected by a JSON-path query.
//!
//! # Design
//! - Configuration is frozen into an `HttpRequest` per call; the transport
//!   never reads mutable state.
//! - The wire work (pooling, redirects, TLS, proxies) is done by `ureq`.
//! - An absent URL is a no-op: accessors return `Ok(None)`.
//! - Errors are returned, not logged and dropped.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod json_path;
pub mod transport;
pub mod types;

pub use client::{RequestExecutor, DOWNLOAD_CHUNK_SIZE};
pub use config::{ProxyConfig, ProxyKind, RequestConfig};
pub use error::CallError;
pub use http::{HeaderEntry, HttpMethod, HttpRequest, HttpResponse, MediaType, RequestBody};
pub use json_path::parse_json_path;
pub use types::{BodyStream, DownloadProgress};
