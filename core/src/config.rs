//! Request configuration.
//!
//! # Design
//! `RequestConfig` is the mutable state a `RequestExecutor` owns. It is never
//! read by the transport directly: `prepare` freezes it into an `HttpRequest`
//! so a call in progress cannot observe later edits. Absent settings (URL,
//! proxy, proxy credentials) are `Option`s rather than sentinel values.
//!
//! The type derives `Deserialize` with per-field defaults, so a partial JSON
//! document such as `{"url": "http://localhost:3000"}` is a complete config.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CallError;
use crate::http::{HeaderEntry, HttpMethod, HttpRequest, MediaType, RequestBody};

pub const DEFAULT_MEDIA_TYPE: &str = "text/plain";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Transport used to reach a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    #[default]
    Http,
    Https,
    Socks4,
    Socks4a,
    Socks5,
}

impl ProxyKind {
    pub fn scheme(self) -> &'static str {
        match self {
            ProxyKind::Http => "http",
            ProxyKind::Https => "https",
            ProxyKind::Socks4 => "socks4",
            ProxyKind::Socks4a => "socks4a",
            ProxyKind::Socks5 => "socks5",
        }
    }
}

/// Proxy endpoint with optional credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub kind: ProxyKind,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16, kind: ProxyKind) -> Self {
        Self {
            host: host.into(),
            port,
            kind,
            username: None,
            password: None,
        }
    }

    /// Credentials, but only when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Proxy URI understood by the transport, e.g. `socks5://user:pw@host:1080`.
    ///
    /// Credentials are percent-encoded and only included when both are set.
    pub fn to_uri(&self) -> String {
        match self.credentials() {
            Some((user, pass)) => format!(
                "{}://{}:{}@{}:{}",
                self.kind.scheme(),
                urlencoding::encode(user),
                urlencoding::encode(pass),
                self.host,
                self.port
            ),
            None => format!("{}://{}:{}", self.kind.scheme(), self.host, self.port),
        }
    }
}

// Keep the password out of logs.
impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("kind", &self.kind)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Everything needed to issue one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub url: Option<String>,
    pub method: HttpMethod,
    pub body: String,
    pub media_type: String,
    pub headers: Vec<HeaderEntry>,
    pub timeout_secs: u64,
    pub retry_on_failure: bool,
    pub follow_redirects: bool,
    pub proxy: Option<ProxyConfig>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            url: None,
            method: HttpMethod::Get,
            body: String::new(),
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
            headers: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_on_failure: true,
            follow_redirects: true,
            proxy: None,
        }
    }
}

impl RequestConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Load a config from JSON. Missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, CallError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Freeze this config into an `HttpRequest`.
    ///
    /// Returns `Ok(None)` when no URL is set. The media type is validated
    /// before anything else is built, even for methods that drop the body.
    pub fn prepare(&self) -> Result<Option<HttpRequest>, CallError> {
        let Some(url) = self.url.as_deref() else {
            debug!("no url configured, skipping request");
            return Ok(None);
        };

        let media_type = MediaType::parse(&self.media_type)?;
        let body = self.method.carries_body().then(|| RequestBody {
            content: self.body.clone(),
            media_type,
        });

        debug!(method = %self.method, url, headers = self.headers.len(), "prepared request");
        Ok(Some(HttpRequest {
            method: self.method,
            url: url.to_string(),
            headers: self.headers.clone(),
            body,
            timeout_secs: self.timeout_secs,
            retry_on_failure: self.retry_on_failure,
            follow_redirects: self.follow_redirects,
            proxy: self.proxy.clone(),
        }))
    }
}
