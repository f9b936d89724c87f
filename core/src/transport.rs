//! Executes a prepared `HttpRequest` with a blocking `ureq` agent.
//!
//! # Design
//! A fresh agent is built per call from the settings frozen into the request,
//! so two requests never share proxy or redirect configuration. Status codes
//! are never turned into errors; a 404 is returned as a response like any
//! other. Redirect traversal, proxy tunneling, TLS and Basic proxy
//! authentication all belong to `ureq`.

use std::time::Duration;

use tracing::{debug, warn};
use ureq::http::Response;
use ureq::typestate::WithBody;
use ureq::{Agent, Body, Proxy, RequestBuilder};

use crate::error::CallError;
use crate::http::{HeaderEntry, HttpMethod, HttpRequest, RequestBody};

/// Redirect hops allowed when redirects are followed.
pub const MAX_REDIRECTS: u32 = 10;

/// Build the agent for one request.
pub fn agent_for(request: &HttpRequest) -> Result<Agent, CallError> {
    let proxy = match &request.proxy {
        Some(proxy) => {
            let uri = proxy.to_uri();
            let parsed = Proxy::new(&uri).map_err(|source| CallError::InvalidProxy {
                uri: format!("{}://{}:{}", proxy.kind.scheme(), proxy.host, proxy.port),
                source,
            })?;
            Some(parsed)
        }
        None => None,
    };

    // With redirects off the 3xx response itself is the result.
    let redirects = if request.follow_redirects { MAX_REDIRECTS } else { 0 };
    // Each phase gets the full budget. The body budget is total, not per read.
    let timeout = Some(Duration::from_secs(request.timeout_secs));

    Ok(Agent::config_builder()
        .http_status_as_error(false)
        .timeout_connect(timeout)
        .timeout_send_request(timeout)
        .timeout_send_body(timeout)
        .timeout_recv_response(timeout)
        .timeout_recv_body(timeout)
        .max_redirects(redirects)
        .max_redirects_will_error(request.follow_redirects)
        .proxy(proxy)
        .build()
        .new_agent())
}

/// Send the request, retrying once on connection-level failure when enabled.
pub fn execute(request: &HttpRequest) -> Result<Response<Body>, CallError> {
    let agent = agent_for(request)?;

    match send(&agent, request) {
        Err(err) if request.retry_on_failure && is_connection_failure(&err) => {
            debug!(url = %request.url, error = %err, "connection failed, retrying once");
            send(&agent, request)
        }
        other => other,
    }
    .map_err(|source| {
        warn!(url = %request.url, error = %source, "request failed");
        CallError::transport(&request.url, source)
    })
}

fn send(agent: &Agent, request: &HttpRequest) -> Result<Response<Body>, ureq::Error> {
    let url = request.url.as_str();
    let headers = request.headers.as_slice();
    let body = request.body.as_ref();

    debug!(method = %request.method, url, "sending request");
    match request.method {
        HttpMethod::Get => with_headers(agent.get(url), headers).call(),
        HttpMethod::Head => with_headers(agent.head(url), headers).call(),
        HttpMethod::Post => send_body(with_headers(agent.post(url), headers), body),
        HttpMethod::Put => send_body(with_headers(agent.put(url), headers), body),
        HttpMethod::Patch => send_body(with_headers(agent.patch(url), headers), body),
        HttpMethod::Delete => {
            send_body(with_headers(agent.delete(url).force_send_body(), headers), body)
        }
        HttpMethod::Connect => {
            send_body(with_headers(agent.connect(url).force_send_body(), headers), body)
        }
        HttpMethod::Options => {
            send_body(with_headers(agent.options(url).force_send_body(), headers), body)
        }
        HttpMethod::Trace => {
            send_body(with_headers(agent.trace(url).force_send_body(), headers), body)
        }
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[HeaderEntry]) -> RequestBuilder<B> {
    for HeaderEntry { key, value } in headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder
}

fn send_body(
    builder: RequestBuilder<WithBody>,
    body: Option<&RequestBody>,
) -> Result<Response<Body>, ureq::Error> {
    match body {
        Some(body) => builder
            .content_type(body.media_type.as_str())
            .send(body.content.as_bytes()),
        None => builder.send_empty(),
    }
}

/// Failures that happen before a response arrives and are worth one retry.
pub fn is_connection_failure(err: &ureq::Error) -> bool {
    matches!(
        err,
        ureq::Error::Io(_)
            | ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
            | ureq::Error::Timeout(_)
    )
}

/// Response headers in wire order.
pub fn response_headers(response: &Response<Body>) -> Vec<HeaderEntry> {
    response
        .headers()
        .iter()
        .map(|(name, value)| {
            HeaderEntry::new(name.as_str(), String::from_utf8_lossy(value.as_bytes()))
        })
        .collect()
}
