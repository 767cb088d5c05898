//! HTTP transport types and the transport seam.
//!
//! # Design
//! Requests and responses are plain data. `CrumbClient` builds an
//! `HttpRequest`, hands it to a `Transport`, and classifies the returned
//! `HttpResponse`. Only the transport touches the network, so the protocol
//! logic can be exercised against a scripted transport in tests.
//!
//! A transport reads the whole response body before returning. The network
//! stream and pooled connection are therefore released when `send` returns,
//! whichever way it returns.

use std::fmt;
use std::time::Duration;

use tracing::trace;

use crate::error::TransportError;

/// An HTTP POST with an empty body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// First header value with a case-insensitive name match.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// First header value with a case-insensitive name match.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Executes one request/response exchange.
///
/// Implementations must be safe to share between threads: a single
/// transport serves every `execute` call made on a client.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport backed by a pooled `ureq::Agent`.
///
/// The agent never follows redirects and never turns 4xx/5xx statuses into
/// errors; both are the executor's job. Bodies are decoded with the charset
/// from `Content-Type`, falling back to UTF-8, and are read whole unless a
/// size cap is configured.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    max_body_bytes: u64,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

impl UreqTransport {
    /// `max_body_bytes: None` lifts ureq's default 10 MiB read cap.
    pub fn new(timeout: Option<Duration>, max_body_bytes: Option<u64>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self {
            agent,
            max_body_bytes: max_body_bytes.unwrap_or(u64::MAX),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.agent.post(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder.send_empty()?;

        let status = response.status().as_u16();
        let headers = header_pairs(response.headers());
        let body = response
            .body_mut()
            .with_config()
            .limit(self.max_body_bytes)
            .read_to_string()?;
        trace!(status, bytes = body.len(), "response body read");

        Ok(HttpResponse { status, headers, body })
    }
}

/// Header values outside visible ASCII are decoded lossily rather than
/// dropped.
fn header_pairs(headers: &ureq::http::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| {
            let value = String::from_utf8_lossy(v.as_bytes()).into_owned();
            (k.as_str().to_string(), value)
        })
        .collect()
}
