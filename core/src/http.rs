//! HTTP request/response values and the transport that executes them.
//!
//! # Design
//! Requests and responses are plain owned data. `AccountClient` builds an
//! `HttpRequest` and parses an `HttpResponse` without knowing how the bytes
//! move; the `Transport` trait is the only place that touches the network.
//! `UreqTransport` is the default implementation. Tests substitute their own.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use ureq::tls::TlsConfig;
use ureq::{Agent, RequestBuilder};

use crate::config::Config;
use crate::error::TransportError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data. The body is kept as raw
/// bytes; decoding it is the parser's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Body as text for diagnostics, invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Executes one request within `timeout`.
///
/// Implementations must return every status code as an `HttpResponse`;
/// only failures to obtain a response are `TransportError`s.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a shared `ureq` agent. The agent keeps its
/// own connection pool and is safe to use from many threads.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new(config: &Config) -> Self {
        let tls = TlsConfig::builder()
            .disable_verification(config.skip_verify())
            .build();
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .tls_config(tls)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => prepare(self.agent.get(&request.url), request, timeout).call(),
            (HttpMethod::Delete, _) => {
                prepare(self.agent.delete(&request.url), request, timeout).call()
            }
            (HttpMethod::Post, Some(body)) => {
                prepare(self.agent.post(&request.url), request, timeout).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => {
                prepare(self.agent.post(&request.url), request, timeout).send_empty()
            }
        };
        let mut response = result.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn prepare<B>(mut builder: RequestBuilder<B>, request: &HttpRequest, timeout: Duration) -> RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.config().timeout_global(Some(timeout)).build()
}

fn transport_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(which) => TransportError::Timeout(format!("{which:?}")),
        other => TransportError::Connection(Box::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost:8080/v1/organisation/accounts/x".to_string(),
            headers: vec![("Accept".to_string(), "application/vnd.api+json".to_string())],
            body: None,
        };
        assert_eq!(req.header("accept"), Some("application/vnd.api+json"));
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn method_names() {
        assert_eq!(HttpMethod::Get.as_str(), "GET");
        assert_eq!(HttpMethod::Post.as_str(), "POST");
        assert_eq!(HttpMethod::Delete.as_str(), "DELETE");
    }

    #[test]
    fn transport_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<UreqTransport>();
    }

    #[test]
    fn transport_builds_with_verification_disabled() {
        let config = Config::new(Some("https://localhost:8443"), Duration::ZERO, true);
        let transport = UreqTransport::new(&config);
        assert_eq!(format!("{transport:?}"), "UreqTransport { .. }");
    }

    #[test]
    fn response_text_replaces_invalid_utf8() {
        let response = HttpResponse {
            status: 502,
            headers: Vec::new(),
            body: vec![b'o', b'k', 0xff],
        };
        assert_eq!(response.text(), "ok\u{fffd}");
    }
}
