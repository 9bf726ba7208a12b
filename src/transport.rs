//! HTTP plumbing: a minimal [`Transport`] seam plus the reqwest-backed implementation,
//! and translation of Eurostat error payloads into [`Error`] kinds.

use crate::error::{Error, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde_json::Value;
use std::time::Duration;

/// Raw HTTP response: status code plus body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into the matching error; pass successes through.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(error_from_response(self.status, &self.body))
        }
    }
}

/// Issues GET requests. Implementations only fail on network problems; HTTP error
/// statuses are returned as responses.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, params: &[(String, String)]) -> Result<Response>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout) // total request timeout
            .connect_timeout(connect_timeout)
            .redirect(Policy::limited(5)) // cap redirects
            .user_agent(concat!("eustat-rs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, params: &[(String, String)]) -> Result<Response> {
        log::debug!("GET {url} ({} params)", params.len());
        let resp = self.http.get(url).query(params).send()?;
        let status = resp.status().as_u16();
        let body = resp.bytes()?.to_vec();
        log::debug!("GET {url} -> {status}, {} bytes", body.len());
        Ok(Response { status, body })
    }
}

/// Map an error response to an [`Error`].
///
/// Eurostat embeds `{"error": {"status": .., "label": ..}}` (sometimes as a list) in
/// JSON error bodies; its `status` wins over the HTTP one. Non-JSON bodies fall back to
/// the HTTP status.
pub fn error_from_response(http_status: u16, body: &[u8]) -> Error {
    if let Ok(v) = serde_json::from_slice::<Value>(body) {
        if let Some(info) = v.get("error") {
            let info = match info {
                Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
                other => other.clone(),
            };
            let status = info
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok())
                .unwrap_or(http_status);
            let message = info
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            return match status {
                404 => Error::DatasetNotFound(message),
                400 => Error::InvalidParameter(format!("bad request: {message}")),
                _ => Error::Api { status, message },
            };
        }
    }
    match http_status {
        404 => Error::DatasetNotFound("dataset not found".into()),
        400 => Error::InvalidParameter("invalid request parameters".into()),
        status => Error::Api {
            status,
            message: format!("HTTP {status}: {}", String::from_utf8_lossy(body)),
        },
    }
}

/// Detect the "too large, processed asynchronously" warning Eurostat returns with 200.
pub fn async_warning(doc: &Value) -> Option<Error> {
    let warning = doc.get("warning")?;
    (warning.get("status").and_then(Value::as_u64) == Some(413)).then(|| Error::Api {
        status: 413,
        message: "request too large, data will be processed asynchronously; \
                  try again later or use more specific filters"
            .into(),
    })
}
