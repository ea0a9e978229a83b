//! Response model produced by handlers.

use crate::app::Settings;
use crate::request::HeaderVec;
use serde_json::Value;
use std::sync::Arc;

/// The response a dispatch builds up.
///
/// Handlers write into this and return [`Flow::Halt`](crate::flow::Flow::Halt)
/// when the response is terminal. The engine itself only writes one response:
/// the synthesized `OPTIONS` reply (status 200, `Allow` header, verb list
/// body). Serializing this onto a socket is the transport's job.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code (200, 404, 500, ...)
    pub status: u16,
    /// Response headers (lowercase names except where set verbatim).
    pub headers: HeaderVec,
    /// Response body as JSON; `Value::String` bodies are sent as text.
    pub body: Value,
    /// Settings of the application currently handling this request.
    pub settings: Option<Arc<Settings>>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// A fresh 200 response with no headers and a null body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderVec::new(),
            body: Value::Null,
            settings: None,
        }
    }

    /// Get a header by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header, replacing any existing value (case-insensitive).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    /// Write a JSON body with the given status and a `content-type` header.
    pub fn send_json(&mut self, status: u16, body: Value) {
        self.status = status;
        self.set_header("content-type", "application/json");
        self.body = body;
    }

    /// Write a plain-text body with the given status.
    pub fn send_text(&mut self, status: u16, body: impl Into<String>) {
        self.status = status;
        self.set_header("content-type", "text/plain");
        self.body = Value::String(body.into());
    }
}
