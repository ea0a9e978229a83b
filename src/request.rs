//! Request model the engine dispatches over.
//!
//! The transport layer (out of scope here) constructs a [`Request`] from the
//! raw HTTP message; the dispatch loop then rewrites `url`/`base_url`/`params`
//! around mount points and restores them when control returns past the mount.

use crate::app::Settings;
use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum number of path/query parameters before heap allocation.
/// Most REST APIs have ≤4 path params (e.g., `/users/:id/posts/:post_id`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` instead of `String` because names come from
/// the compiled pattern keys (known at registration) and `Arc::clone()` is
/// O(1); values remain `String` as they are per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Stack-allocated header storage. Header names repeat across requests
/// (`content-type`, `authorization`, ...) so they share the `Arc<str>` key
/// layout with [`ParamVec`].
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// An in-flight request as the dispatch engine sees it.
///
/// `url` and `base_url` are live state: inside a subtree mounted at
/// `/admin`, a request for `/admin/users` observes `url == "/users"` and
/// `base_url == "/admin"`; both revert once control returns past the mount.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request target relative to `base_url`, including any query string.
    /// Rewritten while control is inside a mounted subtree.
    pub url: String,
    /// Mount prefix accumulated by the routers above the current layer.
    pub base_url: String,
    /// The request target as originally received, never rewritten.
    pub original_url: String,
    /// Parameters captured by the currently matched layer (merged with
    /// ancestor captures when the owning router enables `merge_params`).
    pub params: ParamVec,
    /// Query string parameters parsed at construction.
    pub query_params: ParamVec,
    /// HTTP headers (lowercase names).
    pub headers: HeaderVec,
    /// Request body parsed as JSON, if any.
    pub body: Option<Value>,
    /// Settings of the application currently handling this request.
    /// Swapped while control is inside a mounted application.
    pub settings: Option<Arc<Settings>>,
}

impl Request {
    /// Build a request for the given method and target.
    ///
    /// The target keeps its query string in `url`; query parameters are
    /// parsed eagerly into `query_params`.
    #[must_use]
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            base_url: String::new(),
            original_url: url.to_string(),
            params: ParamVec::new(),
            query_params: parse_query_params(url),
            headers: HeaderVec::new(),
            body: None,
            settings: None,
        }
    }

    /// Pathname of the current `url`, ignoring any query string.
    ///
    /// Returns `None` when no pathname can be derived (the request is then
    /// unroutable). Origin-form targets are sliced directly; absolute-form
    /// targets (`http://host/path`) go through a full URI parse.
    #[must_use]
    pub fn pathname(&self) -> Option<String> {
        if let Some(rest) = self.url.strip_prefix('/') {
            let end = rest.find(['?', '#']).unwrap_or(rest.len());
            return Some(format!("/{}", &rest[..end]));
        }
        if self.url.is_empty() {
            return None;
        }
        url::Url::parse(&self.url)
            .ok()
            .map(|u| u.path().to_string())
    }

    /// Get a captured parameter by name.
    ///
    /// Uses "last write wins" semantics: with duplicate names at different
    /// depths the innermost capture is returned.
    #[inline]
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite (or insert) a captured parameter value. Parameter
    /// precondition callbacks use this to coerce raw values in place.
    pub fn set_param(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.params.iter_mut().rfind(|(k, _)| k.as_ref() == name) {
            slot.1 = value;
        } else {
            self.params.push((Arc::from(name), value));
        }
    }

    /// Get a query parameter by name (last write wins).
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    /// Convert params to a HashMap for compatibility with non-hot-path code.
    /// Note: this allocates — use `get_param()` in hot paths instead.
    #[must_use]
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Parse query string parameters from a request target.
///
/// Extracts everything after the `?` character and URL-decodes parameter
/// names and values.
#[must_use]
pub fn parse_query_params(url: &str) -> ParamVec {
    match url.split_once('?') {
        Some((_, query)) => {
            let query = query.split('#').next().unwrap_or(query);
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (Arc::from(k.as_ref()), v.to_string()))
                .collect()
        }
        None => ParamVec::new(),
    }
}
