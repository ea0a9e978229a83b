//! Path pattern compilation and matching - hot path for layer matching.

use crate::error::DispatchError;
use crate::request::ParamVec;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::debug;

/// Options captured when a pattern is compiled.
///
/// Layers registered through `use` compile with `end = false` (prefix
/// match); route layers compile with `end = true` (full match).
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// Treat `/Users` and `/users` as different paths.
    pub case_sensitive: bool,
    /// Require trailing slashes to match exactly.
    pub strict: bool,
    /// Anchor the pattern at the end of the path.
    pub end: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            strict: false,
            end: true,
        }
    }
}

/// Metadata for one capture group of a compiled pattern, in
/// path-appearance order.
#[derive(Debug, Clone)]
pub struct PathKey {
    /// Capture name (`id` for `:id`, positional `"0"`, `"1"`, ... for `*`).
    pub name: Arc<str>,
    /// The capture may be absent from a matching path (`:name?`, `:name*`).
    pub optional: bool,
    /// The capture may span multiple segments (`:name*`, `:name+`, `*`).
    pub repeating: bool,
}

/// A successful match: the path prefix the pattern consumed and the decoded
/// parameters it captured.
///
/// Returned by value and threaded through the dispatch loop; the pattern
/// itself holds no per-request state, so one compiled pattern is safely
/// shared by concurrently in-flight requests.
#[derive(Debug, Clone)]
pub struct PathMatch {
    /// Matched prefix (empty for a non-consuming mount-point match).
    pub path: String,
    /// Decoded name → value captures.
    pub params: ParamVec,
}

#[derive(Debug)]
enum MatcherKind {
    /// Bare `/` as a non-terminal mount point: matches any path, consumes
    /// nothing, captures nothing.
    FastSlash,
    /// Bare `*`: matches the entire remaining path under the key `"0"`.
    FastStar,
    Pattern(Regex),
}

/// A compiled path pattern.
#[derive(Debug)]
pub struct PathPattern {
    source: String,
    keys: Vec<PathKey>,
    end: bool,
    kind: MatcherKind,
}

impl PathPattern {
    /// Compile a pattern string.
    ///
    /// Pattern strings are registration-time input from the application, so
    /// the generated regex is well-formed by construction.
    #[must_use]
    pub fn compile(pattern: &str, opts: &MatchOptions) -> Self {
        if pattern == "/" && !opts.end {
            return Self {
                source: pattern.to_string(),
                keys: Vec::new(),
                end: false,
                kind: MatcherKind::FastSlash,
            };
        }
        if pattern == "*" {
            return Self {
                source: pattern.to_string(),
                keys: vec![PathKey {
                    name: Arc::from("0"),
                    optional: false,
                    repeating: true,
                }],
                end: opts.end,
                kind: MatcherKind::FastStar,
            };
        }

        let mut regex_src = String::with_capacity(pattern.len() + 8);
        regex_src.push('^');
        let mut keys = Vec::new();
        let mut wildcard_index = 0usize;

        for segment in pattern.split('/') {
            if segment.is_empty() {
                continue;
            }
            if let Some(spec) = segment.strip_prefix(':') {
                let (name, modifier) = match spec.as_bytes().last() {
                    Some(b'?') | Some(b'*') | Some(b'+') => {
                        (&spec[..spec.len() - 1], spec.as_bytes()[spec.len() - 1])
                    }
                    _ => (spec, 0),
                };
                match modifier {
                    b'?' => regex_src.push_str("(?:/([^/]+))?"),
                    b'*' => regex_src.push_str("(?:/((?:[^/]+)(?:/[^/]+)*))?"),
                    b'+' => regex_src.push_str("/((?:[^/]+)(?:/[^/]+)*)"),
                    _ => regex_src.push_str("/([^/]+)"),
                }
                keys.push(PathKey {
                    name: Arc::from(name),
                    optional: matches!(modifier, b'?' | b'*'),
                    repeating: matches!(modifier, b'*' | b'+'),
                });
            } else if segment == "*" {
                regex_src.push_str("/(.*)");
                keys.push(PathKey {
                    name: Arc::from(wildcard_index.to_string().as_str()),
                    optional: false,
                    repeating: true,
                });
                wildcard_index += 1;
            } else {
                regex_src.push('/');
                regex_src.push_str(&regex::escape(segment));
            }
        }

        // A bare "/" route pattern produces no segments above.
        if regex_src.len() == 1 {
            regex_src.push('/');
        }
        if opts.end {
            if !opts.strict {
                regex_src.push_str("/?");
            }
            regex_src.push('$');
        }

        let regex = RegexBuilder::new(&regex_src)
            .case_insensitive(!opts.case_sensitive)
            .build()
            .expect("failed to compile route pattern");

        debug!(pattern = %pattern, regex = %regex_src, keys = keys.len(), "Pattern compiled");

        Self {
            source: pattern.to_string(),
            keys,
            end: opts.end,
            kind: MatcherKind::Pattern(regex),
        }
    }

    /// The pattern string this matcher was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Capture-group metadata in path-appearance order.
    #[must_use]
    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    /// Match a request pathname.
    ///
    /// Returns `Ok(None)` on a clean no-match and `Err` when a captured
    /// value carries a malformed percent-encoding (status 400 — a client
    /// error, never a crash).
    pub fn matches(&self, path: &str) -> Result<Option<PathMatch>, DispatchError> {
        match &self.kind {
            MatcherKind::FastSlash => Ok(Some(PathMatch {
                path: String::new(),
                params: ParamVec::new(),
            })),
            MatcherKind::FastStar => {
                let mut params = ParamVec::new();
                params.push((Arc::from("0"), decode_param(path)?));
                Ok(Some(PathMatch {
                    path: path.to_string(),
                    params,
                }))
            }
            MatcherKind::Pattern(regex) => {
                let caps = match regex.captures(path) {
                    Some(caps) => caps,
                    None => return Ok(None),
                };
                let matched = caps.get(0).map_or("", |m| m.as_str());
                if !self.end {
                    // No lookahead in the regex engine: enforce the segment
                    // boundary after the matched prefix here instead.
                    let rest = &path[matched.len()..];
                    if !rest.is_empty() && !rest.starts_with('/') && !matched.ends_with('/') {
                        return Ok(None);
                    }
                }
                let mut params = ParamVec::new();
                for (i, key) in self.keys.iter().enumerate() {
                    if let Some(value) = caps.get(i + 1) {
                        params.push((Arc::clone(&key.name), decode_param(value.as_str())?));
                    }
                }
                Ok(Some(PathMatch {
                    path: matched.to_string(),
                    params,
                }))
            }
        }
    }
}

/// Percent-decode one captured path value.
///
/// `urlencoding` passes malformed `%` sequences through untouched, so the
/// triplets are validated first; decoding then only fails on invalid UTF-8.
/// Either failure reports the raw value with status 400.
fn decode_param(raw: &str) -> Result<String, DispatchError> {
    if !raw.contains('%') {
        return Ok(raw.to_string());
    }
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len()
                || !bytes[i + 1].is_ascii_hexdigit()
                || !bytes[i + 2].is_ascii_hexdigit()
            {
                return Err(decode_error(raw));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    match urlencoding::decode(raw) {
        Ok(decoded) => Ok(decoded.into_owned()),
        Err(_) => Err(decode_error(raw)),
    }
}

fn decode_error(raw: &str) -> DispatchError {
    DispatchError::bad_request(format!("failed to decode param '{raw}'"))
}
