//! Router dispatch - hot path for request handling.
//!
//! `Router::handle` is the central state machine: a trampoline loop driven
//! by the [`Flow`] value each invocation returns. The loop walks the layer
//! stack in registration order, offers every layer for matching, resolves
//! parameter preconditions for an accepted layer, rewrites the request URL
//! around mounted prefixes, and carries at most one pending error that only
//! error-handling layers may clear.
//!
//! All dispatch state lives in locals created per `handle` call. The router,
//! its layers and its routes are read-only here, so concurrently in-flight
//! requests share them without coordination.

use crate::error::DispatchError;
use crate::flow::{Flow, Outcome};
use crate::layer::{guarded, invoke_error, invoke_request, Layer, LayerKind};
use crate::path::{PathKey, PathMatch};
use crate::request::{ParamVec, Request};
use crate::response::Response;
use crate::route::StackOutcome;
use crate::router::Router;
use http::Method;
use may::coroutine;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A parameter outcome stored for replay within one dispatch.
enum StoredParamError {
    Fail(DispatchError),
    SkipRoute,
    SkipRouter,
}

/// Result of running the precondition callbacks for one parameter name.
///
/// Replayed instead of re-running the callbacks when a later layer captures
/// the same name with the same value — mounted sub-routers re-match the
/// same named parameter all the time, and the callbacks must observe one
/// resolution per request, not one per matching layer.
struct ParamResolution {
    /// The raw captured value the callbacks ran against.
    matched: String,
    /// The value after the callbacks ran (they may coerce it in place).
    value: String,
    error: Option<StoredParamError>,
}

impl Router {
    /// Dispatch a request through this router's stack.
    ///
    /// Returns [`Outcome::Handled`] once a handler (or the synthesized
    /// `OPTIONS` response) terminates the request, otherwise
    /// [`Outcome::Exhausted`] with any still-pending error. The caller owns
    /// turning an exhausted dispatch into a client-visible response.
    pub fn handle(&self, req: &mut Request, res: &mut Response) -> Outcome {
        // Captured for restoration when this dispatch completes; the layer
        // currently being left also restores url/base_url itself.
        let parent_params = req.params.clone();
        let parent_url = req.base_url.clone();

        debug!(
            method = %req.method,
            url = %req.url,
            base_url = %parent_url,
            layers = self.stack.len(),
            "Router dispatch start"
        );

        let mut called: HashMap<String, ParamResolution> = HashMap::new();
        let mut options_methods: Vec<String> = Vec::new();
        let mut pending: Option<DispatchError> = None;
        let mut spins = 0usize;
        let mut idx = 0usize;

        let outcome = loop {
            if idx >= self.stack.len() {
                break self.finish(req, res, pending.take(), &options_methods);
            }
            if spins > self.config.spin_limit {
                // Long pass-through runs must not monopolize the scheduler.
                if coroutine::is_coroutine() {
                    coroutine::yield_now();
                }
                spins = 0;
            }

            // The pathname is recomputed from the live url every step: a
            // mounted subtree further up may have rewritten it.
            let path = match req.pathname() {
                Some(path) => path,
                None => {
                    warn!(url = %req.url, "Request target has no pathname, unroutable");
                    break Outcome::Exhausted(pending.take());
                }
            };

            let layer = &self.stack[idx];
            idx += 1;
            spins += 1;

            let layer_match = match layer.matches(&path) {
                Ok(Some(layer_match)) => layer_match,
                Ok(None) => continue,
                Err(err) => {
                    // Malformed captures become the pending error (first one
                    // wins) and scanning continues so error layers can run.
                    debug!(pattern = layer.pattern.source(), error = %err, "Layer match errored");
                    pending = Some(pending.take().unwrap_or(err));
                    continue;
                }
            };

            if let Some(route) = layer.route() {
                // Routes never run while an error is pending.
                if pending.is_some() {
                    continue;
                }
                if !route.handles_method(&req.method) {
                    if req.method == Method::OPTIONS {
                        append_methods(&mut options_methods, route.allowed_methods());
                    }
                    if req.method != Method::HEAD {
                        continue;
                    }
                }
            }

            debug!(
                pattern = layer.pattern.source(),
                matched = %layer_match.path,
                params = layer_match.params.len(),
                "Layer accepted"
            );

            // Params visible to the layer: its own captures, merged with the
            // ancestor's when configured.
            req.params = if self.config.merge_params {
                merge_params(&layer_match.params, &parent_params)
            } else {
                layer_match.params.clone()
            };

            match self.process_params(layer.pattern.keys(), &mut called, req, res) {
                Flow::Next => {}
                Flow::Halt => break Outcome::Handled,
                Flow::SkipRoute => continue,
                Flow::SkipRouter => break Outcome::Exhausted(None),
                Flow::Fail(err) => {
                    pending = Some(pending.take().unwrap_or(err));
                    continue;
                }
            }

            spins = 0;
            match self.invoke_layer(layer, &layer_match, &parent_url, &pending, req, res) {
                Flow::Next => pending = None,
                Flow::Halt => break Outcome::Handled,
                Flow::SkipRoute => pending = None,
                Flow::SkipRouter => break Outcome::Exhausted(None),
                Flow::Fail(err) => pending = Some(err),
            }
        };

        req.params = parent_params;
        debug!(outcome = outcome_label(&outcome), "Router dispatch complete");
        outcome
    }

    /// Invoke an accepted layer, rewriting the request URL around non-route
    /// layers that matched a non-empty prefix.
    fn invoke_layer(
        &self,
        layer: &Layer,
        layer_match: &PathMatch,
        parent_url: &str,
        pending: &Option<DispatchError>,
        req: &mut Request,
        res: &mut Response,
    ) -> Flow {
        match &layer.kind {
            LayerKind::Route(route) => {
                // `pending` is always None here: route layers are rejected
                // during scanning while an error is pending.
                match route.dispatch(req, res) {
                    StackOutcome::Halt => Flow::Halt,
                    StackOutcome::SkipRouter => Flow::SkipRouter,
                    StackOutcome::Exhausted(Some(err)) => Flow::Fail(err),
                    StackOutcome::Exhausted(None) => Flow::Next,
                }
            }
            LayerKind::Handler(handler) => {
                let trim = TrimGuard::apply(req, &layer_match.path, parent_url);
                let flow = match pending {
                    Some(err) => invoke_error(handler, err, req, res),
                    None => invoke_request(handler, req, res),
                };
                trim.restore(req);
                flow
            }
            LayerKind::Mount(target) => {
                if let Some(err) = pending {
                    // A mounted dispatcher is not an error handler; the
                    // pending error is forwarded past it untouched.
                    return Flow::Fail(err.clone());
                }
                let trim = TrimGuard::apply(req, &layer_match.path, parent_url);
                let outcome = target.dispatch(req, res);
                trim.restore(req);
                match outcome {
                    Outcome::Handled => Flow::Halt,
                    Outcome::Exhausted(Some(err)) => Flow::Fail(err),
                    Outcome::Exhausted(None) => Flow::Next,
                }
            }
        }
    }

    /// Resolve parameter preconditions for the named keys of an accepted
    /// layer, in path-appearance order.
    fn process_params(
        &self,
        keys: &[PathKey],
        called: &mut HashMap<String, ParamResolution>,
        req: &mut Request,
        res: &mut Response,
    ) -> Flow {
        if self.param_callbacks.is_empty() || keys.is_empty() {
            return Flow::Next;
        }

        for key in keys {
            let name = key.name.as_ref();
            let Some(callbacks) = self.param_callbacks.get(name) else {
                continue;
            };
            let Some(raw) = req.get_param(name).map(str::to_string) else {
                continue;
            };

            if let Some(prev) = called.get(name) {
                // A terminal error replays regardless of the captured value;
                // a clean resolution (or a route skip) replays only when the
                // value is identical.
                let replayable = matches!(
                    prev.error,
                    Some(StoredParamError::Fail(_)) | Some(StoredParamError::SkipRouter)
                );
                if replayable || prev.matched == raw {
                    let value = prev.value.clone();
                    req.set_param(name, value);
                    match &prev.error {
                        Some(StoredParamError::Fail(err)) => return Flow::Fail(err.clone()),
                        Some(StoredParamError::SkipRouter) => return Flow::SkipRouter,
                        Some(StoredParamError::SkipRoute) => return Flow::SkipRoute,
                        None => continue,
                    }
                }
            }

            debug!(
                param = name,
                value = %raw,
                callbacks = callbacks.len(),
                "Resolving parameter preconditions"
            );
            called.insert(
                name.to_string(),
                ParamResolution {
                    matched: raw.clone(),
                    value: raw.clone(),
                    error: None,
                },
            );

            for callback in callbacks {
                match guarded(|| callback.call(req, res, &raw, name)) {
                    Flow::Next => {}
                    Flow::Halt => return Flow::Halt,
                    Flow::SkipRoute => {
                        if let Some(entry) = called.get_mut(name) {
                            entry.error = Some(StoredParamError::SkipRoute);
                        }
                        return Flow::SkipRoute;
                    }
                    Flow::SkipRouter => {
                        if let Some(entry) = called.get_mut(name) {
                            entry.error = Some(StoredParamError::SkipRouter);
                        }
                        return Flow::SkipRouter;
                    }
                    Flow::Fail(err) => {
                        if let Some(entry) = called.get_mut(name) {
                            entry.error = Some(StoredParamError::Fail(err.clone()));
                        }
                        return Flow::Fail(err);
                    }
                }
            }

            // The callbacks may have coerced the value; store what they left
            // behind so a replay restores the coerced value, not the raw one.
            if let Some(entry) = called.get_mut(name) {
                if let Some(value) = req.get_param(name) {
                    entry.value = value.to_string();
                }
            }
        }
        Flow::Next
    }

    /// Terminal step for an exhausted stack.
    fn finish(
        &self,
        req: &Request,
        res: &mut Response,
        pending: Option<DispatchError>,
        options_methods: &[String],
    ) -> Outcome {
        if let Some(err) = pending {
            return Outcome::Exhausted(Some(err));
        }
        if req.method == Method::OPTIONS && !options_methods.is_empty() {
            let allow = options_methods.join(",");
            debug!(allow = %allow, "Synthesizing OPTIONS response");
            res.send_text(200, allow.clone());
            res.set_header("Allow", allow);
            return Outcome::Handled;
        }
        Outcome::Exhausted(None)
    }
}

/// Merge a layer's captured params over the ancestor's.
///
/// Lookups are last-write-wins, so appending the child entries makes them
/// override on name collision without destroying the ancestor's. When both
/// sides carry positional (integer-named) captures, the child's indices
/// shift upward by the ancestor's positional count, keeping the union
/// ordered and gap-free.
pub(crate) fn merge_params(captures: &ParamVec, parent: &ParamVec) -> ParamVec {
    if parent.is_empty() {
        return captures.clone();
    }
    let parent_positional = parent
        .iter()
        .filter(|(name, _)| name.parse::<usize>().is_ok())
        .count();
    let mut merged = parent.clone();
    for (name, value) in captures.iter() {
        match name.parse::<usize>() {
            Ok(index) if parent_positional > 0 => {
                let shifted = (index + parent_positional).to_string();
                merged.push((Arc::from(shifted.as_str()), value.clone()));
            }
            _ => merged.push((Arc::clone(name), value.clone())),
        }
    }
    merged
}

/// Accumulate allowed methods for the automatic `OPTIONS` response,
/// preserving first-seen order.
pub(crate) fn append_methods(dst: &mut Vec<String>, src: Vec<String>) {
    for method in src {
        if !dst.contains(&method) {
            dst.push(method);
        }
    }
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Handled => "handled",
        Outcome::Exhausted(Some(_)) => "exhausted_error",
        Outcome::Exhausted(None) => "exhausted",
    }
}

/// URL rewriting around a layer that matched a non-empty prefix.
///
/// While control is inside the layer's subtree the matched prefix is
/// stripped from `req.url` and appended to `req.base_url`; both revert when
/// control returns past the layer. Absolute-form targets keep their
/// scheme/authority part untouched.
struct TrimGuard {
    removed: Option<String>,
    slash_added: bool,
    parent_url: String,
    protohost_len: usize,
}

impl TrimGuard {
    fn apply(req: &mut Request, removed: &str, parent_url: &str) -> Self {
        if removed.is_empty() {
            return Self {
                removed: None,
                slash_added: false,
                parent_url: String::new(),
                protohost_len: 0,
            };
        }

        let protohost_len = protohost(&req.url).len();
        debug!(removed = %removed, url = %req.url, "Trim prefix from url");

        let mut new_url = {
            let prefix = &req.url[..protohost_len];
            let rest = &req.url[protohost_len + removed.len()..];
            format!("{prefix}{rest}")
        };
        let mut slash_added = false;
        if protohost_len == 0 && !new_url.starts_with('/') {
            new_url.insert(0, '/');
            slash_added = true;
        }
        req.url = new_url;

        let base = removed.strip_suffix('/').unwrap_or(removed);
        req.base_url = format!("{parent_url}{base}");

        Self {
            removed: Some(removed.to_string()),
            slash_added,
            parent_url: parent_url.to_string(),
            protohost_len,
        }
    }

    fn restore(self, req: &mut Request) {
        let Some(removed) = self.removed else {
            return;
        };
        if self.slash_added {
            req.url.remove(0);
        }
        let restored = {
            let prefix = &req.url[..self.protohost_len];
            let rest = &req.url[self.protohost_len..];
            format!("{prefix}{removed}{rest}")
        };
        req.url = restored;
        req.base_url = self.parent_url;
    }
}

/// Scheme + authority of an absolute-form request target, empty for the
/// common origin-form.
fn protohost(url: &str) -> &str {
    if url.is_empty() || url.starts_with('/') {
        return "";
    }
    let search_end = url.find('?').unwrap_or(url.len());
    let Some(proto_end) = url[..search_end].find("://") else {
        return "";
    };
    match url[proto_end + 3..search_end].find('/') {
        Some(path_start) => &url[..proto_end + 3 + path_start],
        None => "",
    }
}
