//! Layer - the atomic dispatch unit.
//!
//! A layer pairs a compiled path pattern with a handler. The handler kind is
//! an explicit tagged variant chosen at registration time (request
//! middleware, error middleware, a route, or a mounted dispatcher) — there
//! is no per-call shape inspection. Matching returns a [`PathMatch`] value;
//! layers hold no per-request state and are shared read-only across
//! concurrent dispatches.

use crate::error::DispatchError;
use crate::flow::{Dispatch, ErrorHandler, Flow, Handler};
use crate::path::{PathMatch, PathPattern};
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// A middleware handler, tagged by kind at registration.
pub(crate) enum LayerHandler {
    Request(Arc<dyn Handler>),
    Error(Arc<dyn ErrorHandler>),
}

/// What a layer dispatches into when it matches.
pub(crate) enum LayerKind {
    /// Plain middleware (request- or error-handling).
    Handler(LayerHandler),
    /// A route with its own per-method stack.
    Route(Route),
    /// A mounted sub-router or sub-application.
    Mount(Arc<dyn Dispatch>),
}

/// One entry in a router's stack.
pub struct Layer {
    pub(crate) pattern: PathPattern,
    pub(crate) kind: LayerKind,
}

impl Layer {
    pub(crate) fn new(pattern: PathPattern, kind: LayerKind) -> Self {
        Self { pattern, kind }
    }

    /// Match this layer's pattern against a request pathname.
    pub(crate) fn matches(&self, path: &str) -> Result<Option<PathMatch>, DispatchError> {
        self.pattern.matches(path)
    }

    /// The route owned by this layer, if it is a route layer.
    pub(crate) fn route(&self) -> Option<&Route> {
        match &self.kind {
            LayerKind::Route(route) => Some(route),
            _ => None,
        }
    }
}

/// Invoke a handler during normal (no pending error) scanning.
///
/// Error-handling layers do not participate in normal flow; they report
/// [`Flow::Next`] without running, exactly as if they had not matched.
pub(crate) fn invoke_request(handler: &LayerHandler, req: &mut Request, res: &mut Response) -> Flow {
    match handler {
        LayerHandler::Request(f) => guarded(|| f.call(req, res)),
        LayerHandler::Error(_) => Flow::Next,
    }
}

/// Invoke a handler while an error is pending.
///
/// Request-handling layers are forwarded past: the pending error continues
/// unchanged until an error-handling layer accepts it.
pub(crate) fn invoke_error(
    handler: &LayerHandler,
    err: &DispatchError,
    req: &mut Request,
    res: &mut Response,
) -> Flow {
    match handler {
        LayerHandler::Error(f) => guarded(|| f.call(err, req, res)),
        LayerHandler::Request(_) => Flow::Fail(err.clone()),
    }
}

/// Run a handler with panic recovery.
///
/// A panicking handler must never tear down the dispatch (or the worker
/// executing it); the panic is converted into a 500-class error that
/// propagates through the ordinary error channel.
pub(crate) fn guarded<F>(f: F) -> Flow
where
    F: FnOnce() -> Flow,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(flow) => {
            debug!(flow = flow_label(&flow), "Handler returned");
            flow
        }
        Err(panic) => {
            let panic_message = format!("{panic:?}");
            error!(panic_message = %panic_message, "Handler panicked");
            Flow::Fail(DispatchError::internal(format!(
                "handler panicked: {panic_message}"
            )))
        }
    }
}

fn flow_label(flow: &Flow) -> &'static str {
    match flow {
        Flow::Next => "next",
        Flow::Halt => "halt",
        Flow::SkipRoute => "skip_route",
        Flow::SkipRouter => "skip_router",
        Flow::Fail(_) => "fail",
    }
}
