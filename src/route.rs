//! Route - a layer specialization with a per-method handler stack.

use crate::error::DispatchError;
use crate::flow::{ErrorHandler, Flow, Handler};
use crate::layer::{invoke_error, invoke_request, LayerHandler};
use crate::request::Request;
use crate::response::Response;
use crate::runtime_config::DEFAULT_SPIN_LIMIT;
use http::Method;
use may::coroutine;
use std::sync::Arc;
use tracing::{debug, info};

/// Terminal result of walking a single handler stack.
#[derive(Debug)]
pub(crate) enum StackOutcome {
    /// A handler produced the terminal response.
    Halt,
    /// The stack ran out; `Some` carries a still-pending error.
    Exhausted(Option<DispatchError>),
    /// A handler asked to abort the owning router's stack as well.
    SkipRouter,
}

/// One entry of a route's method stack. `method: None` marks an
/// all-methods handler.
struct MethodLayer {
    method: Option<Method>,
    handler: LayerHandler,
}

/// A route: the handlers registered for one path, grouped by HTTP method.
///
/// Created once per [`Router::route`](crate::router::Router::route) call;
/// the path is immutable, the method stack grows as verbs are added.
pub struct Route {
    path: String,
    stack: Vec<MethodLayer>,
    /// Methods answered, in registration order (drives `Allow` ordering).
    methods: Vec<Method>,
    has_all: bool,
}

impl Route {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stack: Vec::new(),
            methods: Vec::new(),
            has_all: false,
        }
    }

    /// The pattern string this route was registered under (diagnostics).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this route answers the given method.
    ///
    /// `HEAD` falls back to the `GET` stack when no explicit `HEAD` handler
    /// is registered; an all-methods handler answers everything.
    #[must_use]
    pub fn handles_method(&self, method: &Method) -> bool {
        if self.has_all {
            return true;
        }
        if *method == Method::HEAD && !self.methods.contains(&Method::HEAD) {
            return self.methods.contains(&Method::GET);
        }
        self.methods.contains(method)
    }

    /// Upper-cased methods this route answers, in registration order.
    /// `HEAD` is appended automatically when `GET` is present without an
    /// explicit `HEAD` registration. Feeds `OPTIONS` responses.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self
            .methods
            .iter()
            .map(|m| m.as_str().to_string())
            .collect();
        if self.methods.contains(&Method::GET) && !self.methods.contains(&Method::HEAD) {
            methods.push(Method::HEAD.as_str().to_string());
        }
        methods
    }

    /// Register a handler for one method.
    pub fn method(&mut self, method: Method, handler: impl Handler) -> &mut Self {
        info!(path = %self.path, method = %method, "Route handler registered");
        if !self.methods.contains(&method) {
            self.methods.push(method.clone());
        }
        self.stack.push(MethodLayer {
            method: Some(method),
            handler: LayerHandler::Request(Arc::new(handler)),
        });
        self
    }

    /// Register a handler answering every method.
    pub fn all(&mut self, handler: impl Handler) -> &mut Self {
        info!(path = %self.path, "Route all-methods handler registered");
        self.has_all = true;
        self.stack.push(MethodLayer {
            method: None,
            handler: LayerHandler::Request(Arc::new(handler)),
        });
        self
    }

    /// Register an error handler scoped to this route's stack.
    ///
    /// Runs for any method once an earlier handler of this route fails;
    /// does not affect method negotiation or the `Allow` list.
    pub fn catch(&mut self, handler: impl ErrorHandler) -> &mut Self {
        self.stack.push(MethodLayer {
            method: None,
            handler: LayerHandler::Error(Arc::new(handler)),
        });
        self
    }

    pub fn get(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::GET, handler)
    }

    pub fn post(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::POST, handler)
    }

    pub fn put(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::PUT, handler)
    }

    pub fn delete(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::DELETE, handler)
    }

    pub fn patch(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::PATCH, handler)
    }

    pub fn head(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::HEAD, handler)
    }

    pub fn options(&mut self, handler: impl Handler) -> &mut Self {
        self.method(Method::OPTIONS, handler)
    }

    /// Run this route's method stack.
    ///
    /// Same trampoline semantics as the router: handlers execute in
    /// registration order, filtered to the resolved method (after the
    /// HEAD→GET fallback); errors bypass request handlers until an error
    /// handler clears them; [`Flow::SkipRoute`] exits the route without an
    /// error. Exhausting the stack is not "no route matched" — that
    /// distinction belongs to the router above.
    pub(crate) fn dispatch(&self, req: &mut Request, res: &mut Response) -> StackOutcome {
        if self.stack.is_empty() {
            return StackOutcome::Exhausted(None);
        }

        let mut method = req.method.clone();
        if method == Method::HEAD && !self.methods.contains(&Method::HEAD) {
            method = Method::GET;
        }

        debug!(path = %self.path, method = %method, handlers = self.stack.len(), "Route dispatch");

        let mut pending: Option<DispatchError> = None;
        let mut spins = 0usize;
        for layer in &self.stack {
            if let Some(m) = &layer.method {
                if *m != method {
                    spins += 1;
                    if spins > DEFAULT_SPIN_LIMIT {
                        if coroutine::is_coroutine() {
                            coroutine::yield_now();
                        }
                        spins = 0;
                    }
                    continue;
                }
            }
            spins = 0;
            let flow = match &pending {
                Some(err) => invoke_error(&layer.handler, err, req, res),
                None => invoke_request(&layer.handler, req, res),
            };
            match flow {
                Flow::Next => pending = None,
                Flow::Halt => return StackOutcome::Halt,
                Flow::SkipRoute => return StackOutcome::Exhausted(None),
                Flow::SkipRouter => return StackOutcome::SkipRouter,
                Flow::Fail(err) => pending = Some(err),
            }
        }
        StackOutcome::Exhausted(pending)
    }
}
