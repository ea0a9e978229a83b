//! Router construction and registration surface.
//!
//! All mutation of the data model happens here, at application setup time.
//! Once requests are in flight the stack and the parameter registry are
//! read-only; `Router` is `Send + Sync` and one instance serves any number
//! of concurrently dispatching requests without locking.

use crate::flow::{Dispatch, ErrorHandler, Handler, Outcome, ParamHandler};
use crate::layer::{Layer, LayerHandler, LayerKind};
use crate::path::{MatchOptions, PathPattern};
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;
use crate::runtime_config::{RuntimeConfig, DEFAULT_SPIN_LIMIT};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A whole-name parameter interceptor (deprecated registration surface).
/// Given the parameter name and the callback being registered, may return
/// a replacement callback to register instead.
pub(crate) type ParamHook =
    dyn Fn(&str, Arc<dyn ParamHandler>) -> Option<Arc<dyn ParamHandler>> + Send + Sync;

/// Immutable router configuration, captured at construction.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Match paths case-sensitively.
    pub case_sensitive: bool,
    /// Require trailing slashes on route paths to match exactly.
    pub strict: bool,
    /// Merge a mounted layer's captured params with the ancestor's instead
    /// of replacing them.
    pub merge_params: bool,
    /// Consecutive synchronous scan steps before the dispatch loop yields.
    pub spin_limit: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            strict: false,
            merge_params: false,
            spin_limit: DEFAULT_SPIN_LIMIT,
        }
    }
}

impl RouterConfig {
    /// Defaults with the spin limit taken from the environment
    /// (`MIDSTACK_SPIN_LIMIT`).
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            spin_limit: RuntimeConfig::from_env().spin_limit,
            ..Self::default()
        }
    }
}

/// Middleware router: an ordered stack of layers plus a parameter
/// precondition registry.
///
/// The stack is append-only; insertion order is matching priority. Routers
/// nest: a router mounted under a prefix sees requests with that prefix
/// stripped from `req.url`.
pub struct Router {
    pub(crate) stack: Vec<Layer>,
    pub(crate) param_callbacks: HashMap<String, Vec<Arc<dyn ParamHandler>>>,
    pub(crate) param_hooks: Vec<Box<ParamHook>>,
    pub(crate) config: RouterConfig,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a router with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Create a router with explicit configuration.
    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            stack: Vec::new(),
            param_callbacks: HashMap::new(),
            param_hooks: Vec::new(),
            config,
        }
    }

    /// Compile options for `use`-style (prefix) layers.
    fn mount_options(&self) -> MatchOptions {
        MatchOptions {
            case_sensitive: self.config.case_sensitive,
            strict: false,
            end: false,
        }
    }

    /// Compile options for route (full-match) layers.
    fn route_options(&self) -> MatchOptions {
        MatchOptions {
            case_sensitive: self.config.case_sensitive,
            strict: self.config.strict,
            end: true,
        }
    }

    /// Register middleware that runs for every request reaching this router.
    pub fn use_fn(&mut self, handler: impl Handler) -> &mut Self {
        self.use_at("/", handler)
    }

    /// Register middleware under a path prefix. The matched prefix is
    /// stripped from `req.url` while the handler runs.
    pub fn use_at(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        info!(path = path, "Middleware registered");
        let pattern = PathPattern::compile(path, &self.mount_options());
        self.stack.push(Layer::new(
            pattern,
            LayerKind::Handler(LayerHandler::Request(Arc::new(handler))),
        ));
        self
    }

    /// Register an error-handling layer for every path.
    pub fn use_error(&mut self, handler: impl ErrorHandler) -> &mut Self {
        self.use_error_at("/", handler)
    }

    /// Register an error-handling layer under a path prefix.
    pub fn use_error_at(&mut self, path: &str, handler: impl ErrorHandler) -> &mut Self {
        info!(path = path, "Error handler registered");
        let pattern = PathPattern::compile(path, &self.mount_options());
        self.stack.push(Layer::new(
            pattern,
            LayerKind::Handler(LayerHandler::Error(Arc::new(handler))),
        ));
        self
    }

    /// Mount a sub-dispatcher (a [`Router`] or an
    /// [`App`](crate::app::App)) under a path prefix.
    ///
    /// Anything exposing the [`Dispatch`] surface can be mounted; while the
    /// subtree runs, `req.url` has the prefix stripped and `req.base_url`
    /// carries the accumulated mount path.
    pub fn mount(&mut self, path: &str, target: impl Dispatch) -> &mut Self {
        self.mount_arc(path, Arc::new(target))
    }

    pub(crate) fn mount_arc(&mut self, path: &str, target: Arc<dyn Dispatch>) -> &mut Self {
        info!(prefix = path, "Dispatcher mounted");
        let pattern = PathPattern::compile(path, &self.mount_options());
        self.stack.push(Layer::new(pattern, LayerKind::Mount(target)));
        self
    }

    /// Create (and append) a route for `path`, returning it for verb
    /// registration: `router.route("/pets").get(h).post(h)`.
    pub fn route(&mut self, path: &str) -> &mut Route {
        let pattern = PathPattern::compile(path, &self.route_options());
        self.stack
            .push(Layer::new(pattern, LayerKind::Route(Route::new(path))));
        let last = self.stack.len() - 1;
        match &mut self.stack[last].kind {
            LayerKind::Route(route) => route,
            _ => unreachable!("route layer was just pushed"),
        }
    }

    /// Register a `GET` handler (a fresh route per call).
    pub fn get(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(path).get(handler);
        self
    }

    /// Register a `POST` handler.
    pub fn post(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(path).post(handler);
        self
    }

    /// Register a `PUT` handler.
    pub fn put(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(path).put(handler);
        self
    }

    /// Register a `DELETE` handler.
    pub fn delete(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(path).delete(handler);
        self
    }

    /// Register a `PATCH` handler.
    pub fn patch(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(path).patch(handler);
        self
    }

    /// Register a `HEAD` handler.
    pub fn head(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(path).head(handler);
        self
    }

    /// Register an `OPTIONS` handler.
    pub fn options(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(path).options(handler);
        self
    }

    /// Register a handler answering every method on `path`.
    pub fn all(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(path).all(handler);
        self
    }

    /// Register a precondition callback for the named parameter.
    ///
    /// Callbacks for one name run in registration order before any layer
    /// capturing that name is invoked, at most once per distinct captured
    /// value per dispatch.
    pub fn param(&mut self, name: &str, handler: impl ParamHandler) -> &mut Self {
        let mut callback: Arc<dyn ParamHandler> = Arc::new(handler);
        // Interceptors apply once, when a name is first registered.
        if !self.param_callbacks.contains_key(name) {
            for hook in &self.param_hooks {
                if let Some(wrapped) = hook(name, Arc::clone(&callback)) {
                    callback = wrapped;
                }
            }
        }
        info!(param = name, "Parameter callback registered");
        self.param_callbacks
            .entry(name.to_string())
            .or_default()
            .push(callback);
        self
    }

    /// Register a whole-name parameter interceptor.
    ///
    /// Deprecated: prefer named [`Router::param`] callbacks. Interceptors
    /// only observe names registered after them.
    pub fn param_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&str, Arc<dyn ParamHandler>) -> Option<Arc<dyn ParamHandler>>
            + Send
            + Sync
            + 'static,
    {
        warn!("param_hook is deprecated; register named parameter callbacks instead");
        self.param_hooks.push(Box::new(hook));
        self
    }
}

impl Dispatch for Router {
    fn dispatch(&self, req: &mut Request, res: &mut Response) -> Outcome {
        self.handle(req, res)
    }
}
