//! Application container: settings plus a root router.
//!
//! An [`App`] is what gets mounted when a whole sub-application (not just a
//! bare router) lives under a prefix. Its job beyond routing is bookkeeping:
//! carry the settings its handlers observe, swap the request's
//! current-application association while its subtree runs, and put it back
//! afterwards so the outer application's behavior resumes once control
//! returns past the mount point.

use crate::error::DispatchError;
use crate::flow::{Dispatch, ErrorHandler, Handler, Outcome, ParamHandler};
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;
use crate::router::{Router, RouterConfig};
use crate::runtime_config::{RuntimeConfig, DEFAULT_ENV};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Application settings.
///
/// Every field is optional; unset fields resolve through [`Settings::inherit`]
/// when an application is mounted into a parent — an explicit merge at mount
/// time, not live delegation, so later mutation of the parent never leaks
/// into an already-mounted child.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Environment name (`development`, `production`, ...).
    pub env: Option<String>,
    /// Route paths match case-sensitively.
    pub case_sensitive_routing: Option<bool>,
    /// Trailing slashes on route paths are significant.
    pub strict_routing: Option<bool>,
}

impl Settings {
    /// Settings seeded from the process environment (`MIDSTACK_ENV`).
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            env: Some(RuntimeConfig::from_env().env),
            ..Self::default()
        }
    }

    /// Resolve unset fields from a parent: inherit unless overridden.
    #[must_use]
    pub fn inherit(&self, parent: &Settings) -> Settings {
        Settings {
            env: self.env.clone().or_else(|| parent.env.clone()),
            case_sensitive_routing: self
                .case_sensitive_routing
                .or(parent.case_sensitive_routing),
            strict_routing: self.strict_routing.or(parent.strict_routing),
        }
    }

    /// The resolved environment name.
    #[must_use]
    pub fn env(&self) -> &str {
        self.env.as_deref().unwrap_or(DEFAULT_ENV)
    }
}

/// An application: settings plus the root router.
pub struct App {
    settings: Arc<Settings>,
    router: Router,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Create an application with environment-seeded settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(Settings::from_env())
    }

    /// Create an application with explicit settings.
    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        let config = RouterConfig {
            case_sensitive: settings.case_sensitive_routing.unwrap_or(false),
            strict: settings.strict_routing.unwrap_or(false),
            ..RouterConfig::from_env()
        };
        info!(env = settings.env(), "Application created");
        Self {
            settings: Arc::new(settings),
            router: Router::with_config(config),
        }
    }

    /// This application's resolved settings.
    #[must_use]
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// The root router, for registration surfaces not delegated below.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Mount a child application under a prefix.
    ///
    /// The child's unset settings inherit from this application at mount
    /// time; its handlers then observe the merged settings while requests
    /// run inside the mounted subtree.
    pub fn mount(&mut self, path: &str, mut child: App) -> &mut Self {
        child.settings = Arc::new(child.settings.inherit(&self.settings));
        info!(prefix = path, env = child.settings.env(), "Application mounted");
        self.router.mount(path, child);
        self
    }

    /// Mount a bare router under a prefix.
    pub fn mount_router(&mut self, path: &str, router: Router) -> &mut Self {
        self.router.mount(path, router);
        self
    }

    /// Register middleware for every request. See [`Router::use_fn`].
    pub fn use_fn(&mut self, handler: impl Handler) -> &mut Self {
        self.router.use_fn(handler);
        self
    }

    /// Register middleware under a prefix. See [`Router::use_at`].
    pub fn use_at(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.router.use_at(path, handler);
        self
    }

    /// Register an error-handling layer. See [`Router::use_error`].
    pub fn use_error(&mut self, handler: impl ErrorHandler) -> &mut Self {
        self.router.use_error(handler);
        self
    }

    /// Create a route for verb registration. See [`Router::route`].
    pub fn route(&mut self, path: &str) -> &mut Route {
        self.router.route(path)
    }

    /// Register a `GET` handler. See [`Router::get`].
    pub fn get(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.router.get(path, handler);
        self
    }

    /// Register a `POST` handler. See [`Router::post`].
    pub fn post(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.router.post(path, handler);
        self
    }

    /// Register a parameter precondition. See [`Router::param`].
    pub fn param(&mut self, name: &str, handler: impl ParamHandler) -> &mut Self {
        self.router.param(name, handler);
        self
    }

    /// Handle a request to completion.
    ///
    /// The terminal boundary of the engine: an exhausted dispatch becomes a
    /// client-visible JSON response here — the pending error's status, or a
    /// 404 when nothing matched at all.
    pub fn handle(&self, req: &mut Request, res: &mut Response) {
        req.settings = Some(Arc::clone(&self.settings));
        res.settings = Some(Arc::clone(&self.settings));
        match self.router.handle(req, res) {
            Outcome::Handled => {}
            Outcome::Exhausted(Some(err)) => {
                warn!(status = err.status, error = %err, "Request failed");
                self.finalize_error(res, &err);
            }
            Outcome::Exhausted(None) => {
                debug!(method = %req.method, url = %req.original_url, "No route matched");
                res.send_json(
                    404,
                    json!({ "error": format!("cannot {} {}", req.method, req.original_url) }),
                );
            }
        }
    }

    fn finalize_error(&self, res: &mut Response, err: &DispatchError) {
        let status = if err.status >= 400 { err.status } else { 500 };
        res.send_json(status, json!({ "error": err.message }));
    }
}

impl Dispatch for App {
    /// Dispatch as a mounted subtree.
    ///
    /// Swaps the request's and response's current-application association to
    /// this application for the duration, restores the caller's afterwards,
    /// and funnels the router's outcome straight through.
    fn dispatch(&self, req: &mut Request, res: &mut Response) -> Outcome {
        let caller_req_app = req.settings.replace(Arc::clone(&self.settings));
        let caller_res_app = res.settings.replace(Arc::clone(&self.settings));
        let outcome = self.router.handle(req, res);
        req.settings = caller_req_app;
        res.settings = caller_res_app;
        outcome
    }
}
