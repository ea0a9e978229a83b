//! # midstack
//!
//! **midstack** is a layered request-routing and middleware-dispatch engine:
//! given an incoming request and a registered tree of path patterns and
//! handler chains, it determines, in a well-defined order, which handlers
//! execute, threads control through them cooperatively, and produces exactly
//! one terminal outcome — a response or a propagated error.
//!
//! ## Overview
//!
//! The engine is the dispatch core of a web framework with the transport cut
//! away: no sockets, no header parsing, no rendering. A caller (typically an
//! HTTP server running one coroutine per request) builds a [`Request`],
//! hands it to [`App::handle`] or [`Router::handle`] together with a
//! [`Response`], and serializes whatever comes back.
//!
//! ## Architecture
//!
//! The library is organized into a handful of modules, leaves first:
//!
//! - **[`path`]** - path pattern compilation and matching (named captures,
//!   wildcards, percent-decoding with 400-class error surfacing)
//! - **[`layer`]** - the atomic dispatch unit pairing a compiled pattern
//!   with a tagged handler
//! - **[`route`]** - per-method handler stacks with `OPTIONS`/`HEAD`
//!   negotiation
//! - **[`router`]** - the ordered layer stack and the dispatch state machine
//! - **[`app`]** - application settings and mounted-application bridging
//! - **[`flow`]** - the control-flow values and handler traits
//! - **[`runtime_config`]** - environment-driven runtime tunables
//!
//! ### Request Dispatch Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller as Transport<br/>(out of scope)
//!     participant App as App
//!     participant Router as Router
//!     participant Layer as Layer
//!     participant Route as Route
//!     participant Handler as Handler
//!
//!     Caller->>App: handle(req, res)
//!     App->>Router: handle(req, res)
//!     loop stack, in registration order
//!         Router->>Layer: matches(pathname)?
//!         Layer-->>Router: PathMatch / no-match / 400 error
//!         Router->>Router: resolve param preconditions
//!         alt route layer
//!             Router->>Route: dispatch(req, res)
//!             Route->>Handler: call(req, res)
//!             Handler-->>Route: Flow
//!         else middleware / mount
//!             Router->>Handler: call(req, res)
//!             Handler-->>Router: Flow
//!         end
//!     end
//!     Router-->>App: Outcome
//!     App-->>Caller: response finalized (404 / error JSON if exhausted)
//! ```
//!
//! ## Control flow
//!
//! Handlers return a [`Flow`] value instead of calling a continuation:
//! `Next` advances, `Halt` terminates, `SkipRoute`/`SkipRouter` abort the
//! current route or router without raising an error, and `Fail` propagates
//! an error that bypasses every ordinary layer until an error-handling
//! layer accepts it.
//!
//! ## Quick Start
//!
//! ```rust
//! use http::Method;
//! use midstack::{App, Flow, Request, Response};
//!
//! let mut app = App::new();
//! app.use_fn(|req: &mut Request, _res: &mut Response| {
//!     tracing::debug!(url = %req.url, "request seen");
//!     Flow::Next
//! });
//! app.get("/pets/:id", |req: &mut Request, res: &mut Response| {
//!     let id = req.get_param("id").unwrap_or("").to_string();
//!     res.send_json(200, serde_json::json!({ "id": id }));
//!     Flow::Halt
//! });
//!
//! let mut req = Request::new(Method::GET, "/pets/42");
//! let mut res = Response::new();
//! app.handle(&mut req, &mut res);
//! assert_eq!(res.status, 200);
//! ```
//!
//! ## Concurrency model
//!
//! Dispatch is single-threaded and cooperative per request: within one
//! dispatch, layers execute strictly in registration order. Across requests,
//! a `Router` is freely shared — the stack and parameter registry are
//! append-only at setup time and read-only afterwards, and match results are
//! values threaded through each dispatch rather than state cached on shared
//! layers. Under the `may` runtime, the loop yields to the scheduler when it
//! scans long runs of layers without invoking any (see
//! [`runtime_config::DEFAULT_SPIN_LIMIT`]).

pub mod app;
pub mod error;
pub mod flow;
pub mod layer;
pub mod path;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod runtime_config;

pub use app::{App, Settings};
pub use error::DispatchError;
pub use flow::{Dispatch, ErrorHandler, Flow, Handler, Outcome, ParamHandler};
pub use request::{HeaderVec, ParamVec, Request, MAX_INLINE_HEADERS, MAX_INLINE_PARAMS};
pub use response::Response;
pub use route::Route;
pub use router::{Router, RouterConfig};
