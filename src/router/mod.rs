//! # Router Module
//!
//! The router owns an ordered stack of layers and the top-level dispatch
//! state machine that walks it.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Holding middleware, routes and mounted sub-dispatchers in registration
//!   order (order defines matching priority and never changes afterwards)
//! - Matching each incoming request against the stack, one layer at a time
//! - Resolving parameter-precondition callbacks before a matched layer runs
//! - Rewriting `req.url`/`req.base_url` around mounted prefixes and
//!   restoring them when control returns past the mount
//! - Accumulating an automatic `OPTIONS` response when no route answers
//!
//! ## Architecture
//!
//! Registration compiles each path into a [`PathPattern`](crate::path::PathPattern)
//! once; dispatch is a trampoline loop driven by the [`Flow`](crate::flow::Flow)
//! value each handler returns. The loop never grows the call stack with the
//! number of layers, and a spin guard yields to the cooperative scheduler
//! when a long run of layers is scanned without any of them being invoked.
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use midstack::{Flow, Outcome, Request, Response, Router};
//!
//! let mut router = Router::new();
//! router.get("/pets/:id", |req: &mut Request, res: &mut Response| {
//!     let id = req.get_param("id").unwrap_or("").to_string();
//!     res.send_json(200, serde_json::json!({ "id": id }));
//!     Flow::Halt
//! });
//!
//! let mut req = Request::new(Method::GET, "/pets/42");
//! let mut res = Response::new();
//! assert!(matches!(router.handle(&mut req, &mut res), Outcome::Handled));
//! ```

mod core;
mod dispatch;

pub use core::{Router, RouterConfig};
