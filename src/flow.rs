//! Control-flow values and handler contracts for the dispatch engine.
//!
//! Every handler communicates forward through its return value: a [`Flow`]
//! tells the trampoline whether to advance, stop, skip the rest of the
//! current route or router, or propagate an error. There is no continuation
//! callback to call (or forget to call) — the value a handler returns *is*
//! the continuation signal.

use crate::error::DispatchError;
use crate::request::Request;
use crate::response::Response;

/// What a handler tells the dispatch loop to do next.
///
/// `SkipRoute` and `SkipRouter` are control signals, not errors: they are
/// never surfaced to the terminal caller and never logged as failures.
#[derive(Debug)]
pub enum Flow {
    /// Advance to the next eligible layer. Returned by an error-handling
    /// layer, this clears the pending error and resumes normal routing.
    Next,
    /// The handler produced the terminal response; stop dispatching.
    Halt,
    /// Abort the remainder of the current route's method stack only.
    /// Later layers of the owning router still match.
    SkipRoute,
    /// Abort the remainder of the current router's stack, deferring to
    /// whatever dispatched into it.
    SkipRouter,
    /// Propagate an error. Routes stop matching until an error-handling
    /// layer clears it.
    Fail(DispatchError),
}

/// Terminal result of walking one router's stack.
#[derive(Debug)]
#[must_use]
pub enum Outcome {
    /// A handler produced the response (or the router synthesized one).
    Handled,
    /// The stack was exhausted without a terminal response. `Some` carries
    /// the pending error; `None` means nothing matched at all. Producing a
    /// client-visible response for either case is the caller's job.
    Exhausted(Option<DispatchError>),
}

/// An ordinary request-handling middleware or route handler.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: &mut Request, res: &mut Response) -> Flow;
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &mut Response) -> Flow + Send + Sync + 'static,
{
    fn call(&self, req: &mut Request, res: &mut Response) -> Flow {
        self(req, res)
    }
}

/// An error-handling layer. Only invoked while an error is pending;
/// returning [`Flow::Next`] marks the error as handled.
pub trait ErrorHandler: Send + Sync + 'static {
    fn call(&self, err: &DispatchError, req: &mut Request, res: &mut Response) -> Flow;
}

impl<F> ErrorHandler for F
where
    F: Fn(&DispatchError, &mut Request, &mut Response) -> Flow + Send + Sync + 'static,
{
    fn call(&self, err: &DispatchError, req: &mut Request, res: &mut Response) -> Flow {
        self(err, req, res)
    }
}

/// A parameter-precondition callback registered with
/// [`Router::param`](crate::router::Router::param). Receives the decoded
/// captured value and the parameter name.
pub trait ParamHandler: Send + Sync + 'static {
    fn call(&self, req: &mut Request, res: &mut Response, value: &str, name: &str) -> Flow;
}

impl<F> ParamHandler for F
where
    F: Fn(&mut Request, &mut Response, &str, &str) -> Flow + Send + Sync + 'static,
{
    fn call(&self, req: &mut Request, res: &mut Response, value: &str, name: &str) -> Flow {
        self(req, res, value, name)
    }
}

/// The dispatch surface shared by [`Router`](crate::router::Router) and
/// [`App`](crate::app::App). Anything implementing it can be mounted under a
/// path prefix — mounting is detected by capability, not by type.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(&self, req: &mut Request, res: &mut Response) -> Outcome;
}
