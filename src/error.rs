//! Error type carried through the dispatch chain.

use thiserror::Error;

/// An error travelling down a middleware stack.
///
/// Dispatch errors are plain values: handlers return them through
/// [`Flow::Fail`](crate::flow::Flow::Fail), error-handling layers receive
/// them by reference, and whatever survives the stack is handed to the
/// terminal caller. The `status` is the HTTP status class the error maps to
/// when it becomes a client-visible response (the engine itself only ever
/// assigns 400 for malformed parameter encodings and 500 for caught panics).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DispatchError {
    /// HTTP status code this error maps to (400, 404, 500, ...)
    pub status: u16,
    /// Human-readable description, safe to surface to a client
    pub message: String,
}

impl DispatchError {
    /// Create an error with an explicit status code.
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A 400 Bad Request error (malformed client input).
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    /// A 500 Internal Server Error (handler failure).
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }
}
