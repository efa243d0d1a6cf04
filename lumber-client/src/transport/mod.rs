//! Transport contract
//!
//! A transport exposes every logical operation as a begin/end pair: `begin`
//! starts the operation and later hands a pending handle to the completion
//! callback, and `end` turns that handle into the operation's outcome.
//!
//! Contract for implementors:
//! - when `begin` returns `Err`, the callback must not be invoked
//! - when `begin` returns `Ok`, the callback is invoked at most once; dropping
//!   it without invoking it counts as cancellation

mod http;

pub use http::{HttpPending, HttpTransport};

use bytes::Bytes;
use thiserror::Error;

/// Callback receiving the pending handle of a finished operation
pub type OnComplete<P> = Box<dyn FnOnce(P) + Send + 'static>;

/// Logical operations a transport channel supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Close,
    SendBatch,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Open => write!(f, "open"),
            Operation::Close => write!(f, "close"),
            Operation::SendBatch => write!(f, "send-batch"),
        }
    }
}

/// An operation together with its arguments
#[derive(Debug, Clone)]
pub enum Request {
    Open,
    Close,
    /// Encoded batch payload
    SendBatch(Bytes),
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::Open => Operation::Open,
            Request::Close => Operation::Close,
            Request::SendBatch(_) => Operation::SendBatch,
        }
    }
}

/// Terminal result of one operation
#[derive(Debug)]
pub enum Outcome {
    Completed,
    Failed(TransportError),
    Cancelled,
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }
}

/// Errors raised by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Collector answered with an error status code
    #[error("collector error (status {status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message from the collector
        message: String,
    },

    /// Operation requires an open channel
    #[error("transport channel is not open")]
    NotOpen,

    /// Channel was closed and accepts no further operations
    #[error("transport channel is closed")]
    Closed,

    /// Transport cannot run operations right now
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Check if the collector rejected the payload itself (4xx status)
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status >= 400 && *status < 500)
    }
}

/// Begin/end asynchronous transport channel
pub trait Transport: Send + Sync + 'static {
    /// Handle produced when an operation finishes
    type Pending: Send + 'static;

    /// Starts `request`; `on_complete` receives the handle once it finishes
    fn begin(
        &self,
        request: Request,
        on_complete: OnComplete<Self::Pending>,
    ) -> Result<(), TransportError>;

    /// Retrieves the outcome of a finished operation
    fn end(&self, pending: Self::Pending) -> Outcome;
}
