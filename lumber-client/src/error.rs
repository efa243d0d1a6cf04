//! Error types for the lumber client

use lumber_core::BatchError;
use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::transport::TransportError;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the lumber client
#[derive(Debug, Error)]
pub enum ClientError {
    /// The batch could not be built or encoded
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// The operation could not be dispatched or failed in transit
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Transport error behind this failure, if any
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Dispatch(DispatchError::Initiation(err) | DispatchError::Transport(err)) => {
                Some(err)
            }
            _ => None,
        }
    }

    /// Check if this error came from the transport rather than the codec
    pub fn is_transport(&self) -> bool {
        self.transport_error().is_some()
    }

    /// Check if the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Dispatch(DispatchError::Cancelled))
    }

    /// Check if this error is an encode/decode failure
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }
}
