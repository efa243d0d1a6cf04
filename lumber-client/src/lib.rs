//! Lumber Client
//!
//! Ships batches of log entries to a lumber receiver.
//!
//! `RemoteLogClient` encodes entries with the `lumber-core` codec and hands the
//! payload to a `DispatchBridge`, which drives any begin/end `Transport`
//! (`HttpTransport` by default). Calls can be awaited, or started with a
//! correlation token and observed later on the completion stream.
//!
//! # Example
//!
//! ```no_run
//! use lumber_client::{ClientConfig, RemoteLogClient};
//! use lumber_core::{LogEntry, LogLevel};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::new("web-01".to_string(), "http://localhost:4080".to_string());
//!     let client: RemoteLogClient = RemoteLogClient::connect(&config)?;
//!
//!     client.open().await?;
//!     client
//!         .send_batch(&[LogEntry::new(LogLevel::Info, "App.Http", "request served")])
//!         .await?;
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod transport;

// Re-export commonly used types
pub use buffer::{Flusher, LogBuffer};
pub use config::ClientConfig;
pub use dispatch::{CallId, CallState, CompletionEvent, DispatchBridge, DispatchError};
pub use error::{ClientError, Result};
pub use transport::{HttpTransport, Operation, Outcome, Transport, TransportError};

use bytes::Bytes;
use lumber_core::{BatchBuilder, LogEntry, LogEventBatch, codec};
use tokio::sync::mpsc;
use tracing::debug;

/// Client shipping log batches through a transport
///
/// `T` is the correlation token type used by the event-style calls.
pub struct RemoteLogClient<X: Transport = HttpTransport, T = ()> {
    client_name: Option<String>,
    bridge: DispatchBridge<X, T>,
}

impl<T: Send + 'static> RemoteLogClient<HttpTransport, T> {
    /// Create a client talking HTTP to the receiver named in `config`
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(config)
            .map_err(|e| ClientError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::new(transport, Some(config.client_name.clone())))
    }
}

impl<X: Transport, T: Send + 'static> RemoteLogClient<X, T> {
    pub fn new(transport: X, client_name: Option<String>) -> Self {
        Self {
            client_name,
            bridge: DispatchBridge::new(transport),
        }
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    pub fn transport(&self) -> &X {
        self.bridge.transport()
    }

    pub fn bridge(&self) -> &DispatchBridge<X, T> {
        &self.bridge
    }

    /// Completion stream of the event-style calls; available once
    pub fn completions(&self) -> Option<mpsc::UnboundedReceiver<CompletionEvent<T>>> {
        self.bridge.subscribe()
    }

    /// Build a batch from `entries`, preserving their order
    ///
    /// Fails if any entry cannot be placed in the batch; nothing is sent then.
    pub fn build_batch(&self, entries: &[LogEntry]) -> Result<LogEventBatch> {
        let mut builder = BatchBuilder::new(self.client_name.clone());
        builder.extend(entries)?;
        Ok(builder.build())
    }

    fn encode(&self, entries: &[LogEntry]) -> Result<Bytes> {
        let batch = self.build_batch(entries)?;
        let payload = codec::encode(&batch)?;
        debug!(
            "Encoded batch of {} entries ({} strings, {} bytes)",
            batch.len(),
            batch.strings().len(),
            payload.len()
        );
        Ok(Bytes::from(payload))
    }

    // =============================================================================
    // Awaitable calls
    // =============================================================================

    pub async fn open(&self) -> Result<()> {
        Ok(self.bridge.open().await?)
    }

    pub async fn close(&self) -> Result<()> {
        Ok(self.bridge.close().await?)
    }

    /// Ship `entries` as one batch and wait until the transport is done
    ///
    /// An empty slice is sent as an empty batch.
    pub async fn send_batch(&self, entries: &[LogEntry]) -> Result<()> {
        let payload = self.encode(entries)?;
        Ok(self.bridge.send_batch(payload).await?)
    }

    // =============================================================================
    // Event-style calls
    // =============================================================================

    pub fn open_async(&self, token: T) -> Result<CallId> {
        Ok(self.bridge.open_async(token)?)
    }

    pub fn close_async(&self, token: T) -> Result<CallId> {
        Ok(self.bridge.close_async(token)?)
    }

    /// Start shipping `entries`; the outcome arrives on `completions()`
    ///
    /// Encoding failures are returned here and raise no completion event.
    pub fn send_batch_async(&self, entries: &[LogEntry], token: T) -> Result<CallId> {
        let payload = self.encode(entries)?;
        Ok(self.bridge.send_batch_async(payload, token)?)
    }
}
