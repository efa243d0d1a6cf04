//! Log buffering
//!
//! Collects entries in memory and ships them periodically, or as soon as
//! enough entries have piled up, through a `RemoteLogClient`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lumber_core::LogEntry;
use tokio::sync::Notify;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::RemoteLogClient;
use crate::config::ClientConfig;
use crate::transport::Transport;

/// Thread-safe in-memory log buffer
///
/// Cloning yields another handle to the same buffer.
#[derive(Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    threshold: usize,
    full: Arc<Notify>,
}

impl LogBuffer {
    /// Creates a buffer signalling a flush once `threshold` entries are held
    pub fn new(threshold: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            threshold: threshold.max(1),
            full: Arc::new(Notify::new()),
        }
    }

    /// Creates a buffer flushing at the configured `max_buffered_entries`
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.max_buffered_entries)
    }

    /// Adds a log entry to the buffer
    pub fn add_entry(&self, entry: LogEntry) {
        let len = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.push(entry);
            entries.len()
        };
        if len >= self.threshold {
            self.full.notify_one();
        }
    }

    /// Drains all log entries from the buffer, in insertion order
    pub fn drain(&self) -> Vec<LogEntry> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *entries)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically ships the contents of a `LogBuffer`
pub struct Flusher<X: Transport> {
    client: Arc<RemoteLogClient<X, ()>>,
    buffer: LogBuffer,
    interval: Duration,
}

impl<X: Transport> Flusher<X> {
    pub fn new(client: Arc<RemoteLogClient<X, ()>>, buffer: LogBuffer, interval: Duration) -> Self {
        Self {
            client,
            buffer,
            interval,
        }
    }

    /// Creates a flusher running at the configured `flush_interval`
    pub fn from_config(
        client: Arc<RemoteLogClient<X, ()>>,
        buffer: LogBuffer,
        config: &ClientConfig,
    ) -> Self {
        Self::new(client, buffer, config.flush_interval)
    }

    /// Runs until `shutdown` fires, then ships whatever is left
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting log flusher (interval: {:?})", self.interval);

        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
                _ = self.buffer.full.notified() => {
                    debug!("Log buffer reached {} entries", self.buffer.threshold);
                }
            }
            self.flush().await;
        }

        self.flush().await;
        info!("Log flusher stopped");
    }

    /// Ships everything currently buffered as one batch
    ///
    /// Returns the number of entries shipped. Failed batches are dropped;
    /// retrying is left to the caller.
    pub async fn flush(&self) -> usize {
        let entries = self.buffer.drain();
        if entries.is_empty() {
            return 0;
        }

        match self.client.send_batch(&entries).await {
            Ok(()) => {
                debug!("Shipped {} log entries", entries.len());
                entries.len()
            }
            Err(e) => {
                warn!("Failed to ship {} log entries: {}", entries.len(), e);
                0
            }
        }
    }
}
