//! Local log pipelines
//!
//! A pipeline is where decoded entries end up once a batch has been accepted.
//! It is handed to the forwarding endpoint explicitly at startup.

use async_trait::async_trait;
use lumber_core::{LogEntry, LogLevel, Ticks};
use thiserror::Error;
use tokio::sync::mpsc;

/// Target used for re-emitted remote entries
pub const REMOTE_TARGET: &str = "lumber::remote";

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The consumer behind the pipeline is gone
    #[error("pipeline closed")]
    Closed,
}

/// Consumer of fully resolved log entries
#[async_trait]
pub trait LogPipeline: Send + Sync {
    /// Receives the entries of one batch, in their original order
    async fn dispatch(&self, entries: Vec<LogEntry>) -> Result<(), PipelineError>;
}

/// Re-emits each entry as a `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPipeline;

impl TracingPipeline {
    pub fn new() -> Self {
        Self
    }
}

fn format_timestamp(ticks: Ticks) -> String {
    match ticks.to_datetime() {
        Some(at) => at.to_rfc3339(),
        None => format!("{} ticks", ticks.0),
    }
}

#[async_trait]
impl LogPipeline for TracingPipeline {
    async fn dispatch(&self, entries: Vec<LogEntry>) -> Result<(), PipelineError> {
        for entry in &entries {
            let timestamp = format_timestamp(entry.timestamp);
            let exception = entry.exception.as_deref().unwrap_or("");

            macro_rules! emit {
                ($level:ident) => {
                    tracing::$level!(
                        target: REMOTE_TARGET,
                        logger = %entry.logger_name,
                        timestamp = %timestamp,
                        sequence_id = entry.sequence_id,
                        properties = ?entry.properties,
                        exception = %exception,
                        "{}",
                        entry.message
                    )
                };
            }

            match entry.level {
                LogLevel::Trace => emit!(trace),
                LogLevel::Debug => emit!(debug),
                LogLevel::Info => emit!(info),
                LogLevel::Warn => emit!(warn),
                LogLevel::Error | LogLevel::Fatal => emit!(error),
            }
        }
        Ok(())
    }
}

/// Forwards entries to an in-process consumer
#[derive(Debug, Clone)]
pub struct ChannelPipeline {
    sender: mpsc::Sender<LogEntry>,
}

impl ChannelPipeline {
    pub fn new(sender: mpsc::Sender<LogEntry>) -> Self {
        Self { sender }
    }

    /// Creates a pipeline together with the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LogEntry>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl LogPipeline for ChannelPipeline {
    async fn dispatch(&self, entries: Vec<LogEntry>) -> Result<(), PipelineError> {
        for entry in entries {
            self.sender
                .send(entry)
                .await
                .map_err(|_| PipelineError::Closed)?;
        }
        Ok(())
    }
}
