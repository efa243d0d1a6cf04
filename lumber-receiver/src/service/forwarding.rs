//! Forwarding Service
//!
//! Decodes wire batches and hands the resolved entries to the local pipeline.

use std::sync::Arc;

use lumber_core::schema::Schema;
use lumber_core::{BatchError, LogEntry, LogEventBatch, codec};
use thiserror::Error;

use crate::pipeline::{LogPipeline, PipelineError};

/// Service error type
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error(transparent)]
    Malformed(#[from] BatchError),

    #[error("{0}")]
    Validation(String),

    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub type Result<T> = std::result::Result<T, ForwardError>;

/// Size limits applied to every accepted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_events: usize,
    pub max_message_length: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_events: 10_000,
            max_message_length: 32_768,
        }
    }
}

/// Receives wire batches on behalf of a local pipeline
pub struct ForwardingEndpoint {
    pipeline: Arc<dyn LogPipeline>,
    logger_name_prefix: String,
    limits: BatchLimits,
}

impl ForwardingEndpoint {
    pub fn new(pipeline: Arc<dyn LogPipeline>) -> Self {
        Self {
            pipeline,
            logger_name_prefix: String::new(),
            limits: BatchLimits::default(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.logger_name_prefix = prefix.into();
        self
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn logger_name_prefix(&self) -> &str {
        &self.logger_name_prefix
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    /// Decodes `bytes` written with schema `version` and forwards the result
    ///
    /// Returns the number of entries handed to the pipeline. A rejected batch
    /// forwards nothing.
    pub async fn receive(&self, bytes: &[u8], version: u32) -> Result<usize> {
        if Schema::for_version(version).is_none() {
            return Err(ForwardError::UnsupportedSchema(version.to_string()));
        }

        let batch = codec::decode_versioned(bytes, version).inspect_err(|e| {
            tracing::warn!("Rejected malformed batch ({} bytes): {}", bytes.len(), e);
        })?;

        self.forward(&batch).await
    }

    /// Resolves `batch` and forwards its entries, in order
    pub async fn forward(&self, batch: &LogEventBatch) -> Result<usize> {
        if batch.len() > self.limits.max_events {
            return Err(reject(
                batch,
                format!("Too many events in batch (max: {})", self.limits.max_events),
            ));
        }

        let entries = self.expand(batch)?;
        if let Err(reason) = validate_entries(&entries, &self.limits) {
            return Err(reject(batch, reason));
        }

        let count = entries.len();
        if count == 0 {
            return Ok(0);
        }

        self.pipeline.dispatch(entries).await?;

        tracing::debug!(
            "Forwarded {} entries from {}",
            count,
            batch.client_name().unwrap_or("unnamed client")
        );

        Ok(count)
    }

    /// Resolves `batch` with this endpoint's logger-name prefix
    pub fn expand(&self, batch: &LogEventBatch) -> Result<Vec<LogEntry>> {
        Ok(codec::expand(batch, &self.logger_name_prefix)?)
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_entries(entries: &[LogEntry], limits: &BatchLimits) -> std::result::Result<(), String> {
    for (i, entry) in entries.iter().enumerate() {
        if entry.message.len() > limits.max_message_length {
            return Err(format!(
                "Log entry {} message too long (max: {} bytes)",
                i, limits.max_message_length
            ));
        }
    }

    Ok(())
}

fn reject(batch: &LogEventBatch, reason: String) -> ForwardError {
    tracing::warn!(
        "Rejected batch of {} events from {}: {}",
        batch.len(),
        batch.client_name().unwrap_or("unnamed client"),
        reason
    );
    ForwardError::Validation(reason)
}
