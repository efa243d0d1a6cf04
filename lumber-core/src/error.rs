//! Error types for batch encoding and decoding

use thiserror::Error;

/// Lookup of an ordinal past the end of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ordinal {ordinal} out of range (pool size {len})")]
pub struct OutOfRangeError {
    pub ordinal: u32,
    pub len: usize,
}

/// Errors produced by the batch codec
///
/// A failure is local to the batch being processed: nothing from a rejected
/// batch is returned, and no state carries over to the next one.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Structural violation in a batch (missing fields, bad ordinals, bad types)
    #[error("malformed batch: {0}")]
    Malformed(String),

    /// Pool lookup misuse
    #[error(transparent)]
    OutOfRange(#[from] OutOfRangeError),

    /// An entry's timestamp cannot be stored as an offset from the base time
    #[error("timestamp {timestamp} is too far from batch base time {base}")]
    TimeRange { timestamp: i64, base: i64 },

    /// A pool has no ordinals left
    #[error("string pool is full ({len} entries)")]
    PoolFull { len: usize },

    /// The batch could not be serialized
    #[error("failed to serialize batch: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl BatchError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }

    /// Check if this error means the incoming batch was rejected
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
