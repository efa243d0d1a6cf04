//! Lumber Core
//!
//! Core types and the wire codec for shipping log batches between processes.
//!
//! This crate contains:
//! - Domain types: the fully resolved `LogEntry` seen by producers and pipelines
//! - DTOs: the compact `LogEventBatch` wire entity
//! - The string pool, batch builder, wire schema and codec that connect the two

pub mod builder;
pub mod codec;
pub mod domain;
pub mod dto;
pub mod error;
pub mod pool;
pub mod schema;

pub use builder::BatchBuilder;
pub use domain::log::{LogEntry, LogLevel, Ticks};
pub use dto::batch::{EventRecord, LogEventBatch};
pub use error::{BatchError, OutOfRangeError};
pub use pool::StringPool;
