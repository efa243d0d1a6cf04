//! Batch codec
//!
//! Converts batches to and from their wire form, and expands a batch into
//! fully resolved log entries for a local pipeline.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::domain::log::{LogEntry, LogLevel};
use crate::dto::batch::{EventRecord, LogEventBatch};
use crate::error::{BatchError, Result};
use crate::pool::resolve;
use crate::schema::{SCHEMA_VERSION, Schema};

/// Serializes a batch using the current schema
pub fn encode(batch: &LogEventBatch) -> Result<Vec<u8>> {
    serde_json::to_vec(batch).map_err(BatchError::Serialize)
}

/// Parses and validates a batch written with the current schema
pub fn decode(bytes: &[u8]) -> Result<LogEventBatch> {
    decode_versioned(bytes, SCHEMA_VERSION)
}

/// Parses and validates a batch written with an explicit schema version
///
/// Every ordinal is checked before the batch is returned, so a batch that
/// decodes successfully always expands successfully.
pub fn decode_versioned(bytes: &[u8], version: u32) -> Result<LogEventBatch> {
    if Schema::for_version(version).is_none() {
        return Err(BatchError::malformed(format!(
            "unsupported schema version {}",
            version
        )));
    }

    let batch: LogEventBatch =
        serde_json::from_slice(bytes).map_err(|e| BatchError::malformed(e.to_string()))?;

    for (index, record) in batch.events().iter().enumerate() {
        validate_record(&batch, record)
            .map_err(|reason| BatchError::malformed(format!("event {}: {}", index, reason)))?;
    }

    Ok(batch)
}

/// Resolves every event of `batch`, in order
///
/// `logger_name_prefix` is prepended to each logger name; an empty prefix
/// leaves names untouched. The batch itself is never modified.
pub fn expand(batch: &LogEventBatch, logger_name_prefix: &str) -> Result<Vec<LogEntry>> {
    batch
        .events()
        .iter()
        .enumerate()
        .map(|(index, record)| {
            expand_record(batch, record, logger_name_prefix)
                .map_err(|reason| BatchError::malformed(format!("event {}: {}", index, reason)))
        })
        .collect()
}

fn expand_record(
    batch: &LogEventBatch,
    record: &EventRecord,
    prefix: &str,
) -> std::result::Result<LogEntry, String> {
    let strings = batch.strings();

    let logger: Cow<'_, str> = match lookup(strings, record.logger_ordinal, "logger")? {
        name if prefix.is_empty() => Cow::Borrowed(name),
        name => Cow::Owned(format!("{}{}", prefix, name)),
    };

    let level = LogLevel::from_ordinal(record.level)
        .ok_or_else(|| format!("unknown level ordinal {}", record.level))?;

    let timestamp = batch
        .base_timestamp()
        .checked_add(record.time_offset)
        .ok_or_else(|| format!("time offset {} overflows base time", record.time_offset))?;

    let mut properties = BTreeMap::new();
    for &(layout, value) in &record.properties {
        let name = lookup(batch.layout_names(), layout, "layout")?;
        let value = lookup(strings, value, "property value")?;
        if properties.insert(name.to_owned(), value.to_owned()).is_some() {
            return Err(format!("duplicate property {:?} (layout ordinal {})", name, layout));
        }
    }

    let exception = record
        .exception_ordinal
        .map(|ordinal| lookup(strings, ordinal, "exception").map(str::to_owned))
        .transpose()?;

    Ok(LogEntry {
        timestamp,
        level,
        logger_name: logger.into_owned(),
        message: lookup(strings, record.message_ordinal, "message")?.to_owned(),
        properties,
        exception,
        sequence_id: record.sequence_id,
    })
}

fn validate_record(batch: &LogEventBatch, record: &EventRecord) -> std::result::Result<(), String> {
    expand_record(batch, record, "").map(drop)
}

fn lookup<'a>(table: &'a [String], ordinal: u32, what: &str) -> std::result::Result<&'a str, String> {
    resolve(table, ordinal).map_err(|e| format!("{} {}", what, e))
}
