//! Batch builder
//!
//! Accumulates log entries into the pools and compact records of one batch.

use crate::domain::log::{LogEntry, Ticks};
use crate::dto::batch::{EventRecord, LogEventBatch};
use crate::error::{BatchError, Result};
use crate::pool::StringPool;

/// Builds a `LogEventBatch` from entries in arrival order
///
/// The first entry's timestamp becomes the batch base time; later entries are
/// stored as signed offsets from it.
#[derive(Debug, Default)]
pub struct BatchBuilder {
    client_name: Option<String>,
    base_timestamp: Option<Ticks>,
    layouts: StringPool,
    strings: StringPool,
    events: Vec<EventRecord>,
}

impl BatchBuilder {
    pub fn new(client_name: Option<String>) -> Self {
        Self {
            client_name,
            ..Self::default()
        }
    }

    /// Appends an entry, interning its strings
    ///
    /// An entry whose timestamp cannot be stored as an `i64` offset from the
    /// base time is rejected and leaves the batch unchanged.
    pub fn push(&mut self, entry: &LogEntry) -> Result<()> {
        let base = *self.base_timestamp.get_or_insert(entry.timestamp);
        let time_offset = entry
            .timestamp
            .checked_offset_from(base)
            .ok_or(BatchError::TimeRange {
                timestamp: entry.timestamp.0,
                base: base.0,
            })?;

        let mut properties = Vec::with_capacity(entry.properties.len());
        for (name, value) in &entry.properties {
            properties.push((self.layouts.intern(name)?, self.strings.intern(value)?));
        }

        let record = EventRecord {
            sequence_id: entry.sequence_id,
            level: entry.level.ordinal(),
            logger_ordinal: self.strings.intern(&entry.logger_name)?,
            time_offset,
            message_ordinal: self.strings.intern(&entry.message)?,
            properties,
            exception_ordinal: entry
                .exception
                .as_deref()
                .map(|x| self.strings.intern(x))
                .transpose()?,
        };
        self.events.push(record);
        Ok(())
    }

    /// Appends entries in order, stopping at the first rejected one
    pub fn extend<'a>(&mut self, entries: impl IntoIterator<Item = &'a LogEntry>) -> Result<()> {
        for entry in entries {
            self.push(entry)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Finishes the batch
    pub fn build(self) -> LogEventBatch {
        LogEventBatch::from_parts(
            self.client_name,
            self.base_timestamp.unwrap_or_default(),
            self.layouts.into_vec(),
            self.strings.into_vec(),
            self.events,
        )
    }
}
