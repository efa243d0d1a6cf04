//! Log batch DTOs
//!
//! A `LogEventBatch` is the self-contained package sent from a producer to a
//! collector. Serialization walks the field tables in `crate::schema`, which
//! fixes both the identifiers and their order on the wire.

use std::fmt;

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::log::Ticks;
use crate::schema::{self, BatchField, EventField, FieldCursor};

/// Compact record of one log event
///
/// Ordinals index the owning batch's `strings` table, except the first half
/// of each `properties` pair which indexes `layout_names`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    pub sequence_id: u64,
    pub level: u8,
    pub logger_ordinal: u32,
    pub time_offset: i64,
    pub message_ordinal: u32,
    pub properties: Vec<(u32, u32)>,
    pub exception_ordinal: Option<u32>,
}

/// Batch of log events sharing a base time and string tables
///
/// Batches are immutable once built; the builder and the decoder are the only
/// ways to obtain one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEventBatch {
    client_name: Option<String>,
    base_timestamp: Ticks,
    layout_names: Vec<String>,
    strings: Vec<String>,
    events: Vec<EventRecord>,
}

impl LogEventBatch {
    pub(crate) fn from_parts(
        client_name: Option<String>,
        base_timestamp: Ticks,
        layout_names: Vec<String>,
        strings: Vec<String>,
        events: Vec<EventRecord>,
    ) -> Self {
        Self {
            client_name,
            base_timestamp,
            layout_names,
            strings,
            events,
        }
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    pub fn base_timestamp(&self) -> Ticks {
        self.base_timestamp
    }

    pub fn layout_names(&self) -> &[String] {
        &self.layout_names
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Number of events in the batch
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Serialize for LogEventBatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for &field in schema::V1.batch_fields {
            let id = field.id();
            match field {
                BatchField::ClientName => {
                    if let Some(name) = &self.client_name {
                        map.serialize_entry(id, name)?;
                    }
                }
                BatchField::BaseTimestamp => map.serialize_entry(id, &self.base_timestamp)?,
                BatchField::LayoutNames => map.serialize_entry(id, &self.layout_names)?,
                BatchField::Strings => map.serialize_entry(id, &self.strings)?,
                BatchField::Events => map.serialize_entry(id, &self.events)?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LogEventBatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(BatchVisitor)
    }
}

struct BatchVisitor;

impl<'de> Visitor<'de> for BatchVisitor {
    type Value = LogEventBatch;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a log event batch")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut cursor = FieldCursor::new(schema::V1.batch_fields);
        let mut client_name = None;
        let mut base_timestamp = None;
        let mut layout_names = Vec::new();
        let mut strings = Vec::new();
        let mut events = Vec::new();

        while let Some(key) = map.next_key::<String>()? {
            match cursor.accept(&key).map_err(de::Error::custom)? {
                None => {
                    map.next_value::<IgnoredAny>()?;
                }
                Some(BatchField::ClientName) => client_name = map.next_value()?,
                Some(BatchField::BaseTimestamp) => base_timestamp = Some(map.next_value()?),
                Some(BatchField::LayoutNames) => {
                    layout_names = map.next_value::<Option<_>>()?.unwrap_or_default()
                }
                Some(BatchField::Strings) => {
                    strings = map.next_value::<Option<_>>()?.unwrap_or_default()
                }
                Some(BatchField::Events) => {
                    events = map.next_value::<Option<_>>()?.unwrap_or_default()
                }
            }
        }

        if let Some(id) = cursor.missing() {
            return Err(de::Error::missing_field(id));
        }
        let base_timestamp = base_timestamp
            .ok_or_else(|| de::Error::missing_field(BatchField::BaseTimestamp.id()))?;

        Ok(LogEventBatch {
            client_name,
            base_timestamp,
            layout_names,
            strings,
            events,
        })
    }
}

impl Serialize for EventRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for &field in schema::V1.event_fields {
            let id = field.id();
            match field {
                EventField::SequenceId => map.serialize_entry(id, &self.sequence_id)?,
                EventField::Level => map.serialize_entry(id, &self.level)?,
                EventField::LoggerOrdinal => map.serialize_entry(id, &self.logger_ordinal)?,
                EventField::TimeOffset => map.serialize_entry(id, &self.time_offset)?,
                EventField::MessageOrdinal => map.serialize_entry(id, &self.message_ordinal)?,
                EventField::Properties => {
                    if !self.properties.is_empty() {
                        map.serialize_entry(id, &self.properties)?;
                    }
                }
                EventField::Exception => {
                    if let Some(ordinal) = self.exception_ordinal {
                        map.serialize_entry(id, &ordinal)?;
                    }
                }
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EventRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EventVisitor)
    }
}

struct EventVisitor;

impl<'de> Visitor<'de> for EventVisitor {
    type Value = EventRecord;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an event record")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut cursor = FieldCursor::new(schema::V1.event_fields);
        let mut record = EventRecord::default();

        while let Some(key) = map.next_key::<String>()? {
            match cursor.accept(&key).map_err(de::Error::custom)? {
                None => {
                    map.next_value::<IgnoredAny>()?;
                }
                Some(EventField::SequenceId) => record.sequence_id = map.next_value()?,
                Some(EventField::Level) => record.level = map.next_value()?,
                Some(EventField::LoggerOrdinal) => record.logger_ordinal = map.next_value()?,
                Some(EventField::TimeOffset) => record.time_offset = map.next_value()?,
                Some(EventField::MessageOrdinal) => record.message_ordinal = map.next_value()?,
                Some(EventField::Properties) => {
                    record.properties = map.next_value::<Option<_>>()?.unwrap_or_default()
                }
                Some(EventField::Exception) => record.exception_ordinal = map.next_value()?,
            }
        }

        if let Some(id) = cursor.missing() {
            return Err(de::Error::missing_field(id));
        }

        Ok(record)
    }
}
