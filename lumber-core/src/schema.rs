//! Wire schema
//!
//! The field identifiers of a batch document and the order they appear in.
//! Both the serializer and the deserializer walk these tables, so the layout
//! is defined once and cannot drift between the two paths.

/// Current schema version, carried out of band by the transport
pub const SCHEMA_VERSION: u32 = 1;

/// Transport header naming the schema version of a payload
pub const SCHEMA_HEADER: &str = "x-lumber-schema";

/// A versioned wire layout
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub version: u32,
    pub batch_fields: &'static [BatchField],
    pub event_fields: &'static [EventField],
}

impl Schema {
    /// Looks up a supported schema by version
    pub fn for_version(version: u32) -> Option<&'static Schema> {
        (version == V1.version).then_some(&V1)
    }
}

/// Schema version 1
pub static V1: Schema = Schema {
    version: 1,
    batch_fields: &[
        BatchField::ClientName,
        BatchField::BaseTimestamp,
        BatchField::LayoutNames,
        BatchField::Strings,
        BatchField::Events,
    ],
    event_fields: &[
        EventField::SequenceId,
        EventField::Level,
        EventField::LoggerOrdinal,
        EventField::TimeOffset,
        EventField::MessageOrdinal,
        EventField::Properties,
        EventField::Exception,
    ],
};

/// Top-level fields of a batch document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchField {
    ClientName,
    BaseTimestamp,
    LayoutNames,
    Strings,
    Events,
}

impl BatchField {
    pub fn id(self) -> &'static str {
        match self {
            BatchField::ClientName => "cli",
            BatchField::BaseTimestamp => "bts",
            BatchField::LayoutNames => "lts",
            BatchField::Strings => "str",
            BatchField::Events => "ev",
        }
    }

    pub fn required(self) -> bool {
        matches!(self, BatchField::BaseTimestamp)
    }
}

/// Fields of one event record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventField {
    SequenceId,
    Level,
    LoggerOrdinal,
    TimeOffset,
    MessageOrdinal,
    Properties,
    Exception,
}

impl EventField {
    pub fn id(self) -> &'static str {
        match self {
            EventField::SequenceId => "id",
            EventField::Level => "lv",
            EventField::LoggerOrdinal => "lg",
            EventField::TimeOffset => "ts",
            EventField::MessageOrdinal => "m",
            EventField::Properties => "pr",
            EventField::Exception => "x",
        }
    }

    pub fn required(self) -> bool {
        !matches!(self, EventField::Properties | EventField::Exception)
    }
}

/// Field kinds a document can be checked against
pub trait WireField: Copy + PartialEq + 'static {
    fn id(self) -> &'static str;
    fn required(self) -> bool;
}

impl WireField for BatchField {
    fn id(self) -> &'static str {
        BatchField::id(self)
    }

    fn required(self) -> bool {
        BatchField::required(self)
    }
}

impl WireField for EventField {
    fn id(self) -> &'static str {
        EventField::id(self)
    }

    fn required(self) -> bool {
        EventField::required(self)
    }
}

/// Tracks the fields seen while reading one document
///
/// Fields must arrive in schema order, at most once each. Unknown identifiers
/// are reported as `None` so the caller can skip their values.
#[derive(Debug)]
pub struct FieldCursor<F: WireField> {
    fields: &'static [F],
    seen: Vec<bool>,
    last: Option<usize>,
}

impl<F: WireField> FieldCursor<F> {
    pub fn new(fields: &'static [F]) -> Self {
        Self {
            fields,
            seen: vec![false; fields.len()],
            last: None,
        }
    }

    /// Registers `id`, returning the matching field
    pub fn accept(&mut self, id: &str) -> Result<Option<F>, String> {
        let Some(position) = self.fields.iter().position(|f| f.id() == id) else {
            return Ok(None);
        };
        if self.seen[position] {
            return Err(format!("duplicate field `{}`", id));
        }
        if self.last.is_some_and(|last| position < last) {
            return Err(format!("field `{}` out of schema order", id));
        }
        self.seen[position] = true;
        self.last = Some(position);
        Ok(Some(self.fields[position]))
    }

    /// First required field that never showed up
    pub fn missing(&self) -> Option<&'static str> {
        self.fields
            .iter()
            .zip(&self.seen)
            .find(|(field, seen)| field.required() && !**seen)
            .map(|(field, _)| field.id())
    }
}
