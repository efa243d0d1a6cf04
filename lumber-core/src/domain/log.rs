//! Log domain types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;

/// Absolute UTC instant in 100 ns ticks since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticks(pub i64);

impl Ticks {
    /// Current wall-clock time
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Convert a chrono timestamp, truncating below 100 ns
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let secs = at.timestamp();
        let sub = i64::from(at.timestamp_subsec_nanos()) / NANOS_PER_TICK;
        Ticks(secs.saturating_mul(TICKS_PER_SECOND).saturating_add(sub))
    }

    /// Convert back to a chrono timestamp
    ///
    /// Returns `None` when the value is outside chrono's representable range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let secs = self.0.div_euclid(TICKS_PER_SECOND);
        let nanos = self.0.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK;
        DateTime::from_timestamp(secs, nanos as u32)
    }

    /// Apply a signed offset, `None` on overflow
    pub fn checked_add(self, offset: i64) -> Option<Self> {
        self.0.checked_add(offset).map(Ticks)
    }

    /// Signed distance from `base` to `self`, `None` on overflow
    pub fn checked_offset_from(self, base: Ticks) -> Option<i64> {
        self.0.checked_sub(base.0)
    }
}

impl From<DateTime<Utc>> for Ticks {
    fn from(at: DateTime<Utc>) -> Self {
        Self::from_datetime(at)
    }
}

/// Severity of a log entry
///
/// The discriminant is the level ordinal used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    /// Wire ordinal of this level
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Level for a wire ordinal, `None` if unknown
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(LogLevel::Trace),
            1 => Some(LogLevel::Debug),
            2 => Some(LogLevel::Info),
            3 => Some(LogLevel::Warn),
            4 => Some(LogLevel::Error),
            5 => Some(LogLevel::Fatal),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

/// A fully resolved log entry
///
/// Producers hand these to the batch builder, and the receiving side gets
/// them back from `codec::expand` with every ordinal resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Ticks,
    pub level: LogLevel,
    pub logger_name: String,
    pub message: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(default)]
    pub sequence_id: u64,
}

impl LogEntry {
    /// Creates an entry stamped with the current time
    pub fn new(level: LogLevel, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Ticks::now(),
            level,
            logger_name: logger_name.into(),
            message: message.into(),
            properties: BTreeMap::new(),
            exception: None,
            sequence_id: 0,
        }
    }

    pub fn at(mut self, timestamp: Ticks) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn with_sequence_id(mut self, sequence_id: u64) -> Self {
        self.sequence_id = sequence_id;
        self
    }
}
