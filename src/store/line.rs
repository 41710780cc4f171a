//! Timestamped log line
//!
//! The single serialized form `"<timestamp> - <payload>\n"` is shared by the
//! file store and the live broadcast, so both always carry identical bytes.

use bytes::Bytes;
use chrono::{Local, NaiveDateTime};

/// Timestamp format: ISO-8601 local time with microseconds, no offset
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Separator between timestamp and payload
const SEPARATOR: &str = " - ";

/// An immutable timestamped log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    timestamp: String,
    payload: String,
}

impl LogLine {
    /// Create a line from an already formatted timestamp
    pub fn new(timestamp: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            payload: payload.into(),
        }
    }

    /// Create a line stamped with the current local wall-clock time
    pub fn now(payload: impl Into<String>) -> Self {
        Self::new(Local::now().format(TIMESTAMP_FORMAT).to_string(), payload)
    }

    /// Parse a serialized line (trailing newline optional)
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let (timestamp, payload) = line.split_once(SEPARATOR)?;
        Some(Self::new(timestamp, payload))
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Parse the timestamp back into a date-time, if well formed
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).ok()
    }

    /// Serialized form including the trailing newline
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(format!("{}{}{}\n", self.timestamp, SEPARATOR, self.payload))
    }
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.timestamp, SEPARATOR, self.payload)
    }
}
