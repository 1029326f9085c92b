//! Timestamp rendering for persisted records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the record timestamp is written by text-oriented persisters
///
/// JSON-lines records always carry the full RFC 3339 value so they
/// round-trip; this setting only affects human-readable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// `2025-01-08T10:30:45.123456789+00:00`
    Rfc3339,

    /// Milliseconds since the Unix epoch
    UnixMillis,

    /// Any strftime-compatible pattern
    Custom(String),
}

impl TimestampFormat {
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::Iso8601Micros => datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(pattern) => datetime.format(pattern).to_string(),
        }
    }

    /// Compact time-of-day used by the console persister
    #[must_use]
    pub fn short(datetime: &DateTime<Utc>) -> String {
        datetime.format("%H:%M:%S%.3f").to_string()
    }
}
