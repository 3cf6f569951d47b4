use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use okteto_types::{LogEntry, LogLevel};

/// Parser for remote log stream payloads
pub struct LogParser;

impl LogParser {
    /// Parse an event payload into a LogEntry.
    ///
    /// Payloads are usually JSON objects with `message`, `level`, `stage` and
    /// `timestamp` fields; anything else is kept as a plain message.
    pub fn parse(raw: &str) -> LogEntry {
        let mut entry = LogEntry::new(raw.to_string());

        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(raw) else {
            return entry;
        };

        if let Some(message) = fields.get("message").and_then(Value::as_str) {
            entry.message = message.to_string();
        }
        if let Some(level) = fields.get("level").and_then(Value::as_str) {
            entry.level = LogLevel::from(level);
        }
        entry.stage = fields
            .get("stage")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        entry.timestamp = fields.get("timestamp").and_then(Self::parse_timestamp);

        entry
    }

    /// Timestamps come either as unix seconds or as RFC 3339 strings
    fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Number(n) => Utc.timestamp_opt(n.as_i64()?, 0).single(),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|ts| ts.with_timezone(&Utc)),
            _ => None,
        }
    }
}
