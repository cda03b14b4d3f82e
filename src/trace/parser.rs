//! Line parser for the newline-delimited JSON trace log
//!
//! Malformed lines are expected and benign (partial writes, non-trace log
//! output interleaved in the same file), so rejection is silent: the parser
//! either yields a validated [`LogRecord`] or nothing.

use serde_json::Value;

use super::model::LogRecord;

/// Decode one line of text into a [`LogRecord`], or reject it.
///
/// A line qualifies only if it is a JSON object containing both `timestamp`
/// and `level`. Pure function; no side effects.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value: Value = serde_json::from_str(line).ok()?;
    let obj = value.as_object()?;
    if !obj.contains_key("timestamp") || !obj.contains_key("level") {
        return None;
    }

    serde_json::from_value(value).ok()
}
