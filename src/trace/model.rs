//! Data model for parsed trace-log records and assembled call nodes

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One decoded line from the trace log.
///
/// A line is only a record if it decodes as a JSON object carrying both
/// `timestamp` and `level`; everything else is dropped by the parser. The
/// `data` object holds the trace-event fields when the line was emitted by
/// the instrumentation layer, and is `None` for plain log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub fn_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Wall-clock duration in seconds, set by the instrumentation on end events.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "object_or_none")]
    pub data: Option<Map<String, Value>>,
}

/// Tolerate `data: null` or a non-object `data`; the record is still valid,
/// it just carries no trace event.
fn object_or_none<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    })
}

impl LogRecord {
    fn data_value(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.get(key)
    }

    /// String payload field, empty strings treated as absent.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data_value(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn data_f64(&self, key: &str) -> Option<f64> {
        self.data_value(key).and_then(Value::as_f64)
    }

    pub fn data_u64(&self, key: &str) -> Option<u64> {
        self.data_value(key).and_then(Value::as_u64)
    }

    pub fn data_clone(&self, key: &str) -> Option<Value> {
        self.data_value(key).filter(|v| !v.is_null()).cloned()
    }

    pub fn call_id(&self) -> Option<&str> {
        self.data_str("call_id")
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.data_str("parent_id")
    }

    pub fn event(&self) -> Option<&str> {
        self.data_str("event")
    }

    pub fn status(&self) -> Option<&str> {
        self.data_str("status")
    }

    pub fn time_epoch(&self) -> Option<f64> {
        self.data_f64("time_epoch")
    }

    /// Function name, preferring the top-level field over the payload copy.
    pub fn function_name(&self) -> Option<&str> {
        self.function
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.data_str("function"))
    }

    pub fn fn_type(&self) -> Option<&str> {
        self.fn_type
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.data_str("fn_type"))
    }

    /// True for call lifecycle events (start/end/error), false for plain
    /// records and metrics summaries.
    pub fn is_trace_event(&self) -> bool {
        matches!(self.event(), Some("start" | "end" | "error"))
    }

    /// Epoch seconds for this record: the payload's `time_epoch` when the
    /// instrumentation recorded one, otherwise parsed from `timestamp`.
    pub fn epoch(&self) -> f64 {
        self.time_epoch()
            .unwrap_or_else(|| timestamp_epoch(&self.timestamp))
    }
}

/// One node in the reconstructed call tree, keyed by `call_id`.
///
/// Nodes are created lazily the first time an id is referenced, either as
/// the subject of an event or as someone's parent, so every field starts
/// unset and is filled in as events arrive. `children` holds child ids in
/// first-seen order; it is skipped during serialization because responses
/// always nest children as full nodes.
#[derive(Debug, Clone, Serialize)]
pub struct CallNode {
    pub call_id: String,
    pub parent_id: Option<String>,
    pub function: Option<String>,
    pub fn_type: Option<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub duration: Option<f64>,
    pub cpu_time: Option<f64>,
    pub mem_peak_kb: Option<f64>,
    pub mem_rss_kb: Option<f64>,
    pub mem_delta_kb: Option<f64>,
    pub mem_mode: Option<String>,
    pub args_preview: Option<Value>,
    pub kwargs_preview: Option<Value>,
    pub result_preview: Option<Value>,
    pub status: Option<String>,
    pub error: Option<String>,
    pub level: Option<String>,
    pub project: Option<String>,
    #[serde(skip_serializing)]
    pub children: Vec<String>,
}

impl CallNode {
    pub fn new(call_id: String, parent_id: Option<String>) -> Self {
        Self {
            call_id,
            parent_id,
            function: None,
            fn_type: None,
            start_time: None,
            end_time: None,
            duration: None,
            cpu_time: None,
            mem_peak_kb: None,
            mem_rss_kb: None,
            mem_delta_kb: None,
            mem_mode: None,
            args_preview: None,
            kwargs_preview: None,
            result_preview: None,
            status: None,
            error: None,
            level: None,
            project: None,
            children: Vec::new(),
        }
    }
}

/// Materialized call node with children expanded recursively.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: CallNode,
    pub children: Vec<TreeNode>,
}

/// Periodic per-function aggregate snapshot, either extracted inline from
/// the main stream (`event = metrics_summary`) or read from the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: Option<String>,
    pub status: Option<String>,
    #[serde(default = "empty_metrics")]
    pub metrics: Value,
    #[serde(default)]
    pub total_functions: Option<u64>,
    #[serde(default)]
    pub total_calls: Option<u64>,
    #[serde(default)]
    pub generated_at: Option<f64>,
}

fn empty_metrics() -> Value {
    Value::Array(Vec::new())
}

impl MetricsSnapshot {
    /// Normalize an inline `metrics_summary` record into a snapshot.
    pub fn from_record(record: &LogRecord) -> Self {
        Self {
            timestamp: Some(record.timestamp.clone()),
            status: record
                .status()
                .map(str::to_owned)
                .or_else(|| Some(record.level.clone())),
            metrics: record
                .data_clone("metrics")
                .unwrap_or_else(empty_metrics),
            total_functions: record.data_u64("total_functions"),
            total_calls: record.data_u64("total_calls"),
            generated_at: record
                .data_f64("generated_at")
                .or_else(|| Some(timestamp_epoch(&record.timestamp))),
        }
    }
}

/// Epoch seconds for a `YYYY-MM-DDTHH:MM:SS` timestamp, falling back to the
/// current time when the string does not parse.
pub fn timestamp_epoch(timestamp: &str) -> f64 {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.and_utc().timestamp() as f64)
        .unwrap_or_else(|_| now_epoch())
}

/// Current time as fractional epoch seconds.
pub fn now_epoch() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> LogRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_trace_accessors() {
        let rec = record(
            r#"{"timestamp":"2024-01-01T00:00:00","level":"INFO",
                "data":{"call_id":"a","parent_id":"b","event":"start","time_epoch":12.5}}"#,
        );
        assert_eq!(rec.call_id(), Some("a"));
        assert_eq!(rec.parent_id(), Some("b"));
        assert_eq!(rec.event(), Some("start"));
        assert_eq!(rec.time_epoch(), Some(12.5));
        assert!(rec.is_trace_event());
    }

    #[test]
    fn test_empty_strings_treated_as_absent() {
        let rec = record(
            r#"{"timestamp":"t","level":"INFO","data":{"call_id":"","parent_id":""}}"#,
        );
        assert_eq!(rec.call_id(), None);
        assert_eq!(rec.parent_id(), None);
    }

    #[test]
    fn test_null_data_is_tolerated() {
        let rec = record(r#"{"timestamp":"t","level":"INFO","data":null}"#);
        assert!(rec.data.is_none());
        assert!(!rec.is_trace_event());

        let rec = record(r#"{"timestamp":"t","level":"INFO","data":"oops"}"#);
        assert!(rec.data.is_none());
    }

    #[test]
    fn test_function_name_prefers_top_level() {
        let rec = record(
            r#"{"timestamp":"t","level":"INFO","function":"outer",
                "data":{"function":"inner"}}"#,
        );
        assert_eq!(rec.function_name(), Some("outer"));

        let rec = record(r#"{"timestamp":"t","level":"INFO","data":{"function":"inner"}}"#);
        assert_eq!(rec.function_name(), Some("inner"));
    }

    #[test]
    fn test_timestamp_epoch_parses_source_format() {
        let epoch = timestamp_epoch("2024-01-01T00:00:00");
        assert_eq!(epoch, 1704067200.0);
    }

    #[test]
    fn test_timestamp_epoch_fallback_is_recent() {
        let before = now_epoch();
        let epoch = timestamp_epoch("not a timestamp");
        assert!(epoch >= before);
    }

    #[test]
    fn test_metrics_snapshot_from_record() {
        let rec = record(
            r#"{"timestamp":"2024-01-01T00:00:00","level":"INFO",
                "data":{"event":"metrics_summary","metrics":[{"function":"f","count":3}],
                        "total_functions":1,"total_calls":3,"generated_at":99.0}}"#,
        );
        let snap = MetricsSnapshot::from_record(&rec);
        assert_eq!(snap.total_functions, Some(1));
        assert_eq!(snap.total_calls, Some(3));
        assert_eq!(snap.generated_at, Some(99.0));
        assert_eq!(snap.status.as_deref(), Some("INFO"));
        assert!(snap.metrics.is_array());
    }
}
