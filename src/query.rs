//! Read API over the tailer, assembler and metrics merger
//!
//! One `TraceQuery` is constructed per source path and shared by every
//! request handler. Each operation pulls a fresh tailer refresh, then does
//! purely in-memory work on the returned snapshot, so a query never
//! observes a half-updated cache and never blocks on network I/O.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::trace::assembler::assemble;
use crate::trace::metrics;
use crate::trace::model::{now_epoch, LogRecord, MetricsSnapshot, TreeNode};
use crate::trace::tailer::LogTailer;

/// Server-side bounds for the paginated log view.
const MAX_LOG_LIMIT: usize = 10_000;
const DEFAULT_LOG_LIMIT: usize = 1_000;
const MIN_PREVIEW_CHARS: usize = 100;
const MAX_PREVIEW_CHARS: usize = 50_000;
const DEFAULT_PREVIEW_CHARS: usize = 2_000;
const MAX_RAW_ENTRIES: usize = 5_000;
const DEFAULT_RAW_ENTRIES: usize = 1_000;
const MAX_PAYLOAD_KEYS: usize = 32;

/// Response for the tree operation.
#[derive(Debug, Serialize)]
pub struct TreeResponse {
    pub generated_at: f64,
    pub log_file: String,
    pub roots: Vec<TreeNode>,
    pub total_nodes: usize,
    pub metrics: Vec<MetricsSnapshot>,
}

/// One flattened row of the paginated log view.
#[derive(Debug, Serialize)]
pub struct LogRow {
    /// Position of the record in the full accumulated sequence; stable
    /// until the cache resets, and the key for the payload operation.
    pub id: usize,
    pub timestamp: String,
    pub timestamp_epoch: f64,
    pub level: String,
    pub project: Option<String>,
    pub fn_type: Option<String>,
    pub function: Option<String>,
    pub message: Option<String>,
    pub call_id: Option<String>,
    pub parent_id: Option<String>,
    pub event: Option<String>,
    pub status: Option<String>,
    pub linked_to_trace: bool,
    pub is_trace_event: bool,
    /// Serialized trace payload, truncated at the requested preview length.
    pub payload_preview: String,
    /// Serialized payload size in bytes, before truncation.
    pub payload_size: usize,
    pub payload_truncated: bool,
    /// Sorted payload keys, capped so pathological payloads stay bounded.
    pub payload_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub generated_at: f64,
    pub log_file: String,
    pub total_entries: usize,
    pub logs: Vec<LogRow>,
}

/// Full untruncated payload for one log row.
#[derive(Debug, Serialize)]
pub struct PayloadResponse {
    pub id: usize,
    pub entry: LogRecord,
    pub payload: Value,
    pub payload_json: String,
    pub payload_size: usize,
}

/// Stateless read service over one trace log.
pub struct TraceQuery {
    tailer: LogTailer,
}

impl TraceQuery {
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            tailer: LogTailer::new(log_file),
        }
    }

    pub fn log_file(&self) -> &Path {
        self.tailer.path()
    }

    fn log_file_string(&self) -> String {
        self.tailer.path().display().to_string()
    }

    /// Assemble the current call forest and the authoritative metrics list.
    pub fn tree(&self) -> TreeResponse {
        let records = self.tailer.refresh();
        let assembly = assemble(&records);
        let metrics = metrics::choose(
            metrics::read_sidecar(self.tailer.path()),
            assembly.inline_metrics,
        );
        TreeResponse {
            generated_at: now_epoch(),
            log_file: self.log_file_string(),
            roots: assembly.roots,
            total_nodes: assembly.total_nodes,
            metrics,
        }
    }

    /// The most recent `limit` records as flattened rows, oldest first.
    pub fn logs(&self, limit: Option<usize>, preview_chars: Option<usize>) -> LogsResponse {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
        let preview_chars = preview_chars
            .unwrap_or(DEFAULT_PREVIEW_CHARS)
            .clamp(MIN_PREVIEW_CHARS, MAX_PREVIEW_CHARS);

        let records = self.tailer.refresh();
        let total_entries = records.len();
        let start = total_entries.saturating_sub(limit);
        let logs = records[start..]
            .iter()
            .enumerate()
            .map(|(offset, record)| build_row(start + offset, record, preview_chars))
            .collect();

        LogsResponse {
            generated_at: now_epoch(),
            log_file: self.log_file_string(),
            total_entries,
            logs,
        }
    }

    /// Full payload for the record at position `id`, or `None` when the id
    /// is outside the current sequence (it may have grown or been reset
    /// since the id was issued).
    pub fn log_payload(&self, id: usize) -> Option<PayloadResponse> {
        let records = self.tailer.refresh();
        let record = records.get(id)?;
        let payload = Value::Object(record.data.clone().unwrap_or_default());
        let payload_json = payload.to_string();
        Some(PayloadResponse {
            id,
            entry: record.clone(),
            payload_size: payload_json.len(),
            payload,
            payload_json,
        })
    }

    /// Raw parsed records for debugging: the last `limit` entries verbatim.
    pub fn entries(&self, limit: Option<usize>) -> Vec<LogRecord> {
        let limit = limit.unwrap_or(DEFAULT_RAW_ENTRIES).clamp(1, MAX_RAW_ENTRIES);
        let records = self.tailer.refresh();
        let start = records.len().saturating_sub(limit);
        records[start..].to_vec()
    }
}

fn build_row(id: usize, record: &LogRecord, preview_chars: usize) -> LogRow {
    let (payload_preview, payload_size, payload_truncated, payload_keys) =
        preview_payload(record.data.as_ref(), preview_chars);

    LogRow {
        id,
        timestamp: record.timestamp.clone(),
        timestamp_epoch: record.epoch(),
        level: record.level.clone(),
        project: record.project.clone(),
        fn_type: record.fn_type().map(str::to_owned),
        function: record.function_name().map(str::to_owned),
        message: record.message.clone(),
        call_id: record.call_id().map(str::to_owned),
        parent_id: record.parent_id().map(str::to_owned),
        event: record.event().map(str::to_owned),
        status: record.status().map(str::to_owned),
        linked_to_trace: record.call_id().is_some(),
        is_trace_event: record.is_trace_event(),
        payload_preview,
        payload_size,
        payload_truncated,
        payload_keys,
    }
}

fn preview_payload(
    data: Option<&Map<String, Value>>,
    preview_chars: usize,
) -> (String, usize, bool, Vec<String>) {
    let Some(data) = data.filter(|d| !d.is_empty()) else {
        return (String::new(), 0, false, Vec::new());
    };

    let serialized = Value::Object(data.clone()).to_string();
    let payload_size = serialized.len();

    let mut keys: Vec<String> = data.keys().cloned().collect();
    keys.sort();
    keys.truncate(MAX_PAYLOAD_KEYS);

    if serialized.chars().count() > preview_chars {
        let preview: String = serialized.chars().take(preview_chars).collect();
        (preview, payload_size, true, keys)
    } else {
        (serialized, payload_size, false, keys)
    }
}
