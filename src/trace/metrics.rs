//! Metrics sidecar loading and precedence
//!
//! The metrics exporter may write periodic snapshots either inline in the
//! main trace stream or to a `<log>.metrics` sidecar. The sidecar keeps
//! high-frequency snapshots out of the growing trace log, so when it exists
//! and yields anything it is the authoritative view.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use super::model::MetricsSnapshot;

/// Fixed suffix appended to the main log path.
const SIDECAR_SUFFIX: &str = ".metrics";

pub fn sidecar_path(log_file: &Path) -> PathBuf {
    let mut path = OsString::from(log_file.as_os_str());
    path.push(SIDECAR_SUFFIX);
    PathBuf::from(path)
}

/// Read every metrics snapshot from the sidecar next to `log_file`.
///
/// The sidecar is parsed line-by-line like the main stream but filtered to
/// objects marked `event = metrics_summary`. A missing or unreadable
/// sidecar is an empty list, never an error.
pub fn read_sidecar(log_file: &Path) -> Vec<MetricsSnapshot> {
    let path = sidecar_path(log_file);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read metrics sidecar");
            return Vec::new();
        }
    };

    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let value: Value = serde_json::from_str(line).ok()?;
            if value.get("event").and_then(Value::as_str) != Some("metrics_summary") {
                return None;
            }
            serde_json::from_value(value).ok()
        })
        .collect()
}

/// Pick the authoritative metrics list: the sidecar when it produced at
/// least one snapshot, otherwise the inline-extracted list.
pub fn choose(sidecar: Vec<MetricsSnapshot>, inline: Vec<MetricsSnapshot>) -> Vec<MetricsSnapshot> {
    if sidecar.is_empty() {
        inline
    } else {
        sidecar
    }
}
