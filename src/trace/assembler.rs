//! Call-tree assembly from the accumulated record sequence
//!
//! The assembler rebuilds the whole node map from scratch on every
//! invocation. That is a deliberate trade-off: a full O(n) replay over an
//! append-only sequence is trivial to reason about, and n is bounded by
//! realistic trace-log sizes at interactive query rates, so no incremental
//! diffing is attempted.

use std::collections::{HashMap, HashSet};

use super::model::{CallNode, LogRecord, MetricsSnapshot, TreeNode};

/// Result of one full assembly pass.
pub struct Assembly {
    /// Root nodes with children expanded, in first-seen order.
    pub roots: Vec<TreeNode>,
    /// Total number of distinct call ids observed.
    pub total_nodes: usize,
    /// Metrics snapshots embedded inline in the main stream.
    pub inline_metrics: Vec<MetricsSnapshot>,
}

/// Node map with an explicit insertion-order list so rebuilds of the same
/// record sequence materialize byte-for-byte identical trees.
#[derive(Default)]
struct NodeMap {
    nodes: HashMap<String, CallNode>,
    order: Vec<String>,
}

impl NodeMap {
    /// Get-or-create the node for `call_id`. The parent link is backfilled
    /// only while still unset; once known it is never overwritten, so a
    /// later event carrying no parent cannot clobber a correct link.
    fn ensure(&mut self, call_id: &str, parent_id: Option<&str>) -> &mut CallNode {
        if !self.nodes.contains_key(call_id) {
            self.order.push(call_id.to_owned());
            self.nodes.insert(
                call_id.to_owned(),
                CallNode::new(call_id.to_owned(), parent_id.map(str::to_owned)),
            );
        }
        let node = self
            .nodes
            .get_mut(call_id)
            .expect("node inserted above");
        if node.parent_id.is_none() {
            if let Some(parent_id) = parent_id {
                node.parent_id = Some(parent_id.to_owned());
            }
        }
        node
    }
}

/// Replay `records` in file order and produce the current call forest plus
/// the inline metrics list.
pub fn assemble(records: &[LogRecord]) -> Assembly {
    let mut map = NodeMap::default();
    let mut inline_metrics = Vec::new();

    for record in records {
        if record.event() == Some("metrics_summary") {
            inline_metrics.push(MetricsSnapshot::from_record(record));
            continue;
        }
        let Some(call_id) = record.call_id().map(str::to_owned) else {
            // Not a structured trace event.
            continue;
        };
        let parent_id = record.parent_id().map(str::to_owned);

        apply_record(map.ensure(&call_id, parent_id.as_deref()), record);

        if let Some(parent_id) = parent_id {
            let parent = map.ensure(&parent_id, None);
            if !parent.children.iter().any(|c| *c == call_id) {
                parent.children.push(call_id);
            }
        }
    }

    let roots = materialize_roots(&map);
    Assembly {
        roots,
        total_nodes: map.nodes.len(),
        inline_metrics,
    }
}

/// Apply one record's fields to its node. Replay order makes the last
/// applicable event win for every field; an explicit `status` in the
/// payload always beats the event's canonical value.
fn apply_record(node: &mut CallNode, record: &LogRecord) {
    if node.function.is_none() {
        node.function = record.function_name().map(str::to_owned);
    }
    if node.fn_type.is_none() {
        node.fn_type = record.fn_type().map(str::to_owned);
    }
    if node.level.is_none() {
        node.level = Some(record.level.clone());
    }
    if node.project.is_none() {
        node.project = record.project.clone();
    }

    let explicit_status = record.status().map(str::to_owned);
    if let Some(status) = &explicit_status {
        node.status = Some(status.clone());
    }

    match record.event() {
        Some("start") => {
            node.start_time = Some(record.epoch());
            node.args_preview = record.data_clone("args_preview");
            node.kwargs_preview = record.data_clone("kwargs_preview");
            if explicit_status.is_none() {
                node.status = Some("running".to_owned());
            }
        }
        Some("end") => {
            node.end_time = Some(record.epoch());
            node.duration = record.duration;
            node.cpu_time = record.data_f64("cpu_time");
            node.mem_rss_kb = record
                .data_f64("mem_rss_kb")
                .or_else(|| record.data_f64("mem_peak_kb"));
            node.mem_peak_kb = record.data_f64("mem_peak_kb");
            node.mem_delta_kb = record.data_f64("mem_delta_kb");
            if let Some(mode) = record.data_str("mem_mode") {
                node.mem_mode = Some(mode.to_owned());
            }
            node.result_preview = record.data_clone("result_preview");
            if explicit_status.is_none() {
                node.status = Some("success".to_owned());
            }
        }
        Some("error") => {
            node.error = record.message.clone();
            node.end_time = Some(record.epoch());
            if explicit_status.is_none() {
                node.status = Some("error".to_owned());
            }
        }
        _ => {}
    }
}

/// Root set: nodes with no parent link, plus nodes whose id was never
/// registered under any other node (self-healing when the parent-link
/// event is missing).
fn materialize_roots(map: &NodeMap) -> Vec<TreeNode> {
    let mut seen_as_child = HashSet::new();
    for id in &map.order {
        for child in &map.nodes[id].children {
            seen_as_child.insert(child.as_str());
        }
    }

    let mut roots = Vec::new();
    let mut path = Vec::new();
    for id in &map.order {
        let node = &map.nodes[id];
        if node.parent_id.is_none() || !seen_as_child.contains(id.as_str()) {
            roots.push(materialize(map, id, &mut path));
        }
    }
    roots
}

fn materialize(map: &NodeMap, id: &str, path: &mut Vec<String>) -> TreeNode {
    let node = &map.nodes[id];
    path.push(id.to_owned());
    let mut children = Vec::with_capacity(node.children.len());
    for child in &node.children {
        // Malformed input can produce a cycle; stop expanding instead of
        // recursing forever.
        if path.iter().any(|ancestor| ancestor == child) {
            continue;
        }
        children.push(materialize(map, child, path));
    }
    path.pop();
    TreeNode {
        node: node.clone(),
        children,
    }
}
