//! Trace reconstruction subsystem
//!
//! Rebuilds a hierarchical call-trace model from an append-only stream of
//! structured log records:
//!
//! ```text
//! file bytes -> tailer -> parser -> record cache
//!                                       |
//!                     assembler / metrics merger (per query)
//! ```
//!
//! The tailer owns incremental consumption of one source file, including
//! rotation/truncation detection; the parser validates individual lines;
//! the assembler replays the whole cached sequence into a call forest on
//! every query; the metrics merger reconciles the sidecar snapshot file
//! against snapshots embedded inline in the main stream.

pub mod assembler;
pub mod metrics;
pub mod model;
pub mod parser;
pub mod tailer;

pub use assembler::{assemble, Assembly};
pub use model::{CallNode, LogRecord, MetricsSnapshot, TreeNode};
pub use tailer::LogTailer;
